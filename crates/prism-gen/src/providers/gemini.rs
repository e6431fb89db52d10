//! Gemini image generation provider
//!
//! Gemini answers `generateContent` with the image inline, so a submission
//! is already finished: the task is created as `success` with the image
//! carried as a `data:` URL and never needs polling.

use prism_core::{MediaType, TaskStatus};
use serde_json::json;

use super::http::{build_agent, post_json};
use crate::config::PrismConfig;
use crate::provider::*;

const DEFAULT_GEMINI_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Gemini provider for synchronous image generation
pub struct GeminiProvider {
    api_key: String,
    base_url: String,
    agent: ureq::Agent,
}

impl GeminiProvider {
    /// Create a new GeminiProvider from config
    pub fn from_config(config: &PrismConfig) -> Result<Self, ProviderError> {
        let api_key = config
            .api_key("gemini")
            .ok_or_else(|| ProviderError::Unconfigured("gemini".to_string()))?;
        let base_url = config.api_url("gemini").unwrap_or(DEFAULT_GEMINI_URL);
        Ok(Self::new(api_key, base_url))
    }

    pub fn new(api_key: &str, base_url: &str) -> Self {
        Self {
            api_key: api_key.to_string(),
            base_url: base_url.trim_end_matches('/').to_string(),
            agent: build_agent(),
        }
    }

    fn generate_url(&self, model: &str) -> String {
        format!("{}/models/{}:generateContent", self.base_url, model)
    }
}

/// An inline image pulled out of a `generateContent` response
#[derive(Debug, Clone, PartialEq)]
pub struct InlineImage {
    pub mime_type: String,
    pub data: String,
}

impl InlineImage {
    pub fn data_url(&self) -> String {
        format!("data:{};base64,{}", self.mime_type, self.data)
    }
}

/// Find the first inline image part in a `generateContent` response
pub fn parse_inline_image(response: &serde_json::Value) -> Option<InlineImage> {
    response
        .get("candidates")?
        .as_array()?
        .iter()
        .filter_map(|c| c.get("content")?.get("parts")?.as_array())
        .flatten()
        .find_map(|part| {
            let inline = part.get("inlineData").or_else(|| part.get("inline_data"))?;
            let data = inline.get("data")?.as_str()?;
            let mime_type = inline
                .get("mimeType")
                .or_else(|| inline.get("mime_type"))
                .and_then(|m| m.as_str())
                .unwrap_or("image/png");
            Some(InlineImage {
                mime_type: mime_type.to_string(),
                data: data.to_string(),
            })
        })
}

fn finish_reason(response: &serde_json::Value) -> &str {
    response
        .pointer("/candidates/0/finishReason")
        .and_then(|r| r.as_str())
        .or_else(|| {
            response
                .pointer("/promptFeedback/blockReason")
                .and_then(|r| r.as_str())
        })
        .unwrap_or("no image returned")
}

/// Turn a `generateContent` response into a finished submission
pub fn submission_from_response(
    response: &serde_json::Value,
) -> Result<Submission, ProviderError> {
    let image = parse_inline_image(response).ok_or_else(|| {
        ProviderError::RequestRejected(format!("Gemini returned no image: {}", finish_reason(response)))
    })?;

    let provider_task_id = response
        .get("responseId")
        .and_then(|r| r.as_str())
        .map(|r| r.to_string())
        .unwrap_or_else(|| format!("gemini-{}", uuid::Uuid::new_v4()));

    let url = image.data_url();
    Ok(Submission {
        provider_task_id,
        status: TaskStatus::Success,
        info: Some(json!({ "images": [{ "imageUrl": url }] })),
        result: Some(json!({ "images": [{ "url": url, "mimeType": image.mime_type }] })),
    })
}

impl GenerationProvider for GeminiProvider {
    fn name(&self) -> &str {
        "gemini"
    }

    fn supported_media(&self) -> Vec<MediaType> {
        vec![MediaType::Image]
    }

    fn generate(&self, request: &GenerateRequest) -> Result<Submission, ProviderError> {
        request.validate()?;
        if request.media_type != MediaType::Image {
            return Err(ProviderError::RequestRejected(format!(
                "gemini does not generate {}",
                request.media_type
            )));
        }

        let payload = json!({
            "contents": [{ "parts": [{ "text": request.prompt }] }],
            "generationConfig": { "responseModalities": ["TEXT", "IMAGE"] }
        });

        let response = post_json(
            &self.agent,
            "gemini",
            &self.generate_url(&request.model),
            ("x-goog-api-key", &self.api_key),
            &payload,
        )?;
        submission_from_response(&response)
    }

    fn query(&self, query: &TaskQuery) -> Result<QueryOutcome, ProviderError> {
        // Submissions finish synchronously, so there is no upstream job to ask about.
        Err(ProviderError::RequestRejected(format!(
            "gemini task {} has no pollable job",
            query.provider_task_id
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_inline_image() {
        let response: serde_json::Value = serde_json::from_str(
            r#"{
                "candidates": [{
                    "content": {
                        "parts": [
                            {"text": "Here is your cat"},
                            {"inlineData": {"mimeType": "image/png", "data": "iVBORw0KGgo="}}
                        ]
                    },
                    "finishReason": "STOP"
                }],
                "responseId": "resp-123"
            }"#,
        )
        .unwrap();

        let image = parse_inline_image(&response).unwrap();
        assert_eq!(image.mime_type, "image/png");
        assert_eq!(image.data_url(), "data:image/png;base64,iVBORw0KGgo=");

        let submission = submission_from_response(&response).unwrap();
        assert_eq!(submission.provider_task_id, "resp-123");
        assert_eq!(submission.status, TaskStatus::Success);
        assert_eq!(
            submission.info.unwrap()["images"][0]["imageUrl"],
            "data:image/png;base64,iVBORw0KGgo="
        );
    }

    #[test]
    fn test_text_only_response_is_rejected() {
        let response = json!({
            "candidates": [{
                "content": {"parts": [{"text": "I can't draw that"}]},
                "finishReason": "IMAGE_SAFETY"
            }]
        });
        match submission_from_response(&response) {
            Err(ProviderError::RequestRejected(msg)) => assert!(msg.contains("IMAGE_SAFETY")),
            other => panic!("expected rejection, got {:?}", other),
        }
    }

    #[test]
    fn test_generate_url() {
        let provider = GeminiProvider::new("k", "https://example.com/v1beta/");
        assert_eq!(
            provider.generate_url("gemini-2.5-flash-image"),
            "https://example.com/v1beta/models/gemini-2.5-flash-image:generateContent"
        );
    }

    #[test]
    fn test_rejects_video_before_network() {
        let provider = GeminiProvider::new("k", "http://127.0.0.1:9");
        let request = GenerateRequest {
            media_type: MediaType::Video,
            model: "gemini-2.5-flash-image".to_string(),
            prompt: "a cat".to_string(),
        };
        assert!(matches!(
            provider.generate(&request),
            Err(ProviderError::RequestRejected(_))
        ));
    }
}
