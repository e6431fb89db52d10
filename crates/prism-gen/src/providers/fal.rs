//! fal.ai queue provider
//!
//! Submissions go to `POST {base}/{model}` and come back with a request id.
//! Status and results live under a coarser path than the model id: only its
//! first two `/` segments (`fal-ai/flux-pro/v1.1` is polled under
//! `fal-ai/flux-pro`).

use prism_core::{MediaType, TaskStatus};
use serde_json::json;

use super::http::{build_agent, get_json_with_retry, post_json};
use crate::config::PrismConfig;
use crate::provider::*;

const DEFAULT_FAL_URL: &str = "https://queue.fal.run";

/// fal.ai provider for queued image and video generation
pub struct FalProvider {
    api_key: String,
    base_url: String,
    agent: ureq::Agent,
}

impl FalProvider {
    /// Create a new FalProvider from config
    pub fn from_config(config: &PrismConfig) -> Result<Self, ProviderError> {
        let api_key = config
            .api_key("fal")
            .ok_or_else(|| ProviderError::Unconfigured("fal".to_string()))?;
        let base_url = config.api_url("fal").unwrap_or(DEFAULT_FAL_URL);
        Ok(Self::new(api_key, base_url))
    }

    pub fn new(api_key: &str, base_url: &str) -> Self {
        Self {
            api_key: api_key.to_string(),
            base_url: base_url.trim_end_matches('/').to_string(),
            agent: build_agent(),
        }
    }

    fn auth(&self) -> String {
        format!("Key {}", self.api_key)
    }

    fn submit_url(&self, model: &str) -> String {
        format!("{}/{}", self.base_url, model)
    }

    fn status_url(&self, model: &str, request_id: &str) -> String {
        format!(
            "{}/{}/requests/{}/status",
            self.base_url,
            query_model(model),
            request_id
        )
    }

    fn result_url(&self, model: &str, request_id: &str) -> String {
        format!(
            "{}/{}/requests/{}",
            self.base_url,
            query_model(model),
            request_id
        )
    }
}

/// Path scope fal uses for status and result lookups
pub fn query_model(model: &str) -> String {
    model.split('/').take(2).collect::<Vec<_>>().join("/")
}

/// Map a fal queue status onto the task lifecycle; `None` when unrecognised
pub fn map_queue_status(status: &str) -> Option<TaskStatus> {
    match status {
        "IN_QUEUE" => Some(TaskStatus::Pending),
        "IN_PROGRESS" => Some(TaskStatus::Processing),
        "COMPLETED" => Some(TaskStatus::Success),
        "FAILED" | "ERROR" | "CANCELLED" => Some(TaskStatus::Failed),
        _ => None,
    }
}

/// Status of a queue status document. A missing or unrecognised status is
/// a transient error, so the stored task stays as it is.
pub fn queue_status(status_doc: &serde_json::Value) -> Result<(TaskStatus, &str), ProviderError> {
    let raw = status_doc
        .get("status")
        .and_then(|s| s.as_str())
        .ok_or_else(|| {
            ProviderError::Network(format!("fal status response has no status: {}", status_doc))
        })?;
    map_queue_status(raw)
        .map(|status| (status, raw))
        .ok_or_else(|| ProviderError::Network(format!("unrecognised fal queue status {:?}", raw)))
}

/// Parse a submit response into a submission
pub fn parse_submit(response: &serde_json::Value) -> Result<Submission, ProviderError> {
    let request_id = response
        .get("request_id")
        .and_then(|r| r.as_str())
        .filter(|r| !r.is_empty())
        .ok_or_else(|| {
            ProviderError::RequestRejected(format!(
                "Unexpected fal submit response: {}",
                response
            ))
        })?;

    let status = response
        .get("status")
        .and_then(|s| s.as_str())
        .and_then(map_queue_status)
        .unwrap_or(TaskStatus::Pending);

    Ok(Submission {
        provider_task_id: request_id.to_string(),
        status,
        info: None,
        result: None,
    })
}

/// Normalized task info for a completed result: `{status, images: [{imageUrl}]}`
pub fn completed_info(result: &serde_json::Value) -> serde_json::Value {
    let images: Vec<serde_json::Value> = result
        .get("images")
        .and_then(|imgs| imgs.as_array())
        .map(|arr| {
            arr.iter()
                .filter_map(|img| img.get("url").and_then(|u| u.as_str()))
                .map(|url| json!({ "imageUrl": url }))
                .collect()
        })
        .unwrap_or_default();

    json!({ "status": "COMPLETED", "images": images })
}

fn failed_info(status_doc: &serde_json::Value) -> serde_json::Value {
    let message = status_doc
        .get("error")
        .and_then(|e| e.as_str())
        .unwrap_or("Generation failed");
    json!({ "status": "FAILED", "errorMessage": message })
}

impl GenerationProvider for FalProvider {
    fn name(&self) -> &str {
        "fal"
    }

    fn supported_media(&self) -> Vec<MediaType> {
        vec![MediaType::Image, MediaType::Video]
    }

    fn generate(&self, request: &GenerateRequest) -> Result<Submission, ProviderError> {
        request.validate()?;
        if !self.supported_media().contains(&request.media_type) {
            return Err(ProviderError::RequestRejected(format!(
                "fal does not generate {}",
                request.media_type
            )));
        }

        let payload = json!({
            "prompt": request.prompt,
            "image_size": "square",
            "num_images": 1
        });

        let auth = self.auth();
        let response = post_json(
            &self.agent,
            "fal",
            &self.submit_url(&request.model),
            ("Authorization", &auth),
            &payload,
        )?;
        parse_submit(&response)
    }

    fn query(&self, query: &TaskQuery) -> Result<QueryOutcome, ProviderError> {
        let auth = self.auth();
        let status_doc = get_json_with_retry(
            &self.agent,
            "fal",
            &self.status_url(&query.model, &query.provider_task_id),
            ("Authorization", &auth),
        )?;

        let (status, raw) = queue_status(&status_doc)?;

        match status {
            TaskStatus::Success => {
                let result = get_json_with_retry(
                    &self.agent,
                    "fal",
                    &self.result_url(&query.model, &query.provider_task_id),
                    ("Authorization", &auth),
                )?;
                Ok(QueryOutcome {
                    status: TaskStatus::Success,
                    info: Some(completed_info(&result)),
                    result: Some(result),
                })
            }
            TaskStatus::Failed => Ok(QueryOutcome {
                status: TaskStatus::Failed,
                info: Some(failed_info(&status_doc)),
                result: None,
            }),
            status => Ok(QueryOutcome {
                status,
                info: Some(json!({ "status": raw })),
                result: None,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_model_keeps_two_segments() {
        assert_eq!(query_model("fal-ai/flux-pro/v1.1"), "fal-ai/flux-pro");
        assert_eq!(query_model("fal-ai/recraft-v3"), "fal-ai/recraft-v3");
        assert_eq!(query_model("fal-ai/flux/dev"), "fal-ai/flux");
    }

    #[test]
    fn test_urls_use_query_model() {
        let provider = FalProvider::new("k", "https://queue.example.com/");
        assert_eq!(
            provider.submit_url("fal-ai/flux-pro/v1.1"),
            "https://queue.example.com/fal-ai/flux-pro/v1.1"
        );
        assert_eq!(
            provider.status_url("fal-ai/flux-pro/v1.1", "req-1"),
            "https://queue.example.com/fal-ai/flux-pro/requests/req-1/status"
        );
        assert_eq!(
            provider.result_url("fal-ai/flux-pro/v1.1", "req-1"),
            "https://queue.example.com/fal-ai/flux-pro/requests/req-1"
        );
    }

    #[test]
    fn test_parse_submit_response() {
        let response: serde_json::Value = serde_json::from_str(
            r#"{
                "request_id": "764cabcf-b745-4b3e-ae38-1200304cf45b",
                "status": "IN_QUEUE",
                "queue_position": 0
            }"#,
        )
        .unwrap();
        let submission = parse_submit(&response).unwrap();
        assert_eq!(
            submission.provider_task_id,
            "764cabcf-b745-4b3e-ae38-1200304cf45b"
        );
        assert_eq!(submission.status, TaskStatus::Pending);
    }

    #[test]
    fn test_parse_submit_without_request_id() {
        let response = json!({ "detail": "Unauthorized" });
        assert!(matches!(
            parse_submit(&response),
            Err(ProviderError::RequestRejected(_))
        ));
    }

    #[test]
    fn test_queue_status_mapping() {
        assert_eq!(map_queue_status("IN_QUEUE"), Some(TaskStatus::Pending));
        assert_eq!(map_queue_status("IN_PROGRESS"), Some(TaskStatus::Processing));
        assert_eq!(map_queue_status("COMPLETED"), Some(TaskStatus::Success));
        assert_eq!(map_queue_status("FAILED"), Some(TaskStatus::Failed));
        assert_eq!(map_queue_status("RESCHEDULED"), None);
    }

    #[test]
    fn test_unknown_or_missing_status_changes_nothing() {
        assert_eq!(
            queue_status(&json!({"status": "IN_PROGRESS"})).unwrap(),
            (TaskStatus::Processing, "IN_PROGRESS")
        );
        for doc in [json!({"status": "RESCHEDULED"}), json!({"queue_position": 3})] {
            let err = queue_status(&doc).unwrap_err();
            assert!(err.is_transient(), "{:?}", err);
        }
    }

    #[test]
    fn test_completed_info_lifts_image_urls() {
        let result = json!({
            "images": [
                {"url": "https://fal.media/files/cat.png", "width": 1024, "height": 1024},
                {"url": "https://fal.media/files/cat2.png"}
            ],
            "seed": 42
        });
        let info = completed_info(&result);
        assert_eq!(info["images"][0]["imageUrl"], "https://fal.media/files/cat.png");
        assert_eq!(info["images"].as_array().unwrap().len(), 2);
    }

    #[test]
    fn test_generate_rejects_blank_prompt_before_network() {
        let provider = FalProvider::new("k", "http://127.0.0.1:9");
        let err = provider
            .generate(&GenerateRequest::image("fal-ai/flux/dev", "  "))
            .unwrap_err();
        assert!(matches!(err, ProviderError::RequestRejected(_)));
    }

    #[test]
    fn test_from_config_requires_key() {
        let config = PrismConfig::default();
        assert!(matches!(
            FalProvider::from_config(&config),
            Err(ProviderError::Unconfigured(_))
        ));
    }
}
