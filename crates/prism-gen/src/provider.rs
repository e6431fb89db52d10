//! Generation provider trait and request/result types

use prism_core::{MediaType, TaskStatus};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Default upper bound on prompt length, in characters
pub const MAX_PROMPT_CHARS: usize = 2000;

/// Errors reported by a provider adapter.
///
/// Submission failures are contained per task by the dispatcher; query
/// failures only degrade the freshness of the task being queried.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProviderError {
    #[error("{0} provider not configured")]
    Unconfigured(String),

    #[error("request rejected: {0}")]
    RequestRejected(String),

    #[error("network error: {0}")]
    Network(String),

    #[error("timed out: {0}")]
    Timeout(String),
}

impl ProviderError {
    /// Transient errors leave a task eligible for the next query
    pub fn is_transient(&self) -> bool {
        matches!(self, ProviderError::Network(_) | ProviderError::Timeout(_))
    }
}

/// Check a prompt is non-empty after trimming and within `max_chars`.
///
/// Returns the trimmed prompt.
pub fn check_prompt(prompt: &str, max_chars: usize) -> Result<&str, String> {
    let trimmed = prompt.trim();
    if trimmed.is_empty() {
        return Err("prompt is required".to_string());
    }
    let len = trimmed.chars().count();
    if len > max_chars {
        return Err(format!(
            "prompt is {} characters, limit is {}",
            len, max_chars
        ));
    }
    Ok(trimmed)
}

/// A request to submit one generation to a provider
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerateRequest {
    pub media_type: MediaType,
    /// Full provider model id, e.g. `fal-ai/flux-pro/v1.1`
    pub model: String,
    pub prompt: String,
}

impl GenerateRequest {
    pub fn image(model: impl Into<String>, prompt: impl Into<String>) -> Self {
        Self {
            media_type: MediaType::Image,
            model: model.into(),
            prompt: prompt.into(),
        }
    }

    /// Adapter-side prompt guard, reported as a rejection
    pub fn validate(&self) -> Result<(), ProviderError> {
        check_prompt(&self.prompt, MAX_PROMPT_CHARS)
            .map(|_| ())
            .map_err(ProviderError::RequestRejected)
    }
}

/// What a provider hands back when a submission is accepted
#[derive(Debug, Clone, PartialEq)]
pub struct Submission {
    pub provider_task_id: String,
    /// Initial status as the provider reports it
    pub status: TaskStatus,
    /// Set by synchronous providers that finish at submission time
    pub info: Option<serde_json::Value>,
    pub result: Option<serde_json::Value>,
}

impl Submission {
    pub fn queued(provider_task_id: impl Into<String>) -> Self {
        Self {
            provider_task_id: provider_task_id.into(),
            status: TaskStatus::Pending,
            info: None,
            result: None,
        }
    }
}

/// Everything an adapter needs to poll one upstream job
#[derive(Debug, Clone)]
pub struct TaskQuery {
    pub provider_task_id: String,
    pub media_type: MediaType,
    pub model: String,
}

/// Result of polling an upstream job
#[derive(Debug, Clone, PartialEq)]
pub struct QueryOutcome {
    pub status: TaskStatus,
    pub info: Option<serde_json::Value>,
    pub result: Option<serde_json::Value>,
}

impl QueryOutcome {
    pub fn status(status: TaskStatus) -> Self {
        Self {
            status,
            info: None,
            result: None,
        }
    }
}

/// Trait implemented by each generation provider (fal, gemini, mock)
pub trait GenerationProvider: Send + Sync {
    /// Provider identifier used as the registry key (e.g. "fal")
    fn name(&self) -> &str;

    /// Media types this provider can generate
    fn supported_media(&self) -> Vec<MediaType>;

    /// Submit a generation job
    fn generate(&self, request: &GenerateRequest) -> Result<Submission, ProviderError>;

    /// Poll the status of a submitted job
    fn query(&self, query: &TaskQuery) -> Result<QueryOutcome, ProviderError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_check_prompt_trims() {
        assert_eq!(check_prompt("  a cat  ", 10).unwrap(), "a cat");
    }

    #[test]
    fn test_check_prompt_rejects_blank() {
        assert!(check_prompt("   ", 10).is_err());
        assert!(check_prompt("", 10).is_err());
    }

    #[test]
    fn test_check_prompt_length_counts_chars() {
        assert!(check_prompt("ééééé", 5).is_ok());
        assert!(check_prompt("ééééé!", 5).is_err());
    }

    #[test]
    fn test_request_validate_is_a_rejection() {
        let request = GenerateRequest::image("fal-ai/flux/dev", " ");
        assert!(matches!(
            request.validate(),
            Err(ProviderError::RequestRejected(_))
        ));
    }

    #[test]
    fn test_transient_classification() {
        assert!(ProviderError::Network("reset".into()).is_transient());
        assert!(ProviderError::Timeout("60s".into()).is_transient());
        assert!(!ProviderError::RequestRejected("bad".into()).is_transient());
        assert!(!ProviderError::Unconfigured("fal".into()).is_transient());
    }
}
