//! Ledger task records and their read projection
//!
//! A `Task` is one provider/model generation attempt. Tasks are created by
//! the dispatcher, advanced by the reconciler, and never deleted: they are
//! the audit trail for credits spent.

use chrono::{DateTime, Utc};
use prism_core::{MediaType, SessionId, TaskId, TaskStatus, UserId};
use serde::{Deserialize, Serialize};

use crate::catalog::{ModelCatalog, ModelConfig};
use crate::provider::Submission;

/// Message shown for failed tasks that carry no specific reason
pub const GENERIC_FAILURE: &str = "Generation failed";

/// Fields shared by every task created in one dispatch
#[derive(Debug, Clone)]
pub struct TaskSeed<'a> {
    pub session_id: &'a SessionId,
    pub user_id: &'a UserId,
    pub media_type: MediaType,
    pub prompt: &'a str,
}

/// A persisted generation task
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: TaskId,
    pub session_id: SessionId,
    pub user_id: UserId,
    pub media_type: MediaType,
    pub scene: String,
    pub provider: String,
    pub model: String,
    pub prompt: String,
    pub status: TaskStatus,
    pub cost_credits: u32,
    /// Upstream job id; absent only when submission itself failed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider_task_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none", with = "json_text")]
    pub provider_info: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none", with = "json_text")]
    pub provider_result: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Task {
    fn base(seed: &TaskSeed<'_>, model: &ModelConfig, status: TaskStatus) -> Self {
        Self {
            id: TaskId::generate(),
            session_id: seed.session_id.clone(),
            user_id: seed.user_id.clone(),
            media_type: seed.media_type,
            scene: seed.media_type.scene().to_string(),
            provider: model.provider.clone(),
            model: model.model.clone(),
            prompt: seed.prompt.to_string(),
            status,
            cost_credits: model.cost_credits,
            provider_task_id: None,
            provider_info: None,
            provider_result: None,
            error: None,
            created_at: Utc::now(),
        }
    }

    /// A task whose submission the provider accepted
    pub fn accepted(seed: &TaskSeed<'_>, model: &ModelConfig, submission: Submission) -> Self {
        let mut task = Self::base(seed, model, submission.status);
        task.provider_task_id = Some(submission.provider_task_id);
        task.provider_info = submission.info;
        task.provider_result = submission.result;
        task
    }

    /// A task whose submission failed outright
    pub fn rejected(seed: &TaskSeed<'_>, model: &ModelConfig, error: String) -> Self {
        let mut task = Self::base(seed, model, TaskStatus::Failed);
        task.error = Some(error);
        task
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// First image reference in the stored result, falling back to task info
    pub fn image_url(&self) -> Option<String> {
        [&self.provider_result, &self.provider_info]
            .into_iter()
            .flatten()
            .find_map(first_image_url)
    }

    /// Why a failed task failed
    pub fn failure_message(&self) -> String {
        self.error
            .clone()
            .or_else(|| {
                self.provider_info
                    .as_ref()
                    .and_then(|info| info.get("errorMessage"))
                    .and_then(|m| m.as_str())
                    .map(|m| m.to_string())
            })
            .unwrap_or_else(|| GENERIC_FAILURE.to_string())
    }
}

/// `images[0].imageUrl` or `images[0].url` from an opaque provider blob
pub fn first_image_url(blob: &serde_json::Value) -> Option<String> {
    let first = blob.get("images")?.as_array()?.first()?;
    first
        .get("imageUrl")
        .or_else(|| first.get("url"))
        .and_then(|u| u.as_str())
        .map(|u| u.to_string())
}

/// Presentation view of a task; computed, never stored
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompareView {
    pub id: TaskId,
    pub model: String,
    pub model_label: String,
    pub model_style: String,
    pub provider: String,
    pub status: TaskStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl CompareView {
    /// Project a task, resolving display labels through `catalog`
    pub fn from_task(task: &Task, catalog: &ModelCatalog) -> Self {
        let (model_label, model_style) = match catalog.get(&task.model) {
            Some(m) => (m.label.clone(), m.style.clone()),
            None => (task.model.clone(), String::new()),
        };

        let (image_url, error) = match task.status {
            TaskStatus::Success => (task.image_url(), None),
            TaskStatus::Failed => (None, Some(task.failure_message())),
            _ => (None, None),
        };

        Self {
            id: task.id.clone(),
            model: task.model.clone(),
            model_label,
            model_style,
            provider: task.provider.clone(),
            status: task.status,
            image_url,
            error,
        }
    }

    /// Attach a transient, unpersisted error
    pub fn with_error(mut self, error: impl Into<String>) -> Self {
        self.error = Some(error.into());
        self
    }
}

/// Opaque JSON blobs are stored as JSON text so any ledger format can hold them
mod json_text {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(
        value: &Option<serde_json::Value>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        match value {
            Some(v) => serializer.serialize_str(&v.to_string()),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<serde_json::Value>, D::Error> {
        let text: Option<String> = Option::deserialize(deserializer)?;
        text.map(|t| serde_json::from_str(&t).map_err(serde::de::Error::custom))
            .transpose()
    }
}
