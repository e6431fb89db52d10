//! Iteration history kept by the caller
//!
//! Each entry records a picked result and the prompt that produced it. The
//! orchestrator never reads this file; sessions stay unlinked on its side.

use prism_core::{PrismError, Result, TaskId, TaskStatus};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::task::CompareView;

/// One picked result
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub prompt: String,
    pub selected_task_id: TaskId,
    pub model: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    pub model_label: String,
    pub model_style: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IterationHistory {
    /// Model currently being iterated on
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_model: Option<String>,
    #[serde(default)]
    pub entries: Vec<HistoryEntry>,
}

impl IterationHistory {
    pub fn default_path() -> PathBuf {
        PathBuf::from(".prism").join("history.toml")
    }

    /// Load from disk; a missing file is an empty history
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content).map_err(|e| {
            PrismError::ConfigError(format!("Failed to parse {}: {}", path.display(), e))
        })
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, toml::to_string_pretty(self)?)?;
        Ok(())
    }

    /// Record `view` as the pick for `prompt` and iterate on its model next.
    /// Only successful results can be picked.
    pub fn select(&mut self, view: &CompareView, prompt: &str) -> Result<&HistoryEntry> {
        if view.status != TaskStatus::Success {
            return Err(PrismError::InvalidInput(format!(
                "task {} is {}, only successful results can be selected",
                view.id, view.status
            )));
        }

        self.current_model = Some(view.model.clone());
        self.entries.push(HistoryEntry {
            prompt: prompt.to_string(),
            selected_task_id: view.id.clone(),
            model: view.model.clone(),
            image_url: view.image_url.clone(),
            model_label: view.model_label.clone(),
            model_style: view.model_style.clone(),
        });
        Ok(&self.entries[self.entries.len() - 1])
    }

    pub fn latest(&self) -> Option<&HistoryEntry> {
        self.entries.last()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.current_model = None;
        self.entries.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn view(status: TaskStatus) -> CompareView {
        CompareView {
            id: TaskId::from("task-1"),
            model: "fal-ai/recraft-v3".to_string(),
            model_label: "Recraft V3".to_string(),
            model_style: "Design".to_string(),
            provider: "fal".to_string(),
            status,
            image_url: (status == TaskStatus::Success)
                .then(|| "https://fal.media/cat.png".to_string()),
            error: None,
        }
    }

    #[test]
    fn test_select_success_sets_current_model() {
        let mut history = IterationHistory::default();
        let entry = history
            .select(&view(TaskStatus::Success), "a cute orange cat")
            .unwrap();
        assert_eq!(entry.selected_task_id, TaskId::from("task-1"));
        assert_eq!(entry.image_url.as_deref(), Some("https://fal.media/cat.png"));
        assert_eq!(history.current_model.as_deref(), Some("fal-ai/recraft-v3"));
        assert_eq!(history.latest().unwrap().prompt, "a cute orange cat");
    }

    #[test]
    fn test_select_rejects_unfinished_results() {
        let mut history = IterationHistory::default();
        for status in [TaskStatus::Pending, TaskStatus::Processing, TaskStatus::Failed] {
            assert!(matches!(
                history.select(&view(status), "a cat"),
                Err(PrismError::InvalidInput(_))
            ));
        }
        assert!(history.is_empty());
        assert!(history.current_model.is_none());
    }

    #[test]
    fn test_save_and_load() {
        let dir = std::env::temp_dir().join(format!("prism_history_test_{}", uuid::Uuid::new_v4()));
        let path = dir.join("nested").join("history.toml");

        assert!(IterationHistory::load(&path).unwrap().is_empty());

        let mut history = IterationHistory::default();
        history.select(&view(TaskStatus::Success), "a cat").unwrap();
        history
            .select(&view(TaskStatus::Success), "a cat in a hat")
            .unwrap();
        history.save(&path).unwrap();

        let loaded = IterationHistory::load(&path).unwrap();
        assert_eq!(loaded, history);
        assert_eq!(loaded.entries.len(), 2);

        let mut cleared = loaded;
        cleared.clear();
        assert!(cleared.is_empty());

        std::fs::remove_dir_all(&dir).ok();
    }
}
