//! Task lifecycle and media types

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::PrismError;

/// Lifecycle state of a generation task.
///
/// `Pending -> Processing -> {Success | Failed}`. `Failed` is also reachable
/// straight from creation when the provider submission itself errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    Pending,
    Processing,
    Success,
    Failed,
}

impl TaskStatus {
    /// Terminal tasks are never queried upstream again
    pub fn is_terminal(self) -> bool {
        matches!(self, TaskStatus::Success | TaskStatus::Failed)
    }

    fn rank(self) -> u8 {
        match self {
            TaskStatus::Pending => 0,
            TaskStatus::Processing => 1,
            TaskStatus::Success | TaskStatus::Failed => 2,
        }
    }

    /// Whether moving from `self` to `next` is a forward transition
    pub fn can_advance_to(self, next: TaskStatus) -> bool {
        !self.is_terminal() && next.rank() > self.rank()
    }

    pub fn as_str(self) -> &'static str {
        match self {
            TaskStatus::Pending => "pending",
            TaskStatus::Processing => "processing",
            TaskStatus::Success => "success",
            TaskStatus::Failed => "failed",
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TaskStatus {
    type Err = PrismError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(TaskStatus::Pending),
            "processing" => Ok(TaskStatus::Processing),
            "success" => Ok(TaskStatus::Success),
            "failed" => Ok(TaskStatus::Failed),
            other => Err(PrismError::InvalidInput(format!(
                "unknown task status '{}'",
                other
            ))),
        }
    }
}

/// The kind of media a task generates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaType {
    Image,
    Video,
    Music,
}

impl MediaType {
    /// Ledger scene tag recorded alongside the task
    pub fn scene(self) -> &'static str {
        match self {
            MediaType::Image => "text-to-image",
            MediaType::Video => "text-to-video",
            MediaType::Music => "text-to-music",
        }
    }
}

impl fmt::Display for MediaType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MediaType::Image => write!(f, "image"),
            MediaType::Video => write!(f, "video"),
            MediaType::Music => write!(f, "music"),
        }
    }
}
