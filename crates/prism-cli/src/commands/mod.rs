//! CLI command implementations

pub mod compare;
pub mod history;
pub mod init;
pub mod models;
pub mod sessions;

use prism_core::TaskStatus;
use prism_gen::{ApiResponse, CompareService, CompareView, FileLedger, PrismConfig};
use serde::Serialize;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Text,
    Json,
}

/// Service over the project ledger in `.prism/ledger`
pub fn open_service(config: &PrismConfig) -> CompareService {
    let service = CompareService::from_config(config, Arc::new(FileLedger::default_store()));
    tracing::debug!(providers = ?service.providers().names(), "providers registered");
    service
}

/// Print an orchestrator result. JSON mode prints the `{code, message, data}`
/// envelope for errors too, then still fails the command.
pub fn emit<T: Serialize>(
    format: Format,
    result: prism_core::Result<T>,
    text: impl FnOnce(&T),
) -> anyhow::Result<T> {
    match result {
        Ok(data) => {
            match format {
                Format::Json => println!("{}", serde_json::to_string_pretty(&ApiResponse::ok(&data))?),
                Format::Text => text(&data),
            }
            Ok(data)
        }
        Err(e) => {
            if format == Format::Json {
                println!(
                    "{}",
                    serde_json::to_string_pretty(&ApiResponse::<()>::error(&e))?
                );
            }
            Err(e.into())
        }
    }
}

pub fn finished_count(tasks: &[CompareView]) -> usize {
    tasks.iter().filter(|t| t.status.is_terminal()).count()
}

/// One aligned line per task
pub fn print_tasks(tasks: &[CompareView]) {
    for task in tasks {
        let label = if task.model_style.is_empty() {
            task.model_label.clone()
        } else {
            format!("{} ({})", task.model_label, task.model_style)
        };
        let detail = match task.status {
            TaskStatus::Success => task.image_url.as_deref().map(preview).unwrap_or_default(),
            _ => task
                .error
                .as_deref()
                .map(|e| format!("error: {}", e))
                .unwrap_or_default(),
        };
        println!(
            "  {:<12} {:<32} {}  {}",
            format!("[{}]", task.status),
            label,
            task.id,
            detail
        );
    }
}

/// Inline `data:` images are huge; show only their media type
fn preview(url: &str) -> String {
    match url.strip_prefix("data:") {
        Some(rest) => {
            let mime = rest.split(';').next().unwrap_or("image");
            format!("<inline {} image>", mime)
        }
        None => url.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_preview_shortens_inline_images() {
        assert_eq!(
            preview("data:image/png;base64,iVBORw0KGgo="),
            "<inline image/png image>"
        );
        assert_eq!(preview("https://fal.media/cat.png"), "https://fal.media/cat.png");
    }

    #[test]
    fn test_emit_passes_errors_through() {
        let result: prism_core::Result<u32> = Err(prism_core::PrismError::Unauthenticated);
        let err = emit(Format::Text, result, |_| {}).unwrap_err();
        assert_eq!(err.to_string(), "No auth, please sign in");
    }
}
