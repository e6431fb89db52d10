//! Result selection and iteration history

use anyhow::Result;
use clap::Subcommand;
use prism_core::TaskId;
use prism_gen::{IterationHistory, PrismConfig, ReconcileRequest, TaskLedger};

use super::open_service;

#[derive(Subcommand)]
pub enum HistoryCommands {
    /// Show picked results, oldest first
    Show,

    /// Forget every pick and the current model
    Clear,
}

pub fn run(cmd: HistoryCommands) -> Result<()> {
    let path = IterationHistory::default_path();
    let mut history = IterationHistory::load(&path)?;

    match cmd {
        HistoryCommands::Show => {
            if history.is_empty() {
                println!("No results selected yet.");
                return Ok(());
            }
            if let Some(ref model) = history.current_model {
                println!("Iterating on: {}\n", model);
            }
            for (i, entry) in history.entries.iter().enumerate() {
                println!("{}. {}", i + 1, entry.prompt);
                println!(
                    "   {} ({})  {}",
                    entry.model_label, entry.model_style, entry.selected_task_id
                );
                if let Some(ref url) = entry.image_url {
                    println!("   {}", url);
                }
            }
            Ok(())
        }
        HistoryCommands::Clear => {
            history.clear();
            history.save(&path)?;
            println!("History cleared.");
            Ok(())
        }
    }
}

/// Record a finished task as the pick for its prompt
pub fn run_select(config: &PrismConfig, task_id: &str) -> Result<()> {
    let service = open_service(config);
    let task = service
        .ledger()
        .get(&TaskId::from(task_id))?
        .ok_or_else(|| anyhow::anyhow!("Task '{}' not found", task_id))?;

    // Reconcile first so the pick reflects the latest status and image
    let snapshot = service.reconcile(&ReconcileRequest::new(task.session_id.as_str()))?;
    let view = snapshot
        .tasks
        .iter()
        .find(|v| v.id == task.id)
        .ok_or_else(|| anyhow::anyhow!("Task '{}' not found in its session", task_id))?;

    let path = IterationHistory::default_path();
    let mut history = IterationHistory::load(&path)?;
    let entry = history.select(view, &task.prompt)?;
    println!("Selected {} ({})", entry.model_label, entry.model_style);
    println!("  Next: prism iterate \"<refined prompt>\"");
    history.save(&path)?;
    Ok(())
}
