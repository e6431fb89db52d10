//! Session listing

use anyhow::Result;
use prism_core::{SessionId, TaskStatus};
use prism_gen::{PrismConfig, Task, TaskLedger};

use super::open_service;

pub fn run(config: &PrismConfig) -> Result<()> {
    let user = config
        .current_user()
        .ok_or(prism_core::PrismError::Unauthenticated)?;
    let service = open_service(config);
    let tasks: Vec<Task> = service
        .ledger()
        .list()?
        .into_iter()
        .filter(|t| t.user_id == user)
        .collect();

    let sessions = group_by_session(tasks);
    if sessions.is_empty() {
        println!("No sessions found.");
        return Ok(());
    }

    println!("{} session(s):\n", sessions.len());
    for (session_id, tasks) in &sessions {
        let first = &tasks[0];
        let done = tasks
            .iter()
            .filter(|t| t.status == TaskStatus::Success)
            .count();
        println!(
            "  {}  {}  {}/{} succeeded  \"{}\"",
            session_id,
            first.created_at.format("%Y-%m-%d %H:%M"),
            done,
            tasks.len(),
            first.prompt
        );
    }
    Ok(())
}

/// Group tasks by session, keeping first-seen order
fn group_by_session(tasks: Vec<Task>) -> Vec<(SessionId, Vec<Task>)> {
    let mut sessions: Vec<(SessionId, Vec<Task>)> = Vec::new();
    for task in tasks {
        match sessions.iter_mut().find(|(id, _)| *id == task.session_id) {
            Some((_, group)) => group.push(task),
            None => sessions.push((task.session_id.clone(), vec![task])),
        }
    }
    sessions
}
