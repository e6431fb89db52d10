//! Session reconciliation
//!
//! One reconcile call refreshes every non-terminal task of a session from
//! its provider, writes back forward status changes, and reports whether
//! the whole session has settled. Terminal tasks are projected from the
//! ledger without touching the provider.

use prism_core::{PrismError, Result, SessionId, TaskStatus, UserId};
use serde::{Deserialize, Serialize};
use std::thread::{self, ScopedJoinHandle};

use crate::catalog::ModelCatalog;
use crate::ledger::{TaskLedger, TaskUpdate};
use crate::provider::TaskQuery;
use crate::providers::ProviderRegistry;
use crate::task::{CompareView, Task};

const MISSING_TASK_ID: &str = "No task ID";

/// Reconcile response: `{sessionId, allComplete, tasks}`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSnapshot {
    pub session_id: SessionId,
    pub all_complete: bool,
    pub tasks: Vec<CompareView>,
}

/// A task after merging, plus any error that only lives in this response
struct Refreshed {
    task: Task,
    transient_error: Option<String>,
}

impl Refreshed {
    fn settled(task: Task) -> Self {
        Self {
            task,
            transient_error: None,
        }
    }

    fn stale(task: Task, error: String) -> Self {
        Self {
            task,
            transient_error: Some(error),
        }
    }
}

enum Slot<'scope> {
    Ready(Refreshed),
    Querying(Task, ScopedJoinHandle<'scope, Refreshed>),
}

pub struct Reconciler<'a> {
    providers: &'a ProviderRegistry,
    ledger: &'a dyn TaskLedger,
    catalog: &'a ModelCatalog,
}

impl<'a> Reconciler<'a> {
    pub fn new(
        providers: &'a ProviderRegistry,
        ledger: &'a dyn TaskLedger,
        catalog: &'a ModelCatalog,
    ) -> Self {
        Self {
            providers,
            ledger,
            catalog,
        }
    }

    pub fn reconcile(
        &self,
        session_id: &SessionId,
        requesting_user: &UserId,
    ) -> Result<SessionSnapshot> {
        let tasks = self.ledger.find_by_session(session_id)?;
        if tasks.is_empty() {
            return Err(PrismError::NotFound(format!("session {}", session_id)));
        }
        if tasks.iter().any(|t| &t.user_id != requesting_user) {
            tracing::warn!(
                session_id = %session_id,
                user_id = %requesting_user,
                "session ownership mismatch"
            );
            return Err(PrismError::Forbidden(format!("session {}", session_id)));
        }

        let refreshed = self.refresh_all(tasks);

        let all_complete = refreshed.iter().all(|r| r.task.is_terminal());
        let tasks = refreshed
            .into_iter()
            .map(|r| {
                let view = CompareView::from_task(&r.task, self.catalog);
                match r.transient_error {
                    Some(error) => view.with_error(error),
                    None => view,
                }
            })
            .collect();

        Ok(SessionSnapshot {
            session_id: session_id.clone(),
            all_complete,
            tasks,
        })
    }

    /// Query non-terminal tasks in parallel; output order matches input
    fn refresh_all(&self, tasks: Vec<Task>) -> Vec<Refreshed> {
        thread::scope(|scope| {
            let slots: Vec<Slot<'_>> = tasks
                .into_iter()
                .map(|task| {
                    if task.is_terminal() {
                        Slot::Ready(Refreshed::settled(task))
                    } else {
                        let owned = task.clone();
                        Slot::Querying(task, scope.spawn(move || self.refresh(owned)))
                    }
                })
                .collect();

            slots
                .into_iter()
                .map(|slot| match slot {
                    Slot::Ready(refreshed) => refreshed,
                    Slot::Querying(task, handle) => handle.join().unwrap_or_else(|_| {
                        let error = format!("{} adapter panicked during query", task.provider);
                        Refreshed::stale(task, error)
                    }),
                })
                .collect()
        })
    }

    fn refresh(&self, task: Task) -> Refreshed {
        let Some(provider_task_id) = task.provider_task_id.clone() else {
            let update = TaskUpdate {
                status: TaskStatus::Failed,
                provider_info: task.provider_info.clone(),
                provider_result: task.provider_result.clone(),
                error: Some(MISSING_TASK_ID.to_string()),
            };
            return self.persist(task, update);
        };

        let Some(provider) = self.providers.get(&task.provider) else {
            let error = format!("{} provider not configured", task.provider);
            return Refreshed::stale(task, error);
        };

        let query = TaskQuery {
            provider_task_id,
            media_type: task.media_type,
            model: task.model.clone(),
        };

        match provider.query(&query) {
            Ok(outcome) if task.status.can_advance_to(outcome.status) => {
                let update = TaskUpdate {
                    status: outcome.status,
                    provider_info: outcome.info,
                    provider_result: outcome.result,
                    error: None,
                };
                self.persist(task, update)
            }
            Ok(_) => Refreshed::settled(task),
            Err(e) => {
                tracing::warn!(
                    task_id = %task.id,
                    provider = %task.provider,
                    error = %e,
                    "status query failed"
                );
                Refreshed::stale(task, e.to_string())
            }
        }
    }

    fn persist(&self, task: Task, update: TaskUpdate) -> Refreshed {
        match self.ledger.update(&task.id, &update) {
            Ok(stored) if stored.status == update.status => {
                tracing::info!(
                    session_id = %stored.session_id,
                    task_id = %stored.id,
                    from = %task.status,
                    to = %stored.status,
                    "task advanced"
                );
                Refreshed::settled(stored)
            }
            Ok(stored) => {
                // A concurrent reconcile got there first; report what it stored.
                tracing::debug!(
                    task_id = %stored.id,
                    stored = %stored.status,
                    reported = %update.status,
                    "stale update dropped"
                );
                Refreshed::settled(stored)
            }
            Err(e) => {
                tracing::error!(task_id = %task.id, error = %e, "failed to record task status");
                Refreshed::stale(task, format!("failed to record status: {}", e))
            }
        }
    }
}
