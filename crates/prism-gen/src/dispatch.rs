//! Parallel fan-out of one prompt to many models
//!
//! Every submission runs on its own scoped thread and settles on its own:
//! a provider that errors, stalls or panics only affects its own task.
//! Exactly one task is recorded per model, whatever happened upstream.

use prism_core::{MediaType, PrismError, Result, SessionId};
use std::thread;

use crate::admission::AdmissionPass;
use crate::catalog::{ModelCatalog, ModelConfig};
use crate::ledger::TaskLedger;
use crate::provider::{GenerateRequest, ProviderError, Submission};
use crate::providers::ProviderRegistry;
use crate::task::{Task, TaskSeed};

/// What one dispatch created
#[derive(Debug, Clone)]
pub struct DispatchOutcome {
    pub session_id: SessionId,
    pub tasks: Vec<Task>,
    pub total_cost: u32,
}

/// Submits a batch and records the resulting tasks
pub struct Dispatcher<'a> {
    providers: &'a ProviderRegistry,
    ledger: &'a dyn TaskLedger,
}

impl<'a> Dispatcher<'a> {
    pub fn new(providers: &'a ProviderRegistry, ledger: &'a dyn TaskLedger) -> Self {
        Self { providers, ledger }
    }

    /// Fan `prompt` out to `models` under a fresh admission pass
    pub fn dispatch(
        &self,
        pass: AdmissionPass,
        session_id: SessionId,
        prompt: &str,
        media_type: MediaType,
        models: &[ModelConfig],
    ) -> Result<DispatchOutcome> {
        let total_cost = ModelCatalog::total_cost(models)?;
        if pass.total_cost() < total_cost {
            return Err(PrismError::InsufficientCredits {
                required: total_cost,
                available: pass.total_cost(),
            });
        }

        let settled = self.submit_all(prompt, media_type, models);

        let seed = TaskSeed {
            session_id: &session_id,
            user_id: pass.user_id(),
            media_type,
            prompt,
        };
        let tasks: Vec<Task> = models
            .iter()
            .zip(settled)
            .map(|(model, outcome)| match outcome {
                Ok(submission) => Task::accepted(&seed, model, submission),
                Err(e) => {
                    tracing::warn!(
                        session_id = %session_id,
                        provider = %model.provider,
                        model = %model.model,
                        error = %e,
                        "submission failed"
                    );
                    Task::rejected(&seed, model, e.to_string())
                }
            })
            .collect();

        if let Err(e) = self.ledger.create_batch(&tasks) {
            tracing::error!(
                session_id = %session_id,
                error = %e,
                "failed to record dispatched tasks"
            );
            return Err(e);
        }

        tracing::info!(
            session_id = %session_id,
            tasks = tasks.len(),
            failed = tasks.iter().filter(|t| t.provider_task_id.is_none()).count(),
            total_cost,
            "dispatched"
        );

        Ok(DispatchOutcome {
            session_id,
            tasks,
            total_cost,
        })
    }

    /// Run every submission concurrently; results line up with `models`
    fn submit_all(
        &self,
        prompt: &str,
        media_type: MediaType,
        models: &[ModelConfig],
    ) -> Vec<std::result::Result<Submission, ProviderError>> {
        thread::scope(|scope| {
            let handles: Vec<_> = models
                .iter()
                .map(|model| {
                    let provider = self.providers.get(&model.provider);
                    let request = GenerateRequest {
                        media_type,
                        model: model.model.clone(),
                        prompt: prompt.to_string(),
                    };
                    scope.spawn(move || match provider {
                        Some(provider) => provider.generate(&request),
                        None => Err(ProviderError::Unconfigured(model.provider.clone())),
                    })
                })
                .collect();

            handles
                .into_iter()
                .zip(models)
                .map(|(handle, model)| {
                    handle.join().unwrap_or_else(|_| {
                        Err(ProviderError::RequestRejected(format!(
                            "{} adapter panicked during submission",
                            model.provider
                        )))
                    })
                })
                .collect()
        })
    }
}
