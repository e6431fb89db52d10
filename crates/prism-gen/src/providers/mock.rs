//! Mock provider for testing and offline runs
//!
//! Hands out `mock-N` task ids and walks each task through a status script
//! on successive queries, without any network calls. Failure modes can be
//! switched on to exercise the orchestrator's containment paths.

use prism_core::{MediaType, TaskStatus};
use serde_json::json;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use crate::provider::*;

#[derive(Default)]
struct MockState {
    next_id: u64,
    /// Queries answered so far, per provider task id
    polls: HashMap<String, usize>,
    script: Vec<TaskStatus>,
    query_failure: Option<ProviderError>,
}

/// A scripted provider that generates nothing
pub struct MockProvider {
    name: String,
    initial_status: TaskStatus,
    submit_failure: Option<ProviderError>,
    panic_on_submit: bool,
    state: Mutex<MockState>,
    generate_calls: AtomicUsize,
    query_calls: AtomicUsize,
}

impl Default for MockProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl MockProvider {
    /// A provider registered as "mock" that reports processing, then success
    pub fn new() -> Self {
        Self::named("mock")
    }

    pub fn named(name: &str) -> Self {
        Self {
            name: name.to_string(),
            initial_status: TaskStatus::Pending,
            submit_failure: None,
            panic_on_submit: false,
            state: Mutex::new(MockState {
                script: vec![TaskStatus::Processing, TaskStatus::Success],
                ..Default::default()
            }),
            generate_calls: AtomicUsize::new(0),
            query_calls: AtomicUsize::new(0),
        }
    }

    /// Status reported by `generate` on accepted submissions
    pub fn with_initial_status(mut self, status: TaskStatus) -> Self {
        self.initial_status = status;
        self
    }

    /// Statuses reported by successive queries of one task; the last repeats
    pub fn with_script(self, script: Vec<TaskStatus>) -> Self {
        self.set_script(script);
        self
    }

    /// Every submission fails with `error`
    pub fn failing_submit(mut self, error: ProviderError) -> Self {
        self.submit_failure = Some(error);
        self
    }

    /// Every submission panics inside the adapter
    pub fn panicking_submit(mut self) -> Self {
        self.panic_on_submit = true;
        self
    }

    /// Replace the status script for subsequent queries
    pub fn set_script(&self, script: Vec<TaskStatus>) {
        self.lock().script = script;
    }

    /// Make subsequent queries fail (or succeed again with `None`)
    pub fn set_query_failure(&self, error: Option<ProviderError>) {
        self.lock().query_failure = error;
    }

    pub fn generate_calls(&self) -> usize {
        self.generate_calls.load(Ordering::SeqCst)
    }

    pub fn query_calls(&self) -> usize {
        self.query_calls.load(Ordering::SeqCst)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MockState> {
        // A panic while holding the lock leaves plain counters behind; keep going.
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn image_url(&self, task_id: &str) -> String {
        format!("https://mock.prism.local/{}/{}.png", self.name, task_id)
    }
}

impl GenerationProvider for MockProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn supported_media(&self) -> Vec<MediaType> {
        vec![MediaType::Image, MediaType::Video, MediaType::Music]
    }

    fn generate(&self, request: &GenerateRequest) -> Result<Submission, ProviderError> {
        self.generate_calls.fetch_add(1, Ordering::SeqCst);
        if self.panic_on_submit {
            panic!("{} adapter blew up on submit", self.name);
        }
        if let Some(err) = &self.submit_failure {
            return Err(err.clone());
        }
        request.validate()?;

        let mut state = self.lock();
        state.next_id += 1;
        let id = format!("mock-{}", state.next_id);
        drop(state);

        let mut submission = Submission::queued(id.clone());
        submission.status = self.initial_status;
        if self.initial_status == TaskStatus::Success {
            let url = self.image_url(&id);
            submission.info = Some(json!({ "images": [{ "imageUrl": url }] }));
            submission.result = Some(json!({ "images": [{ "url": url }] }));
        }
        Ok(submission)
    }

    fn query(&self, query: &TaskQuery) -> Result<QueryOutcome, ProviderError> {
        self.query_calls.fetch_add(1, Ordering::SeqCst);

        let mut state = self.lock();
        if let Some(err) = &state.query_failure {
            return Err(err.clone());
        }

        let poll = state
            .polls
            .entry(query.provider_task_id.clone())
            .or_insert(0);
        let step = *poll;
        *poll += 1;

        let status = match state.script.as_slice() {
            [] => TaskStatus::Success,
            script => script[step.min(script.len() - 1)],
        };
        drop(state);

        let outcome = match status {
            TaskStatus::Success => {
                let url = self.image_url(&query.provider_task_id);
                QueryOutcome {
                    status,
                    info: Some(json!({ "status": "COMPLETED", "images": [{ "imageUrl": url }] })),
                    result: Some(json!({ "images": [{ "url": url }] })),
                }
            }
            TaskStatus::Failed => QueryOutcome {
                status,
                info: Some(json!({ "status": "FAILED", "errorMessage": "mock generation failed" })),
                result: None,
            },
            other => QueryOutcome {
                status: other,
                info: Some(json!({ "status": other.as_str() })),
                result: None,
            },
        };
        Ok(outcome)
    }
}
