//! Caller-owned reconcile loop
//!
//! Nothing advances a session in the background. A caller that wants to
//! wait for results reconciles on an interval until the session settles,
//! the time budget runs out, or it is cancelled.

use prism_core::{Result, SessionId};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::time::{Duration, Instant};

use crate::reconcile::SessionSnapshot;
use crate::session::{CompareService, ReconcileRequest};

const DEFAULT_INTERVAL_SECS: u64 = 5;
const DEFAULT_TIMEOUT_SECS: u64 = 180;

/// Loop bounds
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollOptions {
    pub interval: Duration,
    pub timeout: Duration,
    /// Optional cap on reconcile calls, on top of `timeout`
    pub max_attempts: Option<u32>,
}

impl Default for PollOptions {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(DEFAULT_INTERVAL_SECS),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            max_attempts: None,
        }
    }
}

/// How a poll loop ended; each variant carries the last snapshot seen
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollOutcome {
    Complete(SessionSnapshot),
    TimedOut(SessionSnapshot),
    Cancelled(SessionSnapshot),
}

impl PollOutcome {
    pub fn snapshot(&self) -> &SessionSnapshot {
        match self {
            PollOutcome::Complete(s) | PollOutcome::TimedOut(s) | PollOutcome::Cancelled(s) => s,
        }
    }

    pub fn into_snapshot(self) -> SessionSnapshot {
        match self {
            PollOutcome::Complete(s) | PollOutcome::TimedOut(s) | PollOutcome::Cancelled(s) => s,
        }
    }

    pub fn is_complete(&self) -> bool {
        matches!(self, PollOutcome::Complete(_))
    }
}

/// Stops a running poll loop, either via `cancel()` or by being dropped
#[derive(Debug)]
pub struct CancelHandle {
    tx: Sender<()>,
}

/// The loop's end of a `CancelHandle`
#[derive(Debug)]
pub struct CancelToken {
    rx: Receiver<()>,
}

impl CancelHandle {
    pub fn pair() -> (CancelHandle, CancelToken) {
        let (tx, rx) = mpsc::channel();
        (CancelHandle { tx }, CancelToken { rx })
    }

    pub fn cancel(&self) {
        // The loop may already have finished; nothing to tell it then.
        self.tx.send(()).ok();
    }
}

impl CancelToken {
    /// Sleep up to `timeout`; true when cancelled meanwhile
    fn wait(&self, timeout: Duration) -> bool {
        match self.rx.recv_timeout(timeout) {
            Ok(()) | Err(RecvTimeoutError::Disconnected) => true,
            Err(RecvTimeoutError::Timeout) => false,
        }
    }
}

/// Reconcile `session_id` immediately, then every `options.interval`.
///
/// `on_update` sees every snapshot. Reconcile errors such as NotFound or
/// Forbidden end the loop with that error.
pub fn poll_session<F>(
    service: &CompareService,
    session_id: &SessionId,
    options: &PollOptions,
    cancel: &CancelToken,
    mut on_update: F,
) -> Result<PollOutcome>
where
    F: FnMut(&SessionSnapshot),
{
    let request = ReconcileRequest::new(session_id.as_str());
    let started = Instant::now();
    let mut attempts: u32 = 0;

    loop {
        let snapshot = service.reconcile(&request)?;
        attempts += 1;
        on_update(&snapshot);

        if snapshot.all_complete {
            tracing::info!(session_id = %session_id, attempts, "session complete");
            return Ok(PollOutcome::Complete(snapshot));
        }

        let remaining = options.timeout.saturating_sub(started.elapsed());
        let exhausted = options.max_attempts.is_some_and(|max| attempts >= max);
        if remaining.is_zero() || exhausted {
            tracing::warn!(
                session_id = %session_id,
                attempts,
                elapsed_secs = started.elapsed().as_secs(),
                "gave up waiting for session"
            );
            return Ok(PollOutcome::TimedOut(snapshot));
        }

        if cancel.wait(options.interval.min(remaining)) {
            tracing::info!(session_id = %session_id, attempts, "polling cancelled");
            return Ok(PollOutcome::Cancelled(snapshot));
        }
    }
}
