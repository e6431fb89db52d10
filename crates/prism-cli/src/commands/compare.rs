//! Compare, iterate and poll commands

use anyhow::Result;
use prism_core::SessionId;
use serde::Serialize;
use prism_gen::{
    poll_session, CancelHandle, CompareRequest, CompareService, DispatchResponse,
    IterateRequest, IterationHistory, PollOutcome, PrismConfig, ReconcileRequest,
    SessionSnapshot,
};

use super::{emit, finished_count, open_service, print_tasks, Format};

pub fn run_compare(
    config: &PrismConfig,
    prompt: String,
    models: Vec<String>,
    wait: bool,
    format: Format,
) -> Result<()> {
    let service = open_service(config);
    let request = CompareRequest {
        prompt,
        models: (!models.is_empty()).then_some(models),
    };

    let response = emit(format, service.start_comparison(&request), print_dispatch)?;
    if wait {
        wait_for(config, &service, &response.session_id, format)?;
    }
    Ok(())
}

pub fn run_iterate(
    config: &PrismConfig,
    prompt: String,
    model: Option<String>,
    wait: bool,
    format: Format,
) -> Result<()> {
    let model = match model {
        Some(m) => m,
        None => IterationHistory::load(&IterationHistory::default_path())?
            .current_model
            .ok_or_else(|| {
                anyhow::anyhow!("No model selected. Pass --model or pick a result with `prism select`")
            })?,
    };

    let service = open_service(config);
    let request = IterateRequest { prompt, model };

    let response = emit(format, service.start_iteration(&request), print_dispatch)?;
    if wait {
        wait_for(config, &service, &response.session_id, format)?;
    }
    Ok(())
}

pub fn run_poll(config: &PrismConfig, session_id: &str, once: bool, format: Format) -> Result<()> {
    let service = open_service(config);
    if once {
        emit(
            format,
            service.reconcile(&ReconcileRequest::new(session_id)),
            print_snapshot,
        )?;
        return Ok(());
    }
    wait_for(config, &service, &SessionId::from(session_id), format)
}

fn wait_for(
    config: &PrismConfig,
    service: &CompareService,
    session_id: &SessionId,
    format: Format,
) -> Result<()> {
    let options = config.poll_options();
    let (_handle, token) = CancelHandle::pair();

    if format == Format::Text {
        println!(
            "\nWaiting for results (every {}s, up to {}s)...",
            options.interval.as_secs(),
            options.timeout.as_secs()
        );
    }

    let outcome = poll_session(service, session_id, &options, &token, |snapshot| {
        if format == Format::Text {
            println!(
                "  {}/{} finished",
                finished_count(&snapshot.tasks),
                snapshot.tasks.len()
            );
        }
    });

    let report = emit(format, outcome.map(WaitReport::from), |report| {
        print_snapshot(&report.snapshot)
    })?;
    match report.unsettled_error() {
        Some(err) => {
            if format == Format::Text {
                println!(
                    "\nStill running. Resume with: prism poll {}",
                    report.snapshot.session_id
                );
            }
            Err(err)
        }
        None => Ok(()),
    }
}

/// JSON payload of a waited-on session: how the wait ended, plus the last
/// snapshot fields
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct WaitReport {
    outcome: WaitEnd,
    #[serde(flatten)]
    snapshot: SessionSnapshot,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
enum WaitEnd {
    Complete,
    TimedOut,
    Cancelled,
}

impl From<PollOutcome> for WaitReport {
    fn from(outcome: PollOutcome) -> Self {
        let (outcome, snapshot) = match outcome {
            PollOutcome::Complete(s) => (WaitEnd::Complete, s),
            PollOutcome::TimedOut(s) => (WaitEnd::TimedOut, s),
            PollOutcome::Cancelled(s) => (WaitEnd::Cancelled, s),
        };
        Self { outcome, snapshot }
    }
}

impl WaitReport {
    /// The command fails unless the session settled
    fn unsettled_error(&self) -> Option<anyhow::Error> {
        let session_id = &self.snapshot.session_id;
        match self.outcome {
            WaitEnd::Complete => None,
            WaitEnd::TimedOut => Some(anyhow::anyhow!(
                "timed out waiting for session {}",
                session_id
            )),
            WaitEnd::Cancelled => Some(anyhow::anyhow!(
                "stopped waiting for session {}",
                session_id
            )),
        }
    }
}

fn print_dispatch(response: &DispatchResponse) {
    println!(
        "Session {} started: {} task(s), {} credit(s)",
        response.session_id,
        response.tasks.len(),
        response.total_cost
    );
    print_tasks(&response.tasks);
}

fn print_snapshot(snapshot: &SessionSnapshot) {
    println!(
        "\nSession {} ({}/{} finished)",
        snapshot.session_id,
        finished_count(&snapshot.tasks),
        snapshot.tasks.len()
    );
    print_tasks(&snapshot.tasks);
    if snapshot.all_complete {
        println!("\nPick one to iterate on with: prism select <task-id>");
    }
}
