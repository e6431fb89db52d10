//! Blocking HTTP plumbing shared by the network adapters

use std::time::Duration;

use crate::provider::ProviderError;

pub(crate) const REQUEST_TIMEOUT_SECS: u64 = 60;
const MAX_RETRIES: usize = 3;
const RETRY_BASE_DELAY_MS: u64 = 500;

pub(crate) fn build_agent() -> ureq::Agent {
    let config = ureq::Agent::config_builder()
        .timeout_global(Some(Duration::from_secs(REQUEST_TIMEOUT_SECS)))
        .build();
    config.into()
}

fn is_retryable_error(e: &ureq::Error) -> bool {
    match e {
        ureq::Error::Timeout(_)
        | ureq::Error::Io(_)
        | ureq::Error::ConnectionFailed
        | ureq::Error::HostNotFound => true,
        ureq::Error::StatusCode(code) => matches!(code, 429 | 500 | 502 | 503 | 504),
        _ => false,
    }
}

fn sleep_backoff(attempt: usize) {
    let delay_ms = RETRY_BASE_DELAY_MS.saturating_mul(1u64 << attempt);
    std::thread::sleep(Duration::from_millis(delay_ms));
}

/// Map a transport error onto the provider error taxonomy
pub(crate) fn classify(provider: &str, e: ureq::Error) -> ProviderError {
    match e {
        ureq::Error::Timeout(_) => {
            ProviderError::Timeout(format!("{} request timed out", provider))
        }
        ureq::Error::StatusCode(code) if code == 429 || code >= 500 => {
            ProviderError::Network(format!("{} returned HTTP {}", provider, code))
        }
        ureq::Error::StatusCode(code) => {
            ProviderError::RequestRejected(format!("{} returned HTTP {}", provider, code))
        }
        other => ProviderError::Network(format!("{} request failed: {}", provider, other)),
    }
}

/// POST a JSON body once. Submissions are not retried: a lost response
/// could otherwise start the same generation twice.
pub(crate) fn post_json(
    agent: &ureq::Agent,
    provider: &str,
    url: &str,
    auth: (&str, &str),
    payload: &serde_json::Value,
) -> Result<serde_json::Value, ProviderError> {
    let mut response = agent
        .post(url)
        .header(auth.0, auth.1)
        .header("Content-Type", "application/json")
        .send_json(payload)
        .map_err(|e| classify(provider, e))?;

    response.body_mut().read_json().map_err(|e| {
        ProviderError::Network(format!("Failed to parse {} response: {}", provider, e))
    })
}

/// GET a JSON document, retrying transient failures with backoff
pub(crate) fn get_json_with_retry(
    agent: &ureq::Agent,
    provider: &str,
    url: &str,
    auth: (&str, &str),
) -> Result<serde_json::Value, ProviderError> {
    let mut attempt = 0;
    loop {
        match agent.get(url).header(auth.0, auth.1).call() {
            Ok(mut ok) => {
                return ok.body_mut().read_json().map_err(|e| {
                    ProviderError::Network(format!("Failed to parse {} response: {}", provider, e))
                });
            }
            Err(e) => {
                if attempt + 1 < MAX_RETRIES && is_retryable_error(&e) {
                    sleep_backoff(attempt);
                    attempt += 1;
                    continue;
                }
                return Err(classify(provider, e));
            }
        }
    }
}
