//! Logging setup
//!
//! Installs a `tracing-subscriber` registry for binaries. Library code only
//! emits events; it never installs a subscriber itself.

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Filter used when `RUST_LOG` is unset
fn default_filter(log_level: &str) -> String {
    format!("warn,prism_gen={0},prism_cli={0}", log_level)
}

/// Install the global subscriber. `RUST_LOG` wins over `log_level`.
///
/// Debug builds print pretty lines, release builds print JSON. Output goes
/// to stderr so command output on stdout stays machine-readable. Calling
/// this twice is harmless.
pub fn init(log_level: &str) {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_filter(log_level)));

    #[cfg(debug_assertions)]
    {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(
                fmt::layer()
                    .pretty()
                    .with_target(false)
                    .with_writer(std::io::stderr),
            )
            .try_init()
            .ok();
    }

    #[cfg(not(debug_assertions))]
    {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(
                fmt::layer()
                    .json()
                    .with_current_span(true)
                    .with_writer(std::io::stderr),
            )
            .try_init()
            .ok();
    }
}
