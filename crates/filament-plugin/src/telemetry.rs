//! Structured telemetry initialisation for plugin processes.
//!
//! Internal diagnostics go to stderr through `tracing`: the daemon leaves
//! stdout to the plugin protocol but captures stderr for its own logs.
//! This is separate from the `log` notification side channel, which is
//! part of the protocol itself.

use std::io::{self, IsTerminal};

use once_cell::sync::OnceCell;
use tracing::subscriber::SetGlobalDefaultError;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt;

static TELEMETRY_GUARD: OnceCell<()> = OnceCell::new();

/// Errors encountered while configuring telemetry.
#[derive(Debug, thiserror::Error)]
pub enum TelemetryError {
    /// Failed to parse the log filter expression.
    #[error("invalid log filter: {0}")]
    Filter(String),
    /// Failed to install the tracing subscriber.
    #[error("failed to install telemetry subscriber: {0}")]
    Subscriber(#[source] SetGlobalDefaultError),
}

/// Configures the global tracing subscriber when invoked for the first
/// time.
///
/// `default_filter` applies when the `RUST_LOG` environment variable is
/// unset. Repeated calls are idempotent: only the first invocation
/// installs the subscriber.
///
/// # Errors
///
/// Returns [`TelemetryError`] if the filter cannot be parsed or a
/// conflicting global subscriber is already installed.
pub fn initialise(default_filter: &str) -> Result<(), TelemetryError> {
    TELEMETRY_GUARD
        .get_or_try_init(|| install_subscriber(default_filter))
        .map(|_| ())
}

fn install_subscriber(default_filter: &str) -> Result<(), TelemetryError> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_filter))
        .map_err(|error| TelemetryError::Filter(error.to_string()))?;

    let subscriber = fmt::Subscriber::builder()
        .with_env_filter(filter)
        .with_target(true)
        .with_level(true)
        .with_writer(io::stderr)
        // Avoid stray colour codes in the daemon's captured stderr while
        // keeping colour on interactive terminals.
        .with_ansi(io::stderr().is_terminal())
        .compact()
        .finish();

    tracing::subscriber::set_global_default(subscriber).map_err(TelemetryError::Subscriber)
}
