//! Plugin that watches HTLC forwards.
//!
//! Registers the `htlc_accepted` hook, logs each accepted HTLC through
//! the daemon's log channel, and always tells the daemon to continue
//! normal processing.

use std::process::ExitCode;

use filament_plugin::{LogLevel, Plugin, PluginBuilder, PluginError, telemetry};
use serde_json::json;
use tracing::error;

fn build() -> Result<Plugin, PluginError> {
    Ok(PluginBuilder::new()
        .hook("htlc_accepted", |ctx, _params| {
            ctx.log(LogLevel::Info, "htlc accepted!")?;
            Ok(json!({"result": "continue"}))
        })?
        .build())
}

fn main() -> ExitCode {
    if let Err(e) = telemetry::initialise("info") {
        error!(error = %e, "failed to initialise telemetry");
        return ExitCode::FAILURE;
    }

    match build().and_then(Plugin::run) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "plugin terminated");
            ExitCode::FAILURE
        }
    }
}
