//! Plugin that reports fully closed channels.
//!
//! Subscribes to `channel_state_changed` and, when a channel reaches
//! `CLOSINGD_COMPLETE`, logs the channel id and close cause through the
//! daemon's log channel.

use std::process::ExitCode;

use filament_plugin::{LogLevel, Plugin, PluginBuilder, telemetry};
use serde_json::Value;
use tracing::error;

fn build() -> Plugin {
    PluginBuilder::new()
        .subscribe("channel_state_changed", |ctx, params| {
            let Some(change) = params.get("channel_state_changed") else {
                return Ok(());
            };
            if change.get("new_state").and_then(Value::as_str) != Some("CLOSINGD_COMPLETE") {
                return Ok(());
            }
            let channel_id = change
                .get("channel_id")
                .and_then(Value::as_str)
                .unwrap_or("unknown");
            let cause = change.get("cause").and_then(Value::as_str).unwrap_or("unknown");
            ctx.log(
                LogLevel::Info,
                format!("channel {channel_id} has closed - cause: {cause}"),
            )?;
            Ok(())
        })
        .build()
}

fn main() -> ExitCode {
    if let Err(e) = telemetry::initialise("info") {
        error!(error = %e, "failed to initialise telemetry");
        return ExitCode::FAILURE;
    }

    match build().run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "plugin terminated");
            ExitCode::FAILURE
        }
    }
}
