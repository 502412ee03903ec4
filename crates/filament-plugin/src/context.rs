//! Handler-facing context: parameter bag, log side channel, shared state.

use std::sync::Arc;

use serde_json::{Value, json};

use crate::config::ConfigSnapshot;
use crate::envelope::Envelope;
use crate::error::PluginError;
use crate::manifest::Manifest;
use crate::transport::SharedWriter;

/// Severity for log-line notifications, using the daemon's level names.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    /// Verbose diagnostics.
    Debug,
    /// Normal operational messages.
    Info,
    /// Something odd worth an operator's attention.
    Unusual,
    /// A serious failure.
    Broken,
}

impl LogLevel {
    /// Returns the protocol string representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Unusual => "unusual",
            Self::Broken => "broken",
        }
    }
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The named-parameter bag passed uniformly to every handler.
///
/// Wraps the envelope's `params` payload; each handler reads the named
/// parameters it cares about and ignores the rest. Positional (array)
/// params are kept verbatim but have no named entries.
#[derive(Debug, Clone, PartialEq)]
pub struct Params {
    value: Value,
}

impl Params {
    /// Wraps a raw params payload.
    #[must_use]
    pub fn from_value(value: Value) -> Self {
        Self { value }
    }

    /// Creates an empty parameter bag.
    #[must_use]
    pub fn empty() -> Self {
        Self { value: json!({}) }
    }

    /// Looks up a named parameter.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.value.get(name)
    }

    /// Looks up a named string parameter.
    #[must_use]
    pub fn get_str(&self, name: &str) -> Option<&str> {
        self.get(name).and_then(Value::as_str)
    }

    /// Returns the raw payload.
    #[must_use]
    pub const fn value(&self) -> &Value {
        &self.value
    }
}

/// Runtime state handed to every handler invocation.
///
/// Holds the immutable manifest and configuration snapshot plus a clone of
/// the shared output writer for the log side channel. Cheap to clone;
/// shared freely because everything behind it is read-only or internally
/// locked.
#[derive(Debug, Clone)]
pub struct PluginContext {
    manifest: Arc<Manifest>,
    config: Arc<ConfigSnapshot>,
    sender: SharedWriter,
}

impl PluginContext {
    pub(crate) fn new(
        manifest: Arc<Manifest>,
        config: Arc<ConfigSnapshot>,
        sender: SharedWriter,
    ) -> Self {
        Self {
            manifest,
            config,
            sender,
        }
    }

    /// Returns the manifest this plugin negotiated with.
    #[must_use]
    pub fn manifest(&self) -> &Manifest {
        &self.manifest
    }

    /// Returns the daemon-supplied configuration snapshot.
    #[must_use]
    pub fn config(&self) -> &ConfigSnapshot {
        &self.config
    }

    /// Emits a log-line notification to the daemon.
    ///
    /// Log lines are fire-and-forget: the daemon records them against the
    /// plugin's name and never replies.
    ///
    /// # Errors
    ///
    /// Returns [`PluginError`] if the notification cannot be written.
    pub fn log(&self, level: LogLevel, message: impl Into<String>) -> Result<(), PluginError> {
        let notification = Envelope::notification(
            "log",
            Some(json!({
                "level": level.as_str(),
                "message": message.into(),
            })),
        );
        self.sender.send(&notification.encode()?)
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;
    use serde_json::json;

    use super::*;
    use crate::transport::test_utils::SharedBuffer;

    fn context_over(buffer: &SharedBuffer) -> PluginContext {
        let manifest = Manifest::new(vec![], vec![], vec![], vec![], true);
        PluginContext::new(
            Arc::new(manifest),
            Arc::new(ConfigSnapshot::default()),
            SharedWriter::new(buffer.clone()),
        )
    }

    #[rstest]
    fn params_expose_named_fields() {
        let params = Params::from_value(json!({"onion": {"payload": ""}, "state": "OPEN"}));

        assert!(params.get("onion").is_some());
        assert_eq!(params.get_str("state"), Some("OPEN"));
        assert_eq!(params.get("missing"), None);
    }

    #[rstest]
    fn array_params_have_no_named_entries() {
        let params = Params::from_value(json!([1, 2, 3]));
        assert_eq!(params.get("anything"), None);
        assert_eq!(params.value(), &json!([1, 2, 3]));
    }

    #[rstest]
    fn log_emits_a_log_notification_frame() {
        let buffer = SharedBuffer::default();
        let context = context_over(&buffer);

        context.log(LogLevel::Info, "htlc accepted!").expect("log failed");

        let frames = buffer.frames();
        assert_eq!(frames.len(), 1);
        let value: serde_json::Value = serde_json::from_slice(&frames[0]).expect("json");
        assert_eq!(value["method"], json!("log"));
        assert_eq!(value["params"]["level"], json!("info"));
        assert_eq!(value["params"]["message"], json!("htlc accepted!"));
        assert_eq!(value.get("id"), None);
    }

    #[rstest]
    #[case(LogLevel::Debug, "debug")]
    #[case(LogLevel::Info, "info")]
    #[case(LogLevel::Unusual, "unusual")]
    #[case(LogLevel::Broken, "broken")]
    fn log_levels_use_daemon_names(#[case] level: LogLevel, #[case] expected: &str) {
        assert_eq!(level.as_str(), expected);
    }
}
