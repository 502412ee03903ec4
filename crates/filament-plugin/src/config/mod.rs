//! Configuration snapshot delivered by the daemon during `init`.
//!
//! The daemon pushes configuration to the plugin instead of the plugin
//! reading files or environment variables: the `init` call carries the
//! operator's values for declared options plus the daemon's own identity
//! parameters (network, lightning directory, RPC socket). The snapshot is
//! built once during negotiation and is read-only to handlers for the
//! rest of the process lifetime.

use serde_json::{Map, Value};

use crate::manifest::ConfigOption;

/// Read-only view of the daemon-supplied configuration.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConfigSnapshot {
    options: Map<String, Value>,
    configuration: Map<String, Value>,
}

impl ConfigSnapshot {
    /// Builds a snapshot from the `init` params.
    ///
    /// Option values reported by the daemon win; declared defaults fill in
    /// any option the daemon omitted. Unknown keys in either map are kept
    /// verbatim so handlers can read daemon fields this crate does not
    /// model.
    #[must_use]
    pub fn from_init(params: &Value, declared: &[ConfigOption]) -> Self {
        let mut options = object_field(params, "options");
        for option in declared {
            if options.contains_key(option.name()) {
                continue;
            }
            if let Some(default) = option.default() {
                options.insert(option.name().to_owned(), default.clone());
            }
        }

        Self {
            options,
            configuration: object_field(params, "configuration"),
        }
    }

    /// Returns the resolved value of a declared option.
    #[must_use]
    pub fn option(&self, name: &str) -> Option<&Value> {
        self.options.get(name)
    }

    /// Returns the raw option map.
    #[must_use]
    pub const fn options(&self) -> &Map<String, Value> {
        &self.options
    }

    /// Returns the raw daemon configuration map.
    #[must_use]
    pub const fn configuration(&self) -> &Map<String, Value> {
        &self.configuration
    }

    /// Returns the Bitcoin network the daemon runs on.
    #[must_use]
    pub fn network(&self) -> Option<&str> {
        self.configuration.get("network").and_then(Value::as_str)
    }

    /// Returns the daemon's data directory.
    #[must_use]
    pub fn lightning_dir(&self) -> Option<&str> {
        self.configuration
            .get("lightning-dir")
            .and_then(Value::as_str)
    }

    /// Returns the daemon's JSON-RPC socket filename.
    #[must_use]
    pub fn rpc_file(&self) -> Option<&str> {
        self.configuration.get("rpc-file").and_then(Value::as_str)
    }

    /// Returns whether the plugin was started with the daemon rather than
    /// dynamically.
    #[must_use]
    pub fn startup(&self) -> bool {
        self.configuration
            .get("startup")
            .and_then(Value::as_bool)
            .unwrap_or(true)
    }
}

fn object_field(params: &Value, key: &str) -> Map<String, Value> {
    params
        .get(key)
        .and_then(Value::as_object)
        .cloned()
        .unwrap_or_default()
}

#[cfg(test)]
mod tests;
