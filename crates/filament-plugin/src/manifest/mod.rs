//! Manifest types describing the plugin's capabilities to the daemon.
//!
//! The manifest is the static self-description sent in reply to the
//! daemon's `getmanifest` call: declared configuration options, RPC
//! methods, event subscriptions, and hook topics. It is built once from
//! the registrations accumulated by the builder and never changes
//! afterwards; the daemon consumes it exactly once during negotiation.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Value type of a declared configuration option.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OptionKind {
    /// Free-form string value.
    String,
    /// Signed integer value.
    Int,
    /// Boolean value.
    Bool,
    /// Presence-only flag with no value.
    Flag,
}

impl OptionKind {
    /// Returns the protocol string representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Int => "int",
            Self::Bool => "bool",
            Self::Flag => "flag",
        }
    }
}

impl std::fmt::Display for OptionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A configuration option the plugin declares to the daemon.
///
/// The daemon surfaces declared options as `lightningd` command-line and
/// config-file settings and reports their values back during `init`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfigOption {
    name: String,
    #[serde(rename = "type")]
    kind: OptionKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    default: Option<Value>,
    description: String,
}

impl ConfigOption {
    /// Creates an option declaration without a default value.
    #[must_use]
    pub fn new(name: impl Into<String>, kind: OptionKind, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind,
            default: None,
            description: description.into(),
        }
    }

    /// Attaches a default value reported when the operator sets none.
    #[must_use]
    pub fn with_default(mut self, default: Value) -> Self {
        self.default = Some(default);
        self
    }

    /// Returns the option name.
    #[must_use]
    pub fn name(&self) -> &str {
        self.name.as_str()
    }

    /// Returns the option value type.
    #[must_use]
    pub const fn kind(&self) -> OptionKind {
        self.kind
    }

    /// Returns the declared default value, if any.
    #[must_use]
    pub fn default(&self) -> Option<&Value> {
        self.default.as_ref()
    }

    /// Returns the human-readable description.
    #[must_use]
    pub fn description(&self) -> &str {
        self.description.as_str()
    }
}

/// An RPC method the plugin offers through the daemon.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RpcMethod {
    name: String,
    #[serde(default)]
    usage: String,
    description: String,
}

impl RpcMethod {
    /// Creates an RPC method declaration.
    #[must_use]
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            usage: String::new(),
            description: description.into(),
        }
    }

    /// Attaches a usage string shown by the daemon's help output.
    #[must_use]
    pub fn with_usage(mut self, usage: impl Into<String>) -> Self {
        self.usage = usage.into();
        self
    }

    /// Returns the method name.
    #[must_use]
    pub fn name(&self) -> &str {
        self.name.as_str()
    }

    /// Returns the usage string.
    #[must_use]
    pub fn usage(&self) -> &str {
        self.usage.as_str()
    }

    /// Returns the human-readable description.
    #[must_use]
    pub fn description(&self) -> &str {
        self.description.as_str()
    }
}

/// The static capability description sent in the `getmanifest` reply.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Manifest {
    options: Vec<ConfigOption>,
    rpcmethods: Vec<RpcMethod>,
    subscriptions: Vec<String>,
    hooks: Vec<String>,
    dynamic: bool,
    nonnumericids: bool,
}

impl Manifest {
    /// Assembles a manifest from the declared capabilities.
    #[must_use]
    pub fn new(
        options: Vec<ConfigOption>,
        rpcmethods: Vec<RpcMethod>,
        subscriptions: Vec<String>,
        hooks: Vec<String>,
        dynamic: bool,
    ) -> Self {
        Self {
            options,
            rpcmethods,
            subscriptions,
            hooks,
            dynamic,
            // The correlator accepts the daemon's string ids, so advertise it.
            nonnumericids: true,
        }
    }

    /// Returns the declared configuration options.
    #[must_use]
    pub fn options(&self) -> &[ConfigOption] {
        &self.options
    }

    /// Returns the declared RPC methods.
    #[must_use]
    pub fn rpcmethods(&self) -> &[RpcMethod] {
        &self.rpcmethods
    }

    /// Returns the subscribed event topics.
    #[must_use]
    pub fn subscriptions(&self) -> &[String] {
        &self.subscriptions
    }

    /// Returns the subscribed hook topics.
    #[must_use]
    pub fn hooks(&self) -> &[String] {
        &self.hooks
    }

    /// Returns whether the daemon may start and stop the plugin at runtime.
    #[must_use]
    pub const fn dynamic(&self) -> bool {
        self.dynamic
    }
}
