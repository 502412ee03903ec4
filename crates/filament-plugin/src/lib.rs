//! Plugin runtime for extending a Lightning Network node daemon.
//!
//! The `filament-plugin` crate implements the daemon side of nothing and
//! the plugin side of everything: a plugin process is spawned by the
//! daemon, answers the `getmanifest` capability-discovery call with a
//! static [`Manifest`], receives its configuration through `init`, and
//! then serves a sequential dispatch loop over its standard streams.
//! Three message classes flow through the loop: event notifications
//! (fire-and-forget), hook calls (synchronous, the reply gates the
//! daemon's own control flow), and RPC calls the plugin advertises.
//!
//! # Architecture
//!
//! Registrations are accumulated on a [`PluginBuilder`] and freeze when
//! [`Plugin::run`] starts: transport acquisition, negotiation, dispatch,
//! and teardown all live inside `run`. Hook replies are correlated by
//! request id and guaranteed to be sent exactly once per call, even when
//! a handler fails — a crashed callback must never leave the daemon
//! waiting on a hook response.
//!
//! # Example
//!
//! ```rust,no_run
//! use filament_plugin::{LogLevel, PluginBuilder, PluginError};
//! use serde_json::json;
//!
//! fn main() -> Result<(), PluginError> {
//!     PluginBuilder::new()
//!         .hook("htlc_accepted", |ctx, _params| {
//!             ctx.log(LogLevel::Info, "htlc accepted!")?;
//!             Ok(json!({"result": "continue"}))
//!         })?
//!         .build()
//!         .run()
//! }
//! ```

pub mod config;
pub mod context;
pub mod dispatch;
pub mod envelope;
pub mod error;
pub mod manifest;
pub mod registry;
pub mod runtime;
pub mod telemetry;
pub mod transport;

pub use self::config::ConfigSnapshot;
pub use self::context::{LogLevel, Params, PluginContext};
pub use self::envelope::{Envelope, MessageClass, RequestId, RpcError};
pub use self::error::{HandlerError, PluginError};
pub use self::manifest::{ConfigOption, Manifest, OptionKind, RpcMethod};
pub use self::registry::{HandlerClass, HandlerRegistry};
pub use self::runtime::{Plugin, PluginBuilder};
