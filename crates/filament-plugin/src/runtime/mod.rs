//! Plugin lifecycle: registration builder, manifest negotiation, dispatch
//! loop.
//!
//! [`PluginBuilder`] accumulates `{topic, class, handler}` registrations
//! and option/method declarations before the runtime starts; [`Plugin`]
//! owns transport acquisition, the `getmanifest`/`init` handshake, and the
//! sequential dispatch loop. The handler table freezes when `run()` begins.
//!
//! Negotiation is a three-state machine, `Uninitialized → ManifestSent →
//! Initialized`, and the ordering is load-bearing: no handler observes a
//! daemon event before the configuration snapshot exists, and the daemon
//! never receives a premature subscription or hook response.

use std::io::BufRead;
use std::sync::Arc;

use serde_json::{Value, json};
use tracing::{debug, info};

use crate::config::ConfigSnapshot;
use crate::context::{Params, PluginContext};
use crate::dispatch::{DispatchOutcome, Dispatcher};
use crate::envelope::{Envelope, MessageClass, RequestId};
use crate::error::{HandlerError, PluginError};
use crate::manifest::{ConfigOption, Manifest, RpcMethod};
use crate::registry::HandlerRegistry;
use crate::transport::{FrameReader, SharedWriter};

/// Tracing target for runtime lifecycle operations.
const RUNTIME_TARGET: &str = "filament_plugin::runtime";

/// Method name of the daemon's capability-discovery call.
const GETMANIFEST_METHOD: &str = "getmanifest";

/// Method name of the daemon's configuration call.
const INIT_METHOD: &str = "init";

/// The conventional fail-open hook directive: continue normal processing.
fn continue_directive() -> Value {
    json!({"result": "continue"})
}

/// Negotiation progress before the dispatch loop starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum NegotiationState {
    /// Nothing received yet; only `getmanifest` is acceptable.
    Uninitialized,
    /// Manifest sent; only `init` is acceptable.
    ManifestSent,
}

/// Accumulates registrations before the runtime starts.
///
/// # Example
///
/// ```
/// use filament_plugin::{PluginBuilder, PluginError};
/// use serde_json::json;
///
/// # fn main() -> Result<(), PluginError> {
/// let plugin = PluginBuilder::new()
///     .subscribe("channel_state_changed", |_ctx, _params| Ok(()))
///     .hook("htlc_accepted", |_ctx, _params| Ok(json!({"result": "continue"})))?
///     .build();
/// assert_eq!(plugin.manifest().hooks(), ["htlc_accepted"]);
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct PluginBuilder {
    options: Vec<ConfigOption>,
    rpcmethods: Vec<RpcMethod>,
    registry: HandlerRegistry,
    dynamic: bool,
    failure_directive: Value,
}

impl Default for PluginBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl PluginBuilder {
    /// Creates an empty builder.
    #[must_use]
    pub fn new() -> Self {
        Self {
            options: Vec::new(),
            rpcmethods: Vec::new(),
            registry: HandlerRegistry::new(),
            dynamic: true,
            failure_directive: continue_directive(),
        }
    }

    /// Declares a configuration option surfaced through the daemon.
    #[must_use]
    pub fn option(mut self, option: ConfigOption) -> Self {
        self.options.push(option);
        self
    }

    /// Subscribes a callback to an event topic. Subscriptions stack: every
    /// callback registered for a topic fires on each matching event.
    #[must_use]
    pub fn subscribe<F>(mut self, topic: impl Into<String>, handler: F) -> Self
    where
        F: Fn(&PluginContext, &Params) -> Result<(), HandlerError> + Send + Sync + 'static,
    {
        self.registry.subscribe(topic, Box::new(handler));
        self
    }

    /// Registers a hook handler. The handler's returned value is the
    /// control directive sent back to the daemon.
    ///
    /// # Errors
    ///
    /// Returns [`PluginError::DuplicateTopic`] if the topic already has a
    /// hook or RPC handler.
    pub fn hook<F>(mut self, topic: impl Into<String>, handler: F) -> Result<Self, PluginError>
    where
        F: Fn(&PluginContext, &Params) -> Result<Value, HandlerError> + Send + Sync + 'static,
    {
        self.registry.register_hook(topic, Box::new(handler))?;
        Ok(self)
    }

    /// Registers an RPC method the plugin advertises in its manifest.
    ///
    /// # Errors
    ///
    /// Returns [`PluginError::DuplicateTopic`] if the method name already
    /// has a hook or RPC handler.
    pub fn rpcmethod<F>(mut self, method: RpcMethod, handler: F) -> Result<Self, PluginError>
    where
        F: Fn(&PluginContext, &Params) -> Result<Value, HandlerError> + Send + Sync + 'static,
    {
        self.registry
            .register_rpc(method.name().to_owned(), Box::new(handler))?;
        self.rpcmethods.push(method);
        Ok(self)
    }

    /// Sets whether the daemon may start and stop this plugin at runtime.
    #[must_use]
    pub fn dynamic(mut self, dynamic: bool) -> Self {
        self.dynamic = dynamic;
        self
    }

    /// Overrides the directive substituted when a hook handler fails.
    ///
    /// Defaults to `{"result": "continue"}`, i.e. fail-open: a crashed
    /// handler must not stall the daemon's payment processing.
    #[must_use]
    pub fn hook_failure_directive(mut self, directive: Value) -> Self {
        self.failure_directive = directive;
        self
    }

    /// Freezes the registrations into a runnable plugin.
    #[must_use]
    pub fn build(self) -> Plugin {
        let manifest = Manifest::new(
            self.options,
            self.rpcmethods,
            self.registry.subscription_topics(),
            self.registry.hook_topics(),
            self.dynamic,
        );
        Plugin {
            manifest,
            registry: self.registry,
            failure_directive: self.failure_directive,
        }
    }
}

/// A fully registered plugin, ready to serve the daemon.
#[derive(Debug)]
pub struct Plugin {
    manifest: Manifest,
    registry: HandlerRegistry,
    failure_directive: Value,
}

impl Plugin {
    /// Returns the manifest that will answer `getmanifest`.
    #[must_use]
    pub fn manifest(&self) -> &Manifest {
        &self.manifest
    }

    /// Serves the daemon over the process's standard streams until the
    /// input closes or the daemon announces shutdown.
    ///
    /// # Errors
    ///
    /// Returns [`PluginError`] on any fatal protocol violation. A closed
    /// input stream is the normal shutdown path and returns `Ok`.
    pub fn run(self) -> Result<(), PluginError> {
        self.run_loop(FrameReader::stdin(), SharedWriter::stdout())
    }

    /// Serves the daemon over explicit transport halves.
    ///
    /// The output writer is flushed on every exit path.
    ///
    /// # Errors
    ///
    /// Returns [`PluginError`] on any fatal protocol violation.
    pub fn run_loop<R: BufRead>(
        self,
        mut reader: FrameReader<R>,
        sender: SharedWriter,
    ) -> Result<(), PluginError> {
        let outcome = self.serve(&mut reader, &sender);
        let _ = sender.flush();
        match outcome {
            Err(PluginError::ConnectionClosed) => Ok(()),
            other => other,
        }
    }

    fn serve<R: BufRead>(
        self,
        reader: &mut FrameReader<R>,
        sender: &SharedWriter,
    ) -> Result<(), PluginError> {
        let Self {
            manifest,
            registry,
            failure_directive,
        } = self;
        let manifest = Arc::new(manifest);

        let snapshot = Self::negotiate(&manifest, reader, sender)?;
        info!(
            target: RUNTIME_TARGET,
            network = snapshot.network().unwrap_or("unknown"),
            "plugin initialised"
        );

        let context = PluginContext::new(Arc::clone(&manifest), Arc::new(snapshot), sender.clone());
        let mut dispatcher = Dispatcher::new(registry, failure_directive);

        loop {
            let frame = reader.receive()?;
            let envelope = Envelope::decode(&frame)?;
            match dispatcher.dispatch(&envelope, &context, sender)? {
                DispatchOutcome::Continue => {}
                DispatchOutcome::Shutdown => return Ok(()),
            }
        }
    }

    /// Runs the startup handshake and returns the configuration snapshot.
    fn negotiate<R: BufRead>(
        manifest: &Manifest,
        reader: &mut FrameReader<R>,
        sender: &SharedWriter,
    ) -> Result<ConfigSnapshot, PluginError> {
        let mut state = NegotiationState::Uninitialized;

        loop {
            let frame = reader.receive()?;
            let envelope = Envelope::decode(&frame)?;

            match state {
                NegotiationState::Uninitialized => {
                    let id = expect_startup_call(&envelope, GETMANIFEST_METHOD)?;
                    let body = serde_json::to_value(manifest).map_err(PluginError::Encode)?;
                    sender.send(&Envelope::response(id, body).encode()?)?;
                    debug!(target: RUNTIME_TARGET, "manifest sent");
                    state = NegotiationState::ManifestSent;
                }
                NegotiationState::ManifestSent => {
                    let id = expect_startup_call(&envelope, INIT_METHOD)?;
                    let snapshot = ConfigSnapshot::from_init(
                        envelope.params().unwrap_or(&Value::Null),
                        manifest.options(),
                    );
                    sender.send(&Envelope::response(id, json!({})).encode()?)?;
                    return Ok(snapshot);
                }
            }
        }
    }
}

/// Checks that an envelope is the expected startup call and returns its id.
fn expect_startup_call(envelope: &Envelope, expected: &str) -> Result<RequestId, PluginError> {
    if envelope.classify() != MessageClass::Request || envelope.method() != Some(expected) {
        return Err(PluginError::NotReady {
            method: envelope.method().unwrap_or("<response>").to_owned(),
        });
    }
    envelope.id().cloned().ok_or_else(|| PluginError::NotReady {
        method: expected.to_owned(),
    })
}
