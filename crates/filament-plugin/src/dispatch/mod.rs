//! Message dispatch: routing, handler invocation, response correlation.
//!
//! The dispatcher receives decoded envelopes after negotiation completes
//! and routes them by message class. Notifications fan out to subscribers
//! and never produce a reply; hook and RPC calls must each produce exactly
//! one reply, which the [`ResponseCorrelator`] enforces. Handler failures
//! are contained here: a failing subscriber is logged and dropped, a
//! failing hook is answered with the safe-default directive, and a failing
//! RPC call is answered with an error payload.

use std::collections::HashMap;
use std::time::Instant;

use serde_json::Value;
use tracing::{debug, warn};

use crate::context::{Params, PluginContext};
use crate::envelope::{Envelope, MessageClass, RequestId, RpcError};
use crate::error::PluginError;
use crate::registry::{HandlerClass, HandlerRegistry};
use crate::transport::SharedWriter;

/// Tracing target for dispatch operations.
const DISPATCH_TARGET: &str = "filament_plugin::dispatch";

/// The daemon's pre-termination notification topic.
const SHUTDOWN_TOPIC: &str = "shutdown";

/// A hook or RPC call awaiting its single response.
#[derive(Debug)]
struct PendingCall {
    topic: String,
    received: Instant,
}

/// Tracks pending call identifiers and enforces exactly one response per
/// call.
///
/// Responses correlate purely by id; nothing requires them to be sent in
/// request order. Completing an id that is not pending is
/// [`PluginError::DoubleResponse`], an internal invariant violation that
/// must abort the process rather than reach the daemon.
#[derive(Debug, Default)]
pub struct ResponseCorrelator {
    pending: HashMap<RequestId, PendingCall>,
}

impl ResponseCorrelator {
    /// Creates an empty correlator.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records the arrival of a call.
    ///
    /// # Errors
    ///
    /// Returns [`PluginError::MalformedEnvelope`] if the daemon reuses an
    /// id that is still pending.
    pub fn begin(&mut self, id: RequestId, topic: &str) -> Result<(), PluginError> {
        if self.pending.contains_key(&id) {
            return Err(PluginError::MalformedEnvelope {
                message: format!("request id {id} is already in flight"),
                source: None,
            });
        }
        self.pending.insert(
            id,
            PendingCall {
                topic: topic.to_owned(),
                received: Instant::now(),
            },
        );
        Ok(())
    }

    /// Sends the single success response for a pending call.
    ///
    /// # Errors
    ///
    /// Returns [`PluginError::DoubleResponse`] if the id is not pending,
    /// or a transport/encoding error if the reply cannot be written.
    pub fn complete(
        &mut self,
        id: &RequestId,
        sender: &SharedWriter,
        result: Value,
    ) -> Result<(), PluginError> {
        let call = self.take(id)?;
        self.finish(&call, sender, Envelope::response(id.clone(), result))
    }

    /// Sends the single error response for a pending call.
    ///
    /// # Errors
    ///
    /// Returns [`PluginError::DoubleResponse`] if the id is not pending,
    /// or a transport/encoding error if the reply cannot be written.
    pub fn fail(
        &mut self,
        id: &RequestId,
        sender: &SharedWriter,
        error: RpcError,
    ) -> Result<(), PluginError> {
        let call = self.take(id)?;
        self.finish(&call, sender, Envelope::error_response(id.clone(), error))
    }

    /// Returns `true` when no calls are awaiting a response.
    #[must_use]
    pub fn is_idle(&self) -> bool {
        self.pending.is_empty()
    }

    fn take(&mut self, id: &RequestId) -> Result<PendingCall, PluginError> {
        self.pending
            .remove(id)
            .ok_or_else(|| PluginError::DoubleResponse { id: id.to_string() })
    }

    fn finish(
        &self,
        call: &PendingCall,
        sender: &SharedWriter,
        reply: Envelope,
    ) -> Result<(), PluginError> {
        sender.send(&reply.encode()?)?;
        debug!(
            target: DISPATCH_TARGET,
            topic = %call.topic,
            elapsed_ms = call.received.elapsed().as_millis() as u64,
            "call completed"
        );
        Ok(())
    }
}

/// Verdict of dispatching one envelope.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// Keep reading frames.
    Continue,
    /// The daemon announced shutdown; end the loop cleanly.
    Shutdown,
}

/// Routes decoded envelopes to registered handlers.
pub struct Dispatcher {
    registry: HandlerRegistry,
    correlator: ResponseCorrelator,
    failure_directive: Value,
}

impl Dispatcher {
    /// Creates a dispatcher over a frozen registry.
    ///
    /// `failure_directive` is the hook reply substituted when a hook
    /// handler fails; it must be an action the daemon can always accept.
    #[must_use]
    pub fn new(registry: HandlerRegistry, failure_directive: Value) -> Self {
        Self {
            registry,
            correlator: ResponseCorrelator::new(),
            failure_directive,
        }
    }

    /// Dispatches one envelope, sending whatever reply its class requires.
    ///
    /// Handler failures never surface as errors here; only protocol and
    /// bookkeeping violations do.
    ///
    /// # Errors
    ///
    /// Returns [`PluginError`] on transport failure or a response
    /// bookkeeping violation.
    pub fn dispatch(
        &mut self,
        envelope: &Envelope,
        context: &PluginContext,
        sender: &SharedWriter,
    ) -> Result<DispatchOutcome, PluginError> {
        match envelope.classify() {
            MessageClass::Request => self.dispatch_request(envelope, context, sender),
            MessageClass::Notification => Ok(self.dispatch_notification(envelope, context)),
            MessageClass::Response => {
                // The runtime issues no calls of its own, so no response
                // can ever be expected here.
                warn!(
                    target: DISPATCH_TARGET,
                    id = ?envelope.id(),
                    "ignoring unexpected response frame"
                );
                Ok(DispatchOutcome::Continue)
            }
        }
    }

    fn dispatch_request(
        &mut self,
        envelope: &Envelope,
        context: &PluginContext,
        sender: &SharedWriter,
    ) -> Result<DispatchOutcome, PluginError> {
        let (Some(id), Some(method)) = (envelope.id().cloned(), envelope.method()) else {
            // Unreachable: classify() only yields Request with both set.
            return Ok(DispatchOutcome::Continue);
        };
        let params = envelope
            .params()
            .cloned()
            .map_or_else(Params::empty, Params::from_value);

        self.correlator.begin(id.clone(), method)?;

        match self.registry.request_class(method) {
            Some(HandlerClass::Hook) => {
                self.answer_hook(&id, method, context, sender, &params)?;
            }
            Some(HandlerClass::Rpc) => {
                self.answer_rpc(&id, method, context, sender, &params)?;
            }
            Some(HandlerClass::Subscription) | None => {
                debug!(target: DISPATCH_TARGET, method, "request for unknown method");
                self.correlator
                    .fail(&id, sender, RpcError::method_not_found(method))?;
            }
        }
        Ok(DispatchOutcome::Continue)
    }

    fn answer_hook(
        &mut self,
        id: &RequestId,
        topic: &str,
        context: &PluginContext,
        sender: &SharedWriter,
        params: &Params,
    ) -> Result<(), PluginError> {
        let Some(handler) = self.registry.hook(topic) else {
            return self
                .correlator
                .fail(id, sender, RpcError::method_not_found(topic));
        };
        match handler(context, params) {
            Ok(directive) => self.correlator.complete(id, sender, directive),
            Err(error) => {
                warn!(
                    target: DISPATCH_TARGET,
                    topic,
                    error = %error,
                    "hook handler failed, replying with the safe default"
                );
                self.correlator
                    .complete(id, sender, self.failure_directive.clone())
            }
        }
    }

    fn answer_rpc(
        &mut self,
        id: &RequestId,
        method: &str,
        context: &PluginContext,
        sender: &SharedWriter,
        params: &Params,
    ) -> Result<(), PluginError> {
        let Some(handler) = self.registry.rpc(method) else {
            return self
                .correlator
                .fail(id, sender, RpcError::method_not_found(method));
        };
        match handler(context, params) {
            Ok(payload) => self.correlator.complete(id, sender, payload),
            Err(error) => {
                warn!(
                    target: DISPATCH_TARGET,
                    method,
                    error = %error,
                    "rpc handler failed"
                );
                self.correlator
                    .fail(id, sender, RpcError::internal(error.message()))
            }
        }
    }

    fn dispatch_notification(
        &mut self,
        envelope: &Envelope,
        context: &PluginContext,
    ) -> DispatchOutcome {
        let Some(topic) = envelope.method() else {
            return DispatchOutcome::Continue;
        };
        let params = envelope
            .params()
            .cloned()
            .map_or_else(Params::empty, Params::from_value);

        match self.registry.subscribers(topic) {
            Some(subscribers) => {
                for handler in subscribers {
                    if let Err(error) = handler(context, &params) {
                        warn!(
                            target: DISPATCH_TARGET,
                            topic,
                            error = %error,
                            "notification handler failed"
                        );
                    }
                }
            }
            None => {
                debug!(target: DISPATCH_TARGET, topic, "unhandled notification");
            }
        }

        if topic == SHUTDOWN_TOPIC {
            debug!(target: DISPATCH_TARGET, "daemon announced shutdown");
            return DispatchOutcome::Shutdown;
        }
        DispatchOutcome::Continue
    }
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("registry", &self.registry)
            .field("pending", &!self.correlator.is_idle())
            .finish()
    }
}

#[cfg(test)]
mod tests;
