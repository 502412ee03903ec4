//! Process-wide table of topic-to-handler mappings.
//!
//! The registry is populated through the builder before the dispatch loop
//! starts and is immutable afterwards (it moves into the runtime when
//! `run()` begins). Hooks and RPC methods are unique per topic because
//! both are looked up by the inbound envelope's `method`; subscriptions
//! fan out to every registered callback.

use std::collections::HashMap;

use serde_json::Value;

use crate::context::{Params, PluginContext};
use crate::error::{HandlerError, PluginError};

/// Callback invoked for a subscribed event notification.
pub type SubscriptionHandler =
    Box<dyn Fn(&PluginContext, &Params) -> Result<(), HandlerError> + Send + Sync>;

/// Callback invoked for a hook call; the returned value is the control
/// directive sent back to the daemon.
pub type HookHandler =
    Box<dyn Fn(&PluginContext, &Params) -> Result<Value, HandlerError> + Send + Sync>;

/// Callback invoked for an RPC call; the returned value is an arbitrary
/// application payload.
pub type RpcHandler =
    Box<dyn Fn(&PluginContext, &Params) -> Result<Value, HandlerError> + Send + Sync>;

/// Dispatch class of a registered handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandlerClass {
    /// Fire-and-forget event; no reply is ever sent.
    Subscription,
    /// Synchronous interception point; the reply gates daemon control flow.
    Hook,
    /// Plain RPC call; the reply is an application payload.
    Rpc,
}

impl HandlerClass {
    /// Returns the canonical name of the class.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Subscription => "subscription",
            Self::Hook => "hook",
            Self::Rpc => "rpc",
        }
    }
}

/// Registry of topic-to-handler mappings.
#[derive(Default)]
pub struct HandlerRegistry {
    subscriptions: HashMap<String, Vec<SubscriptionHandler>>,
    hooks: HashMap<String, HookHandler>,
    rpc: HashMap<String, RpcHandler>,
}

impl HandlerRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a subscriber for an event topic. Multiple subscribers for one
    /// topic are allowed; each is invoked on every matching event.
    pub fn subscribe(&mut self, topic: impl Into<String>, handler: SubscriptionHandler) {
        self.subscriptions.entry(topic.into()).or_default().push(handler);
    }

    /// Registers the hook handler for a topic.
    ///
    /// # Errors
    ///
    /// Returns [`PluginError::DuplicateTopic`] if a hook or RPC handler is
    /// already registered under the same name.
    pub fn register_hook(
        &mut self,
        topic: impl Into<String>,
        handler: HookHandler,
    ) -> Result<(), PluginError> {
        let topic = topic.into();
        self.ensure_request_topic_free(&topic)?;
        self.hooks.insert(topic, handler);
        Ok(())
    }

    /// Registers the RPC handler for a method name.
    ///
    /// # Errors
    ///
    /// Returns [`PluginError::DuplicateTopic`] if a hook or RPC handler is
    /// already registered under the same name.
    pub fn register_rpc(
        &mut self,
        name: impl Into<String>,
        handler: RpcHandler,
    ) -> Result<(), PluginError> {
        let name = name.into();
        self.ensure_request_topic_free(&name)?;
        self.rpc.insert(name, handler);
        Ok(())
    }

    /// Classifies an inbound request method against the registered
    /// handlers.
    #[must_use]
    pub fn request_class(&self, method: &str) -> Option<HandlerClass> {
        if self.hooks.contains_key(method) {
            Some(HandlerClass::Hook)
        } else if self.rpc.contains_key(method) {
            Some(HandlerClass::Rpc)
        } else {
            None
        }
    }

    /// Returns the hook handler for a topic.
    #[must_use]
    pub fn hook(&self, topic: &str) -> Option<&HookHandler> {
        self.hooks.get(topic)
    }

    /// Returns the RPC handler for a method name.
    #[must_use]
    pub fn rpc(&self, name: &str) -> Option<&RpcHandler> {
        self.rpc.get(name)
    }

    /// Returns the subscribers for an event topic.
    #[must_use]
    pub fn subscribers(&self, topic: &str) -> Option<&[SubscriptionHandler]> {
        self.subscriptions.get(topic).map(Vec::as_slice)
    }

    /// Returns the subscribed event topics in sorted order.
    #[must_use]
    pub fn subscription_topics(&self) -> Vec<String> {
        let mut topics: Vec<String> = self.subscriptions.keys().cloned().collect();
        topics.sort();
        topics
    }

    /// Returns the subscribed hook topics in sorted order.
    #[must_use]
    pub fn hook_topics(&self) -> Vec<String> {
        let mut topics: Vec<String> = self.hooks.keys().cloned().collect();
        topics.sort();
        topics
    }

    /// Returns the number of registered topics across all classes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.subscriptions.len() + self.hooks.len() + self.rpc.len()
    }

    /// Returns `true` when nothing is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn ensure_request_topic_free(&self, topic: &str) -> Result<(), PluginError> {
        if self.hooks.contains_key(topic) || self.rpc.contains_key(topic) {
            return Err(PluginError::DuplicateTopic {
                topic: topic.to_owned(),
            });
        }
        Ok(())
    }
}

impl std::fmt::Debug for HandlerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HandlerRegistry")
            .field("subscriptions", &self.subscription_topics())
            .field("hooks", &self.hook_topics())
            .field("rpc", &self.rpc.keys().collect::<Vec<_>>())
            .finish()
    }
}
