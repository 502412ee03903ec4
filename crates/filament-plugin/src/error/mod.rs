//! Domain errors raised by the plugin runtime.
//!
//! All errors use `thiserror`-derived types with structured context so
//! callers can inspect the failure programmatically. [`PluginError`] covers
//! protocol-level failures that terminate the runtime; [`HandlerError`] is
//! the contained failure type for user callbacks and never escapes the
//! dispatch boundary.

use thiserror::Error;

/// Errors arising from the plugin protocol and runtime machinery.
#[derive(Debug, Error)]
pub enum PluginError {
    /// The daemon closed its end of the stream. This is the normal shutdown
    /// signal, not a fault.
    #[error("daemon closed the connection")]
    ConnectionClosed,

    /// A frame could not be read from the stream.
    #[error("malformed frame: {message}")]
    MalformedFrame {
        /// Description of the framing violation.
        message: String,
    },

    /// An inbound message was missing required envelope fields or could not
    /// be parsed at all.
    #[error("malformed envelope: {message}")]
    MalformedEnvelope {
        /// Description of the parse or validation failure.
        message: String,
        /// Optional underlying JSON error.
        #[source]
        source: Option<serde_json::Error>,
    },

    /// A message arrived before manifest negotiation completed.
    #[error("received '{method}' before initialisation completed")]
    NotReady {
        /// Method name of the premature message.
        method: String,
    },

    /// A hook or RPC handler was registered twice for the same topic.
    #[error("handler already registered for topic '{topic}'")]
    DuplicateTopic {
        /// Topic that was registered twice.
        topic: String,
    },

    /// A second response was produced for an identifier that is no longer
    /// pending. Protocol state is undefined after this; the process must
    /// stop rather than keep talking to the daemon.
    #[error("duplicate response for request id {id}")]
    DoubleResponse {
        /// Identifier of the offending response.
        id: String,
    },

    /// An I/O error occurred on the daemon streams.
    #[error("I/O error on daemon stream: {0}")]
    Io(#[from] std::io::Error),

    /// An outbound envelope could not be serialised.
    #[error("failed to serialise outbound envelope: {0}")]
    Encode(#[source] serde_json::Error),
}

/// Failure raised inside a user callback.
///
/// Handler failures are recovered at the dispatch boundary: notifications
/// log and drop them, hooks substitute the safe-default directive, and RPC
/// calls convert them into an error reply. They never terminate the
/// dispatch loop.
#[derive(Debug, Error)]
#[error("{message}")]
pub struct HandlerError {
    message: String,
}

impl HandlerError {
    /// Creates a handler error with the given message.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    /// Returns the failure message.
    #[must_use]
    pub fn message(&self) -> &str {
        self.message.as_str()
    }
}

impl From<PluginError> for HandlerError {
    fn from(error: PluginError) -> Self {
        Self::new(error.to_string())
    }
}

impl From<serde_json::Error> for HandlerError {
    fn from(error: serde_json::Error) -> Self {
        Self::new(error.to_string())
    }
}
