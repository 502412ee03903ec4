//! JSON-RPC 2.0 envelope types for the plugin protocol.
//!
//! The daemon speaks a JSON-RPC 2.0 derived protocol: requests carry an
//! `id` and a `method`, notifications carry a `method` without an `id`, and
//! responses carry an `id` with either a `result` or an `error`. The codec
//! validates only this generic shape; topic-specific parameter schemas pass
//! through as opaque [`serde_json::Value`]s.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::PluginError;

/// JSON-RPC error code for an unknown method.
pub const METHOD_NOT_FOUND: i64 = -32601;

/// JSON-RPC error code for a failure inside a method handler.
pub const INTERNAL_ERROR: i64 = -32603;

/// Request identifier assigned by the daemon.
///
/// `lightningd` uses both numeric ids and structured string ids such as
/// `"cln:gossipd#123"`, so correlation must accept either form.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RequestId {
    /// Numeric identifier.
    Number(i64),
    /// String identifier.
    Text(String),
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Number(n) => write!(f, "{n}"),
            Self::Text(s) => f.write_str(s),
        }
    }
}

impl From<i64> for RequestId {
    fn from(id: i64) -> Self {
        Self::Number(id)
    }
}

impl From<&str> for RequestId {
    fn from(id: &str) -> Self {
        Self::Text(id.to_owned())
    }
}

/// A JSON-RPC 2.0 error payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RpcError {
    /// Error code.
    pub code: i64,
    /// Human-readable error message.
    pub message: String,
    /// Optional additional data.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl RpcError {
    /// Creates an error payload with the given code and message.
    #[must_use]
    pub fn new(code: i64, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            data: None,
        }
    }

    /// Creates a "method not found" error for the given method.
    #[must_use]
    pub fn method_not_found(method: &str) -> Self {
        Self::new(METHOD_NOT_FOUND, format!("unknown method '{method}'"))
    }

    /// Creates an internal error carrying a handler failure message.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(INTERNAL_ERROR, message)
    }
}

/// Classification of a decoded envelope.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageClass {
    /// A call expecting exactly one response with the same id.
    Request,
    /// A fire-and-forget event; no response may be sent.
    Notification,
    /// A reply to a previously issued call.
    Response,
}

/// The generic structured message unit of the plugin protocol.
///
/// Envelopes built through the constructors always serialise successfully;
/// [`Envelope::decode`] enforces the shape invariants on inbound bytes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    jsonrpc: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    id: Option<RequestId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    method: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    params: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    result: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    error: Option<RpcError>,
}

impl Envelope {
    /// Creates a call envelope with an id, method, and optional params.
    #[must_use]
    pub fn request(id: RequestId, method: impl Into<String>, params: Option<Value>) -> Self {
        Self {
            jsonrpc: "2.0".to_owned(),
            id: Some(id),
            method: Some(method.into()),
            params,
            result: None,
            error: None,
        }
    }

    /// Creates a notification envelope (no id, no response expected).
    #[must_use]
    pub fn notification(method: impl Into<String>, params: Option<Value>) -> Self {
        Self {
            jsonrpc: "2.0".to_owned(),
            id: None,
            method: Some(method.into()),
            params,
            result: None,
            error: None,
        }
    }

    /// Creates a success response for the given request id.
    #[must_use]
    pub fn response(id: RequestId, result: Value) -> Self {
        Self {
            jsonrpc: "2.0".to_owned(),
            id: Some(id),
            method: None,
            params: None,
            result: Some(result),
            error: None,
        }
    }

    /// Creates an error response for the given request id.
    #[must_use]
    pub fn error_response(id: RequestId, error: RpcError) -> Self {
        Self {
            jsonrpc: "2.0".to_owned(),
            id: Some(id),
            method: None,
            params: None,
            result: None,
            error: Some(error),
        }
    }

    /// Decodes and validates an envelope from raw frame bytes.
    ///
    /// # Errors
    ///
    /// Returns [`PluginError::MalformedEnvelope`] when the bytes are not
    /// valid JSON or the required envelope fields are missing or
    /// inconsistent.
    pub fn decode(bytes: &[u8]) -> Result<Self, PluginError> {
        let envelope: Self =
            serde_json::from_slice(bytes).map_err(|e| PluginError::MalformedEnvelope {
                message: "unparseable envelope".to_owned(),
                source: Some(e),
            })?;
        envelope.validate()?;
        Ok(envelope)
    }

    /// Encodes the envelope as compact JSON bytes.
    ///
    /// # Errors
    ///
    /// Returns [`PluginError::Encode`] if serialisation fails; this cannot
    /// happen for envelopes built through the constructors.
    pub fn encode(&self) -> Result<Vec<u8>, PluginError> {
        serde_json::to_vec(self).map_err(PluginError::Encode)
    }

    /// Classifies the envelope as a request, notification, or response.
    #[must_use]
    pub fn classify(&self) -> MessageClass {
        match (&self.method, &self.id) {
            (Some(_), Some(_)) => MessageClass::Request,
            (Some(_), None) => MessageClass::Notification,
            (None, _) => MessageClass::Response,
        }
    }

    /// Returns the request identifier, if present.
    #[must_use]
    pub fn id(&self) -> Option<&RequestId> {
        self.id.as_ref()
    }

    /// Returns the method name, if present.
    #[must_use]
    pub fn method(&self) -> Option<&str> {
        self.method.as_deref()
    }

    /// Returns the named parameters, if present.
    #[must_use]
    pub fn params(&self) -> Option<&Value> {
        self.params.as_ref()
    }

    /// Returns the result payload, if present.
    #[must_use]
    pub fn result(&self) -> Option<&Value> {
        self.result.as_ref()
    }

    /// Returns the error payload, if present.
    #[must_use]
    pub fn error(&self) -> Option<&RpcError> {
        self.error.as_ref()
    }

    fn validate(&self) -> Result<(), PluginError> {
        if self.jsonrpc != "2.0" {
            return Err(malformed(format!(
                "unsupported protocol version '{}'",
                self.jsonrpc
            )));
        }
        match (&self.method, &self.result, &self.error) {
            (None, None, None) => Err(malformed("envelope has neither method nor result/error")),
            (Some(_), Some(_), _) | (Some(_), _, Some(_)) => {
                Err(malformed("call envelope carries a response payload"))
            }
            (None, Some(_), Some(_)) => {
                Err(malformed("response carries both result and error"))
            }
            (None, _, _) if self.id.is_none() => Err(malformed("response without an id")),
            _ => Ok(()),
        }
    }
}

fn malformed(message: impl Into<String>) -> PluginError {
    PluginError::MalformedEnvelope {
        message: message.into(),
        source: None,
    }
}
