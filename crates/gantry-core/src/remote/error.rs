//! # Gantry Remote Errors
//!
//! Error taxonomy for remote invocation. Only transport failures flagged as
//! transient are ever retried; application and dispatch errors reach the
//! caller after a single attempt.
use std::fmt;
use std::io::ErrorKind;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use thiserror::Error;

/// The remote method itself failed (a business error).
#[derive(Debug, Clone, PartialEq, Error, Serialize, Deserialize)]
#[error("{tag}: {message}")]
pub struct ApplicationError {
    /// Discriminator identifying the error type across the wire.
    pub tag: String,
    pub message: String,
    /// Structured payload, when the error type carries one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<JsonValue>,
}

impl ApplicationError {
    pub fn new(tag: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            message: message.into(),
            details: None,
        }
    }

    pub fn with_details<T: Serialize>(mut self, details: &T) -> Self {
        self.details = serde_json::to_value(details).ok();
        self
    }

    pub fn is(&self, tag: &str) -> bool {
        self.tag == tag
    }

    /// Best-effort decoding of the structured payload.
    pub fn details_as<T: DeserializeOwned>(&self) -> Option<T> {
        self.details.clone().and_then(|d| serde_json::from_value(d).ok())
    }
}

/// Why the remote side could not route a request to a method.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DispatchReason {
    #[error("service not found")]
    ServiceNotFound,
    #[error("service not remotable")]
    NotRemotable,
    #[error("unknown method")]
    UnknownMethod,
    #[error("bad arguments")]
    BadArguments,
}

#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[error("dispatch failed ({reason}): {detail}")]
pub struct DispatchError {
    pub reason: DispatchReason,
    pub detail: String,
}

impl DispatchError {
    pub fn new(reason: DispatchReason, detail: impl Into<String>) -> Self {
        Self {
            reason,
            detail: detail.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportErrorKind {
    ConnectionRefused,
    Timeout,
    NoRoute,
    /// The connection dropped before a response arrived.
    ConnectionReset,
    /// Malformed frames or an unexpected frame sequence.
    Protocol,
    Other,
}

impl fmt::Display for TransportErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            TransportErrorKind::ConnectionRefused => "connection refused",
            TransportErrorKind::Timeout => "timeout",
            TransportErrorKind::NoRoute => "no route",
            TransportErrorKind::ConnectionReset => "connection reset",
            TransportErrorKind::Protocol => "protocol error",
            TransportErrorKind::Other => "transport error",
        };
        f.write_str(label)
    }
}

/// A single failed transport attempt.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{kind}: {message}")]
pub struct TransportError {
    pub kind: TransportErrorKind,
    pub message: String,
}

impl TransportError {
    pub fn new(kind: TransportErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn refused(message: impl Into<String>) -> Self {
        Self::new(TransportErrorKind::ConnectionRefused, message)
    }

    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new(TransportErrorKind::Timeout, message)
    }

    pub fn protocol(message: impl Into<String>) -> Self {
        Self::new(TransportErrorKind::Protocol, message)
    }

    /// Connectivity-class failures that may succeed on another attempt.
    pub fn is_transient(&self) -> bool {
        matches!(
            self.kind,
            TransportErrorKind::ConnectionRefused
                | TransportErrorKind::Timeout
                | TransportErrorKind::NoRoute
                | TransportErrorKind::ConnectionReset
        )
    }
}

impl From<std::io::Error> for TransportError {
    fn from(err: std::io::Error) -> Self {
        let kind = match err.kind() {
            ErrorKind::ConnectionRefused => TransportErrorKind::ConnectionRefused,
            ErrorKind::TimedOut | ErrorKind::WouldBlock => TransportErrorKind::Timeout,
            ErrorKind::ConnectionReset
            | ErrorKind::ConnectionAborted
            | ErrorKind::BrokenPipe
            | ErrorKind::UnexpectedEof => TransportErrorKind::ConnectionReset,
            ErrorKind::NotConnected
            | ErrorKind::AddrNotAvailable
            | ErrorKind::HostUnreachable
            | ErrorKind::NetworkUnreachable => TransportErrorKind::NoRoute,
            ErrorKind::InvalidData => TransportErrorKind::Protocol,
            _ => TransportErrorKind::Other,
        };
        TransportError::new(kind, err.to_string())
    }
}

/// Transport failure surfaced to the caller once retries are exhausted.
#[derive(Debug, Clone, Error)]
#[error("remote call to '{target}' failed after {attempts} attempt(s): {source}")]
pub struct InvocationTransportError {
    pub target: String,
    pub attempts: u32,
    #[source]
    pub source: TransportError,
}

#[derive(Debug, Clone, Error)]
pub enum RemoteError {
    #[error(transparent)]
    Transport(#[from] InvocationTransportError),

    #[error("Remote application error: {0}")]
    Application(#[from] ApplicationError),

    #[error("Remote {0}")]
    Dispatch(#[from] DispatchError),

    #[error("Codec error in '{context}': {message}")]
    Codec { context: String, message: String },

    #[error("Remote stream interrupted: {0}")]
    StreamInterrupted(TransportError),

    #[error("Unexpected response from '{target}': {message}")]
    Protocol { target: String, message: String },
}

impl RemoteError {
    pub fn codec(context: impl Into<String>, err: impl fmt::Display) -> Self {
        RemoteError::Codec {
            context: context.into(),
            message: err.to_string(),
        }
    }

    pub fn application(&self) -> Option<&ApplicationError> {
        match self {
            RemoteError::Application(e) => Some(e),
            _ => None,
        }
    }

    pub fn is_transport(&self) -> bool {
        matches!(self, RemoteError::Transport(_) | RemoteError::StreamInterrupted(_))
    }
}
