use std::io;

use thiserror::Error;

/// Failures of the serving side. Client failures surface as
/// [`TransportError`](gantry_core::remote::TransportError) instead.
#[derive(Debug, Error)]
pub enum TcpError {
    #[error("Failed to bind '{addr}': {source}")]
    Bind {
        addr: String,
        #[source]
        source: io::Error,
    },

    #[error("Protocol violation: {0}")]
    Protocol(String),

    #[error("Malformed request: {0}")]
    MalformedRequest(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl From<TcpError> for gantry_core::KernelError {
    fn from(err: TcpError) -> Self {
        gantry_core::KernelError::Other(err.to_string())
    }
}
