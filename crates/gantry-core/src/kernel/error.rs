//! # Gantry Kernel Errors
//!
//! [`Error`] wraps the typed errors of every subsystem (configuration, graph,
//! wiring, remote invocation) and adds the failures of the kernel lifecycle
//! itself. Startup failures are reported with the service and phase they
//! happened in; the original cause stays reachable through `source()`.
use std::fmt;
use std::path::PathBuf;
use std::result::Result as StdResult;

use thiserror::Error as ThisError;

use crate::config::error::ConfigError;
use crate::graph::error::GraphError;
use crate::instantiator::error::WiringError;
use crate::remote::error::RemoteError;

#[derive(Debug, ThisError)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Dependency graph error: {0}")]
    Graph(#[from] GraphError),

    #[error("Wiring error: {0}")]
    Wiring(#[from] WiringError),

    #[error("Remote invocation error: {0}")]
    Remote(#[from] RemoteError),

    /// A single service failed while being brought up or taken down.
    #[error("Service '{service}' failed during {phase}: {source}")]
    ServiceLifecycle {
        service: String,
        phase: ServicePhase,
        #[source]
        source: Box<Error>,
    },

    /// Error occurring during a specific kernel lifecycle phase.
    #[error("Kernel lifecycle error during {phase}: {message}")]
    KernelLifecycleError { phase: KernelLifecyclePhase, message: String },

    #[error("I/O error during '{operation}' on '{}': {source}", path.display())]
    Io {
        #[source]
        source: std::io::Error,
        operation: String,
        path: PathBuf,
    },

    /// Generic error with message
    #[error("Error: {0}")]
    Other(String),
}

/// Phase of a single service's lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServicePhase {
    Construct,
    Link,
    Listen,
    Register,
    Start,
    Stop,
}

impl fmt::Display for ServicePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ServicePhase::Construct => "construction",
            ServicePhase::Link => "field linking",
            ServicePhase::Listen => "listener processing",
            ServicePhase::Register => "registration",
            ServicePhase::Start => "start",
            ServicePhase::Stop => "stop",
        };
        f.write_str(label)
    }
}

/// Represents a specific phase in the kernel's lifecycle.
#[derive(Debug, Clone, PartialEq, Eq, ThisError)]
pub enum KernelLifecyclePhase {
    #[error("Load")]
    Load,
    #[error("Register")]
    Register,
    #[error("Start")]
    Start,
    #[error("Shutdown")]
    Shutdown,
}

/// Shorthand for Result with our Error type
pub type Result<T> = StdResult<T, Error>;

impl Error {
    pub fn io(source: std::io::Error, operation: impl Into<String>, path: PathBuf) -> Self {
        Error::Io {
            source,
            operation: operation.into(),
            path,
        }
    }

    pub fn lifecycle(phase: KernelLifecyclePhase, message: impl Into<String>) -> Self {
        Error::KernelLifecycleError {
            phase,
            message: message.into(),
        }
    }

    pub(crate) fn in_service(self, service: &str, phase: ServicePhase) -> Self {
        Error::ServiceLifecycle {
            service: service.to_string(),
            phase,
            source: Box::new(self),
        }
    }

    /// The innermost error, skipping service-lifecycle wrappers.
    pub fn root(&self) -> &Error {
        match self {
            Error::ServiceLifecycle { source, .. } => source.root(),
            other => other,
        }
    }
}

impl From<&str> for Error {
    fn from(msg: &str) -> Self {
        Error::Other(msg.to_string())
    }
}

impl From<String> for Error {
    fn from(msg: String) -> Self {
        Error::Other(msg)
    }
}
