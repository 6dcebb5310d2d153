use std::fmt;

use thiserror::Error;

/// Why a service could not be placed in the start order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BlockReason {
    /// Part of a reference cycle; the path starts and ends at the service.
    Cyclic { cycle: Vec<String> },
    /// Not in a cycle itself, but depends on services that are blocked.
    WaitingOn(Vec<String>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockedService {
    pub service: String,
    pub reason: BlockReason,
}

impl fmt::Display for BlockedService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.reason {
            BlockReason::Cyclic { cycle } => write!(f, "{} (cycle: {})", self.service, cycle.join(" -> ")),
            BlockReason::WaitingOn(deps) => write!(f, "{} (waiting on {})", self.service, deps.join(", ")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GraphError {
    #[error("Service '{service}' references '{target}', which is not declared")]
    MissingReference { service: String, target: String },

    #[error("Service '{service}' references '{target}', which is disabled")]
    DisabledReference { service: String, target: String },

    #[error("Service '{service}' is declared but is also a registered instance")]
    ExternalConflict { service: String },

    #[error("Unresolvable service dependencies: {}", format_blocked(.blocked))]
    Unresolvable { blocked: Vec<BlockedService> },
}

impl GraphError {
    /// Names of the services that could not be ordered.
    pub fn blocked_services(&self) -> Vec<&str> {
        match self {
            GraphError::Unresolvable { blocked } => blocked.iter().map(|b| b.service.as_str()).collect(),
            _ => Vec::new(),
        }
    }
}

fn format_blocked(blocked: &[BlockedService]) -> String {
    blocked.iter().map(ToString::to_string).collect::<Vec<_>>().join("; ")
}
