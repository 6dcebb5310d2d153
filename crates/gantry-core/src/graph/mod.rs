//! # Gantry Dependency Graph
//!
//! Builds the reference graph of the enabled services and derives a
//! deterministic start order from it. Missing or disabled references fail
//! immediately; cycles fail with every blocked service and the reason it is
//! blocked.
pub mod builder;
pub mod error;

pub use builder::{DependencyGraph, NodeState, ServiceNode};
pub use error::{BlockReason, BlockedService, GraphError};
