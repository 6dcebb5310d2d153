//! Gantry: a dependency-injection service kernel.
//!
//! Services are declared in modules (embedded trees and JSON/YAML/TOML
//! files merged in order), wired by reference, started in dependency order
//! and may be backed by proxies to services living in another process.
pub mod config;
pub mod graph;
pub mod instantiator;
pub mod kernel;
pub mod remote;

// Re-export the types most embedding programs need.
pub use config::{ConfigValue, ModuleLoader, ModuleSet, ModuleSource, ServiceDefinition};
pub use graph::{DependencyGraph, NodeState};
pub use instantiator::{Arg, FactoryContext, ServiceListener, WiringError};
pub use kernel::error::Error as KernelError;
pub use kernel::{Kernel, KernelBuilder, Service, ServiceInstance, StopReport};
pub use remote::{Dispatcher, LocalTransport, RemoteClient, RemoteEndpoint, RemoteError, Reply, Transport};

#[cfg(test)]
mod tests;
