//! # Gantry Instantiator
//!
//! Everything between a [`ServiceDefinition`](crate::config::ServiceDefinition)
//! and a registered [`ServiceInstance`](crate::kernel::component::ServiceInstance):
//! factories by type name, reference resolution, field links and listeners.
//!
//! - **[`registry`]**: [`TypeRegistry`], factories keyed by type name.
//! - **[`args`]**: [`Arg`] values and the [`FactoryContext`] a factory reads them from.
//! - **[`resolve`]**: replaces `$ref` expressions with registered instances.
//! - **[`linker`]**: applies field bindings through a per-type [`FieldCache`].
//! - **[`listeners`]**: [`ServiceListener`] hooks run after construction.
pub mod args;
pub mod error;
pub mod linker;
pub mod listeners;
pub mod registry;
pub mod resolve;

pub use args::{Arg, FactoryContext, LinkFault};
pub use error::WiringError;
pub use linker::FieldCache;
pub use listeners::{ListenerRegistry, ServiceListener};
pub use registry::{Factory, TypeRegistry};
