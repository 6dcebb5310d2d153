//! # Gantry Kernel
//!
//! The `kernel` module ties the other subsystems together: it loads module
//! definitions, orders them through the dependency graph, instantiates and
//! starts each service, and tears everything down in reverse.
//!
//! ## Key Responsibilities & Components:
//!
//! - **Lifecycle**: [`Kernel`](bootstrap::Kernel) and its
//!   [`KernelBuilder`](bootstrap::KernelBuilder) in the `bootstrap` submodule.
//!   Startup is all-or-nothing; shutdown continues past failures.
//! - **Services**: the [`Service`](component::Service) trait and
//!   [`ServiceInstance`](component::ServiceInstance), which carries the
//!   interfaces a service exports.
//! - **Registry**: [`ServiceRegistry`](registry::ServiceRegistry), started
//!   services by qualified name, shared with remote dispatchers.
//! - **Core Constants**: system-wide names and defaults in `constants`.
//! - **Error Handling**: [`Error`](error::Error) and the `Result` alias.
pub mod bootstrap;
pub mod component;
pub mod constants;
pub mod error;
pub mod registry;

pub use bootstrap::{Kernel, KernelBuilder, KernelStatus, StopReport};
pub use component::{Service, ServiceInstance};
pub use error::{Error, KernelLifecyclePhase, Result, ServicePhase};
pub use registry::{ServiceRegistry, SharedRegistry};
