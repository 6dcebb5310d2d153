//! # Gantry Module Configuration
//!
//! Turns an ordered list of module sources into the typed [`ModuleSet`] the
//! kernel builds its dependency graph from.
//!
//! ## Key Components:
//!
//! - **[`value`]**: [`ConfigValue`], the format-independent tree, and the
//!   deep-merge rule (mappings merge key by key, everything else is replaced).
//! - **[`loader`]**: [`ModuleLoader`] and [`ConfigFormat`]; reads embedded
//!   trees and JSON/YAML/TOML files, merging them front to back.
//! - **[`module`]**: [`Module`] and [`ServiceDefinition`] parsing, profile
//!   gating and duplicate-name detection.
//! - **[`error`]**: [`ConfigError`].
pub mod error;
pub mod loader;
pub mod module;
pub mod value;

pub use error::ConfigError;
pub use loader::{ConfigFormat, ModuleLoader, ModuleSource};
pub use module::{Implementation, Module, ModuleSet, ServiceDefinition};
pub use value::{ConfigMap, ConfigValue, REFERENCE_KEY};
