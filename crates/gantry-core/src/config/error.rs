//! # Gantry Configuration Errors
//!
//! Errors raised while reading module sources and turning the merged
//! configuration tree into typed module definitions.
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("I/O error during operation '{operation}' on path '{path}': {source}")]
    Io {
        path: PathBuf,
        operation: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Configuration file not found: {0}")]
    FileNotFound(PathBuf),

    #[error("Unsupported configuration format for path: {0}")]
    UnsupportedFormat(PathBuf),

    #[error("Deserialization from '{format}' failed for '{path}': {source}")]
    Deserialization {
        format: String,
        path: PathBuf,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync + 'static>,
    },

    #[error("Configuration source '{source_name}' must be a mapping of modules, found {found}")]
    NotAMapping { source_name: String, found: &'static str },

    #[error("Invalid value at '{path}': expected {expected}, found {found}")]
    InvalidValue {
        path: String,
        expected: &'static str,
        found: String,
    },

    #[error("Missing required key '{key}' at '{path}'")]
    MissingKey { path: String, key: &'static str },

    #[error("Service '{path}' declares neither 'type' nor 'remote'")]
    NoImplementation { path: String },

    #[error("Service '{path}' declares both 'type' and 'remote'")]
    AmbiguousImplementation { path: String },

    #[error("Duplicate qualified service name '{name}' declared by '{first}' and '{second}'")]
    DuplicateName {
        name: String,
        first: String,
        second: String,
    },
}

impl ConfigError {
    pub fn io(source: std::io::Error, operation: impl Into<String>, path: PathBuf) -> Self {
        ConfigError::Io {
            source,
            operation: operation.into(),
            path,
        }
    }

    pub(crate) fn invalid(path: impl Into<String>, expected: &'static str, found: impl ToString) -> Self {
        ConfigError::InvalidValue {
            path: path.into(),
            expected,
            found: found.to_string(),
        }
    }
}
