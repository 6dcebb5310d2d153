use thiserror::Error;

/// Failures while turning a definition into a registered instance: unknown
/// names, bad arguments and rejected field links.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WiringError {
    #[error("Service '{service}' uses unknown type '{type_name}'")]
    UnknownType { service: String, type_name: String },

    #[error("Service '{service}' uses unknown listener '{listener}'")]
    UnknownListener { service: String, listener: String },

    #[error("Service '{service}' needs a proxy for unknown interface '{interface}'")]
    UnknownInterface { service: String, interface: String },

    #[error("Service '{service}' uses unsupported transport scheme '{scheme}'")]
    UnknownTransport { service: String, scheme: String },

    #[error("Remote service '{service}' cannot declare field links")]
    FieldsOnRemote { service: String },

    #[error("Service '{service}': missing argument '{parameter}' (expected {expected})")]
    MissingArgument {
        service: String,
        parameter: String,
        expected: &'static str,
    },

    #[error("Service '{service}': argument '{parameter}' expected {expected}, found {found}")]
    ArgumentType {
        service: String,
        parameter: String,
        expected: &'static str,
        found: String,
    },

    #[error("type {type_name}, field {field}: not found (service '{service}')")]
    FieldNotFound {
        service: String,
        type_name: String,
        field: String,
    },

    #[error("type {type_name}, field {field}: expected {expected}, found {found} (service '{service}')")]
    FieldType {
        service: String,
        type_name: String,
        field: String,
        expected: &'static str,
        found: String,
    },

    #[error("type {type_name}, field {field}: already linked (service '{service}')")]
    FieldAlreadyLinked {
        service: String,
        type_name: String,
        field: String,
    },

    #[error("Service '{service}' references '{target}', which is not registered")]
    UnresolvedReference { service: String, target: String },

    #[error("No instance was produced for service '{service}'")]
    NoInstance { service: String },

    #[error("Service '{0}' is already registered")]
    AlreadyRegistered(String),
}
