use std::any::type_name;
use std::sync::Arc;

use crate::instantiator::error::WiringError;
use crate::kernel::component::ServiceInstance;

/// A resolved argument or field value: configuration scalars with every
/// `$ref` replaced by the registered instance it names.
#[derive(Debug, Clone)]
pub enum Arg {
    Null,
    Bool(bool),
    Integer(i64),
    Float(f64),
    String(String),
    List(Vec<Arg>),
    Map(Vec<(String, Arg)>),
    Service(ServiceInstance),
}

impl Arg {
    pub fn kind(&self) -> &'static str {
        match self {
            Arg::Null => "null",
            Arg::Bool(_) => "bool",
            Arg::Integer(_) => "integer",
            Arg::Float(_) => "float",
            Arg::String(_) => "string",
            Arg::List(_) => "sequence",
            Arg::Map(_) => "mapping",
            Arg::Service(_) => "service",
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Arg::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Arg::Integer(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Arg::Float(f) => Some(*f),
            Arg::Integer(i) => Some(*i as f64),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Arg::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Arg]> {
        match self {
            Arg::List(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_service(&self) -> Option<&ServiceInstance> {
        match self {
            Arg::Service(instance) => Some(instance),
            _ => None,
        }
    }

    /// The interface `I` exported by a referenced service.
    pub fn interface<I>(&self) -> Option<Arc<I>>
    where
        I: ?Sized + Send + Sync + 'static,
    {
        self.as_service().and_then(ServiceInstance::interface::<I>)
    }

    /// Like [`Arg::interface`], reporting a type mismatch for link targets.
    pub fn link_interface<I>(&self) -> Result<Arc<I>, LinkFault>
    where
        I: ?Sized + Send + Sync + 'static,
    {
        self.interface::<I>().ok_or_else(|| LinkFault::TypeMismatch {
            expected: type_name::<I>(),
            found: self.describe(),
        })
    }

    /// Kind plus, for services, the concrete type name.
    pub fn describe(&self) -> String {
        match self {
            Arg::Service(instance) => format!("service of type {}", instance.type_name()),
            other => other.kind().to_string(),
        }
    }
}

/// Why a service rejected a field link.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkFault {
    Unknown(String),
    TypeMismatch { expected: &'static str, found: String },
    /// The field only accepts one link and already has it.
    AlreadyLinked,
}

/// What a factory sees while constructing one service.
#[derive(Debug)]
pub struct FactoryContext<'a> {
    service: &'a str,
    args: &'a [(String, Arg)],
}

impl<'a> FactoryContext<'a> {
    pub fn new(service: &'a str, args: &'a [(String, Arg)]) -> Self {
        Self { service, args }
    }

    /// Qualified name of the service being built.
    pub fn name(&self) -> &str {
        self.service
    }

    pub fn arg(&self, key: &str) -> Option<&'a Arg> {
        self.args.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    pub fn args(&self) -> &'a [(String, Arg)] {
        self.args
    }

    pub fn require(&self, key: &str, expected: &'static str) -> Result<&'a Arg, WiringError> {
        self.arg(key).ok_or_else(|| WiringError::MissingArgument {
            service: self.service.to_string(),
            parameter: key.to_string(),
            expected,
        })
    }

    pub fn string(&self, key: &str) -> Result<String, WiringError> {
        let arg = self.require(key, "string")?;
        arg.as_str()
            .map(str::to_string)
            .ok_or_else(|| self.mismatch(key, "string", arg))
    }

    pub fn integer(&self, key: &str) -> Result<i64, WiringError> {
        let arg = self.require(key, "integer")?;
        arg.as_i64().ok_or_else(|| self.mismatch(key, "integer", arg))
    }

    pub fn bool_or(&self, key: &str, default: bool) -> Result<bool, WiringError> {
        match self.arg(key) {
            None => Ok(default),
            Some(arg) => arg.as_bool().ok_or_else(|| self.mismatch(key, "bool", arg)),
        }
    }

    pub fn integer_or(&self, key: &str, default: i64) -> Result<i64, WiringError> {
        match self.arg(key) {
            None => Ok(default),
            Some(arg) => arg.as_i64().ok_or_else(|| self.mismatch(key, "integer", arg)),
        }
    }

    pub fn string_or(&self, key: &str, default: &str) -> Result<String, WiringError> {
        match self.arg(key) {
            None => Ok(default.to_string()),
            Some(arg) => arg
                .as_str()
                .map(str::to_string)
                .ok_or_else(|| self.mismatch(key, "string", arg)),
        }
    }

    /// A referenced service, viewed through interface `I`.
    pub fn service<I>(&self, key: &str) -> Result<Arc<I>, WiringError>
    where
        I: ?Sized + Send + Sync + 'static,
    {
        let arg = self.require(key, type_name::<I>())?;
        arg.interface::<I>()
            .ok_or_else(|| self.mismatch(key, type_name::<I>(), arg))
    }

    fn mismatch(&self, key: &str, expected: &'static str, found: &Arg) -> WiringError {
        WiringError::ArgumentType {
            service: self.service.to_string(),
            parameter: key.to_string(),
            expected,
            found: found.describe(),
        }
    }
}
