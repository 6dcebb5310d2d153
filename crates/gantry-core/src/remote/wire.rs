use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use crate::remote::error::{ApplicationError, DispatchError};

/// Method name plus arity; enough to route a call on the remote side.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MethodSignature {
    pub name: String,
    pub arity: usize,
}

impl MethodSignature {
    pub fn new(name: impl Into<String>, arity: usize) -> Self {
        Self {
            name: name.into(),
            arity,
        }
    }

    pub fn is(&self, name: &str, arity: usize) -> bool {
        self.name == name && self.arity == arity
    }
}

impl fmt::Display for MethodSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.name, self.arity)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CallKind {
    Invoke,
    /// Liveness check; never reaches business logic.
    Probe,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Request {
    pub target: String,
    pub method: MethodSignature,
    #[serde(default)]
    pub args: Vec<JsonValue>,
    pub kind: CallKind,
}

impl Request {
    pub fn invoke(target: impl Into<String>, method: &str, args: Vec<JsonValue>) -> Self {
        Self {
            target: target.into(),
            method: MethodSignature::new(method, args.len()),
            args,
            kind: CallKind::Invoke,
        }
    }

    pub fn probe(target: impl Into<String>) -> Self {
        Self {
            target: target.into(),
            method: MethodSignature::new("$probe", 0),
            args: Vec::new(),
            kind: CallKind::Probe,
        }
    }
}

/// One frame of a response. A plain call answers with exactly one terminal
/// frame; a streaming call answers `StreamStart`, any number of `Item`s and
/// then `End` (or an error frame).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "frame", rename_all = "snake_case")]
pub enum ResponseFrame {
    Value { value: JsonValue },
    StreamStart,
    Item { value: JsonValue },
    End,
    ApplicationError { error: ApplicationError },
    DispatchError { error: DispatchError },
}

impl ResponseFrame {
    pub fn label(&self) -> &'static str {
        match self {
            ResponseFrame::Value { .. } => "value",
            ResponseFrame::StreamStart => "stream_start",
            ResponseFrame::Item { .. } => "item",
            ResponseFrame::End => "end",
            ResponseFrame::ApplicationError { .. } => "application_error",
            ResponseFrame::DispatchError { .. } => "dispatch_error",
        }
    }

    /// True for the last frame of a response. Nothing follows it on the
    /// same connection until the next request.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, ResponseFrame::StreamStart | ResponseFrame::Item { .. })
    }
}
