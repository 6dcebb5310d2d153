use async_trait::async_trait;
use futures::stream::{BoxStream, Stream, StreamExt};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value as JsonValue;

use crate::remote::error::ApplicationError;
use crate::remote::wire::MethodSignature;

/// Server-side face of a remotable service.
///
/// A service becomes remotable by exporting `dyn RemoteEndpoint`; the
/// dispatcher finds it through that export and forwards calls to it.
#[async_trait]
pub trait RemoteEndpoint: Send + Sync {
    async fn invoke(&self, method: &MethodSignature, args: Vec<JsonValue>) -> Result<Reply, InvokeFault>;
}

/// Result of a successful dispatch.
pub enum Reply {
    Value(JsonValue),
    /// Elements are pulled lazily as the caller consumes them.
    Stream(BoxStream<'static, Result<JsonValue, ApplicationError>>),
}

impl Reply {
    pub fn value<T: Serialize + ?Sized>(value: &T) -> Result<Self, InvokeFault> {
        serde_json::to_value(value)
            .map(Reply::Value)
            .map_err(|e| InvokeFault::Application(ApplicationError::new("encode", e.to_string())))
    }

    pub fn unit() -> Self {
        Reply::Value(JsonValue::Null)
    }

    /// Wrap a stream of serializable elements.
    pub fn stream<S, T>(items: S) -> Self
    where
        S: Stream<Item = Result<T, ApplicationError>> + Send + 'static,
        T: Serialize,
    {
        Reply::Stream(
            items
                .map(|item| {
                    item.and_then(|value| {
                        serde_json::to_value(&value).map_err(|e| ApplicationError::new("encode", e.to_string()))
                    })
                })
                .boxed(),
        )
    }
}

impl std::fmt::Debug for Reply {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Reply::Value(v) => f.debug_tuple("Value").field(v).finish(),
            Reply::Stream(_) => f.write_str("Stream(..)"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum InvokeFault {
    /// The method ran and failed.
    Application(ApplicationError),
    UnknownMethod,
    BadArguments(String),
}

impl From<ApplicationError> for InvokeFault {
    fn from(err: ApplicationError) -> Self {
        InvokeFault::Application(err)
    }
}

/// Decode an argument list into a tuple, e.g. `let (name,): (String,) = decode_args(args)?`.
pub fn decode_args<T: DeserializeOwned>(args: Vec<JsonValue>) -> Result<T, InvokeFault> {
    serde_json::from_value(JsonValue::Array(args)).map_err(|e| InvokeFault::BadArguments(e.to_string()))
}
