use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use futures::StreamExt;
use log::{debug, warn};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value as JsonValue;

use crate::remote::error::{InvocationTransportError, RemoteError, TransportError, TransportErrorKind};
use crate::remote::location::RemoteLocation;
use crate::remote::stream::RemoteStream;
use crate::remote::transport::{FrameStream, Transport};
use crate::remote::wire::{Request, ResponseFrame};

/// Calls into one remote service. Proxy adapters wrap a client and expose the
/// service's interface on top of it.
///
/// Two clients compare equal when they point at the same remote location.
#[derive(Clone)]
pub struct RemoteClient {
    location: RemoteLocation,
    transport: Arc<dyn Transport>,
}

impl RemoteClient {
    pub fn new(location: RemoteLocation, transport: Arc<dyn Transport>) -> Self {
        Self { location, transport }
    }

    pub fn location(&self) -> &RemoteLocation {
        &self.location
    }

    /// Call a method and decode its single return value.
    ///
    /// `args` is serialized to JSON: a tuple or sequence becomes the argument
    /// list, `()` means no arguments, anything else is a single argument.
    pub async fn invoke<A, T>(&self, method: &str, args: &A) -> Result<T, RemoteError>
    where
        A: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let request = Request::invoke(&self.location.service, method, encode_args(method, args)?);
        let (first, _rest) = self.exchange(&request).await?;
        match first {
            ResponseFrame::Value { value } => {
                serde_json::from_value(value).map_err(|e| RemoteError::codec(format!("{} result", method), e))
            }
            frame => Err(self.unexpected(frame, "value")),
        }
    }

    /// Call a streaming method. Elements are pulled from the remote side as
    /// the returned stream is polled; dropping it closes the channel.
    pub async fn invoke_stream<A, T>(&self, method: &str, args: &A) -> Result<RemoteStream<T>, RemoteError>
    where
        A: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let request = Request::invoke(&self.location.service, method, encode_args(method, args)?);
        let (first, rest) = self.exchange(&request).await?;
        match first {
            ResponseFrame::StreamStart => Ok(RemoteStream::new(format!("{}.{}", self.location.service, method), rest)),
            frame => Err(self.unexpected(frame, "stream_start")),
        }
    }

    /// Check that the remote service exists and is remotable without running
    /// any of its methods.
    pub async fn probe(&self) -> Result<(), RemoteError> {
        let request = Request::probe(&self.location.service);
        let (first, _rest) = self.exchange(&request).await?;
        match first {
            ResponseFrame::Value { .. } => Ok(()),
            frame => Err(self.unexpected(frame, "value")),
        }
    }

    /// Run attempts until one yields a first frame. Only transient transport
    /// failures are retried; error frames are returned as-is.
    async fn exchange(&self, request: &Request) -> Result<(ResponseFrame, FrameStream), RemoteError> {
        let policy = &self.location.policy;
        let max_attempts = policy.max_attempts();
        let mut attempt = 0;
        let (first, rest) = loop {
            attempt += 1;
            match self.attempt(request).await {
                Ok(pair) => break pair,
                Err(err) if err.is_transient() && attempt < max_attempts => {
                    let delay = policy.backoff_for(attempt);
                    warn!(
                        "Attempt {}/{} to {} for '{}' failed ({}), retrying in {:?}",
                        attempt, max_attempts, self.location, request.method, err, delay
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(err) => {
                    return Err(InvocationTransportError {
                        target: self.location.to_string(),
                        attempts: attempt,
                        source: err,
                    }
                    .into());
                }
            }
        };
        debug!("{} '{}' answered with {}", self.location, request.method, first.label());
        match first {
            ResponseFrame::ApplicationError { error } => Err(RemoteError::Application(error)),
            ResponseFrame::DispatchError { error } => Err(RemoteError::Dispatch(error)),
            frame => Ok((frame, rest)),
        }
    }

    async fn attempt(&self, request: &Request) -> Result<(ResponseFrame, FrameStream), TransportError> {
        let timeout = self.location.policy.timeout;
        let exchange = async {
            let mut frames = self.transport.open(&self.location, request.clone()).await?;
            match frames.next().await {
                Some(Ok(frame)) => Ok((frame, frames)),
                Some(Err(err)) => Err(err),
                None => Err(TransportError::new(
                    TransportErrorKind::ConnectionReset,
                    "channel closed before a response arrived",
                )),
            }
        };
        match tokio::time::timeout(timeout, exchange).await {
            Ok(result) => result,
            Err(_) => Err(TransportError::timeout(format!("no response within {:?}", timeout))),
        }
    }

    fn unexpected(&self, frame: ResponseFrame, expected: &str) -> RemoteError {
        RemoteError::Protocol {
            target: self.location.to_string(),
            message: format!("expected {} frame, got {}", expected, frame.label()),
        }
    }
}

fn encode_args<A: Serialize + ?Sized>(method: &str, args: &A) -> Result<Vec<JsonValue>, RemoteError> {
    let value = serde_json::to_value(args).map_err(|e| RemoteError::codec(format!("{} arguments", method), e))?;
    Ok(match value {
        JsonValue::Null => Vec::new(),
        JsonValue::Array(items) => items,
        single => vec![single],
    })
}

impl fmt::Debug for RemoteClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RemoteClient")
            .field("location", &self.location)
            .field("transport", &self.transport.scheme())
            .finish()
    }
}

impl fmt::Display for RemoteClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "remote {} ({})", self.location, self.location.interface)
    }
}

impl PartialEq for RemoteClient {
    fn eq(&self, other: &Self) -> bool {
        self.location == other.location
    }
}

impl Eq for RemoteClient {}

impl Hash for RemoteClient {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.location.hash(state);
    }
}
