//! # Gantry Remote Invocation
//!
//! Lets a service declared as `remote` in one kernel be called like a local
//! one. The caller side is a [`RemoteClient`] wrapped by a proxy adapter; the
//! serving side is a [`Dispatcher`] over the kernel registry. In between sits
//! a [`Transport`] chosen by URL scheme.
//!
//! ## Behaviour
//!
//! - Transient transport failures are retried up to `max_retries` times with
//!   exponential backoff, each attempt bounded by the policy timeout.
//! - Application and dispatch errors are returned after a single attempt.
//! - Streaming results are pulled lazily; dropping a [`RemoteStream`] closes
//!   the channel. Retries only apply until the first frame arrives.
pub mod client;
pub mod dispatcher;
pub mod endpoint;
pub mod error;
pub mod local;
pub mod location;
pub mod proxy;
pub mod stream;
pub mod transport;
pub mod wire;

pub use client::RemoteClient;
pub use dispatcher::Dispatcher;
pub use endpoint::{InvokeFault, RemoteEndpoint, Reply, decode_args};
pub use error::{
    ApplicationError, DispatchError, DispatchReason, InvocationTransportError, RemoteError, TransportError,
    TransportErrorKind,
};
pub use local::{LOCAL_SCHEME, LocalTransport};
pub use location::{InvocationPolicy, RemoteLocation};
pub use proxy::{ProxyFactory, ProxyRegistry, REMOTE_PROXY_LISTENER, RemoteProxyListener};
pub use stream::RemoteStream;
pub use transport::{FrameStream, Transport, TransportRegistry};
pub use wire::{CallKind, MethodSignature, Request, ResponseFrame};
