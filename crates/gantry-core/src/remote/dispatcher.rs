use futures::stream::{self, StreamExt};
use log::{debug, warn};
use serde_json::Value as JsonValue;

use crate::kernel::registry::SharedRegistry;
use crate::remote::endpoint::{InvokeFault, RemoteEndpoint, Reply};
use crate::remote::error::{DispatchError, DispatchReason};
use crate::remote::transport::FrameStream;
use crate::remote::wire::{CallKind, Request, ResponseFrame};

/// Server side of remote invocation: resolves the target service in a
/// kernel's registry and turns its reply into response frames.
#[derive(Debug, Clone)]
pub struct Dispatcher {
    registry: SharedRegistry,
}

impl Dispatcher {
    pub fn new(registry: SharedRegistry) -> Self {
        Self { registry }
    }

    /// Always answers with frames; failures become error frames. Streaming
    /// replies are produced lazily as the returned stream is polled.
    pub async fn dispatch(&self, request: Request) -> FrameStream {
        let instance = self.registry.read().await.get(&request.target).cloned();
        let Some(instance) = instance else {
            return reject(DispatchReason::ServiceNotFound, format!("no service named '{}'", request.target));
        };
        let Some(endpoint) = instance.interface::<dyn RemoteEndpoint>() else {
            return reject(
                DispatchReason::NotRemotable,
                format!("service '{}' does not export a remote endpoint", request.target),
            );
        };
        if request.kind == CallKind::Probe {
            debug!("Probe for '{}' answered", request.target);
            return single(ResponseFrame::Value {
                value: JsonValue::Bool(true),
            });
        }

        debug!("Dispatching {} to '{}'", request.method, request.target);
        match endpoint.invoke(&request.method, request.args).await {
            Ok(Reply::Value(value)) => single(ResponseFrame::Value { value }),
            Ok(Reply::Stream(items)) => {
                let body = stream::unfold(Some(items), |state| async move {
                    let mut items = state?;
                    match items.next().await {
                        Some(Ok(value)) => Some((ResponseFrame::Item { value }, Some(items))),
                        Some(Err(error)) => Some((ResponseFrame::ApplicationError { error }, None)),
                        None => Some((ResponseFrame::End, None)),
                    }
                });
                stream::once(async { ResponseFrame::StreamStart })
                    .chain(body)
                    .map(Ok)
                    .boxed()
            }
            Err(InvokeFault::Application(error)) => {
                debug!("'{}' {} failed: {}", request.target, request.method, error);
                single(ResponseFrame::ApplicationError { error })
            }
            Err(InvokeFault::UnknownMethod) => reject(
                DispatchReason::UnknownMethod,
                format!("'{}' has no method {}", request.target, request.method),
            ),
            Err(InvokeFault::BadArguments(detail)) => reject(
                DispatchReason::BadArguments,
                format!("{} on '{}': {}", request.method, request.target, detail),
            ),
        }
    }
}

fn single(frame: ResponseFrame) -> FrameStream {
    stream::once(async move { Ok(frame) }).boxed()
}

fn reject(reason: DispatchReason, detail: String) -> FrameStream {
    warn!("Rejecting remote request: {}", detail);
    single(ResponseFrame::DispatchError {
        error: DispatchError::new(reason, detail),
    })
}
