use std::fmt;
use std::marker::PhantomData;
use std::pin::Pin;
use std::task::{Context, Poll};

use futures::Stream;
use log::debug;
use serde::de::DeserializeOwned;

use crate::remote::error::{RemoteError, TransportError, TransportErrorKind};
use crate::remote::transport::FrameStream;
use crate::remote::wire::ResponseFrame;

/// Elements of a remote streaming call, decoded as they arrive.
///
/// The stream ends after the remote `End` frame. An error frame or a broken
/// channel yields one `Err` and then ends. Dropping the stream early closes
/// the underlying channel so the remote producer stops.
pub struct RemoteStream<T> {
    context: String,
    frames: Option<FrameStream>,
    _marker: PhantomData<fn() -> T>,
}

impl<T> RemoteStream<T> {
    pub(crate) fn new(context: String, frames: FrameStream) -> Self {
        Self {
            context,
            frames: Some(frames),
            _marker: PhantomData,
        }
    }

    pub fn is_finished(&self) -> bool {
        self.frames.is_none()
    }

    /// Close the channel without consuming the remaining elements.
    pub fn close(mut self) {
        if self.frames.take().is_some() {
            debug!("Closing remote stream {} early", self.context);
        }
    }

    fn finish(&mut self) {
        self.frames = None;
    }
}

impl<T: DeserializeOwned> Stream for RemoteStream<T> {
    type Item = Result<T, RemoteError>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = &mut *self;
        let Some(frames) = this.frames.as_mut() else {
            return Poll::Ready(None);
        };
        let polled = match frames.as_mut().poll_next(cx) {
            Poll::Pending => return Poll::Pending,
            Poll::Ready(polled) => polled,
        };
        let item = match polled {
            Some(Ok(ResponseFrame::Item { value })) => {
                return Poll::Ready(Some(
                    serde_json::from_value(value).map_err(|e| RemoteError::codec(this.context.clone(), e)),
                ));
            }
            Some(Ok(ResponseFrame::End)) => None,
            Some(Ok(ResponseFrame::ApplicationError { error })) => Some(Err(RemoteError::Application(error))),
            Some(Ok(ResponseFrame::DispatchError { error })) => Some(Err(RemoteError::Dispatch(error))),
            Some(Ok(other)) => Some(Err(RemoteError::Protocol {
                target: this.context.clone(),
                message: format!("unexpected {} frame inside a stream", other.label()),
            })),
            Some(Err(err)) => Some(Err(RemoteError::StreamInterrupted(err))),
            None => Some(Err(RemoteError::StreamInterrupted(TransportError::new(
                TransportErrorKind::ConnectionReset,
                "channel closed before the end of the stream",
            )))),
        };
        this.finish();
        Poll::Ready(item)
    }
}

impl<T> fmt::Debug for RemoteStream<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RemoteStream")
            .field("context", &self.context)
            .field("finished", &self.is_finished())
            .finish()
    }
}
