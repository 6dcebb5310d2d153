use std::sync::Arc;

use async_trait::async_trait;
use futures::StreamExt;
use gantry_core::remote::{FrameStream, RemoteLocation, Request, ResponseFrame, Transport, TransportError, TransportErrorKind};
use log::{debug, warn};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;

use crate::framing::{Opcode, read_message, write_frame};
use crate::pool::ConnectionPool;

pub const TCP_SCHEME: &str = "tcp";

/// Frames read ahead of the caller on a streaming response.
const FRAME_BUFFER: usize = 16;

type FrameSender = mpsc::Sender<Result<ResponseFrame, TransportError>>;

/// Client side of the TCP transport, registered for `tcp://host:port`.
///
/// Each call takes a pooled connection (or opens one), writes the request and
/// hands back a stream fed by a reader task. Dropping that stream before the
/// last frame closes the connection instead of returning it to the pool.
#[derive(Debug, Clone)]
pub struct TcpTransport {
    pool: Arc<ConnectionPool>,
}

impl TcpTransport {
    pub fn new() -> Self {
        Self::with_pool(Arc::new(ConnectionPool::default()))
    }

    pub fn with_pool(pool: Arc<ConnectionPool>) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &Arc<ConnectionPool> {
        &self.pool
    }

    /// Writes the request and waits for the first response frame. A pooled
    /// connection that fails before answering is stale; the request then goes
    /// out once more on a fresh connection.
    async fn exchange(&self, addr: &str, request: &Request) -> Result<(TcpStream, ResponseFrame), TransportError> {
        if let Some(stream) = self.pool.checkout(addr) {
            match first_frame(stream, addr, request).await {
                Ok(answered) => {
                    debug!("Reused pooled connection to {}", addr);
                    return Ok(answered);
                }
                Err(e) => debug!("Discarding stale connection to {}: {}", addr, e),
            }
        }
        debug!("Connecting to {}", addr);
        let stream = TcpStream::connect(addr).await?;
        stream.set_nodelay(true)?;
        first_frame(stream, addr, request).await
    }
}

async fn first_frame(
    mut stream: TcpStream,
    addr: &str,
    request: &Request,
) -> Result<(TcpStream, ResponseFrame), TransportError> {
    write_frame(&mut stream, Opcode::Request, request).await?;
    match read_message::<_, ResponseFrame>(&mut stream, Opcode::Response).await? {
        Some(frame) => Ok((stream, frame)),
        None => Err(closed_early(addr)),
    }
}

fn closed_early(addr: &str) -> TransportError {
    TransportError::new(
        TransportErrorKind::ConnectionReset,
        format!("{} closed the connection before the response ended", addr),
    )
}

impl Default for TcpTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Transport for TcpTransport {
    fn scheme(&self) -> &str {
        TCP_SCHEME
    }

    async fn open(&self, location: &RemoteLocation, request: Request) -> Result<FrameStream, TransportError> {
        let addr = location.authority().to_string();
        let (stream, first) = self.exchange(&addr, &request).await?;
        if first.is_terminal() {
            self.pool.checkin(&addr, stream);
            return Ok(futures::stream::once(async move { Ok(first) }).boxed());
        }
        let (tx, rx) = mpsc::channel(FRAME_BUFFER);
        tokio::spawn(read_response(stream, addr, self.pool.clone(), tx));
        Ok(futures::stream::once(async move { Ok(first) })
            .chain(ReceiverStream::new(rx))
            .boxed())
    }
}

/// Forwards the frames after the first until the terminal one, then parks the
/// connection in the pool. Stops early when the caller goes away.
async fn read_response(mut stream: TcpStream, addr: String, pool: Arc<ConnectionPool>, tx: FrameSender) {
    loop {
        let next = tokio::select! {
            _ = tx.closed() => {
                debug!("Response from {} abandoned, closing connection", addr);
                return;
            }
            next = read_message::<_, ResponseFrame>(&mut stream, Opcode::Response) => next,
        };
        match next {
            Ok(Some(frame)) if frame.is_terminal() => {
                pool.checkin(&addr, stream);
                let _ = tx.send(Ok(frame)).await;
                return;
            }
            Ok(Some(frame)) => {
                if tx.send(Ok(frame)).await.is_err() {
                    return;
                }
            }
            Ok(None) => {
                let _ = tx.send(Err(closed_early(&addr))).await;
                return;
            }
            Err(e) => {
                warn!("Reading response from {} failed: {}", addr, e);
                let _ = tx.send(Err(TransportError::from(e))).await;
                return;
            }
        }
    }
}
