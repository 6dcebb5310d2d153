use std::future::Future;
use std::io;
use std::net::SocketAddr;

use futures::StreamExt;
use gantry_core::remote::{Dispatcher, Request};
use log::{debug, info, warn};
use tokio::io::AsyncReadExt;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::oneshot;
use tokio::task::{JoinHandle, JoinSet};

use crate::error::TcpError;
use crate::framing::{Opcode, read_frame, write_frame};

/// Serves a kernel's [`Dispatcher`] over TCP. Requests on one connection are
/// handled one after the other; connections run concurrently.
#[derive(Debug)]
pub struct TcpServer {
    listener: TcpListener,
    dispatcher: Dispatcher,
}

impl TcpServer {
    pub async fn bind(addr: &str, dispatcher: Dispatcher) -> Result<Self, TcpError> {
        let listener = TcpListener::bind(addr).await.map_err(|source| TcpError::Bind {
            addr: addr.to_string(),
            source,
        })?;
        Ok(Self { listener, dispatcher })
    }

    pub fn local_addr(&self) -> Result<SocketAddr, TcpError> {
        Ok(self.listener.local_addr()?)
    }

    /// Accepts connections until `shutdown` resolves, then drops every open
    /// connection.
    pub async fn serve<F>(self, shutdown: F) -> Result<(), TcpError>
    where
        F: Future<Output = ()>,
    {
        let addr = self.local_addr()?;
        info!("Serving remote calls on {}", addr);
        tokio::pin!(shutdown);
        let mut connections = JoinSet::new();

        loop {
            tokio::select! {
                _ = &mut shutdown => break,
                accepted = self.listener.accept() => match accepted {
                    Ok((socket, peer)) => {
                        debug!("Accepted connection from {}", peer);
                        let dispatcher = self.dispatcher.clone();
                        connections.spawn(async move {
                            if let Err(e) = serve_connection(socket, dispatcher).await {
                                warn!("Connection from {} closed: {}", peer, e);
                            }
                        });
                    }
                    Err(e) => warn!("Accept on {} failed: {}", addr, e),
                },
                Some(_) = connections.join_next(), if !connections.is_empty() => {}
            }
        }

        connections.shutdown().await;
        info!("Server on {} stopped", addr);
        Ok(())
    }

    /// Runs the server on a background task. Dropping the handle stops it.
    pub fn spawn(self) -> Result<ServerHandle, TcpError> {
        let addr = self.local_addr()?;
        let (tx, rx) = oneshot::channel::<()>();
        let task = tokio::spawn(self.serve(async {
            let _ = rx.await;
        }));
        Ok(ServerHandle {
            addr,
            shutdown: Some(tx),
            task,
        })
    }
}

/// Handle to a spawned [`TcpServer`].
#[derive(Debug)]
pub struct ServerHandle {
    addr: SocketAddr,
    shutdown: Option<oneshot::Sender<()>>,
    task: JoinHandle<Result<(), TcpError>>,
}

impl ServerHandle {
    pub fn local_addr(&self) -> SocketAddr {
        self.addr
    }

    /// `tcp://` URL for remote definitions pointing at this server.
    pub fn url(&self) -> String {
        format!("tcp://{}", self.addr)
    }

    pub async fn shutdown(mut self) -> Result<(), TcpError> {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        match self.task.await {
            Ok(result) => result,
            Err(e) => Err(TcpError::Io(io::Error::other(e))),
        }
    }
}

async fn serve_connection(mut socket: TcpStream, dispatcher: Dispatcher) -> Result<(), TcpError> {
    socket.set_nodelay(true)?;
    let (mut reader, mut writer) = socket.split();
    let mut stray = [0u8; 1];

    loop {
        let Some((opcode, payload)) = read_frame(&mut reader).await? else {
            return Ok(());
        };
        if Opcode::from_u32(opcode) != Some(Opcode::Request) {
            return Err(TcpError::Protocol(format!("expected a request, got opcode {}", opcode)));
        }
        let request: Request = serde_json::from_slice(&payload)?;
        let mut frames = dispatcher.dispatch(request).await;

        loop {
            // The client stays silent until the response ends; a readable
            // socket here means it hung up or broke protocol.
            let next = tokio::select! {
                next = frames.next() => next,
                read = reader.read(&mut stray) => {
                    return match read {
                        Ok(0) => {
                            debug!("Client hung up mid-response");
                            Ok(())
                        }
                        Ok(_) => Err(TcpError::Protocol("data received while a response was in flight".into())),
                        Err(e) => Err(e.into()),
                    };
                }
            };
            let Some(frame) = next else { break };
            let frame = frame.map_err(|e| TcpError::Protocol(e.to_string()))?;
            if let Err(e) = write_frame(&mut writer, Opcode::Response, &frame).await {
                debug!("Client went away: {}", e);
                return Ok(());
            }
        }
    }
}
