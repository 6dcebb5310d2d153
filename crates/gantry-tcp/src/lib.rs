//! # Gantry TCP transport
//!
//! Carries remote invocations between kernels over TCP. Every message is one
//! frame: a little-endian `u32` opcode, a little-endian `u32` payload length
//! and a UTF-8 JSON payload.
//!
//! [`TcpTransport`] is registered with a kernel for `tcp://host:port` URLs and
//! keeps idle connections pooled per address. [`TcpServer`] exposes a
//! kernel's [`Dispatcher`](gantry_core::Dispatcher) on a listening socket.
pub mod client;
pub mod error;
pub mod framing;
pub mod pool;
pub mod server;

pub use client::{TCP_SCHEME, TcpTransport};
pub use error::TcpError;
pub use framing::Opcode;
pub use pool::ConnectionPool;
pub use server::{ServerHandle, TcpServer};

#[cfg(test)]
mod tests;
