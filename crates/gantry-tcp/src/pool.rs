use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use log::debug;
use tokio::net::TcpStream;

/// Idle connections per remote address. A connection is checked out for one
/// call and returned only when the call ended on a terminal frame.
#[derive(Debug)]
pub struct ConnectionPool {
    idle: Mutex<HashMap<String, Vec<TcpStream>>>,
    max_idle_per_addr: usize,
}

impl ConnectionPool {
    pub const DEFAULT_MAX_IDLE: usize = 8;

    pub fn new(max_idle_per_addr: usize) -> Self {
        Self {
            idle: Mutex::new(HashMap::new()),
            max_idle_per_addr,
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, Vec<TcpStream>>> {
        self.idle.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn checkout(&self, addr: &str) -> Option<TcpStream> {
        self.lock().get_mut(addr).and_then(Vec::pop)
    }

    /// Returns `stream` to the pool; dropped when the address is full.
    pub fn checkin(&self, addr: &str, stream: TcpStream) {
        let mut idle = self.lock();
        let slot = idle.entry(addr.to_string()).or_default();
        if slot.len() < self.max_idle_per_addr {
            slot.push(stream);
        } else {
            debug!("Pool for {} is full, closing connection", addr);
        }
    }

    pub fn idle_count(&self, addr: &str) -> usize {
        self.lock().get(addr).map_or(0, Vec::len)
    }

    pub fn clear(&self) {
        self.lock().clear();
    }
}

impl Default for ConnectionPool {
    fn default() -> Self {
        Self::new(Self::DEFAULT_MAX_IDLE)
    }
}
