use std::collections::HashMap;
use std::fmt::Debug;
use std::pin::Pin;
use std::sync::Arc;

use async_trait::async_trait;
use futures::Stream;

use crate::remote::error::TransportError;
use crate::remote::location::RemoteLocation;
use crate::remote::wire::{Request, ResponseFrame};

/// Response channel of one request. Dropping it closes the channel.
pub type FrameStream = Pin<Box<dyn Stream<Item = Result<ResponseFrame, TransportError>> + Send>>;

/// Moves requests to a remote kernel and hands back its response frames.
///
/// Implementations report connectivity problems as [`TransportError`]s; the
/// caller decides whether to retry.
#[async_trait]
pub trait Transport: Send + Sync + Debug {
    /// URL scheme this transport serves (`tcp`, `local`, ...).
    fn scheme(&self) -> &str;

    async fn open(&self, location: &RemoteLocation, request: Request) -> Result<FrameStream, TransportError>;
}

/// Transports keyed by URL scheme.
#[derive(Debug, Default, Clone)]
pub struct TransportRegistry {
    transports: HashMap<String, Arc<dyn Transport>>,
}

impl TransportRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a transport; a later registration for the same scheme wins.
    pub fn register(&mut self, transport: Arc<dyn Transport>) {
        self.transports.insert(transport.scheme().to_string(), transport);
    }

    pub fn get(&self, scheme: &str) -> Option<Arc<dyn Transport>> {
        self.transports.get(scheme).cloned()
    }

    pub fn schemes(&self) -> Vec<String> {
        let mut schemes: Vec<String> = self.transports.keys().cloned().collect();
        schemes.sort();
        schemes
    }
}
