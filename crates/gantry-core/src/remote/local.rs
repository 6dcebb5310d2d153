use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use log::debug;

use crate::remote::dispatcher::Dispatcher;
use crate::remote::error::TransportError;
use crate::remote::location::RemoteLocation;
use crate::remote::transport::{FrameStream, Transport};
use crate::remote::wire::Request;

pub const LOCAL_SCHEME: &str = "local";

/// In-process transport: `local://<node>` routes to the dispatcher bound
/// under `<node>`. Frames are pulled straight from the dispatcher, so
/// streaming stays lazy and dropping the stream stops the producer.
#[derive(Debug, Clone, Default)]
pub struct LocalTransport {
    nodes: Arc<RwLock<HashMap<String, Dispatcher>>>,
}

impl LocalTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn bind(&self, node: impl Into<String>, dispatcher: Dispatcher) {
        let node = node.into();
        debug!("Binding local node '{}'", node);
        self.nodes
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .insert(node, dispatcher);
    }

    pub fn unbind(&self, node: &str) -> bool {
        self.nodes
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .remove(node)
            .is_some()
    }

    fn dispatcher(&self, node: &str) -> Option<Dispatcher> {
        self.nodes
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .get(node)
            .cloned()
    }
}

#[async_trait]
impl Transport for LocalTransport {
    fn scheme(&self) -> &str {
        LOCAL_SCHEME
    }

    async fn open(&self, location: &RemoteLocation, request: Request) -> Result<FrameStream, TransportError> {
        let node = location.authority();
        let dispatcher = self
            .dispatcher(node)
            .ok_or_else(|| TransportError::refused(format!("no local node '{}'", node)))?;
        Ok(dispatcher.dispatch(request).await)
    }
}
