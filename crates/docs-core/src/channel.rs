//! BroadcastChannel trait for same-origin messaging between replicas.
//!
//! Implementations:
//! - `LocalChannel` - In-process hub, for native front ends and tests
//! - `JsChannelBridge` (in docs-wasm) - Posts through the browser's BroadcastChannel
//!
//! Delivery follows the browser semantics: a message posted on a channel
//! reaches every other endpoint with the same name, never the sender.

use async_trait::async_trait;
use futures::StreamExt;
use futures::channel::mpsc::{self, TryRecvError, UnboundedReceiver, UnboundedSender};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ChannelError {
    #[error("Channel closed: {0}")]
    Closed(String),

    #[error("Post failed: {0}")]
    PostFailed(String),

    #[error("Receive failed: {0}")]
    ReceiveFailed(String),
}

pub type Result<T> = std::result::Result<T, ChannelError>;

/// A named same-origin channel endpoint.
#[cfg_attr(target_arch = "wasm32", async_trait(?Send))]
#[cfg_attr(not(target_arch = "wasm32"), async_trait)]
#[cfg(not(target_arch = "wasm32"))]
pub trait BroadcastChannel: Send + Sync {
    /// Channel name shared by all endpoints that talk to each other
    fn name(&self) -> &str;

    /// Post data to every other endpoint on this channel
    async fn post(&self, data: &[u8]) -> Result<()>;

    /// Receive the next message (waits until one is available)
    async fn recv(&self) -> Result<Vec<u8>>;

    /// Take a message if one is already queued
    fn try_recv(&self) -> Result<Option<Vec<u8>>>;
}

/// A named same-origin channel endpoint (WASM version without Send + Sync).
#[cfg_attr(target_arch = "wasm32", async_trait(?Send))]
#[cfg_attr(not(target_arch = "wasm32"), async_trait)]
#[cfg(target_arch = "wasm32")]
pub trait BroadcastChannel {
    /// Channel name shared by all endpoints that talk to each other
    fn name(&self) -> &str;

    /// Post data to every other endpoint on this channel
    async fn post(&self, data: &[u8]) -> Result<()>;

    /// Receive the next message (waits until one is available)
    async fn recv(&self) -> Result<Vec<u8>>;

    /// Take a message if one is already queued
    fn try_recv(&self) -> Result<Option<Vec<u8>>>;
}

#[derive(Default)]
struct HubState {
    next_endpoint: u64,
    channels: HashMap<String, Vec<(u64, UnboundedSender<Vec<u8>>)>>,
}

/// In-process stand-in for the browser's same-origin message bus.
///
/// Cloning the hub shares the same set of channels.
#[derive(Clone, Default)]
pub struct LocalHub {
    state: Arc<Mutex<HubState>>,
}

impl LocalHub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a new endpoint on the named channel.
    pub fn open(&self, name: &str) -> LocalChannel {
        let (tx, rx) = mpsc::unbounded();
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        let endpoint = state.next_endpoint;
        state.next_endpoint += 1;
        state
            .channels
            .entry(name.to_string())
            .or_default()
            .push((endpoint, tx));

        LocalChannel {
            hub: self.clone(),
            name: name.to_string(),
            endpoint,
            rx: futures::lock::Mutex::new(rx),
        }
    }

    /// Number of open endpoints on a channel.
    pub fn endpoint_count(&self, name: &str) -> usize {
        let state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        state.channels.get(name).map_or(0, Vec::len)
    }

    /// Deliver to every endpoint except `from`. Returns the number of recipients.
    fn deliver(&self, name: &str, from: u64, data: &[u8]) -> usize {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        let Some(endpoints) = state.channels.get_mut(name) else {
            return 0;
        };

        // Endpoints whose receiver is gone are pruned on the way
        endpoints.retain(|(_, tx)| !tx.is_closed());

        let mut delivered = 0;
        for (id, tx) in endpoints.iter() {
            if *id != from && tx.unbounded_send(data.to_vec()).is_ok() {
                delivered += 1;
            }
        }
        delivered
    }

    fn detach(&self, name: &str, endpoint: u64) {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(endpoints) = state.channels.get_mut(name) {
            endpoints.retain(|(id, _)| *id != endpoint);
            if endpoints.is_empty() {
                state.channels.remove(name);
            }
        }
    }
}

/// One endpoint on a `LocalHub` channel. Detaches on drop.
pub struct LocalChannel {
    hub: LocalHub,
    name: String,
    endpoint: u64,
    rx: futures::lock::Mutex<UnboundedReceiver<Vec<u8>>>,
}

impl Drop for LocalChannel {
    fn drop(&mut self) {
        self.hub.detach(&self.name, self.endpoint);
    }
}

#[cfg_attr(target_arch = "wasm32", async_trait(?Send))]
#[cfg_attr(not(target_arch = "wasm32"), async_trait)]
impl BroadcastChannel for LocalChannel {
    fn name(&self) -> &str {
        &self.name
    }

    async fn post(&self, data: &[u8]) -> Result<()> {
        let delivered = self.hub.deliver(&self.name, self.endpoint, data);
        tracing::trace!("Posted {} bytes on {} to {} endpoint(s)", data.len(), self.name, delivered);
        Ok(())
    }

    async fn recv(&self) -> Result<Vec<u8>> {
        let mut rx = self.rx.lock().await;
        rx.next()
            .await
            .ok_or_else(|| ChannelError::Closed(self.name.clone()))
    }

    fn try_recv(&self) -> Result<Option<Vec<u8>>> {
        let Some(mut rx) = self.rx.try_lock() else {
            // A pending recv() holds the receiver; it will get the message
            return Ok(None);
        };
        match rx.try_recv() {
            Ok(data) => Ok(Some(data)),
            Err(TryRecvError::Empty) => Ok(None),
            Err(TryRecvError::Closed) => Err(ChannelError::Closed(self.name.clone())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_post_reaches_other_endpoints_only() {
        let hub = LocalHub::new();
        let a = hub.open("docs");
        let b = hub.open("docs");
        let c = hub.open("docs");

        a.post(b"hello").await.unwrap();

        assert_eq!(b.recv().await.unwrap(), b"hello");
        assert_eq!(c.try_recv().unwrap().unwrap(), b"hello");
        assert!(a.try_recv().unwrap().is_none());
    }

    #[tokio::test]
    async fn test_channels_are_isolated_by_name() {
        let hub = LocalHub::new();
        let a = hub.open("one");
        let b = hub.open("two");

        a.post(b"x").await.unwrap();
        assert!(b.try_recv().unwrap().is_none());
    }

    #[tokio::test]
    async fn test_drop_detaches_endpoint() {
        let hub = LocalHub::new();
        let a = hub.open("docs");
        {
            let _b = hub.open("docs");
            assert_eq!(hub.endpoint_count("docs"), 2);
        }
        assert_eq!(hub.endpoint_count("docs"), 1);
        a.post(b"nobody listens").await.unwrap();
    }

    #[tokio::test]
    async fn test_messages_keep_order() {
        let hub = LocalHub::new();
        let a = hub.open("docs");
        let b = hub.open("docs");

        for i in 0u8..5 {
            a.post(&[i]).await.unwrap();
        }
        for i in 0u8..5 {
            assert_eq!(b.recv().await.unwrap(), vec![i]);
        }
    }
}
