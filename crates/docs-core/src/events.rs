//! Event infrastructure for docs-core.
//!
//! Provides `StoreEvent` for UI refresh and monitoring, and `EventBus` for subscriptions.
//! Platform-specific implementations handle thread safety:
//! - Native: `Arc<EventBus>` with `Mutex`
//! - WASM: `Rc<EventBus>` with `RefCell` for the single-threaded browser tab

use serde::Serialize;

/// Events emitted by a replica as its collection changes.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum StoreEvent {
    /// A document was created on this replica.
    DocumentAdded {
        id: String,
        /// Milliseconds since Unix epoch.
        timestamp: f64,
    },
    /// A document's body or flag changed on this replica.
    DocumentUpdated { id: String, timestamp: f64 },
    /// A document was removed on this replica.
    DocumentDeleted { id: String, timestamp: f64 },
    /// Remote state was merged and the local collection advanced.
    RemoteMerged {
        /// Replica the data came from (hex).
        origin: String,
        timestamp: f64,
    },
    /// A message was posted on the channel.
    MessageSent {
        #[serde(rename = "messageType")]
        message_type: String,
        size: usize,
        timestamp: f64,
    },
    /// A message arrived on the channel.
    MessageReceived {
        #[serde(rename = "messageType")]
        message_type: String,
        size: usize,
        timestamp: f64,
    },
}

/// Current time in milliseconds since Unix epoch (works on WASM).
pub fn now_millis() -> f64 {
    web_time::SystemTime::now()
        .duration_since(web_time::UNIX_EPOCH)
        .map(|d| d.as_millis() as f64)
        .unwrap_or(0.0)
}

// ============================================================================
// Native (multi-threaded) implementation
// ============================================================================

#[cfg(not(target_arch = "wasm32"))]
mod platform {
    use super::*;
    use std::collections::BTreeMap;
    use std::sync::{Arc, Mutex, MutexGuard, Weak};

    /// Shared handle to an event bus.
    pub type SharedEventBus = Arc<EventBus>;

    type Listener = Arc<dyn Fn(StoreEvent) + Send + Sync>;

    #[derive(Default)]
    struct Listeners {
        next_id: u64,
        by_id: BTreeMap<u64, Listener>,
    }

    /// Removes its listener from the bus when dropped.
    pub struct Subscription {
        bus: Weak<EventBus>,
        id: u64,
    }

    impl Drop for Subscription {
        fn drop(&mut self) {
            if let Some(bus) = self.bus.upgrade() {
                bus.listeners().by_id.remove(&self.id);
            }
        }
    }

    /// Fan-out of store events to listeners, in subscription order.
    #[derive(Default)]
    pub struct EventBus {
        listeners: Mutex<Listeners>,
    }

    impl EventBus {
        pub fn new() -> Self {
            Self::default()
        }

        fn listeners(&self) -> MutexGuard<'_, Listeners> {
            self.listeners.lock().unwrap_or_else(|e| e.into_inner())
        }

        pub fn subscribe(
            self: &Arc<Self>,
            callback: impl Fn(StoreEvent) + Send + Sync + 'static,
        ) -> Subscription {
            let mut listeners = self.listeners();
            let id = listeners.next_id;
            listeners.next_id += 1;
            listeners.by_id.insert(id, Arc::new(callback));
            Subscription {
                bus: Arc::downgrade(self),
                id,
            }
        }

        /// Deliver `event` to every current listener.
        ///
        /// The lock is released before callbacks run, so a callback may
        /// subscribe or drop a subscription.
        pub fn emit(&self, event: StoreEvent) {
            let current: Vec<Listener> = self.listeners().by_id.values().cloned().collect();
            for listener in current {
                listener(event.clone());
            }
        }
    }
}

// ============================================================================
// WASM (single-threaded) implementation
// ============================================================================

#[cfg(target_arch = "wasm32")]
mod platform {
    use super::*;
    use std::cell::RefCell;
    use std::collections::BTreeMap;
    use std::rc::{Rc, Weak};

    /// Shared handle to an event bus.
    pub type SharedEventBus = Rc<EventBus>;

    type Listener = Rc<dyn Fn(StoreEvent)>;

    #[derive(Default)]
    struct Listeners {
        next_id: u64,
        by_id: BTreeMap<u64, Listener>,
    }

    /// Removes its listener from the bus when dropped.
    pub struct Subscription {
        bus: Weak<EventBus>,
        id: u64,
    }

    impl Drop for Subscription {
        fn drop(&mut self) {
            if let Some(bus) = self.bus.upgrade() {
                bus.listeners.borrow_mut().by_id.remove(&self.id);
            }
        }
    }

    /// Fan-out of store events to listeners, in subscription order.
    #[derive(Default)]
    pub struct EventBus {
        listeners: RefCell<Listeners>,
    }

    impl EventBus {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn subscribe(self: &Rc<Self>, callback: impl Fn(StoreEvent) + 'static) -> Subscription {
            let mut listeners = self.listeners.borrow_mut();
            let id = listeners.next_id;
            listeners.next_id += 1;
            listeners.by_id.insert(id, Rc::new(callback));
            Subscription {
                bus: Rc::downgrade(self),
                id,
            }
        }

        /// Deliver `event` to every current listener.
        pub fn emit(&self, event: StoreEvent) {
            let current: Vec<Listener> = self.listeners.borrow().by_id.values().cloned().collect();
            for listener in current {
                listener(event.clone());
            }
        }
    }
}

pub use platform::*;
