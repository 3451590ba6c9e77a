//! WASM bindings for docs-core.
//!
//! Lets a browser tab drive a `Replica`. The page supplies storage callbacks
//! (usually `localforage`) and a `BroadcastChannel` post callback.
//!
//! ```text
//! TypeScript                         WASM (Rust)
//! ──────────                         ───────────
//! localforage ──callbacks──> JsStorageBridge ─┐
//! BroadcastChannel ─post───> JsChannelBridge ─┤
//!                                             ▼
//!                     Replica<JsStorageBridge, JsChannelBridge>
//!                                             │
//!                                             ▼
//!                                 WasmReplica (exposed to JS)
//! ```
//!
//! **Note**: This crate only compiles for `wasm32` targets. When building for native
//! targets (e.g., during `cargo check --workspace`), this crate provides no exports.

#[cfg(target_arch = "wasm32")]
mod channel_bridge;
#[cfg(target_arch = "wasm32")]
mod js_util;
#[cfg(target_arch = "wasm32")]
mod storage_bridge;

#[cfg(target_arch = "wasm32")]
pub use channel_bridge::JsChannelBridge;
#[cfg(target_arch = "wasm32")]
pub use storage_bridge::JsStorageBridge;

#[cfg(target_arch = "wasm32")]
mod wasm_impl {
    use super::*;
    use docs_core::{MergeOutcome, Replica, ReplicaConfig, ReplicaId};
    use std::cell::RefCell;
    use tracing_subscriber::layer::SubscriberExt;
    use wasm_bindgen::prelude::*;

    // ========== Callback Logger Layer ==========

    thread_local! {
        static LOGGER_CALLBACK: RefCell<Option<js_sys::Function>> = const { RefCell::new(None) };
    }

    /// A tracing layer that invokes a JavaScript callback for each log event.
    struct JsCallbackLayer;

    impl<S> tracing_subscriber::Layer<S> for JsCallbackLayer
    where
        S: tracing::Subscriber,
    {
        fn on_event(
            &self,
            event: &tracing::Event<'_>,
            _ctx: tracing_subscriber::layer::Context<'_, S>,
        ) {
            LOGGER_CALLBACK.with(|cb| {
                if let Some(callback) = cb.borrow().as_ref() {
                    let metadata = event.metadata();

                    let mut visitor = MessageVisitor::default();
                    event.record(&mut visitor);

                    let js_event = js_sys::Object::new();
                    let _ = js_sys::Reflect::set(
                        &js_event,
                        &"level".into(),
                        &metadata.level().as_str().into(),
                    );
                    let _ =
                        js_sys::Reflect::set(&js_event, &"target".into(), &metadata.target().into());
                    let _ = js_sys::Reflect::set(
                        &js_event,
                        &"message".into(),
                        &visitor.message.into(),
                    );
                    let _ = js_sys::Reflect::set(
                        &js_event,
                        &"timestamp".into(),
                        &docs_core::events::now_millis().into(),
                    );

                    let _ = callback.call1(&JsValue::NULL, &js_event);
                }
            });
        }
    }

    /// Collects the `message` field, appending any other fields as `name=value`.
    #[derive(Default)]
    struct MessageVisitor {
        message: String,
    }

    impl MessageVisitor {
        fn push_field(&mut self, name: &str, value: String) {
            if name == "message" {
                self.message.insert_str(0, &value);
            } else {
                if !self.message.is_empty() {
                    self.message.push(' ');
                }
                self.message.push_str(&format!("{}={}", name, value));
            }
        }
    }

    impl tracing::field::Visit for MessageVisitor {
        fn record_debug(&mut self, field: &tracing::field::Field, value: &dyn std::fmt::Debug) {
            self.push_field(field.name(), format!("{:?}", value));
        }

        fn record_str(&mut self, field: &tracing::field::Field, value: &str) {
            self.push_field(field.name(), value.to_string());
        }
    }

    fn console_layer() -> tracing_wasm::WASMLayer {
        tracing_wasm::WASMLayer::new(
            tracing_wasm::WASMLayerConfigBuilder::new()
                .set_max_level(tracing::Level::DEBUG)
                .build(),
        )
    }

    /// Initialize the WASM module (panic hook and tracing).
    ///
    /// - `init()` - console-only logging
    /// - `init({ logger: (event) => {...} })` - callback + console logging
    ///
    /// The logger callback receives events with: `{ level, target, message, timestamp }`
    #[wasm_bindgen]
    pub fn init(config: Option<js_sys::Object>) {
        console_error_panic_hook::set_once();

        let callback = config
            .as_ref()
            .and_then(|cfg| js_sys::Reflect::get(cfg, &"logger".into()).ok())
            .and_then(|v| v.dyn_into::<js_sys::Function>().ok());

        match callback {
            Some(cb) => {
                LOGGER_CALLBACK.with(|cell| *cell.borrow_mut() = Some(cb));
                let subscriber = tracing_subscriber::registry()
                    .with(JsCallbackLayer)
                    .with(console_layer());
                tracing::subscriber::set_global_default(subscriber).ok();
            }
            None => {
                let subscriber = tracing_subscriber::registry().with(console_layer());
                tracing::subscriber::set_global_default(subscriber).ok();
            }
        }

        tracing::info!("docs-wasm {} initialized", version());
    }

    #[wasm_bindgen]
    pub fn version() -> String {
        env!("CARGO_PKG_VERSION").to_string()
    }

    /// Generate a new random replica ID (16-character hex string).
    #[wasm_bindgen(js_name = generateReplicaId)]
    pub fn generate_replica_id() -> String {
        ReplicaId::generate().to_string()
    }

    /// Card title for a document body.
    #[wasm_bindgen(js_name = documentTitle)]
    pub fn document_title(text: &str, name: Option<String>) -> String {
        docs_core::summary::title(text, name.as_deref())
    }

    fn js_err(e: impl std::fmt::Display) -> JsError {
        JsError::new(&e.to_string())
    }

    // ========== WASM Subscription Handle ==========

    /// Call `dispose()` to unsubscribe, or let the JS garbage collector
    /// collect it (the Rust Drop will run via FinalizationRegistry).
    #[wasm_bindgen]
    pub struct WasmSubscription {
        inner: RefCell<Option<docs_core::Subscription>>,
    }

    #[wasm_bindgen]
    impl WasmSubscription {
        /// Unsubscribe from events. Safe to call multiple times.
        pub fn dispose(&self) {
            self.inner.borrow_mut().take();
        }
    }

    /// One browser tab's replica, exposed to TypeScript.
    #[wasm_bindgen]
    pub struct WasmReplica {
        inner: Replica<JsStorageBridge, JsChannelBridge>,
    }

    #[wasm_bindgen]
    impl WasmReplica {
        /// Open the replica for this tab.
        ///
        /// `config` is an optional `{ snapshotKey, commentsKey, userIdKey, announceOnOpen }`
        /// object; missing fields take their defaults. `replicaId` is generated when omitted.
        #[wasm_bindgen]
        pub async fn open(
            storage: JsStorageBridge,
            channel: JsChannelBridge,
            config: JsValue,
            replica_id: Option<String>,
        ) -> Result<WasmReplica, JsError> {
            let config: ReplicaConfig = if config.is_null() || config.is_undefined() {
                ReplicaConfig::default()
            } else {
                serde_wasm_bindgen::from_value(config)
                    .map_err(|e| JsError::new(&format!("Invalid config: {}", e)))?
            };

            let replica = match replica_id {
                Some(id) => id
                    .parse::<ReplicaId>()
                    .map_err(|e| JsError::new(&format!("Invalid replica ID: {}", e)))?,
                None => ReplicaId::generate(),
            };

            let inner = Replica::open_as(storage, channel, config, replica)
                .await
                .map_err(js_err)?;
            Ok(WasmReplica { inner })
        }

        #[wasm_bindgen(js_name = replicaId)]
        pub fn replica_id(&self) -> String {
            self.inner.replica_id().to_string()
        }

        /// `<userId>_<replicaId>`, as shown in the change log.
        pub fn author(&self) -> String {
            self.inner.author().to_string()
        }

        #[wasm_bindgen(js_name = userId)]
        pub fn user_id(&self) -> String {
            self.inner.author().user.to_string()
        }

        // ========== Documents ==========

        /// All documents as `{ id, text, done, userId }` objects, in list order.
        pub fn documents(&self) -> Result<JsValue, JsError> {
            serde_wasm_bindgen::to_value(&self.inner.documents()).map_err(js_err)
        }

        /// One document, or `null` if it does not exist.
        pub fn document(&self, id: &str) -> Result<JsValue, JsError> {
            match self.inner.document(id) {
                Some(doc) => serde_wasm_bindgen::to_value(&doc).map_err(js_err),
                None => Ok(JsValue::NULL),
            }
        }

        pub fn title(&self, id: &str) -> Option<String> {
            self.inner.title(id)
        }

        /// Returns the new document's ID.
        #[wasm_bindgen(js_name = addDocument)]
        pub async fn add_document(&self, text: &str) -> Result<String, JsError> {
            self.inner.add_document(text).await.map_err(js_err)
        }

        #[wasm_bindgen(js_name = updateDocument)]
        pub async fn update_document(&self, id: &str, text: &str) -> Result<bool, JsError> {
            self.inner.update_document(id, text).await.map_err(js_err)
        }

        #[wasm_bindgen(js_name = setDone)]
        pub async fn set_done(&self, id: &str, done: bool) -> Result<bool, JsError> {
            self.inner.set_done(id, done).await.map_err(js_err)
        }

        #[wasm_bindgen(js_name = deleteDocument)]
        pub async fn delete_document(&self, id: &str) -> Result<bool, JsError> {
            self.inner.delete_document(id).await.map_err(js_err)
        }

        // ========== Sync ==========

        /// Handle a message from the BroadcastChannel.
        ///
        /// Returns `"ignored"`, `"unchanged"`, `"merged"` or `"answered"`.
        /// Undecodable messages and unmergeable payloads are dropped with a
        /// warning and reported as `"ignored"`.
        pub async fn receive(&self, data: &[u8]) -> Result<String, JsError> {
            let outcome = self
                .inner
                .handle_message_lenient(data)
                .await
                .map_err(js_err)?;

            let name = match outcome {
                MergeOutcome::Ignored => "ignored",
                MergeOutcome::Unchanged => "unchanged",
                MergeOutcome::Merged => "merged",
                MergeOutcome::Answered => "answered",
            };
            Ok(name.to_string())
        }

        /// Ask other tabs for anything this one is missing.
        pub async fn announce(&self) -> Result<(), JsError> {
            self.inner.announce().await.map_err(js_err)
        }

        pub async fn persist(&self) -> Result<(), JsError> {
            self.inner.persist().await.map_err(js_err)
        }

        // ========== Review ==========

        /// Change log lines, oldest first.
        #[wasm_bindgen(js_name = changeLog)]
        pub fn change_log(&self) -> Vec<String> {
            self.inner
                .change_log()
                .iter()
                .map(ToString::to_string)
                .collect()
        }

        /// Change log lines for `id` that have not been accepted or rejected.
        #[wasm_bindgen(js_name = pendingChanges)]
        pub fn pending_changes(&self, id: &str) -> Vec<String> {
            self.inner
                .pending_changes(id)
                .iter()
                .map(ToString::to_string)
                .collect()
        }

        #[wasm_bindgen(js_name = acceptChanges)]
        pub fn accept_changes(&self, id: &str) -> Result<(), JsError> {
            self.inner.accept_changes(id).map_err(js_err)
        }

        #[wasm_bindgen(js_name = rejectChanges)]
        pub async fn reject_changes(&self, id: &str) -> Result<bool, JsError> {
            self.inner.reject_changes(id).await.map_err(js_err)
        }

        // ========== Comments ==========

        #[wasm_bindgen(js_name = addComment)]
        pub async fn add_comment(&self, id: &str, selection: &str, body: &str) -> Result<(), JsError> {
            self.inner
                .add_comment(id, selection, body)
                .await
                .map_err(js_err)
        }

        /// Comments on `id` as `{ docId, selection, body }` objects.
        pub fn comments(&self, id: &str) -> Result<JsValue, JsError> {
            serde_wasm_bindgen::to_value(&self.inner.comments_for(id)).map_err(js_err)
        }

        // ========== Events ==========

        /// Subscribe to store events. Returns a handle; call `dispose()` to unsubscribe.
        pub fn subscribe(&self, callback: js_sys::Function) -> WasmSubscription {
            let rust_closure = move |event: docs_core::StoreEvent| {
                if let Ok(js_event) = serde_wasm_bindgen::to_value(&event) {
                    let _ = callback.call1(&JsValue::NULL, &js_event);
                }
            };

            WasmSubscription {
                inner: RefCell::new(Some(self.inner.events().subscribe(rust_closure))),
            }
        }
    }
}

#[cfg(target_arch = "wasm32")]
pub use wasm_impl::*;
