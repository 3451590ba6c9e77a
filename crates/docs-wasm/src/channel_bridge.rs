//! JavaScript BroadcastChannel bridge for WASM.
//!
//! Outgoing messages go through a JS `post` callback. Incoming messages are
//! pushed by the page: its `onmessage` handler calls `WasmReplica.receive`,
//! so this bridge never has anything queued.

use async_trait::async_trait;
use docs_core::BroadcastChannel;
use docs_core::channel::{ChannelError, Result};
use wasm_bindgen::prelude::*;

use crate::js_util::{call_js_async, js_error_message};

/// # Example (TypeScript side)
///
/// ```typescript
/// const bc = new BroadcastChannel("docs");
/// const channel = new JsChannelBridge("docs", (data) => bc.postMessage(data));
/// const replica = await WasmReplica.open(storage, channel, {});
/// bc.onmessage = (e) => replica.receive(new Uint8Array(e.data));
/// ```
#[wasm_bindgen]
pub struct JsChannelBridge {
    name: String,
    post_fn: js_sys::Function,
}

#[wasm_bindgen]
impl JsChannelBridge {
    #[wasm_bindgen(constructor)]
    pub fn new(name: String, post_fn: js_sys::Function) -> Self {
        Self { name, post_fn }
    }
}

#[async_trait(?Send)]
impl BroadcastChannel for JsChannelBridge {
    fn name(&self) -> &str {
        &self.name
    }

    async fn post(&self, data: &[u8]) -> Result<()> {
        let js_array = js_sys::Uint8Array::from(data);
        call_js_async(&self.post_fn, &[js_array.into()])
            .await
            .map_err(|e| ChannelError::PostFailed(js_error_message(&e)))?;
        Ok(())
    }

    async fn recv(&self) -> Result<Vec<u8>> {
        Err(ChannelError::ReceiveFailed(
            "messages are delivered through WasmReplica.receive".into(),
        ))
    }

    fn try_recv(&self) -> Result<Option<Vec<u8>>> {
        Ok(None)
    }
}
