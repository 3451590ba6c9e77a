//! JavaScript storage bridge for WASM.
//!
//! Implements the `KeyValueStore` trait by calling JavaScript callback functions,
//! normally thin wrappers around `localforage`. Each callback is an async JS
//! function that returns a Promise, which we convert to a Rust Future.

use async_trait::async_trait;
use docs_core::KeyValueStore;
use docs_core::storage::{Result, StorageError};
use wasm_bindgen::prelude::*;

use crate::js_util::{call_js_async, js_error_message};

/// JavaScript storage bridge.
///
/// # Example (TypeScript side)
///
/// ```typescript
/// const storage = new JsStorageBridge(
///   (key) => localforage.getItem(key),
///   (key, value) => localforage.setItem(key, value),
///   (key) => localforage.removeItem(key),
///   () => localforage.keys(),
///   () => localforage.clear(),
/// );
/// ```
#[wasm_bindgen]
pub struct JsStorageBridge {
    get_fn: js_sys::Function,
    set_fn: js_sys::Function,
    remove_fn: js_sys::Function,
    keys_fn: js_sys::Function,
    clear_fn: js_sys::Function,
}

#[wasm_bindgen]
impl JsStorageBridge {
    /// Create a new storage bridge. All callbacks should return Promises.
    #[wasm_bindgen(constructor)]
    pub fn new(
        get_fn: js_sys::Function,
        set_fn: js_sys::Function,
        remove_fn: js_sys::Function,
        keys_fn: js_sys::Function,
        clear_fn: js_sys::Function,
    ) -> Self {
        Self {
            get_fn,
            set_fn,
            remove_fn,
            keys_fn,
            clear_fn,
        }
    }
}

fn js_err_to_storage_err(err: JsValue) -> StorageError {
    let msg = js_error_message(&err);
    // localforage reports a missing driver as "No available storage method found."
    if msg.contains("No available storage") || msg.contains("QuotaExceeded") {
        StorageError::Unavailable(msg)
    } else {
        StorageError::Io(msg)
    }
}

#[async_trait(?Send)]
impl KeyValueStore for JsStorageBridge {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let result = call_js_async(&self.get_fn, &[key.into()])
            .await
            .map_err(js_err_to_storage_err)?;

        if result.is_null() || result.is_undefined() {
            return Ok(None);
        }
        // The user id is stored as a plain string by older pages
        if let Some(s) = result.as_string() {
            return Ok(Some(s.into_bytes()));
        }
        Ok(Some(js_sys::Uint8Array::new(&result).to_vec()))
    }

    async fn set(&self, key: &str, value: &[u8]) -> Result<()> {
        if key.is_empty() {
            return Err(StorageError::InvalidKey("empty key".into()));
        }
        let js_array = js_sys::Uint8Array::from(value);
        call_js_async(&self.set_fn, &[key.into(), js_array.into()])
            .await
            .map_err(js_err_to_storage_err)?;
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<()> {
        call_js_async(&self.remove_fn, &[key.into()])
            .await
            .map_err(js_err_to_storage_err)?;
        Ok(())
    }

    async fn keys(&self) -> Result<Vec<String>> {
        let result = call_js_async(&self.keys_fn, &[])
            .await
            .map_err(js_err_to_storage_err)?;
        serde_wasm_bindgen::from_value(result)
            .map_err(|e| StorageError::Io(format!("Failed to parse keys result: {}", e)))
    }

    async fn clear(&self) -> Result<()> {
        call_js_async(&self.clear_fn, &[])
            .await
            .map_err(js_err_to_storage_err)?;
        Ok(())
    }
}
