//! Helpers shared by the JS bridges.

use wasm_bindgen::prelude::*;
use wasm_bindgen_futures::JsFuture;

/// Call a JS function and await its result.
///
/// Plain return values are accepted too: `Promise.resolve` wraps them.
pub async fn call_js_async(func: &js_sys::Function, args: &[JsValue]) -> Result<JsValue, JsValue> {
    let js_args = js_sys::Array::new();
    for arg in args {
        js_args.push(arg);
    }

    let value = func.apply(&JsValue::NULL, &js_args)?;
    JsFuture::from(js_sys::Promise::resolve(&value)).await
}

/// Best-effort message from a thrown JS value.
pub fn js_error_message(err: &JsValue) -> String {
    err.as_string()
        .or_else(|| {
            js_sys::Reflect::get(err, &"message".into())
                .ok()
                .and_then(|v| v.as_string())
        })
        .unwrap_or_else(|| format!("{:?}", err))
}
