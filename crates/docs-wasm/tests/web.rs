//! Browser-side smoke tests. Run with `wasm-pack test --headless --firefox`.

#![cfg(target_arch = "wasm32")]

use wasm_bindgen_test::*;

wasm_bindgen_test_configure!(run_in_browser);

#[wasm_bindgen_test]
fn generated_replica_ids_are_hex() {
    let id = docs_wasm::generate_replica_id();
    assert_eq!(id.len(), 16);
    assert!(id.chars().all(|c| c.is_ascii_hexdigit()));
}

#[wasm_bindgen_test]
fn document_title_prefers_explicit_name() {
    assert_eq!(
        docs_wasm::document_title("<p>Groceries for the week</p>", None),
        "Groceries ..."
    );
    assert_eq!(
        docs_wasm::document_title("<p>anything</p>", Some("Named".into())),
        "Named"
    );
}
