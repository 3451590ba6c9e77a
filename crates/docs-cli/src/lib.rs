//! docs-cli library: the store and commands behind the `docs` binary.
//!
//! Exposed as a library so integration tests can run commands directly.

pub mod commands;
pub mod dir_store;

pub use commands::{Command, execute};
pub use dir_store::DirStore;
