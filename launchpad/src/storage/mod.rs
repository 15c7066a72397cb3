//! Persistence: deployment/server store, settings and on-disk layout

pub mod json_store;
pub mod layout;
pub mod settings;
pub mod store;

pub use json_store::JsonFileStore;
pub use store::{MemoryStore, Store};
