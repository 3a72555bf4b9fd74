//! # Adapters Module
//!
//! Storage implementations and the resilient facade over them.

pub mod file_store;
pub mod memory_store;
pub mod resilient_storage;

pub use file_store::FileKeyValueStore;
pub use memory_store::InMemoryKeyValueStore;
pub use resilient_storage::{ResilientStorage, StorageKeys, STORAGE_LABEL};
