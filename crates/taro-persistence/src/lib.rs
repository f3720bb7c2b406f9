//! Taro Persistence - storage traits and backends
//!
//! This crate provides:
//! - Storage trait abstractions for config and namespace records
//! - Domain model types for storage operations
//! - An in-memory backend for standalone deployments and tests

pub mod memory;
pub mod model;
pub mod traits;

// Re-export storage traits
pub use traits::{ConfigSearchParam, ConfigStore, ConfigWriteParam, NamespaceStore, PlaneStore};

// Re-export the in-memory backend
pub use memory::MemoryStore;

// Re-export model types
pub use model::{
    ConfigBetaStorageData, ConfigHistoryStorageData, ConfigStorageData, NamespaceInfo,
};
