//! Storage trait definitions
//!
//! Backends implement [`PlaneStore`], the umbrella over config and
//! namespace storage. The in-memory backend lives in [`crate::memory`];
//! other backends can be added without touching the service layer.

pub mod config;
pub mod namespace;

pub use config::{ConfigSearchParam, ConfigStore, ConfigWriteParam};
pub use namespace::NamespaceStore;

/// Umbrella trait for a complete storage backend
pub trait PlaneStore: ConfigStore + NamespaceStore {
    /// Short backend identifier for logs and diagnostics.
    fn backend_name(&self) -> &'static str;

    /// Cheap liveness probe.
    fn health_check(&self) -> bool {
        true
    }
}
