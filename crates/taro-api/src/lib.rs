//! Taro API - Transport-agnostic API models
//!
//! This crate provides:
//! - Pagination wrapper shared by all paged queries
//! - Listen-context structures for long-poll registration
//! - Long-poll protocol constants and the legacy probe codec

pub mod model;
pub mod probe;

// Re-export commonly used types
pub use model::{ConfigListenContext, Page};
pub use probe::{parse_probe_string, serialize_probe_string};
