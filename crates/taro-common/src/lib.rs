//! Taro Common - Shared types and utilities
//!
//! This crate provides the foundational types used across all Taro components:
//! - Error types and error codes
//! - Identifier validation
//! - Content fingerprints
//! - Common constants

pub mod error;
pub mod utils;

// Re-exports for convenience
pub use error::{ErrorCode, TaroError};
pub use utils::{is_valid, md5_hex};

/// Default namespace ID used when no namespace is specified
pub const DEFAULT_NAMESPACE_ID: &str = "public";

/// Default group name
pub const DEFAULT_GROUP: &str = "DEFAULT_GROUP";

/// Check whether a tenant value refers to the default/public namespace
///
/// An empty tenant and the literal default namespace ID are equivalent.
pub fn is_default_namespace(tenant: &str) -> bool {
    tenant.is_empty() || tenant == DEFAULT_NAMESPACE_ID
}
