//! Configuration service layer
//!
//! This module provides the store-facing operations behind the plane facade:
//! - Config CRUD, beta (canary) records and tagged variants
//! - Config history queries
//! - Namespace management
//! - Export/Import/Clone bulk transfer

pub mod config;
pub mod namespace;
pub mod transfer;

pub use config::*;
pub use namespace::*;
pub use transfer::*;
