//! Configuration data models
//!
//! This module contains data structures for configuration management:
//! - Config forms for publish operations
//! - Config info structures for responses
//! - Config history tracking
//! - Export/import data models

pub mod config;
pub mod export;

pub use config::*;
pub use export::*;
