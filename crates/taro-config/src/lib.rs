//! Taro Config - Multi-tenant configuration control plane
//!
//! This crate provides:
//! - Atomic publish/delete for formal records, beta (canary) records and
//!   tagged variants, with full change history
//! - Long-poll change notification with race-free registration
//! - Bulk export/import/clone with ABORT/SKIP/OVERWRITE conflict policies
//! - Exact and fuzzy paginated search
//! - Namespace management over an implicit public namespace
//!
//! Everything hangs off [`ConfigPlane`], an injected context object owning
//! the store handle, the change bus and the long-poll tracker.

pub mod listener;
pub mod model;
pub mod notify;
pub mod plane;
pub mod service;
pub mod settings;

// Re-export the facade and its vocabulary
pub use model::*;
pub use notify::{ChangeSubscription, ConfigChangeBus, ConfigChangeEvent, ConfigChangeType};
pub use plane::ConfigPlane;
pub use settings::PlaneSettings;
