//! API model types and protocol constants
//!
//! Transport-agnostic building blocks shared by the engine and by any
//! transport adapter layered on top of it: pagination, listen contexts,
//! and the long-poll protocol constants.

use serde::{Deserialize, Serialize};

// Timeouts and intervals (milliseconds)
pub const CONFIG_LONG_POLL_TIMEOUT: i64 = 30000;
pub const MIN_CONFIG_LONG_POLL_TIMEOUT: i64 = 10000;

// Long-poll probe protocol
pub const PROBE_MODIFY_REQUEST: &str = "Listening-Configs";
pub const LINE_SEPARATOR: &str = "\u{1}";
pub const WORD_SEPARATOR: &str = "\u{2}";

/// Generic pagination wrapper for API responses
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Page<T> {
    pub total_count: u64,
    pub page_number: u64,
    pub pages_available: u64,
    pub page_items: Vec<T>,
}

impl<T> Default for Page<T> {
    fn default() -> Self {
        Self {
            total_count: 0,
            page_number: 1,
            pages_available: 0,
            page_items: vec![],
        }
    }
}

impl<T> Page<T> {
    pub fn new(total_count: u64, page_number: u64, page_size: u64, page_items: Vec<T>) -> Self {
        Self {
            total_count,
            page_number,
            pages_available: if page_size > 0 {
                (total_count as f64 / page_size as f64).ceil() as u64
            } else {
                0
            },
            page_items,
        }
    }

    pub fn empty() -> Self {
        Self::default()
    }
}

/// One entry of a long-poll registration: which config the client watches
/// and the fingerprint it last observed
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigListenContext {
    pub data_id: String,
    pub group: String,
    #[serde(default)]
    pub tenant: String,
    /// Optional secondary dimension selecting a tagged variant
    #[serde(default)]
    pub tag: String,
    pub md5: String,
}

impl ConfigListenContext {
    pub fn new(data_id: &str, group: &str, tenant: &str, md5: &str) -> Self {
        Self {
            data_id: data_id.to_string(),
            group: group.to_string(),
            tenant: tenant.to_string(),
            tag: String::new(),
            md5: md5.to_string(),
        }
    }
}
