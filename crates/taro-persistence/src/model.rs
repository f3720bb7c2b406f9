//! Domain model types for the storage abstraction layer
//!
//! These types are used as return values from the storage traits,
//! decoupled from any specific backend.

use serde::{Deserialize, Serialize};

/// Config record as held by the store
///
/// `md5` is always computed by the backend from `content` on write;
/// callers never supply it.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ConfigStorageData {
    /// Opaque record identifier, assigned by the backend
    pub id: i64,
    pub data_id: String,
    pub group: String,
    pub tenant: String,
    pub content: String,
    pub md5: String,
    pub app_name: String,
    pub config_type: String,
    pub desc: String,
    pub config_tags: String,
    pub encrypted_data_key: String,
    pub src_user: String,
    pub src_ip: String,
    pub created_time: i64,
    pub modified_time: i64,
}

/// Beta (canary) record held alongside a config record
///
/// Visible only to the clients whitelisted by `beta_ips`; never consulted
/// by normal reads.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ConfigBetaStorageData {
    pub data_id: String,
    pub group: String,
    pub tenant: String,
    pub content: String,
    pub md5: String,
    pub app_name: String,
    /// Comma-separated client IP whitelist
    pub beta_ips: String,
    pub encrypted_data_key: String,
    pub src_user: String,
    pub src_ip: String,
    pub created_time: i64,
    pub modified_time: i64,
}

/// Audit snapshot written on every successful mutation
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ConfigHistoryStorageData {
    pub id: u64,
    pub data_id: String,
    pub group: String,
    pub tenant: String,
    pub content: String,
    pub md5: String,
    pub app_name: String,
    pub src_user: String,
    pub src_ip: String,
    /// "I" insert, "U" update, "D" delete
    pub op_type: String,
    /// "formal" for primary records, "gray" for beta records
    pub publish_type: String,
    /// Serialized metadata snapshot (desc, tags, type)
    pub ext_info: String,
    pub encrypted_data_key: String,
    pub created_time: i64,
    pub modified_time: i64,
}

/// Namespace information
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NamespaceInfo {
    pub namespace_id: String,
    pub namespace_name: String,
    pub namespace_desc: String,
    pub config_count: i32,
    pub quota: i32,
}
