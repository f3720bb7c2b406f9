// Export/import data models for config bundles

use std::{
    fmt::{Display, Formatter},
    str::FromStr,
};

use serde::{Deserialize, Serialize};

/// Manifest file name of the single-manifest bundle layout
pub const EXPORT_METADATA_FILE_NAME: &str = ".metadata.yml";

/// Bundle layout version
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ExportFormat {
    /// One `group/dataId.meta` sidecar per item
    V1,
    /// Single `.metadata.yml` manifest for the whole bundle
    #[default]
    V2,
}

/// Per-item metadata sidecar of the v1 bundle layout
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ConfigExportMetadata {
    pub data_id: String,
    pub group: String,
    pub namespace_id: String,
    #[serde(rename = "type")]
    pub content_type: String,
    pub app_name: String,
    pub desc: String,
    pub config_tags: String,
    pub md5: String,
    pub encrypted_data_key: String,
    pub create_time: i64,
    pub modify_time: i64,
}

/// One exported config: its metadata plus the raw content
#[derive(Clone, Debug, Default)]
pub struct ConfigExportItem {
    pub metadata: ConfigExportMetadata,
    pub content: String,
}

/// Whole-bundle manifest of the v2 layout
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ConfigMetadata {
    pub metadata: Vec<ConfigMetadataItem>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ConfigMetadataItem {
    pub data_id: String,
    pub group: String,
    pub desc: String,
    #[serde(rename = "type")]
    pub content_type: String,
    pub app_name: String,
}

/// Selects which configs an export covers: an explicit id list wins,
/// otherwise the optional filters narrow the tenant's full set
#[derive(Clone, Debug, Default)]
pub struct ExportSelector {
    pub tenant: String,
    pub ids: Option<Vec<i64>>,
    pub group: Option<String>,
    pub data_ids: Option<Vec<String>>,
    pub app_name: Option<String>,
}

/// One item of an import batch
#[derive(Clone, Debug, Default)]
pub struct ConfigImportItem {
    pub data_id: String,
    pub group: String,
    pub tenant: String,
    pub content: String,
    pub config_type: String,
    pub app_name: String,
    pub desc: String,
    pub config_tags: String,
    pub encrypted_data_key: String,
}

impl From<ConfigExportItem> for ConfigImportItem {
    fn from(value: ConfigExportItem) -> Self {
        Self {
            data_id: value.metadata.data_id,
            group: value.metadata.group,
            tenant: value.metadata.namespace_id,
            content: value.content,
            config_type: value.metadata.content_type,
            app_name: value.metadata.app_name,
            desc: value.metadata.desc,
            config_tags: value.metadata.config_tags,
            encrypted_data_key: value.metadata.encrypted_data_key,
        }
    }
}

/// One source config of a clone batch, with optional coordinate overrides
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ConfigCloneInfo {
    /// Backend-assigned id of the source config
    pub config_id: i64,
    /// Replaces the source data id when non-empty
    pub target_data_id: String,
    /// Replaces the source group when non-empty
    pub target_group_name: String,
}

/// Import operation result summary
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportResult {
    pub success_count: u32,
    pub skip_count: u32,
    pub fail_count: u32,
    pub skip_data: Vec<ImportSkipItem>,
    pub fail_data: Vec<ImportFailItem>,
}

/// Details of a failed import item
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportFailItem {
    pub data_id: String,
    pub group: String,
    pub reason: String,
}

/// Coordinate of an item skipped under the SKIP policy
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportSkipItem {
    pub data_id: String,
    pub group: String,
}

/// Import conflict resolution policy
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SameConfigPolicy {
    /// Any conflict fails the whole batch before anything is written
    #[default]
    Abort,
    /// Skip conflicting configs, continue with others
    Skip,
    /// Overwrite existing configs with imported data
    Overwrite,
}

impl Display for SameConfigPolicy {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            SameConfigPolicy::Abort => write!(f, "ABORT"),
            SameConfigPolicy::Skip => write!(f, "SKIP"),
            SameConfigPolicy::Overwrite => write!(f, "OVERWRITE"),
        }
    }
}

impl FromStr for SameConfigPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "ABORT" => Ok(SameConfigPolicy::Abort),
            "SKIP" => Ok(SameConfigPolicy::Skip),
            "OVERWRITE" => Ok(SameConfigPolicy::Overwrite),
            _ => Err(format!(
                "Invalid policy: {}. Valid values: ABORT, SKIP, OVERWRITE",
                s
            )),
        }
    }
}
