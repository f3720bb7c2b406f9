use async_trait::async_trait;

use taro_api::model::Page;

use crate::model::{ConfigBetaStorageData, ConfigHistoryStorageData, ConfigStorageData};

/// Parameters for a config write
///
/// `md5` is intentionally absent; backends recompute it from `content`.
#[derive(Clone, Debug, Default)]
pub struct ConfigWriteParam {
    pub data_id: String,
    pub group: String,
    pub tenant: String,
    pub content: String,
    pub app_name: String,
    pub config_type: String,
    pub desc: String,
    pub config_tags: String,
    pub encrypted_data_key: String,
    pub src_user: String,
    pub src_ip: String,
}

/// Filters for paginated config search
#[derive(Clone, Debug, Default)]
pub struct ConfigSearchParam {
    /// Exact match on all non-empty filters when true, substring/glob when false
    pub exact: bool,
    pub tenant: String,
    pub data_id: String,
    pub group: String,
    pub app_name: String,
    pub content: String,
    /// Comma-separated tag filter; a record matches only when it carries every tag
    pub config_tags: String,
    /// Comma-separated type filter, any-match
    pub types: String,
    pub page_no: u64,
    pub page_size: u64,
}

/// Config storage operations
#[async_trait]
pub trait ConfigStore: Send + Sync {
    /// Find a single config by its coordinate.
    async fn config_find(
        &self,
        data_id: &str,
        group: &str,
        tenant: &str,
    ) -> anyhow::Result<Option<ConfigStorageData>>;

    /// Find configs by backend-assigned ids. Unknown ids are skipped.
    async fn config_find_by_ids(&self, ids: &[i64]) -> anyhow::Result<Vec<ConfigStorageData>>;

    /// Find all configs in a tenant, ordered by (group, data_id).
    async fn config_find_all(&self, tenant: &str) -> anyhow::Result<Vec<ConfigStorageData>>;

    /// Find configs for export, narrowed by optional group, data id and app filters.
    async fn config_find_for_export(
        &self,
        tenant: &str,
        group: Option<&str>,
        data_ids: Option<&[String]>,
        app_name: Option<&str>,
    ) -> anyhow::Result<Vec<ConfigStorageData>>;

    /// Insert or update a config, recomputing md5 and writing a history row.
    ///
    /// Returns true when the record was newly created.
    async fn config_create_or_update(&self, param: &ConfigWriteParam) -> anyhow::Result<bool>;

    /// Delete a config and its beta record, writing a history row.
    ///
    /// Returns false when no record existed.
    async fn config_delete(
        &self,
        data_id: &str,
        group: &str,
        tenant: &str,
        src_user: &str,
        src_ip: &str,
    ) -> anyhow::Result<bool>;

    /// Delete configs by id, returning the records actually removed.
    /// Unknown ids are skipped.
    async fn config_batch_delete(
        &self,
        ids: &[i64],
        src_user: &str,
        src_ip: &str,
    ) -> anyhow::Result<Vec<ConfigStorageData>>;

    /// Paginated search over configs.
    async fn config_search_page(
        &self,
        param: &ConfigSearchParam,
    ) -> anyhow::Result<Page<ConfigStorageData>>;

    /// Number of configs in a tenant.
    async fn config_count(&self, tenant: &str) -> anyhow::Result<u64>;

    /// Find the beta record for a coordinate.
    async fn config_beta_find(
        &self,
        data_id: &str,
        group: &str,
        tenant: &str,
    ) -> anyhow::Result<Option<ConfigBetaStorageData>>;

    /// Insert or update a beta record, recomputing md5.
    ///
    /// Returns true when the beta record was newly created.
    async fn config_beta_create_or_update(
        &self,
        param: &ConfigWriteParam,
        beta_ips: &str,
    ) -> anyhow::Result<bool>;

    /// Remove the beta record for a coordinate.
    ///
    /// Returns false when no beta record existed.
    async fn config_beta_delete(
        &self,
        data_id: &str,
        group: &str,
        tenant: &str,
        src_user: &str,
        src_ip: &str,
    ) -> anyhow::Result<bool>;

    /// Find the tagged variant of a coordinate.
    async fn config_tag_find(
        &self,
        data_id: &str,
        group: &str,
        tenant: &str,
        tag: &str,
    ) -> anyhow::Result<Option<ConfigStorageData>>;

    /// Insert or update a tagged variant, recomputing md5 and writing a history row.
    ///
    /// Tagged variants never shadow the formal record; they live in their own
    /// table and are invisible to search and export.
    ///
    /// Returns true when the variant was newly created.
    async fn config_tag_create_or_update(
        &self,
        param: &ConfigWriteParam,
        tag: &str,
    ) -> anyhow::Result<bool>;

    /// Remove the tagged variant of a coordinate.
    ///
    /// Returns false when no variant existed.
    async fn config_tag_delete(
        &self,
        data_id: &str,
        group: &str,
        tenant: &str,
        tag: &str,
        src_user: &str,
        src_ip: &str,
    ) -> anyhow::Result<bool>;

    /// Paginated history for a coordinate, newest first.
    async fn config_history_page(
        &self,
        data_id: &str,
        group: &str,
        tenant: &str,
        page_no: u64,
        page_size: u64,
    ) -> anyhow::Result<Page<ConfigHistoryStorageData>>;

    /// Find a single history row by id.
    async fn config_history_find(
        &self,
        id: u64,
    ) -> anyhow::Result<Option<ConfigHistoryStorageData>>;
}
