//! The configuration plane facade
//!
//! [`ConfigPlane`] owns the store handle, the change bus and the long-poll
//! tracker, and exposes the whole operation surface behind one injected
//! context object. Transport adapters hold a clone of the plane; nothing in
//! here lives in a global static.

use std::sync::Arc;

use tracing::info;

use taro_api::model::{ConfigListenContext, Page};
use taro_persistence::{MemoryStore, NamespaceInfo, PlaneStore};

use crate::listener::ListenerManager;
use crate::model::{
    ConfigAllInfo, ConfigBetaInfo, ConfigCloneInfo, ConfigHistoryInfo, ConfigInfo, ConfigKey,
    ConfigListenerInfo, ConfigPublishForm, ExportFormat, ExportSelector, ImportResult,
    SameConfigPolicy,
};
use crate::notify::{ChangeSubscription, ConfigChangeBus, ConfigChangeType};
use crate::service;
use crate::service::config::storage_tenant;
use crate::settings::PlaneSettings;

/// Shared configuration control plane
#[derive(Clone)]
pub struct ConfigPlane {
    pub settings: PlaneSettings,
    store: Arc<dyn PlaneStore>,
    bus: Arc<ConfigChangeBus>,
    listeners: Arc<ListenerManager>,
}

impl std::fmt::Debug for ConfigPlane {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConfigPlane")
            .field("settings", &self.settings)
            .field("store", &self.store.backend_name())
            .field("bus", &"<ConfigChangeBus>")
            .field("listeners", &"<ListenerManager>")
            .finish()
    }
}

impl ConfigPlane {
    /// Build a plane over the bundled in-memory backend
    pub fn new(settings: PlaneSettings) -> Self {
        Self::with_store(Arc::new(MemoryStore::new()), settings)
    }

    /// Build a plane over an injected storage backend
    pub fn with_store(store: Arc<dyn PlaneStore>, settings: PlaneSettings) -> Self {
        let bus = Arc::new(ConfigChangeBus::new(settings.notify_queue_size()));
        let listeners = Arc::new(ListenerManager::with_wait_bounds(
            settings.listen_min_timeout_ms(),
            settings.listen_timeout_ms(),
        ));
        Self {
            settings,
            store,
            bus,
            listeners,
        }
    }

    /// Start background machinery (the change bus)
    pub async fn start(&self) {
        self.bus.start().await;
        info!(
            backend = self.store.backend_name(),
            "config plane started"
        );
    }

    /// Stop background machinery; pending long-polls resolve empty
    pub async fn shutdown(&self) {
        self.bus.stop().await;
        info!("config plane stopped");
    }

    pub fn store(&self) -> &dyn PlaneStore {
        self.store.as_ref()
    }

    pub fn bus(&self) -> &ConfigChangeBus {
        &self.bus
    }

    pub fn listeners(&self) -> &ListenerManager {
        &self.listeners
    }

    // ========================================================================
    // Config Mutation
    // ========================================================================

    /// Publish a config, or a tagged variant when the form carries a tag.
    /// Returns true when the record was newly created.
    pub async fn publish(&self, form: &ConfigPublishForm) -> anyhow::Result<bool> {
        service::publish_config(
            self.store.as_ref(),
            &self.bus,
            form,
            self.settings.max_content(),
        )
        .await
    }

    /// Publish a beta (canary) record for the whitelisted client IPs
    pub async fn publish_beta(
        &self,
        form: &ConfigPublishForm,
        beta_ips: &str,
    ) -> anyhow::Result<bool> {
        service::publish_config_beta(
            self.store.as_ref(),
            &self.bus,
            form,
            beta_ips,
            self.settings.max_content(),
        )
        .await
    }

    /// Remove a beta record; idempotent on an absent beta
    pub async fn stop_beta(
        &self,
        data_id: &str,
        group: &str,
        tenant: &str,
        src_user: &str,
        src_ip: &str,
    ) -> anyhow::Result<bool> {
        service::stop_config_beta(
            self.store.as_ref(),
            &self.bus,
            data_id,
            group,
            tenant,
            src_user,
            src_ip,
        )
        .await
    }

    /// Delete a config or its tagged variant; idempotent on an absent key
    pub async fn delete(
        &self,
        data_id: &str,
        group: &str,
        tenant: &str,
        tag: &str,
        src_user: &str,
        src_ip: &str,
    ) -> anyhow::Result<bool> {
        service::delete_config(
            self.store.as_ref(),
            &self.bus,
            data_id,
            group,
            tenant,
            tag,
            src_user,
            src_ip,
        )
        .await
    }

    /// Delete configs by backend id; unknown ids are skipped
    pub async fn delete_batch(
        &self,
        ids: &[i64],
        src_user: &str,
        src_ip: &str,
    ) -> anyhow::Result<Vec<ConfigKey>> {
        service::delete_configs_by_ids(self.store.as_ref(), &self.bus, ids, src_user, src_ip).await
    }

    // ========================================================================
    // Config Read & Search
    // ========================================================================

    /// Read one config; a non-empty tag selects the tagged variant
    pub async fn get(
        &self,
        data_id: &str,
        group: &str,
        tenant: &str,
        tag: &str,
    ) -> anyhow::Result<Option<ConfigAllInfo>> {
        service::find_one(self.store.as_ref(), data_id, group, tenant, tag).await
    }

    /// Read the beta record for a coordinate
    pub async fn get_beta(
        &self,
        data_id: &str,
        group: &str,
        tenant: &str,
    ) -> anyhow::Result<Option<ConfigBetaInfo>> {
        service::find_beta(self.store.as_ref(), data_id, group, tenant).await
    }

    /// Paginated search; exact or fuzzy per the flag
    pub async fn search(
        &self,
        exact: bool,
        tenant: &str,
        data_id: &str,
        group: &str,
        app_name: &str,
        content: &str,
        config_tags: &str,
        types: &str,
        page_no: u64,
        page_size: u64,
    ) -> anyhow::Result<Page<ConfigInfo>> {
        service::search_config_page(
            self.store.as_ref(),
            exact,
            tenant,
            data_id,
            group,
            app_name,
            content,
            config_tags,
            types,
            page_no,
            page_size,
        )
        .await
    }

    // ========================================================================
    // Long Poll
    // ========================================================================

    /// Wait until any watched config changes or the wait expires; returns
    /// the changed keys (never content)
    pub async fn listen(
        &self,
        contexts: &[ConfigListenContext],
        max_wait_ms: i64,
        client_ip: &str,
    ) -> anyhow::Result<Vec<ConfigKey>> {
        let normalized: Vec<ConfigListenContext> = contexts
            .iter()
            .map(|ctx| {
                let mut ctx = ctx.clone();
                ctx.tenant = storage_tenant(&ctx.tenant).to_string();
                ctx.tag = ctx.tag.trim().to_string();
                ctx
            })
            .collect();

        self.listeners
            .poll_changes(
                self.store.as_ref(),
                &self.bus,
                &normalized,
                max_wait_ms,
                client_ip,
            )
            .await
    }

    /// Sampled view of who watches one config
    pub async fn sample_listeners(&self, key: &ConfigKey, windows: usize) -> ConfigListenerInfo {
        let key = ConfigKey::new(&key.data_id, &key.group, storage_tenant(&key.tenant));
        let windows = windows.clamp(1, self.settings.sample_windows_cap());
        ConfigListenerInfo {
            query_type: ConfigListenerInfo::QUERY_TYPE_CONFIG.to_string(),
            listeners_status: self.listeners.collect_listener_status(&key, windows).await,
        }
    }

    /// Sampled view of everything one client address watches
    pub async fn sample_listeners_by_ip(
        &self,
        client_ip: &str,
        windows: usize,
    ) -> ConfigListenerInfo {
        let windows = windows.clamp(1, self.settings.sample_windows_cap());
        ConfigListenerInfo {
            query_type: ConfigListenerInfo::QUERY_TYPE_IP.to_string(),
            listeners_status: self
                .listeners
                .collect_listener_status_by_ip(client_ip, windows)
                .await,
        }
    }

    // ========================================================================
    // Bulk Transfer
    // ========================================================================

    /// Export selected configs as a zip bundle
    pub async fn export(
        &self,
        selector: &ExportSelector,
        format: ExportFormat,
    ) -> anyhow::Result<Vec<u8>> {
        service::export_configs(self.store.as_ref(), selector, format).await
    }

    /// Import a zip bundle into a namespace under a conflict policy
    pub async fn import(
        &self,
        data: &[u8],
        target_tenant: &str,
        policy: SameConfigPolicy,
        src_user: &str,
        src_ip: &str,
    ) -> anyhow::Result<ImportResult> {
        service::import_configs(
            self.store.as_ref(),
            &self.bus,
            data,
            target_tenant,
            policy,
            src_user,
            src_ip,
            self.settings.max_content(),
        )
        .await
    }

    /// Clone configs by id into a namespace, with per-item renames
    pub async fn clone_configs(
        &self,
        items: &[ConfigCloneInfo],
        target_tenant: &str,
        policy: SameConfigPolicy,
        src_user: &str,
        src_ip: &str,
    ) -> anyhow::Result<ImportResult> {
        service::clone_configs(
            self.store.as_ref(),
            &self.bus,
            items,
            target_tenant,
            policy,
            src_user,
            src_ip,
            self.settings.max_content(),
        )
        .await
    }

    // ========================================================================
    // History
    // ========================================================================

    /// Paginated change history for one coordinate, newest first
    pub async fn history_page(
        &self,
        data_id: &str,
        group: &str,
        tenant: &str,
        page_no: u64,
        page_size: u64,
    ) -> anyhow::Result<Page<ConfigHistoryInfo>> {
        service::find_history_page(self.store.as_ref(), data_id, group, tenant, page_no, page_size)
            .await
    }

    /// One history row by id
    pub async fn history_get(&self, id: u64) -> anyhow::Result<Option<ConfigHistoryInfo>> {
        service::find_history_one(self.store.as_ref(), id).await
    }

    // ========================================================================
    // Namespaces
    // ========================================================================

    /// All namespaces, the implicit public one first
    pub async fn namespace_list(&self) -> anyhow::Result<Vec<NamespaceInfo>> {
        service::find_all_namespaces(self.store.as_ref()).await
    }

    pub async fn namespace_get(&self, namespace_id: &str) -> anyhow::Result<Option<NamespaceInfo>> {
        service::find_namespace(self.store.as_ref(), namespace_id).await
    }

    /// Create a namespace; an empty id gets a generated UUID. Returns the
    /// effective id.
    pub async fn namespace_create(
        &self,
        namespace_id: &str,
        namespace_name: &str,
        namespace_desc: &str,
    ) -> anyhow::Result<String> {
        service::create_namespace(self.store.as_ref(), namespace_id, namespace_name, namespace_desc)
            .await
    }

    pub async fn namespace_update(
        &self,
        namespace_id: &str,
        namespace_name: &str,
        namespace_desc: &str,
    ) -> anyhow::Result<()> {
        service::update_namespace(self.store.as_ref(), namespace_id, namespace_name, namespace_desc)
            .await
    }

    pub async fn namespace_delete(&self, namespace_id: &str) -> anyhow::Result<bool> {
        service::delete_namespace(self.store.as_ref(), namespace_id).await
    }

    pub async fn namespace_exists(&self, namespace_id: &str) -> anyhow::Result<bool> {
        service::namespace_exists(self.store.as_ref(), namespace_id).await
    }

    // ========================================================================
    // Change Stream
    // ========================================================================

    /// Subscribe to the whole change stream
    pub fn subscribe(&self) -> ChangeSubscription {
        self.bus.subscribe()
    }

    /// Subscribe to one change kind only
    pub fn subscribe_to(&self, change_type: ConfigChangeType) -> ChangeSubscription {
        self.bus.subscribe_to(change_type)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_plane() -> ConfigPlane {
        let config = config::Config::builder()
            .set_override("taro.listen.minTimeoutMs", 10)
            .unwrap()
            .set_override("taro.listen.maxTimeoutMs", 100)
            .unwrap()
            .build()
            .unwrap();
        ConfigPlane::new(PlaneSettings { config })
    }

    #[tokio::test]
    async fn test_plane_wires_settings_into_tracker() {
        let plane = test_plane();
        plane.start().await;

        let form = ConfigPublishForm {
            data_id: "app.yaml".to_string(),
            group: "DEFAULT_GROUP".to_string(),
            content: "a: 1".to_string(),
            ..Default::default()
        };
        assert!(plane.publish(&form).await.unwrap());

        // A poll with fresh fingerprints waits, clamped to 100ms, then
        // resolves empty
        let md5 = plane
            .get("app.yaml", "DEFAULT_GROUP", "", "")
            .await
            .unwrap()
            .unwrap()
            .config_info
            .config_info_base
            .md5;
        let contexts = vec![ConfigListenContext::new(
            "app.yaml",
            "DEFAULT_GROUP",
            "public",
            &md5,
        )];
        let changed = plane.listen(&contexts, 5000, "10.0.0.1").await.unwrap();
        assert!(changed.is_empty());

        plane.shutdown().await;
    }

    #[tokio::test]
    async fn test_public_tenant_aliases_collapse() {
        let plane = test_plane();
        plane.start().await;

        let form = ConfigPublishForm {
            data_id: "app.yaml".to_string(),
            group: "DEFAULT_GROUP".to_string(),
            tenant: "public".to_string(),
            content: "a: 1".to_string(),
            ..Default::default()
        };
        plane.publish(&form).await.unwrap();

        // Readable through both spellings of the default namespace
        assert!(plane.get("app.yaml", "DEFAULT_GROUP", "", "").await.unwrap().is_some());
        assert!(
            plane
                .get("app.yaml", "DEFAULT_GROUP", "public", "")
                .await
                .unwrap()
                .is_some()
        );
    }

    #[test]
    fn test_debug_names_backend() {
        let plane = test_plane();
        let rendered = format!("{plane:?}");
        assert!(rendered.contains("memory"));
    }
}
