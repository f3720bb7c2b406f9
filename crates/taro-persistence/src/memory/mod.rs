//! In-memory storage backend
//!
//! Standalone single-process storage over concurrent hash maps. Records are
//! keyed by `tenant@@group@@data_id`, with a secondary index from the
//! backend-assigned integer id back to that key.
//!
//! Multi-step writes (existence check, record write, history row, id index)
//! are serialized per key through a small pool of sharded locks, so two
//! concurrent writers to the same coordinate never observe partial state and
//! exactly one of them sees the record as newly created.

use std::hash::{DefaultHasher, Hash, Hasher};
use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};

use async_trait::async_trait;
use dashmap::DashMap;
use md5::{Digest, Md5};
use parking_lot::Mutex;
use tracing::debug;

use taro_api::model::Page;

use crate::model::{
    ConfigBetaStorageData, ConfigHistoryStorageData, ConfigStorageData, NamespaceInfo,
};
use crate::traits::{ConfigSearchParam, ConfigStore, ConfigWriteParam, NamespaceStore, PlaneStore};

const KEY_LOCK_SHARDS: usize = 64;

/// Standalone in-memory storage
pub struct MemoryStore {
    configs: DashMap<String, ConfigStorageData>,
    betas: DashMap<String, ConfigBetaStorageData>,
    /// Tagged variants, keyed by `tenant@@group@@data_id@@tag`
    tagged: DashMap<String, ConfigStorageData>,
    histories: DashMap<u64, ConfigHistoryStorageData>,
    namespaces: DashMap<String, NamespaceInfo>,
    /// Secondary index: backend-assigned id -> storage key
    ids: DashMap<i64, String>,
    id_seq: AtomicI64,
    history_seq: AtomicU64,
    key_locks: Vec<Mutex<()>>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            configs: DashMap::new(),
            betas: DashMap::new(),
            tagged: DashMap::new(),
            histories: DashMap::new(),
            namespaces: DashMap::new(),
            ids: DashMap::new(),
            id_seq: AtomicI64::new(0),
            history_seq: AtomicU64::new(0),
            key_locks: (0..KEY_LOCK_SHARDS).map(|_| Mutex::new(())).collect(),
        }
    }

    /// Storage key for a config coordinate
    fn storage_key(data_id: &str, group: &str, tenant: &str) -> String {
        format!("{}@@{}@@{}", tenant, group, data_id)
    }

    /// Storage key for a tagged variant
    fn tag_storage_key(data_id: &str, group: &str, tenant: &str, tag: &str) -> String {
        format!("{}@@{}@@{}@@{}", tenant, group, data_id, tag)
    }

    /// Compute MD5 hash of content
    fn compute_md5(content: &str) -> String {
        format!("{:x}", Md5::digest(content.as_bytes()))
    }

    /// Pick the lock shard serializing writes for a storage key
    fn key_lock(&self, key: &str) -> &Mutex<()> {
        let mut hasher = DefaultHasher::new();
        key.hash(&mut hasher);
        let idx = (hasher.finish() as usize) % KEY_LOCK_SHARDS;
        &self.key_locks[idx]
    }

    fn next_id(&self) -> i64 {
        self.id_seq.fetch_add(1, Ordering::Relaxed) + 1
    }

    fn next_history_id(&self) -> u64 {
        self.history_seq.fetch_add(1, Ordering::Relaxed) + 1
    }

    /// Append a history row. `op_type` is "I", "U" or "D"; `publish_type`
    /// distinguishes "formal" records from "gray" (beta) records.
    #[allow(clippy::too_many_arguments)]
    fn record_history(
        &self,
        data: &ConfigStorageData,
        op_type: &str,
        publish_type: &str,
        src_user: &str,
        src_ip: &str,
    ) {
        let id = self.next_history_id();
        let now = chrono::Utc::now().timestamp_millis();
        let ext_info = serde_json::json!({
            "type": data.config_type,
            "desc": data.desc,
            "config_tags": data.config_tags,
        })
        .to_string();

        self.histories.insert(
            id,
            ConfigHistoryStorageData {
                id,
                data_id: data.data_id.clone(),
                group: data.group.clone(),
                tenant: data.tenant.clone(),
                content: data.content.clone(),
                md5: data.md5.clone(),
                app_name: data.app_name.clone(),
                src_user: src_user.to_string(),
                src_ip: src_ip.to_string(),
                op_type: op_type.to_string(),
                publish_type: publish_type.to_string(),
                ext_info,
                encrypted_data_key: data.encrypted_data_key.clone(),
                created_time: now,
                modified_time: now,
            },
        );
    }

    /// Match a search filter against a field value.
    ///
    /// Empty filters match everything. Exact mode compares literally; fuzzy
    /// mode treats `*` as a wildcard and otherwise falls back to substring
    /// containment, so every exact hit is also a fuzzy hit.
    fn field_matches(filter: &str, value: &str, exact: bool) -> bool {
        if filter.is_empty() {
            return true;
        }
        if exact {
            return filter == value;
        }
        if filter.contains('*') {
            return Self::wildcard_match(filter, value);
        }
        value.contains(filter)
    }

    /// Glob-style match where `*` spans any run of characters
    fn wildcard_match(pattern: &str, value: &str) -> bool {
        let parts: Vec<&str> = pattern.split('*').collect();
        let mut pos = 0usize;
        for (i, part) in parts.iter().enumerate() {
            if part.is_empty() {
                continue;
            }
            if i == 0 {
                if !value.starts_with(part) {
                    return false;
                }
                pos = part.len();
            } else if i == parts.len() - 1 && !pattern.ends_with('*') {
                return value[pos..].ends_with(part);
            } else if let Some(found) = value[pos..].find(part) {
                pos += found + part.len();
            } else {
                return false;
            }
        }
        true
    }

    fn sort_by_coordinate(items: &mut [ConfigStorageData]) {
        items.sort_by(|a, b| {
            a.group
                .cmp(&b.group)
                .then_with(|| a.data_id.cmp(&b.data_id))
        });
    }
}

#[async_trait]
impl ConfigStore for MemoryStore {
    async fn config_find(
        &self,
        data_id: &str,
        group: &str,
        tenant: &str,
    ) -> anyhow::Result<Option<ConfigStorageData>> {
        let key = Self::storage_key(data_id, group, tenant);
        Ok(self.configs.get(&key).map(|e| e.value().clone()))
    }

    async fn config_find_by_ids(&self, ids: &[i64]) -> anyhow::Result<Vec<ConfigStorageData>> {
        let mut results = Vec::with_capacity(ids.len());
        for id in ids {
            // Clone the key out before touching the configs map so no two
            // map guards are ever held at once
            let Some(key) = self.ids.get(id).map(|e| e.value().clone()) else {
                continue;
            };
            if let Some(config) = self.configs.get(&key) {
                results.push(config.value().clone());
            }
        }
        Ok(results)
    }

    async fn config_find_all(&self, tenant: &str) -> anyhow::Result<Vec<ConfigStorageData>> {
        let mut results: Vec<ConfigStorageData> = self
            .configs
            .iter()
            .filter(|e| e.value().tenant == tenant)
            .map(|e| e.value().clone())
            .collect();
        Self::sort_by_coordinate(&mut results);
        Ok(results)
    }

    async fn config_find_for_export(
        &self,
        tenant: &str,
        group: Option<&str>,
        data_ids: Option<&[String]>,
        app_name: Option<&str>,
    ) -> anyhow::Result<Vec<ConfigStorageData>> {
        let mut results: Vec<ConfigStorageData> = self
            .configs
            .iter()
            .filter(|e| {
                let c = e.value();
                if c.tenant != tenant {
                    return false;
                }
                if let Some(g) = group
                    && c.group != g
                {
                    return false;
                }
                if let Some(ids) = data_ids
                    && !ids.iter().any(|d| *d == c.data_id)
                {
                    return false;
                }
                if let Some(app) = app_name
                    && c.app_name != app
                {
                    return false;
                }
                true
            })
            .map(|e| e.value().clone())
            .collect();
        Self::sort_by_coordinate(&mut results);
        Ok(results)
    }

    async fn config_create_or_update(&self, param: &ConfigWriteParam) -> anyhow::Result<bool> {
        let key = Self::storage_key(&param.data_id, &param.group, &param.tenant);
        let now = chrono::Utc::now().timestamp_millis();
        let md5_val = Self::compute_md5(&param.content);

        let guard = self.key_lock(&key).lock();

        let existing = self.configs.get(&key).map(|e| e.value().clone());
        let is_update = existing.is_some();
        let (id, created_time) = match &existing {
            Some(ex) => (ex.id, ex.created_time),
            None => (self.next_id(), now),
        };

        let data = ConfigStorageData {
            id,
            data_id: param.data_id.clone(),
            group: param.group.clone(),
            tenant: param.tenant.clone(),
            content: param.content.clone(),
            md5: md5_val,
            app_name: param.app_name.clone(),
            config_type: param.config_type.clone(),
            desc: param.desc.clone(),
            config_tags: param.config_tags.clone(),
            encrypted_data_key: param.encrypted_data_key.clone(),
            src_user: param.src_user.clone(),
            src_ip: param.src_ip.clone(),
            created_time,
            modified_time: now,
        };

        self.configs.insert(key.clone(), data.clone());
        if !is_update {
            self.ids.insert(id, key);
        }

        let op_type = if is_update { "U" } else { "I" };
        self.record_history(&data, op_type, "formal", &param.src_user, &param.src_ip);

        drop(guard);
        Ok(!is_update)
    }

    async fn config_delete(
        &self,
        data_id: &str,
        group: &str,
        tenant: &str,
        src_user: &str,
        src_ip: &str,
    ) -> anyhow::Result<bool> {
        let key = Self::storage_key(data_id, group, tenant);

        let guard = self.key_lock(&key).lock();

        let Some((_, existing)) = self.configs.remove(&key) else {
            drop(guard);
            return Ok(false);
        };

        self.ids.remove(&existing.id);
        // Beta and tagged variants never outlive their primary
        self.betas.remove(&key);
        let tag_prefix = format!("{}@@", key);
        self.tagged.retain(|k, _| !k.starts_with(&tag_prefix));
        self.record_history(&existing, "D", "formal", src_user, src_ip);

        drop(guard);
        Ok(true)
    }

    async fn config_batch_delete(
        &self,
        ids: &[i64],
        src_user: &str,
        src_ip: &str,
    ) -> anyhow::Result<Vec<ConfigStorageData>> {
        let mut deleted = Vec::new();
        for id in ids {
            let Some(key) = self.ids.get(id).map(|e| e.value().clone()) else {
                debug!(id, "skipping unknown config id in batch delete");
                continue;
            };

            let guard = self.key_lock(&key).lock();
            if let Some((_, existing)) = self.configs.remove(&key) {
                self.ids.remove(&existing.id);
                self.betas.remove(&key);
                let tag_prefix = format!("{}@@", key);
                self.tagged.retain(|k, _| !k.starts_with(&tag_prefix));
                self.record_history(&existing, "D", "formal", src_user, src_ip);
                deleted.push(existing);
            }
            drop(guard);
        }
        Ok(deleted)
    }

    async fn config_search_page(
        &self,
        param: &ConfigSearchParam,
    ) -> anyhow::Result<Page<ConfigStorageData>> {
        let tags: Vec<&str> = param
            .config_tags
            .split(',')
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .collect();
        let types: Vec<&str> = param
            .types
            .split(',')
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .collect();

        let mut filtered: Vec<ConfigStorageData> = self
            .configs
            .iter()
            .filter(|e| {
                let c = e.value();
                // Tenant is a hard scope, never a pattern
                if c.tenant != param.tenant {
                    return false;
                }
                if !Self::field_matches(&param.data_id, &c.data_id, param.exact) {
                    return false;
                }
                if !Self::field_matches(&param.group, &c.group, param.exact) {
                    return false;
                }
                if !Self::field_matches(&param.app_name, &c.app_name, param.exact) {
                    return false;
                }
                if !tags.is_empty() && !tags.iter().all(|t| c.config_tags.contains(t)) {
                    return false;
                }
                if !types.is_empty() && !types.iter().any(|t| *t == c.config_type) {
                    return false;
                }
                if !param.content.is_empty() && !c.content.contains(&param.content) {
                    return false;
                }
                true
            })
            .map(|e| e.value().clone())
            .collect();

        Self::sort_by_coordinate(&mut filtered);

        let total = filtered.len() as u64;
        let offset = param.page_no.saturating_sub(1) * param.page_size;
        let page_items: Vec<ConfigStorageData> = filtered
            .into_iter()
            .skip(offset as usize)
            .take(param.page_size as usize)
            .collect();

        Ok(Page::new(total, param.page_no, param.page_size, page_items))
    }

    async fn config_count(&self, tenant: &str) -> anyhow::Result<u64> {
        Ok(self
            .configs
            .iter()
            .filter(|e| e.value().tenant == tenant)
            .count() as u64)
    }

    async fn config_beta_find(
        &self,
        data_id: &str,
        group: &str,
        tenant: &str,
    ) -> anyhow::Result<Option<ConfigBetaStorageData>> {
        let key = Self::storage_key(data_id, group, tenant);
        Ok(self.betas.get(&key).map(|e| e.value().clone()))
    }

    async fn config_beta_create_or_update(
        &self,
        param: &ConfigWriteParam,
        beta_ips: &str,
    ) -> anyhow::Result<bool> {
        let key = Self::storage_key(&param.data_id, &param.group, &param.tenant);
        let now = chrono::Utc::now().timestamp_millis();
        let md5_val = Self::compute_md5(&param.content);

        let guard = self.key_lock(&key).lock();

        let existing = self.betas.get(&key).map(|e| e.value().clone());
        let is_update = existing.is_some();
        let created_time = existing.as_ref().map_or(now, |ex| ex.created_time);

        let data = ConfigBetaStorageData {
            data_id: param.data_id.clone(),
            group: param.group.clone(),
            tenant: param.tenant.clone(),
            content: param.content.clone(),
            md5: md5_val.clone(),
            app_name: param.app_name.clone(),
            beta_ips: beta_ips.to_string(),
            encrypted_data_key: param.encrypted_data_key.clone(),
            src_user: param.src_user.clone(),
            src_ip: param.src_ip.clone(),
            created_time,
            modified_time: now,
        };
        self.betas.insert(key, data);

        let snapshot = ConfigStorageData {
            data_id: param.data_id.clone(),
            group: param.group.clone(),
            tenant: param.tenant.clone(),
            content: param.content.clone(),
            md5: md5_val,
            app_name: param.app_name.clone(),
            encrypted_data_key: param.encrypted_data_key.clone(),
            ..Default::default()
        };
        let op_type = if is_update { "U" } else { "I" };
        self.record_history(&snapshot, op_type, "gray", &param.src_user, &param.src_ip);

        drop(guard);
        Ok(!is_update)
    }

    async fn config_beta_delete(
        &self,
        data_id: &str,
        group: &str,
        tenant: &str,
        src_user: &str,
        src_ip: &str,
    ) -> anyhow::Result<bool> {
        let key = Self::storage_key(data_id, group, tenant);

        let guard = self.key_lock(&key).lock();

        let Some((_, existing)) = self.betas.remove(&key) else {
            drop(guard);
            return Ok(false);
        };

        let snapshot = ConfigStorageData {
            data_id: existing.data_id,
            group: existing.group,
            tenant: existing.tenant,
            content: existing.content,
            md5: existing.md5,
            app_name: existing.app_name,
            encrypted_data_key: existing.encrypted_data_key,
            ..Default::default()
        };
        self.record_history(&snapshot, "D", "gray", src_user, src_ip);

        drop(guard);
        Ok(true)
    }

    async fn config_tag_find(
        &self,
        data_id: &str,
        group: &str,
        tenant: &str,
        tag: &str,
    ) -> anyhow::Result<Option<ConfigStorageData>> {
        let key = Self::tag_storage_key(data_id, group, tenant, tag);
        Ok(self.tagged.get(&key).map(|e| e.value().clone()))
    }

    async fn config_tag_create_or_update(
        &self,
        param: &ConfigWriteParam,
        tag: &str,
    ) -> anyhow::Result<bool> {
        let primary_key = Self::storage_key(&param.data_id, &param.group, &param.tenant);
        let key = Self::tag_storage_key(&param.data_id, &param.group, &param.tenant, tag);
        let now = chrono::Utc::now().timestamp_millis();
        let md5_val = Self::compute_md5(&param.content);

        // All variants of a coordinate serialize on the primary key's shard,
        // so a concurrent delete of the primary cannot interleave
        let guard = self.key_lock(&primary_key).lock();

        let existing = self.tagged.get(&key).map(|e| e.value().clone());
        let is_update = existing.is_some();
        let created_time = existing.as_ref().map_or(now, |ex| ex.created_time);

        let data = ConfigStorageData {
            id: 0,
            data_id: param.data_id.clone(),
            group: param.group.clone(),
            tenant: param.tenant.clone(),
            content: param.content.clone(),
            md5: md5_val,
            app_name: param.app_name.clone(),
            config_type: param.config_type.clone(),
            desc: param.desc.clone(),
            config_tags: tag.to_string(),
            encrypted_data_key: param.encrypted_data_key.clone(),
            src_user: param.src_user.clone(),
            src_ip: param.src_ip.clone(),
            created_time,
            modified_time: now,
        };
        self.tagged.insert(key, data.clone());

        let op_type = if is_update { "U" } else { "I" };
        self.record_history(&data, op_type, "tag", &param.src_user, &param.src_ip);

        drop(guard);
        Ok(!is_update)
    }

    async fn config_tag_delete(
        &self,
        data_id: &str,
        group: &str,
        tenant: &str,
        tag: &str,
        src_user: &str,
        src_ip: &str,
    ) -> anyhow::Result<bool> {
        let primary_key = Self::storage_key(data_id, group, tenant);
        let key = Self::tag_storage_key(data_id, group, tenant, tag);

        let guard = self.key_lock(&primary_key).lock();

        let Some((_, existing)) = self.tagged.remove(&key) else {
            drop(guard);
            return Ok(false);
        };

        self.record_history(&existing, "D", "tag", src_user, src_ip);

        drop(guard);
        Ok(true)
    }

    async fn config_history_page(
        &self,
        data_id: &str,
        group: &str,
        tenant: &str,
        page_no: u64,
        page_size: u64,
    ) -> anyhow::Result<Page<ConfigHistoryStorageData>> {
        let mut all_items: Vec<ConfigHistoryStorageData> = self
            .histories
            .iter()
            .filter(|e| {
                let h = e.value();
                h.data_id == data_id && h.group == group && h.tenant == tenant
            })
            .map(|e| e.value().clone())
            .collect();

        // Newest first
        all_items.sort_by(|a, b| b.id.cmp(&a.id));

        let total = all_items.len() as u64;
        let offset = page_no.saturating_sub(1) * page_size;
        let page_items: Vec<ConfigHistoryStorageData> = all_items
            .into_iter()
            .skip(offset as usize)
            .take(page_size as usize)
            .collect();

        Ok(Page::new(total, page_no, page_size, page_items))
    }

    async fn config_history_find(
        &self,
        id: u64,
    ) -> anyhow::Result<Option<ConfigHistoryStorageData>> {
        Ok(self.histories.get(&id).map(|e| e.value().clone()))
    }
}

#[async_trait]
impl NamespaceStore for MemoryStore {
    async fn namespace_find_all(&self) -> anyhow::Result<Vec<NamespaceInfo>> {
        let mut result: Vec<NamespaceInfo> = self
            .namespaces
            .iter()
            .map(|e| e.value().clone())
            .collect();
        for info in &mut result {
            info.config_count = self.config_count(&info.namespace_id).await? as i32;
        }
        result.sort_by(|a, b| a.namespace_id.cmp(&b.namespace_id));
        Ok(result)
    }

    async fn namespace_find(&self, namespace_id: &str) -> anyhow::Result<Option<NamespaceInfo>> {
        let Some(info) = self.namespaces.get(namespace_id).map(|e| e.value().clone()) else {
            return Ok(None);
        };
        let config_count = self.config_count(namespace_id).await? as i32;
        Ok(Some(NamespaceInfo {
            config_count,
            ..info
        }))
    }

    async fn namespace_create(&self, info: &NamespaceInfo) -> anyhow::Result<bool> {
        let guard = self.key_lock(&info.namespace_id).lock();
        if self.namespaces.contains_key(&info.namespace_id) {
            drop(guard);
            return Ok(false);
        }
        self.namespaces
            .insert(info.namespace_id.clone(), info.clone());
        drop(guard);
        Ok(true)
    }

    async fn namespace_update(&self, info: &NamespaceInfo) -> anyhow::Result<bool> {
        let guard = self.key_lock(&info.namespace_id).lock();
        let Some(mut existing) = self.namespaces.get_mut(&info.namespace_id) else {
            drop(guard);
            return Ok(false);
        };
        existing.namespace_name = info.namespace_name.clone();
        existing.namespace_desc = info.namespace_desc.clone();
        drop(existing);
        drop(guard);
        Ok(true)
    }

    async fn namespace_delete(&self, namespace_id: &str) -> anyhow::Result<bool> {
        Ok(self.namespaces.remove(namespace_id).is_some())
    }
}

impl PlaneStore for MemoryStore {
    fn backend_name(&self) -> &'static str {
        "memory"
    }
}
