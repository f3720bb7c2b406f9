//! Configuration service layer
//!
//! Store-facing operations for config management:
//! - Publish/delete for formal records and tagged variants
//! - Gray release (beta configs)
//! - Paginated search
//! - Config history queries
//!
//! Mutations emit change events after the store write commits, so a
//! notified listener observes the new fingerprint on its next read.

#![allow(clippy::too_many_arguments)]

use anyhow::bail;

use taro_api::model::Page;
use taro_common::{TaroError, is_default_namespace, is_valid};
use taro_persistence::{ConfigSearchParam, ConfigStore, ConfigWriteParam, PlaneStore};

use crate::model::{
    ConfigAllInfo, ConfigBetaInfo, ConfigHistoryInfo, ConfigInfo, ConfigKey, ConfigPublishForm,
    ConfigType,
};
use crate::notify::{ConfigChangeBus, ConfigChangeEvent};

/// Map the public namespace onto the empty storage tenant.
#[inline]
pub(crate) fn storage_tenant(tenant: &str) -> &str {
    if is_default_namespace(tenant) { "" } else { tenant }
}

/// Normalize config tags: trim entries, drop empties, dedup preserving order.
#[inline]
pub(crate) fn normalize_config_tags(config_tags: &str) -> String {
    let mut tags: Vec<&str> = Vec::new();
    for tag in config_tags.split(',') {
        let tag = tag.trim();
        if !tag.is_empty() && !tags.contains(&tag) {
            tags.push(tag);
        }
    }
    tags.join(",")
}

/// Reject malformed identifiers before the store is touched.
fn validate_coordinate(data_id: &str, group: &str, tenant: &str, tag: &str) -> anyhow::Result<()> {
    if data_id.is_empty() || !is_valid(data_id) {
        bail!(TaroError::Validation(format!("invalid dataId: '{data_id}'")));
    }
    if group.is_empty() || !is_valid(group) {
        bail!(TaroError::Validation(format!("invalid group: '{group}'")));
    }
    if !is_valid(tenant) {
        bail!(TaroError::Validation(format!(
            "invalid namespace: '{tenant}'"
        )));
    }
    if !is_valid(tag) {
        bail!(TaroError::Validation(format!("invalid tag: '{tag}'")));
    }
    Ok(())
}

fn validate_content(content: &str, max_content: usize) -> anyhow::Result<()> {
    if content.is_empty() {
        bail!(TaroError::Validation("content is empty".to_string()));
    }
    if content.len() > max_content {
        bail!(TaroError::Validation(format!(
            "content length {} exceeds limit {}",
            content.len(),
            max_content
        )));
    }
    Ok(())
}

fn write_param(form: &ConfigPublishForm, tenant: &str) -> ConfigWriteParam {
    let config_type = if form.r#type.is_empty() {
        ConfigType::default().as_str().to_string()
    } else {
        form.r#type.clone()
    };
    ConfigWriteParam {
        data_id: form.data_id.clone(),
        group: form.group.clone(),
        tenant: tenant.to_string(),
        content: form.content.clone(),
        app_name: form.app_name.clone(),
        config_type,
        desc: form.desc.clone(),
        config_tags: normalize_config_tags(&form.config_tags),
        encrypted_data_key: form.encrypted_data_key.clone(),
        src_user: form.src_user.clone(),
        src_ip: form.src_ip.clone(),
    }
}

/// Publish a config: create or overwrite the formal record, or the tagged
/// variant when the form carries a tag.
///
/// Returns true when the record was newly created.
pub async fn publish_config(
    store: &dyn PlaneStore,
    bus: &ConfigChangeBus,
    form: &ConfigPublishForm,
    max_content: usize,
) -> anyhow::Result<bool> {
    validate_coordinate(&form.data_id, &form.group, &form.tenant, &form.tag)?;
    validate_content(&form.content, max_content)?;

    let tenant = storage_tenant(&form.tenant);
    let param = write_param(form, tenant);

    let created = if form.tag.is_empty() {
        store.config_create_or_update(&param).await?
    } else {
        store.config_tag_create_or_update(&param, &form.tag).await?
    };

    let event = if created {
        ConfigChangeEvent::added(&form.data_id, &form.group, tenant, &form.tag)
    } else {
        ConfigChangeEvent::updated(&form.data_id, &form.group, tenant, &form.tag)
    };
    bus.publish(event).await;

    Ok(created)
}

/// Publish a beta (canary) record visible only to whitelisted client IPs.
/// The formal record is untouched.
///
/// Returns true when the beta record was newly created.
pub async fn publish_config_beta(
    store: &dyn PlaneStore,
    bus: &ConfigChangeBus,
    form: &ConfigPublishForm,
    beta_ips: &str,
    max_content: usize,
) -> anyhow::Result<bool> {
    validate_coordinate(&form.data_id, &form.group, &form.tenant, "")?;
    validate_content(&form.content, max_content)?;
    if beta_ips.trim().is_empty() {
        bail!(TaroError::Validation("betaIps is empty".to_string()));
    }

    let tenant = storage_tenant(&form.tenant);
    let param = write_param(form, tenant);
    let created = store.config_beta_create_or_update(&param, beta_ips).await?;

    let event = if created {
        ConfigChangeEvent::added(&form.data_id, &form.group, tenant, "")
    } else {
        ConfigChangeEvent::updated(&form.data_id, &form.group, tenant, "")
    };
    bus.publish(event.beta()).await;

    Ok(created)
}

/// Remove the beta record for a coordinate. Idempotent: an absent beta
/// still succeeds, and the delete event fires only when something was
/// actually removed.
pub async fn stop_config_beta(
    store: &dyn PlaneStore,
    bus: &ConfigChangeBus,
    data_id: &str,
    group: &str,
    tenant: &str,
    src_user: &str,
    src_ip: &str,
) -> anyhow::Result<bool> {
    validate_coordinate(data_id, group, tenant, "")?;
    let tenant = storage_tenant(tenant);

    let removed = store
        .config_beta_delete(data_id, group, tenant, src_user, src_ip)
        .await?;
    if removed {
        bus.publish(ConfigChangeEvent::deleted(data_id, group, tenant, "").beta())
            .await;
    }
    Ok(removed)
}

/// Delete a config, or its tagged variant when a tag is given. Idempotent:
/// deleting an absent key succeeds without an event.
///
/// Returns true when a record was actually removed.
pub async fn delete_config(
    store: &dyn PlaneStore,
    bus: &ConfigChangeBus,
    data_id: &str,
    group: &str,
    tenant: &str,
    tag: &str,
    src_user: &str,
    src_ip: &str,
) -> anyhow::Result<bool> {
    validate_coordinate(data_id, group, tenant, tag)?;
    let tenant = storage_tenant(tenant);

    let removed = if tag.is_empty() {
        store
            .config_delete(data_id, group, tenant, src_user, src_ip)
            .await?
    } else {
        store
            .config_tag_delete(data_id, group, tenant, tag, src_user, src_ip)
            .await?
    };
    if removed {
        bus.publish(ConfigChangeEvent::deleted(data_id, group, tenant, tag))
            .await;
    }
    Ok(removed)
}

/// Delete configs by their backend-assigned ids in one logical operation.
/// Unknown ids are silently skipped; one delete event fires per record
/// actually removed.
///
/// Returns the keys of the removed records.
pub async fn delete_configs_by_ids(
    store: &dyn PlaneStore,
    bus: &ConfigChangeBus,
    ids: &[i64],
    src_user: &str,
    src_ip: &str,
) -> anyhow::Result<Vec<ConfigKey>> {
    let removed = store.config_batch_delete(ids, src_user, src_ip).await?;

    let mut keys = Vec::with_capacity(removed.len());
    for record in removed {
        bus.publish(ConfigChangeEvent::deleted(
            &record.data_id,
            &record.group,
            &record.tenant,
            "",
        ))
        .await;
        keys.push(ConfigKey::new(&record.data_id, &record.group, &record.tenant));
    }
    Ok(keys)
}

/// Find a single config with its audit fields. A non-empty tag selects the
/// tagged variant instead of the formal record.
pub async fn find_one(
    store: &dyn PlaneStore,
    data_id: &str,
    group: &str,
    tenant: &str,
    tag: &str,
) -> anyhow::Result<Option<ConfigAllInfo>> {
    let tenant = storage_tenant(tenant);
    let found = if tag.is_empty() {
        store.config_find(data_id, group, tenant).await?
    } else {
        store.config_tag_find(data_id, group, tenant, tag).await?
    };
    Ok(found.map(ConfigAllInfo::from))
}

/// Find the beta record for a coordinate.
pub async fn find_beta(
    store: &dyn PlaneStore,
    data_id: &str,
    group: &str,
    tenant: &str,
) -> anyhow::Result<Option<ConfigBetaInfo>> {
    let tenant = storage_tenant(tenant);
    let found = store.config_beta_find(data_id, group, tenant).await?;
    Ok(found.map(ConfigBetaInfo::from))
}

/// Paginated config search.
///
/// Exact mode matches non-empty filters verbatim; fuzzy mode applies
/// `*`-wildcard/substring matching on data_id, group and app_name. The tag
/// filter requires every listed tag; the type filter matches any.
pub async fn search_config_page(
    store: &dyn PlaneStore,
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
    if page_no < 1 || page_size < 1 {
        bail!(TaroError::Validation(format!(
            "invalid pagination: pageNo={page_no}, pageSize={page_size}"
        )));
    }

    let param = ConfigSearchParam {
        exact,
        tenant: storage_tenant(tenant).to_string(),
        data_id: data_id.to_string(),
        group: group.to_string(),
        app_name: app_name.to_string(),
        content: content.to_string(),
        config_tags: normalize_config_tags(config_tags),
        types: types.to_string(),
        page_no,
        page_size,
    };
    let page = store.config_search_page(&param).await?;

    Ok(Page::new(
        page.total_count,
        page_no,
        page_size,
        page.page_items.into_iter().map(ConfigInfo::from).collect(),
    ))
}

/// Paginated change history for a coordinate, newest first.
pub async fn find_history_page(
    store: &dyn PlaneStore,
    data_id: &str,
    group: &str,
    tenant: &str,
    page_no: u64,
    page_size: u64,
) -> anyhow::Result<Page<ConfigHistoryInfo>> {
    if page_no < 1 || page_size < 1 {
        bail!(TaroError::Validation(format!(
            "invalid pagination: pageNo={page_no}, pageSize={page_size}"
        )));
    }
    let tenant = storage_tenant(tenant);
    let page = store
        .config_history_page(data_id, group, tenant, page_no, page_size)
        .await?;
    Ok(Page::new(
        page.total_count,
        page_no,
        page_size,
        page.page_items
            .into_iter()
            .map(ConfigHistoryInfo::from)
            .collect(),
    ))
}

/// Find a single history row by id.
pub async fn find_history_one(
    store: &dyn PlaneStore,
    id: u64,
) -> anyhow::Result<Option<ConfigHistoryInfo>> {
    let found = store.config_history_find(id).await?;
    Ok(found.map(ConfigHistoryInfo::from))
}
