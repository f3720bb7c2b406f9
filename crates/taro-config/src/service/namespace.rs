//! Namespace service layer
//!
//! The default (public) namespace is implicit: it is never stored, always
//! exists, and maps onto the empty storage tenant. All other namespaces are
//! explicit records.

use anyhow::bail;
use uuid::Uuid;

use taro_common::{DEFAULT_NAMESPACE_ID, TaroError, is_default_namespace, is_valid};
use taro_persistence::{ConfigStore, NamespaceInfo, NamespaceStore, PlaneStore};

/// Quota attached to every namespace until quota management exists
const DEFAULT_NAMESPACE_QUOTA: i32 = 200;

async fn default_namespace(store: &dyn PlaneStore) -> anyhow::Result<NamespaceInfo> {
    let config_count = store.config_count("").await? as i32;
    Ok(NamespaceInfo {
        namespace_id: DEFAULT_NAMESPACE_ID.to_string(),
        namespace_name: DEFAULT_NAMESPACE_ID.to_string(),
        namespace_desc: "Public Namespace".to_string(),
        config_count,
        quota: DEFAULT_NAMESPACE_QUOTA,
    })
}

/// All namespaces, the implicit public one first.
pub async fn find_all_namespaces(store: &dyn PlaneStore) -> anyhow::Result<Vec<NamespaceInfo>> {
    let mut namespaces = vec![default_namespace(store).await?];
    namespaces.extend(store.namespace_find_all().await?);
    Ok(namespaces)
}

/// Find a namespace by id. The public namespace is always found.
pub async fn find_namespace(
    store: &dyn PlaneStore,
    namespace_id: &str,
) -> anyhow::Result<Option<NamespaceInfo>> {
    if is_default_namespace(namespace_id) {
        return Ok(Some(default_namespace(store).await?));
    }
    store.namespace_find(namespace_id).await
}

/// Whether a namespace exists. The public namespace always does.
pub async fn namespace_exists(store: &dyn PlaneStore, namespace_id: &str) -> anyhow::Result<bool> {
    if is_default_namespace(namespace_id) {
        return Ok(true);
    }
    Ok(store.namespace_find(namespace_id).await?.is_some())
}

/// Fail with `NamespaceNotExist` unless the namespace is registered.
pub async fn ensure_namespace_exists(
    store: &dyn PlaneStore,
    namespace_id: &str,
) -> anyhow::Result<()> {
    if !namespace_exists(store, namespace_id).await? {
        bail!(TaroError::NamespaceNotExist(namespace_id.to_string()));
    }
    Ok(())
}

/// Create a namespace. An empty id gets a generated UUID.
///
/// Returns the effective namespace id.
pub async fn create_namespace(
    store: &dyn PlaneStore,
    namespace_id: &str,
    namespace_name: &str,
    namespace_desc: &str,
) -> anyhow::Result<String> {
    let namespace_id = if namespace_id.trim().is_empty() {
        Uuid::new_v4().to_string()
    } else {
        namespace_id.trim().to_string()
    };

    if !is_valid(&namespace_id) {
        bail!(TaroError::Validation(format!(
            "invalid namespace id: '{namespace_id}'"
        )));
    }
    if is_default_namespace(&namespace_id) {
        bail!(TaroError::NamespaceAlreadyExist(namespace_id));
    }
    if namespace_name.trim().is_empty() {
        bail!(TaroError::Validation("namespace name is empty".to_string()));
    }

    let info = NamespaceInfo {
        namespace_id: namespace_id.clone(),
        namespace_name: namespace_name.trim().to_string(),
        namespace_desc: namespace_desc.to_string(),
        config_count: 0,
        quota: DEFAULT_NAMESPACE_QUOTA,
    };
    if !store.namespace_create(&info).await? {
        bail!(TaroError::NamespaceAlreadyExist(namespace_id));
    }
    Ok(namespace_id)
}

/// Update a namespace's name and description.
pub async fn update_namespace(
    store: &dyn PlaneStore,
    namespace_id: &str,
    namespace_name: &str,
    namespace_desc: &str,
) -> anyhow::Result<()> {
    if is_default_namespace(namespace_id) {
        bail!(TaroError::Validation(
            "the public namespace cannot be modified".to_string()
        ));
    }
    if namespace_name.trim().is_empty() {
        bail!(TaroError::Validation("namespace name is empty".to_string()));
    }

    let info = NamespaceInfo {
        namespace_id: namespace_id.to_string(),
        namespace_name: namespace_name.trim().to_string(),
        namespace_desc: namespace_desc.to_string(),
        config_count: 0,
        quota: DEFAULT_NAMESPACE_QUOTA,
    };
    if !store.namespace_update(&info).await? {
        bail!(TaroError::NamespaceNotExist(namespace_id.to_string()));
    }
    Ok(())
}

/// Delete a namespace. The public namespace cannot be deleted; deleting an
/// unknown one is a no-op.
///
/// Returns true when a namespace was actually removed.
pub async fn delete_namespace(store: &dyn PlaneStore, namespace_id: &str) -> anyhow::Result<bool> {
    if is_default_namespace(namespace_id) {
        bail!(TaroError::Validation(
            "the public namespace cannot be deleted".to_string()
        ));
    }
    store.namespace_delete(namespace_id).await
}
