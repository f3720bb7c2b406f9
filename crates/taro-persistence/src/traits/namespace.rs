use async_trait::async_trait;

use crate::model::NamespaceInfo;

/// Namespace storage operations
///
/// The default (public) namespace is implicit and never stored; callers
/// are expected to map it before reaching the store.
#[async_trait]
pub trait NamespaceStore: Send + Sync {
    /// All namespaces, ordered by namespace id.
    async fn namespace_find_all(&self) -> anyhow::Result<Vec<NamespaceInfo>>;

    /// Find a namespace by id.
    async fn namespace_find(&self, namespace_id: &str) -> anyhow::Result<Option<NamespaceInfo>>;

    /// Create a namespace.
    ///
    /// Returns false when a namespace with the same id already exists.
    async fn namespace_create(&self, info: &NamespaceInfo) -> anyhow::Result<bool>;

    /// Update a namespace's name and description.
    ///
    /// Returns false when the namespace does not exist.
    async fn namespace_update(&self, info: &NamespaceInfo) -> anyhow::Result<bool>;

    /// Delete a namespace.
    ///
    /// Returns false when the namespace does not exist.
    async fn namespace_delete(&self, namespace_id: &str) -> anyhow::Result<bool>;
}
