//! Bulk transfer engine: export, import and clone
//!
//! Bundles are zip archives with one `{group}/{dataId}` entry per config.
//! The v1 layout adds a `.meta` YAML sidecar per item; the v2 layout writes
//! a single `.metadata.yml` manifest for the whole bundle instead, so
//! re-import need not guess types from file extensions.

#![allow(clippy::too_many_arguments)]

use std::collections::HashMap;
use std::io::{Cursor, Read, Write};

use anyhow::bail;
use zip::{ZipArchive, ZipWriter, write::SimpleFileOptions};

use taro_common::{DEFAULT_GROUP, TaroError};
use taro_persistence::{ConfigStorageData, ConfigStore, PlaneStore};

use crate::model::{
    ConfigCloneInfo, ConfigExportItem, ConfigExportMetadata, ConfigImportItem, ConfigMetadata,
    ConfigMetadataItem, ConfigPublishForm, ConfigType, EXPORT_METADATA_FILE_NAME, ExportFormat,
    ExportSelector, ImportFailItem, ImportResult, ImportSkipItem, SameConfigPolicy,
};
use crate::notify::ConfigChangeBus;
use crate::service::config::{publish_config, storage_tenant};
use crate::service::namespace::ensure_namespace_exists;

/// Export the selected configs as a zip bundle.
///
/// An explicit id list wins over the filter fields; empty-string filters
/// count as absent. An empty selection is a validation error, not an empty
/// archive.
pub async fn export_configs(
    store: &dyn PlaneStore,
    selector: &ExportSelector,
    format: ExportFormat,
) -> anyhow::Result<Vec<u8>> {
    let records = select_for_export(store, selector).await?;
    if records.is_empty() {
        bail!(TaroError::Validation("no data to export".to_string()));
    }

    let items: Vec<ConfigExportItem> = records.into_iter().map(export_item).collect();
    match format {
        ExportFormat::V1 => build_zip_v1(&items),
        ExportFormat::V2 => build_zip_v2(&items),
    }
}

async fn select_for_export(
    store: &dyn PlaneStore,
    selector: &ExportSelector,
) -> anyhow::Result<Vec<ConfigStorageData>> {
    if let Some(ids) = &selector.ids
        && !ids.is_empty()
    {
        return store.config_find_by_ids(ids).await;
    }

    let tenant = storage_tenant(&selector.tenant);
    let group = selector.group.as_deref().filter(|g| !g.is_empty());
    let app_name = selector.app_name.as_deref().filter(|a| !a.is_empty());
    let data_ids = selector.data_ids.as_deref().filter(|d| !d.is_empty());
    store
        .config_find_for_export(tenant, group, data_ids, app_name)
        .await
}

fn export_item(record: ConfigStorageData) -> ConfigExportItem {
    ConfigExportItem {
        metadata: ConfigExportMetadata {
            data_id: record.data_id,
            group: record.group,
            namespace_id: record.tenant,
            content_type: record.config_type,
            app_name: record.app_name,
            desc: record.desc,
            config_tags: record.config_tags,
            md5: record.md5,
            encrypted_data_key: record.encrypted_data_key,
            create_time: record.created_time,
            modify_time: record.modified_time,
        },
        content: record.content,
    }
}

fn zip_options() -> SimpleFileOptions {
    SimpleFileOptions::default()
        .compression_method(zip::CompressionMethod::Deflated)
        .unix_permissions(0o644)
}

fn build_zip_v1(items: &[ConfigExportItem]) -> anyhow::Result<Vec<u8>> {
    let mut buffer = Cursor::new(Vec::new());
    let mut zip = ZipWriter::new(&mut buffer);
    let options = zip_options();

    for item in items {
        let content_path = format!("{}/{}", item.metadata.group, item.metadata.data_id);
        zip.start_file(&content_path, options)?;
        zip.write_all(item.content.as_bytes())?;

        let meta_path = format!("{content_path}.meta");
        let meta_yaml = serde_yaml::to_string(&item.metadata)?;
        zip.start_file(&meta_path, options)?;
        zip.write_all(meta_yaml.as_bytes())?;
    }

    zip.finish()?;
    Ok(buffer.into_inner())
}

fn build_zip_v2(items: &[ConfigExportItem]) -> anyhow::Result<Vec<u8>> {
    let mut buffer = Cursor::new(Vec::new());
    let mut zip = ZipWriter::new(&mut buffer);
    let options = zip_options();

    let mut manifest = ConfigMetadata::default();
    for item in items {
        let content_path = format!("{}/{}", item.metadata.group, item.metadata.data_id);
        zip.start_file(&content_path, options)?;
        zip.write_all(item.content.as_bytes())?;

        manifest.metadata.push(ConfigMetadataItem {
            data_id: item.metadata.data_id.clone(),
            group: item.metadata.group.clone(),
            desc: item.metadata.desc.clone(),
            content_type: item.metadata.content_type.clone(),
            app_name: item.metadata.app_name.clone(),
        });
    }

    let manifest_yaml = serde_yaml::to_string(&manifest)?;
    zip.start_file(EXPORT_METADATA_FILE_NAME, options)?;
    zip.write_all(manifest_yaml.as_bytes())?;

    zip.finish()?;
    Ok(buffer.into_inner())
}

/// Parse a zip bundle into import items.
///
/// v1 sidecars and the v2 manifest are both honored in one pass; entries
/// without metadata fall back to path-derived coordinates with the type
/// inferred from the data id extension.
pub fn parse_import_zip(data: &[u8]) -> anyhow::Result<Vec<ConfigImportItem>> {
    if data.is_empty() {
        bail!(TaroError::Validation("import file is empty".to_string()));
    }

    let cursor = Cursor::new(data);
    let mut archive = match ZipArchive::new(cursor) {
        Ok(archive) => archive,
        Err(e) => bail!(TaroError::Format(format!("not a zip archive: {e}"))),
    };

    let mut content_map: HashMap<String, String> = HashMap::new();
    let mut meta_map: HashMap<String, ConfigExportMetadata> = HashMap::new();
    let mut manifest: Option<ConfigMetadata> = None;

    // First pass: read all entries
    for i in 0..archive.len() {
        let mut file = archive.by_index(i)?;
        let name = file.name().to_string();

        if file.is_dir() {
            continue;
        }

        let mut contents = String::new();
        if file.read_to_string(&mut contents).is_err() {
            bail!(TaroError::Format(format!(
                "entry '{name}' is not valid UTF-8"
            )));
        }

        if name == EXPORT_METADATA_FILE_NAME {
            match serde_yaml::from_str(&contents) {
                Ok(parsed) => manifest = Some(parsed),
                Err(e) => bail!(TaroError::Format(format!("invalid bundle manifest: {e}"))),
            }
        } else if let Some(base_name) = name.strip_suffix(".meta") {
            match serde_yaml::from_str::<ConfigExportMetadata>(&contents) {
                Ok(metadata) => {
                    meta_map.insert(base_name.to_string(), metadata);
                }
                Err(e) => bail!(TaroError::Format(format!(
                    "invalid metadata for '{base_name}': {e}"
                ))),
            }
        } else {
            content_map.insert(name, contents);
        }
    }

    // Manifest entries are keyed by coordinate, not by archive path
    let mut manifest_map: HashMap<(String, String), ConfigMetadataItem> = HashMap::new();
    if let Some(manifest) = manifest {
        for entry in manifest.metadata {
            manifest_map.insert((entry.group.clone(), entry.data_id.clone()), entry);
        }
    }

    // Second pass: match content with metadata
    let mut items: Vec<ConfigImportItem> = Vec::new();
    for (path, content) in content_map {
        let metadata = if let Some(meta) = meta_map.get(&path) {
            meta.clone()
        } else {
            path_metadata(&path)
        };

        let mut item = ConfigImportItem::from(ConfigExportItem { metadata, content });
        if let Some(entry) = manifest_map.get(&(item.group.clone(), item.data_id.clone())) {
            if !entry.content_type.is_empty() {
                item.config_type = entry.content_type.clone();
            }
            if !entry.app_name.is_empty() {
                item.app_name = entry.app_name.clone();
            }
            if !entry.desc.is_empty() {
                item.desc = entry.desc.clone();
            }
        }
        items.push(item);
    }

    Ok(items)
}

/// Default metadata for a bundle entry without a sidecar: coordinates from
/// the `group/dataId` path, type from the extension.
fn path_metadata(path: &str) -> ConfigExportMetadata {
    let parts: Vec<&str> = path.splitn(2, '/').collect();
    if parts.len() == 2 {
        ConfigExportMetadata {
            group: parts[0].to_string(),
            data_id: parts[1].to_string(),
            content_type: infer_content_type(parts[1]),
            ..Default::default()
        }
    } else {
        ConfigExportMetadata {
            data_id: path.to_string(),
            group: DEFAULT_GROUP.to_string(),
            content_type: infer_content_type(path),
            ..Default::default()
        }
    }
}

/// Infer content type from the data id's file extension
fn infer_content_type(data_id: &str) -> String {
    let ext = data_id.rsplit('.').next().unwrap_or("").to_lowercase();
    ConfigType::of_extension(&ext).as_str().to_string()
}

/// Import a zip bundle into a target namespace with a conflict policy.
///
/// Every item lands in the target tenant regardless of what its bundle
/// metadata claims. Each written item emits a change event and appends
/// history exactly as a normal publish.
pub async fn import_configs(
    store: &dyn PlaneStore,
    bus: &ConfigChangeBus,
    data: &[u8],
    target_tenant: &str,
    policy: SameConfigPolicy,
    src_user: &str,
    src_ip: &str,
    max_content: usize,
) -> anyhow::Result<ImportResult> {
    ensure_namespace_exists(store, target_tenant).await?;

    let items = parse_import_zip(data)?;
    if items.is_empty() {
        bail!(TaroError::Validation(
            "no config found in the import file".to_string()
        ));
    }

    apply_import_items(
        store,
        bus,
        items,
        target_tenant,
        policy,
        src_user,
        src_ip,
        max_content,
    )
    .await
}

/// Clone configs into a target namespace by id, optionally renaming each.
/// Same conflict semantics as import, without the intermediate archive.
pub async fn clone_configs(
    store: &dyn PlaneStore,
    bus: &ConfigChangeBus,
    items: &[ConfigCloneInfo],
    target_tenant: &str,
    policy: SameConfigPolicy,
    src_user: &str,
    src_ip: &str,
    max_content: usize,
) -> anyhow::Result<ImportResult> {
    ensure_namespace_exists(store, target_tenant).await?;

    let ids: Vec<i64> = items.iter().map(|i| i.config_id).collect();
    let sources = store.config_find_by_ids(&ids).await?;
    if sources.is_empty() {
        bail!(TaroError::Validation(
            "no config selected to clone".to_string()
        ));
    }

    let overrides: HashMap<i64, &ConfigCloneInfo> =
        items.iter().map(|i| (i.config_id, i)).collect();

    let mut import_items = Vec::with_capacity(sources.len());
    for source in sources {
        let mut item = ConfigImportItem {
            data_id: source.data_id,
            group: source.group,
            tenant: String::new(),
            content: source.content,
            config_type: source.config_type,
            app_name: source.app_name,
            desc: source.desc,
            config_tags: source.config_tags,
            encrypted_data_key: source.encrypted_data_key,
        };
        if let Some(info) = overrides.get(&source.id) {
            if !info.target_data_id.is_empty() {
                item.data_id = info.target_data_id.clone();
            }
            if !info.target_group_name.is_empty() {
                item.group = info.target_group_name.clone();
            }
        }
        import_items.push(item);
    }

    apply_import_items(
        store,
        bus,
        import_items,
        target_tenant,
        policy,
        src_user,
        src_ip,
        max_content,
    )
    .await
}

/// Write a batch of items under one conflict policy.
///
/// ABORT runs a pre-flight existence scan so a conflicting batch is
/// rejected before anything is written. A concurrent publish can still slip
/// a conflict in between the scan and the writes; that narrow window
/// surfaces as a per-item failure instead of a partial rollback.
async fn apply_import_items(
    store: &dyn PlaneStore,
    bus: &ConfigChangeBus,
    items: Vec<ConfigImportItem>,
    target_tenant: &str,
    policy: SameConfigPolicy,
    src_user: &str,
    src_ip: &str,
    max_content: usize,
) -> anyhow::Result<ImportResult> {
    let tenant = storage_tenant(target_tenant);

    if policy == SameConfigPolicy::Abort {
        let mut conflicts: Vec<String> = Vec::new();
        for item in &items {
            if store
                .config_find(&item.data_id, &item.group, tenant)
                .await?
                .is_some()
            {
                conflicts.push(format!("{}/{}", item.group, item.data_id));
            }
        }
        if let Some(first) = conflicts.first() {
            let detail = if conflicts.len() > 1 {
                format!("{} (and {} more)", first, conflicts.len() - 1)
            } else {
                first.clone()
            };
            bail!(TaroError::ImportConflict(detail));
        }
    }

    let mut result = ImportResult::default();
    for item in items {
        let exists = store
            .config_find(&item.data_id, &item.group, tenant)
            .await?
            .is_some();
        if exists {
            match policy {
                SameConfigPolicy::Abort => {
                    // A concurrent publish slipped past the pre-flight scan
                    result.fail_count += 1;
                    result.fail_data.push(ImportFailItem {
                        data_id: item.data_id,
                        group: item.group,
                        reason: "configuration already exists".to_string(),
                    });
                    continue;
                }
                SameConfigPolicy::Skip => {
                    result.skip_count += 1;
                    result.skip_data.push(ImportSkipItem {
                        data_id: item.data_id,
                        group: item.group,
                    });
                    continue;
                }
                SameConfigPolicy::Overwrite => {}
            }
        }

        let form = ConfigPublishForm {
            data_id: item.data_id.clone(),
            group: item.group.clone(),
            tenant: target_tenant.to_string(),
            content: item.content,
            tag: String::new(),
            app_name: item.app_name,
            src_user: src_user.to_string(),
            src_ip: src_ip.to_string(),
            config_tags: item.config_tags,
            desc: item.desc,
            r#type: item.config_type,
            encrypted_data_key: item.encrypted_data_key,
        };
        match publish_config(store, bus, &form, max_content).await {
            Ok(_) => result.success_count += 1,
            Err(e) => {
                result.fail_count += 1;
                result.fail_data.push(ImportFailItem {
                    data_id: item.data_id,
                    group: item.group,
                    reason: e.to_string(),
                });
            }
        }
    }

    Ok(result)
}
