//! Integration tests for the configuration plane
//!
//! Exercises the facade end to end: publish/get/delete, beta lifecycle,
//! tagged variants, long-poll notification, search, history and namespaces.

use std::collections::HashSet;
use std::time::Duration;

use taro_api::model::ConfigListenContext;
use taro_common::md5_hex;
use taro_config::{
    ConfigChangeType, ConfigKey, ConfigPlane, ConfigPublishForm, PlaneSettings,
};

fn short_wait_plane() -> ConfigPlane {
    let config = config::Config::builder()
        .set_override("taro.listen.minTimeoutMs", 20)
        .unwrap()
        .set_override("taro.listen.maxTimeoutMs", 2000)
        .unwrap()
        .build()
        .unwrap();
    ConfigPlane::new(PlaneSettings { config })
}

fn form(data_id: &str, content: &str) -> ConfigPublishForm {
    ConfigPublishForm {
        data_id: data_id.to_string(),
        group: "DEFAULT_GROUP".to_string(),
        content: content.to_string(),
        ..Default::default()
    }
}

async fn current_md5(plane: &ConfigPlane, data_id: &str) -> String {
    plane
        .get(data_id, "DEFAULT_GROUP", "", "")
        .await
        .unwrap()
        .unwrap()
        .config_info
        .config_info_base
        .md5
}

// ============================================================================
// Publish / Get / History
// ============================================================================

#[tokio::test]
async fn test_publish_get_history_round_trip() {
    let plane = short_wait_plane();
    plane.start().await;

    assert!(plane.publish(&form("app.yaml", "v1")).await.unwrap());
    let found = plane
        .get("app.yaml", "DEFAULT_GROUP", "public", "")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(found.config_info.config_info_base.content, "v1");
    assert_eq!(found.config_info.config_info_base.md5, md5_hex("v1"));

    // Second publish is an update, not a create
    assert!(!plane.publish(&form("app.yaml", "v2")).await.unwrap());
    assert_eq!(current_md5(&plane, "app.yaml").await, md5_hex("v2"));

    let page = plane
        .history_page("app.yaml", "DEFAULT_GROUP", "", 1, 10)
        .await
        .unwrap();
    assert_eq!(page.total_count, 2);
    assert_eq!(page.page_items[0].op_type, "U");
    assert_eq!(page.page_items[1].op_type, "I");

    let first = plane
        .history_get(page.page_items[1].id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(first.content, "v1");

    plane.shutdown().await;
}

#[tokio::test]
async fn test_delete_idempotent_and_silent_when_absent() {
    let plane = short_wait_plane();
    plane.start().await;
    plane.publish(&form("app.yaml", "v1")).await.unwrap();

    let mut events = plane.subscribe();
    assert!(
        plane
            .delete("app.yaml", "DEFAULT_GROUP", "", "", "tester", "127.0.0.1")
            .await
            .unwrap()
    );
    let event = events.recv().await.unwrap();
    assert_eq!(event.change_type, ConfigChangeType::Delete);

    // Absent key: still Ok, no second event
    assert!(
        !plane
            .delete("app.yaml", "DEFAULT_GROUP", "", "", "tester", "127.0.0.1")
            .await
            .unwrap()
    );
    assert!(events.try_recv().is_none());
}

#[tokio::test]
async fn test_delete_batch_skips_unknown_ids() {
    let plane = short_wait_plane();
    plane.start().await;
    plane.publish(&form("keep.yaml", "k")).await.unwrap();
    plane.publish(&form("drop.yaml", "d")).await.unwrap();

    let page = plane
        .search(true, "", "drop.yaml", "", "", "", "", "", 1, 10)
        .await
        .unwrap();
    let drop_id = page.page_items[0].config_info_base.id;

    let mut events = plane.subscribe_to(ConfigChangeType::Delete);
    let removed = plane
        .delete_batch(&[drop_id, 424242], "tester", "127.0.0.1")
        .await
        .unwrap();
    assert_eq!(removed.len(), 1);
    assert_eq!(removed[0].data_id, "drop.yaml");

    // Exactly one delete event
    assert!(events.try_recv().is_some());
    assert!(events.try_recv().is_none());
    assert!(
        plane
            .get("keep.yaml", "DEFAULT_GROUP", "", "")
            .await
            .unwrap()
            .is_some()
    );
}

// ============================================================================
// Beta (Canary)
// ============================================================================

#[tokio::test]
async fn test_beta_lifecycle_and_whitelist() {
    let plane = short_wait_plane();
    plane.start().await;
    plane.publish(&form("app.yaml", "stable")).await.unwrap();

    plane
        .publish_beta(&form("app.yaml", "canary"), "10.1.1.1, 10.1.1.2")
        .await
        .unwrap();

    let beta = plane
        .get_beta("app.yaml", "DEFAULT_GROUP", "")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(beta.config_info.config_info_base.content, "canary");
    assert!(beta.covers_ip("10.1.1.2"));
    assert!(!beta.covers_ip("10.1.1.3"));

    // The formal record is untouched by the canary
    assert_eq!(current_md5(&plane, "app.yaml").await, md5_hex("stable"));

    assert!(
        plane
            .stop_beta("app.yaml", "DEFAULT_GROUP", "", "tester", "127.0.0.1")
            .await
            .unwrap()
    );
    // Absent beta: still success, nothing removed
    assert!(
        !plane
            .stop_beta("app.yaml", "DEFAULT_GROUP", "", "tester", "127.0.0.1")
            .await
            .unwrap()
    );
    assert_eq!(current_md5(&plane, "app.yaml").await, md5_hex("stable"));
}

// ============================================================================
// Tagged Variants
// ============================================================================

#[tokio::test]
async fn test_tagged_variant_is_separate_and_invisible_to_search() {
    let plane = short_wait_plane();
    plane.start().await;
    plane.publish(&form("app.yaml", "formal")).await.unwrap();

    let mut tagged = form("app.yaml", "gray content");
    tagged.tag = "gray".to_string();
    plane.publish(&tagged).await.unwrap();

    let variant = plane
        .get("app.yaml", "DEFAULT_GROUP", "", "gray")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(variant.config_info.config_info_base.content, "gray content");
    assert_eq!(current_md5(&plane, "app.yaml").await, md5_hex("formal"));

    // Search sees only the formal record
    let page = plane
        .search(false, "", "app*", "", "", "", "", "", 1, 10)
        .await
        .unwrap();
    assert_eq!(page.total_count, 1);

    // Deleting the formal record takes its variants with it
    plane
        .delete("app.yaml", "DEFAULT_GROUP", "", "", "tester", "127.0.0.1")
        .await
        .unwrap();
    assert!(
        plane
            .get("app.yaml", "DEFAULT_GROUP", "", "gray")
            .await
            .unwrap()
            .is_none()
    );
}

// ============================================================================
// Long Poll
// ============================================================================

#[tokio::test]
async fn test_listen_resolves_immediately_on_stale_md5() {
    let plane = short_wait_plane();
    plane.start().await;
    plane.publish(&form("app.yaml", "v1")).await.unwrap();

    let contexts = vec![ConfigListenContext::new(
        "app.yaml",
        "DEFAULT_GROUP",
        "public",
        "stale-fingerprint",
    )];
    let changed = plane.listen(&contexts, 0, "10.0.0.1").await.unwrap();
    assert_eq!(changed.len(), 1);
    assert_eq!(changed[0].data_id, "app.yaml");
}

#[tokio::test]
async fn test_listen_resolves_against_concurrent_publish() {
    let plane = short_wait_plane();
    plane.start().await;
    plane.publish(&form("race.yaml", "v1")).await.unwrap();
    let md5 = current_md5(&plane, "race.yaml").await;

    // The publish races the listener registration; whichever side wins,
    // the poll must resolve with the changed key
    let contexts = vec![ConfigListenContext::new(
        "race.yaml",
        "DEFAULT_GROUP",
        "",
        &md5,
    )];
    let listen = plane.listen(&contexts, 2000, "10.0.0.1");
    let publish = async {
        tokio::task::yield_now().await;
        plane.publish(&form("race.yaml", "v2")).await.unwrap();
    };
    let (changed, _) = tokio::join!(listen, publish);
    let changed = changed.unwrap();
    assert_eq!(changed.len(), 1);
    assert_eq!(changed[0].data_id, "race.yaml");
}

#[tokio::test]
async fn test_listen_resolves_on_later_publish() {
    let plane = short_wait_plane();
    plane.start().await;
    plane.publish(&form("app.yaml", "v1")).await.unwrap();
    let md5 = current_md5(&plane, "app.yaml").await;

    let handle = {
        let plane = plane.clone();
        tokio::spawn(async move {
            let contexts = vec![ConfigListenContext::new(
                "app.yaml",
                "DEFAULT_GROUP",
                "",
                &md5,
            )];
            plane.listen(&contexts, 2000, "10.0.0.1").await
        })
    };

    // Let the session register and suspend, then publish
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(plane.listeners().session_count(), 1);
    plane.publish(&form("app.yaml", "v2")).await.unwrap();

    let changed = handle.await.unwrap().unwrap();
    assert_eq!(changed.len(), 1);
    assert_eq!(changed[0].data_id, "app.yaml");
    assert_eq!(plane.listeners().session_count(), 0);
}

#[tokio::test]
async fn test_listen_times_out_empty() {
    let plane = short_wait_plane();
    plane.start().await;
    plane.publish(&form("app.yaml", "v1")).await.unwrap();
    let md5 = current_md5(&plane, "app.yaml").await;

    let contexts = vec![ConfigListenContext::new(
        "app.yaml",
        "DEFAULT_GROUP",
        "",
        &md5,
    )];
    let changed = plane.listen(&contexts, 50, "10.0.0.1").await.unwrap();
    assert!(changed.is_empty());
}

#[tokio::test]
async fn test_sample_listeners_during_poll() {
    let plane = short_wait_plane();
    plane.start().await;
    plane.publish(&form("app.yaml", "v1")).await.unwrap();
    let md5 = current_md5(&plane, "app.yaml").await;

    let handle = {
        let plane = plane.clone();
        let md5 = md5.clone();
        tokio::spawn(async move {
            let contexts = vec![ConfigListenContext::new(
                "app.yaml",
                "DEFAULT_GROUP",
                "public",
                &md5,
            )];
            plane.listen(&contexts, 2000, "172.16.0.9").await
        })
    };
    tokio::time::sleep(Duration::from_millis(100)).await;

    let key = ConfigKey::new("app.yaml", "DEFAULT_GROUP", "public");
    let info = plane.sample_listeners(&key, 1).await;
    assert_eq!(info.query_type, "config");
    assert_eq!(info.listeners_status.get("172.16.0.9"), Some(&md5));

    let by_ip = plane.sample_listeners_by_ip("172.16.0.9", 1).await;
    assert_eq!(by_ip.query_type, "ip");
    assert!(
        by_ip
            .listeners_status
            .contains_key("@@DEFAULT_GROUP@@app.yaml")
    );

    // Resolve the poll so the spawned task finishes
    plane.publish(&form("app.yaml", "v2")).await.unwrap();
    handle.await.unwrap().unwrap();
}

// ============================================================================
// Search
// ============================================================================

#[tokio::test]
async fn test_search_pagination_and_fuzzy_superset() {
    let plane = short_wait_plane();
    plane.start().await;
    for i in 0..15 {
        plane
            .publish(&form(&format!("svc-{i:02}.yaml"), "x"))
            .await
            .unwrap();
    }
    plane.publish(&form("other.yaml", "y")).await.unwrap();

    let page = plane
        .search(false, "", "svc-*", "", "", "", "", "", 2, 10)
        .await
        .unwrap();
    assert_eq!(page.total_count, 15);
    assert_eq!(page.pages_available, 2);
    assert_eq!(page.page_items.len(), 5);

    // Every exact hit shows up in the matching fuzzy query
    let exact = plane
        .search(true, "", "svc-07.yaml", "", "", "", "", "", 1, 100)
        .await
        .unwrap();
    let fuzzy = plane
        .search(false, "", "svc-*", "", "", "", "", "", 1, 100)
        .await
        .unwrap();
    let fuzzy_ids: HashSet<String> = fuzzy
        .page_items
        .iter()
        .map(|c| c.config_info_base.data_id.clone())
        .collect();
    assert!(!exact.page_items.is_empty());
    for hit in &exact.page_items {
        assert!(fuzzy_ids.contains(&hit.config_info_base.data_id));
    }
}

// ============================================================================
// Namespaces
// ============================================================================

#[tokio::test]
async fn test_namespace_lifecycle_through_plane() {
    let plane = short_wait_plane();
    plane.start().await;

    let all = plane.namespace_list().await.unwrap();
    assert_eq!(all[0].namespace_id, "public");

    let id = plane.namespace_create("dev", "dev", "team dev").await.unwrap();
    assert_eq!(id, "dev");
    assert!(plane.namespace_exists("dev").await.unwrap());
    assert!(plane.namespace_create("dev", "dev", "").await.is_err());

    let mut dev_form = form("app.yaml", "dev content");
    dev_form.tenant = "dev".to_string();
    plane.publish(&dev_form).await.unwrap();

    let found = plane
        .get("app.yaml", "DEFAULT_GROUP", "dev", "")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(found.config_info.tenant, "dev");
    // Isolated from the public namespace
    assert!(
        plane
            .get("app.yaml", "DEFAULT_GROUP", "", "")
            .await
            .unwrap()
            .is_none()
    );

    let dev = plane.namespace_get("dev").await.unwrap().unwrap();
    assert_eq!(dev.config_count, 1);

    plane.namespace_update("dev", "dev-renamed", "").await.unwrap();
    assert!(plane.namespace_delete("public").await.is_err());
    assert!(plane.namespace_delete("dev").await.unwrap());
    assert!(!plane.namespace_exists("dev").await.unwrap());
}
