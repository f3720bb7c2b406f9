//! Long-poll listener tracking
//!
//! Tracks which live long-poll sessions are watching which configurations,
//! and drives the wait/notify cycle that resolves those sessions. Sessions
//! are indexed both by config key and by session id so that teardown after
//! a resolved or abandoned poll is cheap.

use std::collections::{HashMap, HashSet};
use std::time::Duration;

use dashmap::DashMap;
use tokio::time::sleep;
use tracing::debug;
use uuid::Uuid;

use taro_api::model::{CONFIG_LONG_POLL_TIMEOUT, ConfigListenContext, MIN_CONFIG_LONG_POLL_TIMEOUT};
use taro_persistence::{ConfigStore, PlaneStore};

use crate::model::ConfigKey;
use crate::notify::{ConfigChangeBus, ConfigChangeEvent};

/// Delay between registry snapshots when sampling listener state
const SAMPLE_PERIOD_MS: u64 = 100;

/// One live long-poll registration for a single config
#[derive(Clone, Debug)]
pub struct SessionListener {
    pub session_id: String,
    pub client_ip: String,
    /// Fingerprint the client last observed
    pub md5: String,
    /// Tagged variant the client watches, empty for the formal record
    pub tag: String,
}

/// Tracks long-poll sessions and resolves them against the change stream
pub struct ListenerManager {
    /// Map from config key string to the sessions watching it
    listeners: DashMap<String, HashMap<String, SessionListener>>,
    /// Map from session id to watched key strings, for cleanup
    session_keys: DashMap<String, HashSet<String>>,
    min_wait_ms: i64,
    max_wait_ms: i64,
}

impl Default for ListenerManager {
    fn default() -> Self {
        Self::new()
    }
}

impl ListenerManager {
    pub fn new() -> Self {
        Self::with_wait_bounds(MIN_CONFIG_LONG_POLL_TIMEOUT, CONFIG_LONG_POLL_TIMEOUT)
    }

    /// Create a manager with custom wait clamping bounds (milliseconds)
    pub fn with_wait_bounds(min_wait_ms: i64, max_wait_ms: i64) -> Self {
        Self {
            listeners: DashMap::new(),
            session_keys: DashMap::new(),
            min_wait_ms,
            max_wait_ms,
        }
    }

    /// Wait for any watched config to change, or until the wait expires.
    ///
    /// The contexts are diffed against the store first: anything already
    /// stale resolves immediately. A non-positive `max_wait_ms` degrades to
    /// that no-wait poll; otherwise the wait is clamped to the configured
    /// bounds. The bus subscription is taken before the post-registration
    /// re-check, so a publish landing between the first diff and the
    /// registration is never lost.
    pub async fn poll_changes(
        &self,
        store: &dyn PlaneStore,
        bus: &ConfigChangeBus,
        contexts: &[ConfigListenContext],
        max_wait_ms: i64,
        client_ip: &str,
    ) -> anyhow::Result<Vec<ConfigKey>> {
        let changed = Self::diff_contexts(store, contexts).await?;
        if !changed.is_empty() || max_wait_ms <= 0 {
            return Ok(changed);
        }

        let wait_ms = max_wait_ms.clamp(self.min_wait_ms, self.max_wait_ms);

        let mut subscription = bus.subscribe();

        let session_id = Uuid::new_v4().to_string();
        self.register(&session_id, client_ip, contexts);
        let _guard = SessionGuard {
            manager: self,
            session_id,
        };

        // Close the race window: whatever was published before the
        // subscription existed shows up in this second diff
        let changed = Self::diff_contexts(store, contexts).await?;
        if !changed.is_empty() {
            return Ok(changed);
        }

        let timeout = sleep(Duration::from_millis(wait_ms as u64));
        tokio::pin!(timeout);

        let mut observed_drops = 0u64;
        loop {
            tokio::select! {
                event = subscription.recv() => {
                    let Some(event) = event else {
                        // Bus is gone, nothing further can arrive
                        return Ok(vec![]);
                    };
                    if subscription.dropped_events() > observed_drops {
                        // Events were lost to queue overflow; one of them may
                        // have been ours, so fall back to a full diff
                        observed_drops = subscription.dropped_events();
                        let changed = Self::diff_contexts(store, contexts).await?;
                        if !changed.is_empty() {
                            return Ok(changed);
                        }
                    }
                    if let Some(key) = Self::match_event(contexts, &event) {
                        return Ok(vec![key]);
                    }
                }
                _ = &mut timeout => {
                    return Ok(vec![]);
                }
            }
        }
    }

    /// All sessions currently watching a config
    pub fn snapshot(&self, key: &ConfigKey) -> Vec<SessionListener> {
        self.listeners
            .get(&key.to_key_string())
            .map(|sessions| sessions.values().cloned().collect())
            .unwrap_or_default()
    }

    /// All sessions registered from a client address
    pub fn snapshot_by_ip(&self, client_ip: &str) -> Vec<(ConfigKey, SessionListener)> {
        let mut result = Vec::new();
        for entry in self.listeners.iter() {
            for session in entry.value().values() {
                if session.client_ip == client_ip
                    && let Some(key) = ConfigKey::parse_key_string(entry.key())
                {
                    result.push((key, session.clone()));
                }
            }
        }
        result
    }

    /// Merge several registry snapshots for one config over short windows,
    /// newest observation winning. Returns client address -> observed md5.
    pub async fn collect_listener_status(
        &self,
        key: &ConfigKey,
        windows: usize,
    ) -> HashMap<String, String> {
        let mut merged = HashMap::new();
        for round in 0..windows.max(1) {
            if round > 0 {
                sleep(Duration::from_millis(SAMPLE_PERIOD_MS)).await;
            }
            for session in self.snapshot(key) {
                merged.insert(session.client_ip, session.md5);
            }
        }
        merged
    }

    /// Sampled view of everything one client address watches.
    /// Returns config key string -> observed md5.
    pub async fn collect_listener_status_by_ip(
        &self,
        client_ip: &str,
        windows: usize,
    ) -> HashMap<String, String> {
        let mut merged = HashMap::new();
        for round in 0..windows.max(1) {
            if round > 0 {
                sleep(Duration::from_millis(SAMPLE_PERIOD_MS)).await;
            }
            for (key, session) in self.snapshot_by_ip(client_ip) {
                merged.insert(key.to_key_string(), session.md5);
            }
        }
        merged
    }

    /// Number of live long-poll sessions
    pub fn session_count(&self) -> usize {
        self.session_keys.len()
    }

    /// Number of distinct configs with at least one watcher
    pub fn watched_key_count(&self) -> usize {
        self.listeners.len()
    }

    fn register(&self, session_id: &str, client_ip: &str, contexts: &[ConfigListenContext]) {
        for ctx in contexts {
            let key_string =
                ConfigKey::new(&ctx.data_id, &ctx.group, &ctx.tenant).to_key_string();

            self.listeners.entry(key_string.clone()).or_default().insert(
                session_id.to_string(),
                SessionListener {
                    session_id: session_id.to_string(),
                    client_ip: client_ip.to_string(),
                    md5: ctx.md5.clone(),
                    tag: ctx.tag.clone(),
                },
            );

            self.session_keys
                .entry(session_id.to_string())
                .or_default()
                .insert(key_string);
        }
        debug!(session_id, configs = contexts.len(), "registered long-poll session");
    }

    fn deregister(&self, session_id: &str) {
        if let Some((_, key_strings)) = self.session_keys.remove(session_id) {
            for key_string in key_strings {
                if let Some(mut sessions) = self.listeners.get_mut(&key_string) {
                    sessions.remove(session_id);
                    if sessions.is_empty() {
                        drop(sessions);
                        self.listeners.remove(&key_string);
                    }
                }
            }
        }
    }

    /// Diff the watched contexts against what the store holds now.
    /// A missing record diffs as the empty fingerprint.
    async fn diff_contexts(
        store: &dyn PlaneStore,
        contexts: &[ConfigListenContext],
    ) -> anyhow::Result<Vec<ConfigKey>> {
        let lookups = contexts.iter().map(|ctx| async move {
            let record_md5 = if ctx.tag.is_empty() {
                store
                    .config_find(&ctx.data_id, &ctx.group, &ctx.tenant)
                    .await?
                    .map(|c| c.md5)
            } else {
                store
                    .config_tag_find(&ctx.data_id, &ctx.group, &ctx.tenant, &ctx.tag)
                    .await?
                    .map(|c| c.md5)
            };
            anyhow::Ok((ctx, record_md5.unwrap_or_default()))
        });

        let observed = futures::future::try_join_all(lookups).await?;
        Ok(observed
            .into_iter()
            .filter(|(ctx, server_md5)| *server_md5 != ctx.md5)
            .map(|(ctx, _)| ConfigKey::new(&ctx.data_id, &ctx.group, &ctx.tenant))
            .collect())
    }

    /// Match an event against the watched contexts.
    ///
    /// Beta events never resolve a poll: whitelisted clients pick up canary
    /// content on the read path, not through change notification.
    fn match_event(contexts: &[ConfigListenContext], event: &ConfigChangeEvent) -> Option<ConfigKey> {
        if event.is_beta {
            return None;
        }
        contexts
            .iter()
            .find(|ctx| {
                ctx.data_id == event.data_id
                    && ctx.group == event.group
                    && ctx.tenant == event.tenant
                    && ctx.tag == event.tag
            })
            .map(|ctx| ConfigKey::new(&ctx.data_id, &ctx.group, &ctx.tenant))
    }
}

/// Removes a session from the registry when the poll future completes or
/// is dropped mid-wait
struct SessionGuard<'a> {
    manager: &'a ListenerManager,
    session_id: String,
}

impl Drop for SessionGuard<'_> {
    fn drop(&mut self) {
        self.manager.deregister(&self.session_id);
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use taro_persistence::{ConfigStore, ConfigWriteParam, MemoryStore};

    use super::*;

    fn context(data_id: &str, md5: &str) -> ConfigListenContext {
        ConfigListenContext::new(data_id, "DEFAULT_GROUP", "", md5)
    }

    async fn seed(store: &MemoryStore, data_id: &str, content: &str) -> String {
        store
            .config_create_or_update(&ConfigWriteParam {
                data_id: data_id.to_string(),
                group: "DEFAULT_GROUP".to_string(),
                content: content.to_string(),
                ..Default::default()
            })
            .await
            .unwrap();
        store
            .config_find(data_id, "DEFAULT_GROUP", "")
            .await
            .unwrap()
            .unwrap()
            .md5
    }

    // === Registry ===

    #[test]
    fn test_register_and_deregister() {
        let manager = ListenerManager::new();
        let contexts = vec![context("a.yaml", "m1"), context("b.yaml", "m2")];

        manager.register("s1", "10.0.0.1", &contexts);
        manager.register("s2", "10.0.0.2", &contexts[..1]);

        assert_eq!(manager.session_count(), 2);
        assert_eq!(manager.watched_key_count(), 2);

        let key = ConfigKey::new("a.yaml", "DEFAULT_GROUP", "");
        assert_eq!(manager.snapshot(&key).len(), 2);
        assert_eq!(manager.snapshot_by_ip("10.0.0.1").len(), 2);

        manager.deregister("s1");
        assert_eq!(manager.session_count(), 1);
        assert_eq!(manager.snapshot(&key).len(), 1);
        // b.yaml lost its only watcher
        assert_eq!(manager.watched_key_count(), 1);
    }

    #[tokio::test]
    async fn test_collect_listener_status_merges_rounds() {
        let manager = ListenerManager::new();
        let key = ConfigKey::new("a.yaml", "DEFAULT_GROUP", "");
        manager.register("s1", "10.0.0.1", &[context("a.yaml", "m1")]);

        let status = manager.collect_listener_status(&key, 1).await;
        assert_eq!(status.get("10.0.0.1").map(String::as_str), Some("m1"));

        let by_ip = manager.collect_listener_status_by_ip("10.0.0.1", 1).await;
        assert_eq!(
            by_ip.get(&key.to_key_string()).map(String::as_str),
            Some("m1")
        );
    }

    // === Polling ===

    #[tokio::test]
    async fn test_poll_resolves_immediately_on_stale_md5() {
        let store = MemoryStore::new();
        let bus = ConfigChangeBus::new(16);
        bus.start().await;
        let manager = ListenerManager::new();

        seed(&store, "app.yaml", "v1").await;

        let changed = manager
            .poll_changes(&store, &bus, &[context("app.yaml", "stale")], 30000, "10.0.0.1")
            .await
            .unwrap();
        assert_eq!(changed.len(), 1);
        assert_eq!(changed[0].data_id, "app.yaml");
        // No session lingers after resolution
        assert_eq!(manager.session_count(), 0);
    }

    #[tokio::test]
    async fn test_poll_missing_record_matches_empty_md5() {
        let store = MemoryStore::new();
        let bus = ConfigChangeBus::new(16);
        bus.start().await;
        let manager = ListenerManager::new();

        // Client already knows the key is absent: no change to report
        let changed = manager
            .poll_changes(&store, &bus, &[context("ghost.yaml", "")], 0, "10.0.0.1")
            .await
            .unwrap();
        assert!(changed.is_empty());

        // Client holds a fingerprint for a record that is gone: stale
        let changed = manager
            .poll_changes(&store, &bus, &[context("ghost.yaml", "old")], 0, "10.0.0.1")
            .await
            .unwrap();
        assert_eq!(changed.len(), 1);
    }

    #[tokio::test]
    async fn test_poll_times_out_empty() {
        let store = MemoryStore::new();
        let bus = ConfigChangeBus::new(16);
        bus.start().await;
        let manager = ListenerManager::with_wait_bounds(10, 50);

        let md5 = seed(&store, "app.yaml", "v1").await;

        let changed = manager
            .poll_changes(&store, &bus, &[context("app.yaml", &md5)], 20, "10.0.0.1")
            .await
            .unwrap();
        assert!(changed.is_empty());
        assert_eq!(manager.session_count(), 0);
    }

    #[tokio::test]
    async fn test_poll_resolves_on_matching_event() {
        let store = Arc::new(MemoryStore::new());
        let bus = Arc::new(ConfigChangeBus::new(16));
        bus.start().await;
        let manager = Arc::new(ListenerManager::new());

        let md5 = seed(&store, "app.yaml", "v1").await;

        let poll = {
            let store = store.clone();
            let bus = bus.clone();
            let manager = manager.clone();
            let md5 = md5.clone();
            tokio::spawn(async move {
                manager
                    .poll_changes(
                        store.as_ref() as &dyn PlaneStore,
                        &bus,
                        &[context("app.yaml", &md5)],
                        30000,
                        "10.0.0.1",
                    )
                    .await
            })
        };

        // Give the poll time to register, then publish the change
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(manager.session_count(), 1);
        bus.publish(ConfigChangeEvent::updated("app.yaml", "DEFAULT_GROUP", "", ""))
            .await;

        let changed = poll.await.unwrap().unwrap();
        assert_eq!(changed.len(), 1);
        assert_eq!(changed[0].data_id, "app.yaml");
        assert_eq!(manager.session_count(), 0);
    }

    #[tokio::test]
    async fn test_poll_ignores_beta_and_foreign_events() {
        let store = Arc::new(MemoryStore::new());
        let bus = Arc::new(ConfigChangeBus::new(16));
        bus.start().await;
        let manager = Arc::new(ListenerManager::with_wait_bounds(100, 200));

        let md5 = seed(&store, "app.yaml", "v1").await;

        let poll = {
            let store = store.clone();
            let bus = bus.clone();
            let manager = manager.clone();
            let md5 = md5.clone();
            tokio::spawn(async move {
                manager
                    .poll_changes(
                        store.as_ref() as &dyn PlaneStore,
                        &bus,
                        &[context("app.yaml", &md5)],
                        150,
                        "10.0.0.1",
                    )
                    .await
            })
        };

        tokio::time::sleep(Duration::from_millis(30)).await;
        // Neither a beta change of the watched key nor a change of another
        // key may resolve the poll
        bus.publish(
            ConfigChangeEvent::updated("app.yaml", "DEFAULT_GROUP", "", "").beta(),
        )
        .await;
        bus.publish(ConfigChangeEvent::updated("other.yaml", "DEFAULT_GROUP", "", ""))
            .await;

        let changed = poll.await.unwrap().unwrap();
        assert!(changed.is_empty());
    }

    #[test]
    fn test_match_event_requires_tag_equality() {
        let mut ctx = context("app.yaml", "m");
        ctx.tag = "gray".to_string();

        let formal = ConfigChangeEvent::updated("app.yaml", "DEFAULT_GROUP", "", "");
        assert!(ListenerManager::match_event(&[ctx.clone()], &formal).is_none());

        let tagged = ConfigChangeEvent::updated("app.yaml", "DEFAULT_GROUP", "", "gray");
        assert!(ListenerManager::match_event(&[ctx], &tagged).is_some());
    }
}
