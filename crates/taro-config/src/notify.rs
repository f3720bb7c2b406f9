// Config change event handling
// Provides event-driven notifications for configuration changes

use tokio::sync::{RwLock, broadcast};
use tracing::{debug, info, warn};

use crate::model::ConfigKey;

/// Type of config change event
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConfigChangeType {
    /// A config was created
    Add,
    /// An existing config's content or metadata changed
    Update,
    /// A config was removed
    Delete,
}

impl std::fmt::Display for ConfigChangeType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigChangeType::Add => write!(f, "ADD"),
            ConfigChangeType::Update => write!(f, "UPDATE"),
            ConfigChangeType::Delete => write!(f, "DELETE"),
        }
    }
}

/// Config change event
#[derive(Clone, Debug)]
pub struct ConfigChangeEvent {
    /// Type of change
    pub change_type: ConfigChangeType,
    pub data_id: String,
    pub group: String,
    pub tenant: String,
    /// Tagged variant this change applies to, empty for the formal record
    pub tag: String,
    /// Whether this change concerns the beta record
    pub is_beta: bool,
    /// Timestamp of the event
    pub timestamp: i64,
}

impl ConfigChangeEvent {
    /// Create a new config added event
    pub fn added(data_id: &str, group: &str, tenant: &str, tag: &str) -> Self {
        Self::build(ConfigChangeType::Add, data_id, group, tenant, tag)
    }

    /// Create a new config updated event
    pub fn updated(data_id: &str, group: &str, tenant: &str, tag: &str) -> Self {
        Self::build(ConfigChangeType::Update, data_id, group, tenant, tag)
    }

    /// Create a new config deleted event
    pub fn deleted(data_id: &str, group: &str, tenant: &str, tag: &str) -> Self {
        Self::build(ConfigChangeType::Delete, data_id, group, tenant, tag)
    }

    /// Mark the event as concerning the beta record
    pub fn beta(mut self) -> Self {
        self.is_beta = true;
        self
    }

    pub fn key(&self) -> ConfigKey {
        ConfigKey::new(&self.data_id, &self.group, &self.tenant)
    }

    fn build(
        change_type: ConfigChangeType,
        data_id: &str,
        group: &str,
        tenant: &str,
        tag: &str,
    ) -> Self {
        Self {
            change_type,
            data_id: data_id.to_string(),
            group: group.to_string(),
            tenant: tenant.to_string(),
            tag: tag.to_string(),
            is_beta: false,
            timestamp: chrono::Utc::now().timestamp_millis(),
        }
    }
}

/// Config change event bus
/// Fans every published event out to all current subscriptions
pub struct ConfigChangeBus {
    /// Broadcast sender for events
    broadcast_tx: broadcast::Sender<ConfigChangeEvent>,
    /// Whether the bus is running
    running: RwLock<bool>,
}

impl ConfigChangeBus {
    /// Create a new event bus with a bounded per-subscriber queue
    pub fn new(queue_size: usize) -> Self {
        let (broadcast_tx, _) = broadcast::channel(queue_size);

        Self {
            broadcast_tx,
            running: RwLock::new(false),
        }
    }

    /// Start the event bus
    pub async fn start(&self) {
        let mut running = self.running.write().await;
        if *running {
            return;
        }
        *running = true;
        info!("Starting config change event bus");
    }

    /// Stop the event bus; further publishes are dropped
    pub async fn stop(&self) {
        let mut running = self.running.write().await;
        *running = false;
        info!("Stopped config change event bus");
    }

    /// Publish a config change event to all subscriptions
    pub async fn publish(&self, event: ConfigChangeEvent) {
        let is_running = *self.running.read().await;
        if !is_running {
            return;
        }

        debug!(
            "Publishing config change event: {} for {}@@{}@@{} (beta: {})",
            event.change_type, event.tenant, event.group, event.data_id, event.is_beta
        );

        // Send fails only when no subscription exists, which is fine
        let _ = self.broadcast_tx.send(event);
    }

    /// Subscribe to the whole event stream
    pub fn subscribe(&self) -> ChangeSubscription {
        ChangeSubscription {
            rx: self.broadcast_tx.subscribe(),
            filter: None,
            dropped: 0,
        }
    }

    /// Subscribe to events of a single change kind
    pub fn subscribe_to(&self, change_type: ConfigChangeType) -> ChangeSubscription {
        ChangeSubscription {
            rx: self.broadcast_tx.subscribe(),
            filter: Some(change_type),
            dropped: 0,
        }
    }

    /// Number of live subscriptions
    pub fn subscription_count(&self) -> usize {
        self.broadcast_tx.receiver_count()
    }
}

/// One subscriber's view of the event stream
///
/// The per-subscriber queue is bounded; when a slow subscriber falls behind,
/// the oldest events are dropped and counted rather than blocking publishers.
pub struct ChangeSubscription {
    rx: broadcast::Receiver<ConfigChangeEvent>,
    filter: Option<ConfigChangeType>,
    dropped: u64,
}

impl ChangeSubscription {
    /// Receive the next matching event
    ///
    /// Returns `None` once the bus has been dropped and the queue is drained.
    pub async fn recv(&mut self) -> Option<ConfigChangeEvent> {
        loop {
            match self.rx.recv().await {
                Ok(event) => {
                    if let Some(kind) = self.filter
                        && event.change_type != kind
                    {
                        continue;
                    }
                    return Some(event);
                }
                Err(broadcast::error::RecvError::Lagged(missed)) => {
                    self.dropped += missed;
                    warn!(missed, "change subscription lagged, oldest events dropped");
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }

    /// Receive the next matching event without waiting
    ///
    /// Returns `None` when the queue is empty or the bus is gone.
    pub fn try_recv(&mut self) -> Option<ConfigChangeEvent> {
        loop {
            match self.rx.try_recv() {
                Ok(event) => {
                    if let Some(kind) = self.filter
                        && event.change_type != kind
                    {
                        continue;
                    }
                    return Some(event);
                }
                Err(broadcast::error::TryRecvError::Lagged(missed)) => {
                    self.dropped += missed;
                    warn!(missed, "change subscription lagged, oldest events dropped");
                }
                Err(_) => return None,
            }
        }
    }

    /// Total events this subscription has lost to queue overflow
    pub fn dropped_events(&self) -> u64 {
        self.dropped
    }
}
