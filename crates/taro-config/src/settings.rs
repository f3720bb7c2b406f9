//! Runtime settings for the configuration plane
//!
//! Settings are loaded from `conf/taro.yml` (optional) and `TARO_`-prefixed
//! environment variables; everything has a working default so an empty
//! source set still yields a usable plane.

use config::{Config, Environment};

use taro_api::model::{CONFIG_LONG_POLL_TIMEOUT, MIN_CONFIG_LONG_POLL_TIMEOUT};

/// Default cap on config content size in bytes
pub const DEFAULT_MAX_CONTENT: usize = 10 * 1024 * 1024;

/// Default bounded queue depth per change-bus subscriber
pub const DEFAULT_NOTIFY_QUEUE_SIZE: usize = 1024;

/// Default cap on listener sampling rounds
pub const DEFAULT_SAMPLE_WINDOWS_CAP: usize = 10;

/// Plane settings loaded from config files and environment
#[derive(Clone, Debug, Default)]
pub struct PlaneSettings {
    pub config: Config,
}

impl PlaneSettings {
    pub fn new() -> Self {
        let config = Config::builder()
            .add_source(config::File::with_name("conf/taro").required(false))
            .add_source(
                Environment::with_prefix("taro")
                    .separator(".")
                    .try_parsing(true),
            )
            .build()
            .expect("Failed to build configuration - check conf/taro.yml");

        PlaneSettings { config }
    }

    // ========================================================================
    // Content Limits
    // ========================================================================

    /// Maximum accepted config content size in bytes
    pub fn max_content(&self) -> usize {
        self.config
            .get_int("taro.config.maxContent")
            .unwrap_or(DEFAULT_MAX_CONTENT as i64) as usize
    }

    // ========================================================================
    // Long Poll
    // ========================================================================

    /// Upper clamp on a long-poll wait in milliseconds
    pub fn listen_timeout_ms(&self) -> i64 {
        self.config
            .get_int("taro.listen.maxTimeoutMs")
            .unwrap_or(CONFIG_LONG_POLL_TIMEOUT)
    }

    /// Lower clamp on a long-poll wait in milliseconds
    pub fn listen_min_timeout_ms(&self) -> i64 {
        self.config
            .get_int("taro.listen.minTimeoutMs")
            .unwrap_or(MIN_CONFIG_LONG_POLL_TIMEOUT)
    }

    /// Most sampling rounds a listener-status query may request
    pub fn sample_windows_cap(&self) -> usize {
        self.config
            .get_int("taro.listen.sampleWindows")
            .unwrap_or(DEFAULT_SAMPLE_WINDOWS_CAP as i64) as usize
    }

    // ========================================================================
    // Change Notification
    // ========================================================================

    /// Bounded queue depth per change-bus subscriber
    pub fn notify_queue_size(&self) -> usize {
        self.config
            .get_int("taro.notify.queueSize")
            .unwrap_or(DEFAULT_NOTIFY_QUEUE_SIZE as i64) as usize
    }
}
