//! Configuration Module
//!
//! Store options and server configuration loaded from environment variables.

use std::env;
use std::path::PathBuf;
use std::time::Duration;

use serde::Serialize;

use crate::backend::MIN_IMAGE_SIZE;

/// Default backing image name inside the store directory
pub const DEFAULT_NAME: &str = "shm_cache";

/// Default time budget for a reactive prune pass
pub const DEFAULT_MAX_PRUNE_TIME: Duration = Duration::from_secs(2);

/// Default share of total capacity a reactive prune tries to get down to
pub const DEFAULT_PRUNE_TARGET_RATIO: f64 = 0.75;

// == Store Options ==
/// Options a cache store is opened with.
///
/// ```rust
/// use shm_cache::config::StoreOptions;
/// use std::time::Duration;
///
/// let options = StoreOptions::default()
///     .with_name("sessions")
///     .with_size(64 * 1024 * 1024)
///     .with_max_prune_time(Duration::from_millis(500));
/// assert_eq!(options.size_mb(), 64);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StoreOptions {
    /// Directory the backing image lives in
    pub directory: PathBuf,
    /// Backing image identifier
    pub name: String,
    /// Capacity in bytes; raised to the image minimum when smaller
    pub size: u64,
    /// Time budget for reactive pruning
    pub max_prune_time: Duration,
    /// Reactive prune target as a share of total capacity
    pub prune_target_ratio: f64,
    /// Expiry applied to writes that carry no TTL of their own
    pub expires_in: Option<Duration>,
}

impl Default for StoreOptions {
    fn default() -> Self {
        Self {
            directory: env::temp_dir(),
            name: DEFAULT_NAME.to_string(),
            size: MIN_IMAGE_SIZE,
            max_prune_time: DEFAULT_MAX_PRUNE_TIME,
            prune_target_ratio: DEFAULT_PRUNE_TARGET_RATIO,
            expires_in: None,
        }
    }
}

impl StoreOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_directory(mut self, directory: impl Into<PathBuf>) -> Self {
        self.directory = directory.into();
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Sets the capacity in bytes. Values below the image minimum are
    /// raised to it.
    pub fn with_size(mut self, size: u64) -> Self {
        self.size = size.max(MIN_IMAGE_SIZE);
        self
    }

    pub fn with_max_prune_time(mut self, max_prune_time: Duration) -> Self {
        self.max_prune_time = max_prune_time;
        self
    }

    /// Sets the reactive prune target ratio, clamped to `0.0..=1.0`.
    pub fn with_prune_target_ratio(mut self, ratio: f64) -> Self {
        self.prune_target_ratio = ratio.clamp(0.0, 1.0);
        self
    }

    pub fn with_expires_in(mut self, expires_in: Duration) -> Self {
        self.expires_in = Some(expires_in);
        self
    }

    /// Location of the backing image.
    pub fn image_path(&self) -> PathBuf {
        self.directory.join(&self.name)
    }

    /// Capacity in whole MiB, never below the image minimum.
    pub fn size_mb(&self) -> u64 {
        self.size.max(MIN_IMAGE_SIZE) / (1024 * 1024)
    }
}

/// Server configuration parameters.
///
/// All values can be configured via environment variables with sensible defaults.
#[derive(Debug, Clone)]
pub struct Config {
    /// Options for the served cache store
    pub store: StoreOptions,
    /// HTTP server port
    pub server_port: u16,
    /// Background cleanup task interval in seconds
    pub cleanup_interval: u64,
}

fn env_parse<T: std::str::FromStr>(name: &str) -> Option<T> {
    env::var(name).ok().and_then(|v| v.parse().ok())
}

impl Config {
    /// Creates a new Config by loading values from environment variables.
    ///
    /// # Environment Variables
    /// - `CACHE_DIRECTORY` - Backing image directory (default: system temp dir)
    /// - `CACHE_NAME` - Backing image name (default: shm_cache)
    /// - `CACHE_SIZE` - Capacity in bytes (default and minimum: 16 MiB)
    /// - `MAX_PRUNE_TIME_MS` - Reactive prune budget in milliseconds (default: 2000)
    /// - `PRUNE_TARGET_RATIO` - Reactive prune target ratio (default: 0.75)
    /// - `SERVER_PORT` - HTTP server port (default: 3000)
    /// - `CLEANUP_INTERVAL` - Cleanup frequency in seconds (default: 60)
    pub fn from_env() -> Self {
        let mut store = StoreOptions::default();

        if let Ok(directory) = env::var("CACHE_DIRECTORY") {
            store = store.with_directory(directory);
        }
        if let Ok(name) = env::var("CACHE_NAME") {
            store = store.with_name(name);
        }
        if let Some(size) = env_parse::<u64>("CACHE_SIZE") {
            store = store.with_size(size);
        }
        if let Some(ms) = env_parse::<u64>("MAX_PRUNE_TIME_MS") {
            store = store.with_max_prune_time(Duration::from_millis(ms));
        }
        if let Some(ratio) = env_parse::<f64>("PRUNE_TARGET_RATIO") {
            store = store.with_prune_target_ratio(ratio);
        }

        Self {
            store,
            server_port: env_parse("SERVER_PORT").unwrap_or(3000),
            cleanup_interval: env_parse("CLEANUP_INTERVAL").unwrap_or(60),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            store: StoreOptions::default(),
            server_port: 3000,
            cleanup_interval: 60,
        }
    }
}
