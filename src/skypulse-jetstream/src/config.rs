//! Configuration for the Jetstream client.
//!
//! Supports loading configuration from:
//! - TOML configuration files
//! - Environment variables (`SKYPULSE_*`)
//!
//! Every field has a default, so an empty file or environment yields a
//! working configuration against the public Jetstream hosts.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::endpoints::EndpointPool;
use crate::error::{JetstreamError, JetstreamResult};

/// Public Jetstream hosts serving the same logical feed.
pub const DEFAULT_ENDPOINTS: &[&str] = &[
    "jetstream1.us-east.bsky.network",
    "jetstream2.us-east.bsky.network",
    "jetstream1.us-west.bsky.network",
    "jetstream2.us-west.bsky.network",
];

/// Collection NSID for posts.
pub const POST_COLLECTION: &str = "app.bsky.feed.post";

/// Environment variable names.
const ENV_ENDPOINTS: &str = "SKYPULSE_ENDPOINTS";
const ENV_COLLECTIONS: &str = "SKYPULSE_COLLECTIONS";
const ENV_HASHTAGS: &str = "SKYPULSE_HASHTAGS";
const ENV_IDLE_TIMEOUT: &str = "SKYPULSE_IDLE_TIMEOUT_SECS";
const ENV_SEED: &str = "SKYPULSE_SEED";

/// Jetstream client configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JetstreamConfig {
    /// Interchangeable endpoint hosts.
    #[serde(default = "default_endpoints")]
    pub endpoints: Vec<String>,

    /// Collections requested through `wantedCollections`.
    #[serde(default = "default_collections")]
    pub collections: Vec<String>,

    /// Seconds after a connection attempt starts before the session is
    /// closed, whether or not data is flowing.
    #[serde(default = "default_idle_timeout")]
    pub idle_timeout_secs: u64,

    /// Maximum number of characters in a sample token.
    #[serde(default = "default_sample_len")]
    pub sample_len: usize,

    /// Only sample posts carrying one of these hashtags (without `#`).
    #[serde(default)]
    pub hashtags: Vec<String>,

    /// Seed for endpoint and word selection.
    #[serde(default)]
    pub seed: Option<u64>,

    /// Use `wss://` (true) or plain `ws://` (false).
    #[serde(default = "default_true")]
    pub tls: bool,

    /// Seconds to wait for the server to complete a close handshake.
    #[serde(default = "default_close_timeout")]
    pub close_timeout_secs: u64,
}

fn default_endpoints() -> Vec<String> {
    DEFAULT_ENDPOINTS.iter().map(|s| s.to_string()).collect()
}

fn default_collections() -> Vec<String> {
    vec![POST_COLLECTION.to_string()]
}

fn default_idle_timeout() -> u64 {
    15
}

fn default_sample_len() -> usize {
    21
}

fn default_close_timeout() -> u64 {
    5
}

fn default_true() -> bool {
    true
}

impl Default for JetstreamConfig {
    fn default() -> Self {
        Self {
            endpoints: default_endpoints(),
            collections: default_collections(),
            idle_timeout_secs: default_idle_timeout(),
            sample_len: default_sample_len(),
            hashtags: Vec::new(),
            seed: None,
            tls: true,
            close_timeout_secs: default_close_timeout(),
        }
    }
}

impl JetstreamConfig {
    /// Load configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> JetstreamResult<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        debug!("Loaded Jetstream config from {}", path.display());
        Ok(config)
    }

    /// Load from environment variables, starting from the defaults.
    ///
    /// Recognised variables:
    /// - `SKYPULSE_ENDPOINTS` (comma separated)
    /// - `SKYPULSE_COLLECTIONS` (comma separated)
    /// - `SKYPULSE_HASHTAGS` (comma separated)
    /// - `SKYPULSE_IDLE_TIMEOUT_SECS`
    /// - `SKYPULSE_SEED`
    pub fn from_env() -> JetstreamResult<Self> {
        let mut config = Self::default();
        config.apply_env(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    /// Apply overrides read through `lookup`.
    pub fn apply_env<F>(&mut self, lookup: F) -> JetstreamResult<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(endpoints) = lookup(ENV_ENDPOINTS) {
            self.endpoints = split_list(&endpoints);
        }

        if let Some(collections) = lookup(ENV_COLLECTIONS) {
            self.collections = split_list(&collections);
        }

        if let Some(hashtags) = lookup(ENV_HASHTAGS) {
            self.hashtags = split_list(&hashtags);
        }

        if let Some(timeout) = lookup(ENV_IDLE_TIMEOUT) {
            self.idle_timeout_secs = timeout.trim().parse().map_err(|_| {
                JetstreamError::Config(format!("{ENV_IDLE_TIMEOUT} must be an integer: {timeout}"))
            })?;
        }

        if let Some(seed) = lookup(ENV_SEED) {
            self.seed = Some(seed.trim().parse().map_err(|_| {
                JetstreamError::Config(format!("{ENV_SEED} must be an integer: {seed}"))
            })?);
        }

        Ok(())
    }

    /// Get the idle timeout as Duration.
    pub fn idle_timeout(&self) -> Duration {
        Duration::from_secs(self.idle_timeout_secs)
    }

    /// Get the close handshake timeout as Duration.
    pub fn close_timeout(&self) -> Duration {
        Duration::from_secs(self.close_timeout_secs)
    }

    /// Build the endpoint pool, validating every endpoint.
    pub fn endpoint_pool(&self) -> JetstreamResult<EndpointPool> {
        EndpointPool::new(&self.endpoints, &self.collections, self.tls)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> JetstreamResult<()> {
        if self.endpoints.is_empty() {
            return Err(JetstreamError::Config("endpoint pool is empty".to_string()));
        }
        if self.collections.is_empty() {
            return Err(JetstreamError::Config(
                "at least one collection is required".to_string(),
            ));
        }
        if self.idle_timeout_secs == 0 {
            return Err(JetstreamError::Config(
                "idle timeout must be greater than zero".to_string(),
            ));
        }
        if self.sample_len == 0 {
            return Err(JetstreamError::Config(
                "sample length must be greater than zero".to_string(),
            ));
        }

        self.endpoint_pool().map(|_| ())
    }
}

fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}
