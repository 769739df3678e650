//! Configuration types

use crate::queue::{DEFAULT_EXTENSION, QueueLayout, local_machine_name};
use crate::receive::{CircuitBreakerConfig, ReceiveSettings};
use crate::root::{DEFAULT_MARKER, FixedRoot, MarkerRoot, RootLocator, default_mount_parents};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

/// Complete configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Working root discovery
    #[serde(default)]
    pub root: RootConfig,
    /// Queue naming
    #[serde(default)]
    pub queue: QueueConfig,
    /// Receive loop tuning
    #[serde(default)]
    pub receive: ReceiveConfig,
    /// Circuit breaker tuning
    #[serde(default)]
    pub breaker: BreakerConfig,
    /// Outgoing-queue report
    #[serde(default)]
    pub report: ReportConfig,
}

/// Working root discovery
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RootConfig {
    /// Explicit working root; disables marker probing when set
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
    /// Marker directory name at the top of a volume
    #[serde(default = "default_marker")]
    pub marker: String,
    /// Directories probed directly as volume roots
    #[serde(default)]
    pub volumes: Vec<PathBuf>,
    /// Directories whose children and grandchildren are probed as volumes
    #[serde(default = "default_mount_parents")]
    pub mount_parents: Vec<PathBuf>,
}

impl Default for RootConfig {
    fn default() -> Self {
        Self {
            path: None,
            marker: default_marker(),
            volumes: Vec::new(),
            mount_parents: default_mount_parents(),
        }
    }
}

fn default_marker() -> String {
    DEFAULT_MARKER.to_string()
}

/// Queue naming
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueueConfig {
    /// Local machine name (default: host name)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub machine: Option<String>,
    /// Message file extension
    #[serde(default = "default_extension")]
    pub extension: String,
    /// Delete everything in the input queue when a receiver starts
    #[serde(default)]
    pub purge_on_startup: bool,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            machine: None,
            extension: default_extension(),
            purge_on_startup: false,
        }
    }
}

fn default_extension() -> String {
    DEFAULT_EXTENSION.to_string()
}

/// Receive loop tuning
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReceiveConfig {
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
    #[serde(default = "default_backoff_base_ms")]
    pub backoff_base_ms: u64,
    #[serde(default = "default_backoff_max_ms")]
    pub backoff_max_ms: u64,
    #[serde(default = "default_claim_attempts")]
    pub claim_attempts: u32,
    #[serde(default = "default_claim_retry_ms")]
    pub claim_retry_ms: u64,
}

impl Default for ReceiveConfig {
    fn default() -> Self {
        Self {
            concurrency: default_concurrency(),
            backoff_base_ms: default_backoff_base_ms(),
            backoff_max_ms: default_backoff_max_ms(),
            claim_attempts: default_claim_attempts(),
            claim_retry_ms: default_claim_retry_ms(),
        }
    }
}

fn default_concurrency() -> usize {
    1
}

fn default_backoff_base_ms() -> u64 {
    50
}

fn default_backoff_max_ms() -> u64 {
    10_000
}

fn default_claim_attempts() -> u32 {
    3
}

fn default_claim_retry_ms() -> u64 {
    10
}

/// Circuit breaker tuning
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BreakerConfig {
    #[serde(default = "default_window_secs")]
    pub window_secs: u64,
    #[serde(default = "default_delay_after_failure_ms")]
    pub delay_after_failure_ms: u64,
    #[serde(default = "default_failure_threshold")]
    pub failure_threshold: u32,
}

impl Default for BreakerConfig {
    fn default() -> Self {
        Self {
            window_secs: default_window_secs(),
            delay_after_failure_ms: default_delay_after_failure_ms(),
            failure_threshold: default_failure_threshold(),
        }
    }
}

fn default_window_secs() -> u64 {
    120
}

fn default_delay_after_failure_ms() -> u64 {
    10_000
}

fn default_failure_threshold() -> u32 {
    1
}

/// Outgoing-queue report
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportConfig {
    #[serde(default = "default_report_enabled")]
    pub enabled: bool,
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            enabled: default_report_enabled(),
            interval_secs: default_interval_secs(),
        }
    }
}

fn default_report_enabled() -> bool {
    true
}

fn default_interval_secs() -> u64 {
    60
}

impl Config {
    /// Root locator for this configuration, consulted fresh on every call.
    pub fn locator(&self) -> Arc<dyn RootLocator> {
        if let Some(path) = &self.root.path {
            return Arc::new(FixedRoot::new(path));
        }

        let locator = self
            .root
            .volumes
            .iter()
            .fold(MarkerRoot::new(&self.root.marker), |l, v| l.with_volume(v));
        let locator = self
            .root
            .mount_parents
            .iter()
            .fold(locator, |l, p| l.with_mount_parent(p));
        Arc::new(locator)
    }

    pub fn layout(&self) -> QueueLayout {
        let machine = self
            .queue
            .machine
            .clone()
            .filter(|m| !m.trim().is_empty())
            .unwrap_or_else(local_machine_name);
        QueueLayout::new(machine, &self.queue.extension)
    }

    pub fn receive_settings(&self) -> ReceiveSettings {
        ReceiveSettings {
            concurrency: self.receive.concurrency.max(1),
            backoff_base: Duration::from_millis(self.receive.backoff_base_ms),
            backoff_max: Duration::from_millis(self.receive.backoff_max_ms),
            claim_attempts: self.receive.claim_attempts.max(1),
            claim_retry_delay: Duration::from_millis(self.receive.claim_retry_ms),
            purge_on_startup: self.queue.purge_on_startup,
        }
    }

    pub fn breaker_config(&self) -> CircuitBreakerConfig {
        CircuitBreakerConfig {
            window: Duration::from_secs(self.breaker.window_secs),
            delay_after_failure: Duration::from_millis(self.breaker.delay_after_failure_ms),
            failure_threshold: self.breaker.failure_threshold,
            ..CircuitBreakerConfig::default()
        }
    }

    pub fn report_interval(&self) -> Option<Duration> {
        (self.report.enabled && self.report.interval_secs > 0)
            .then(|| Duration::from_secs(self.report.interval_secs))
    }

    /// Transport built from this configuration.
    pub fn transport(&self) -> crate::Transport {
        crate::Transport::with_shared_locator(self.locator(), self.layout())
            .with_receive_settings(self.receive_settings())
            .with_breaker_config(self.breaker_config())
    }
}
