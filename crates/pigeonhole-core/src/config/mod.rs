//! Configuration resolution
//!
//! Resolves configuration from multiple sources with priority:
//! 1. Command-line flags (passed as parameters)
//! 2. Environment variables
//! 3. Explicit config file
//! 4. Global config (~/.config/pigeonhole/config.toml)
//! 5. Defaults

mod discovery;
mod types;

pub use discovery::{ConfigError, ConfigOverrides, load_config_file, resolve_config};
pub use types::{BreakerConfig, Config, QueueConfig, ReceiveConfig, ReportConfig, RootConfig};
