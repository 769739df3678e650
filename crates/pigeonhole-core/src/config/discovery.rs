//! Configuration discovery and resolution

use super::types::Config;
use crate::home::global_config_path;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::warn;

/// Configuration error
#[derive(Debug, Error)]
pub enum ConfigError {
    /// I/O error
    #[error("I/O error reading {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// TOML parsing error
    #[error("TOML parsing error in {path}: {source}")]
    TomlParse {
        path: PathBuf,
        source: toml::de::Error,
    },

    /// Semantically invalid value
    #[error("Invalid value for {key}: {message}")]
    Invalid { key: &'static str, message: String },
}

/// Command-line overrides for configuration
#[derive(Debug, Default, Clone)]
pub struct ConfigOverrides {
    /// Explicit working root
    pub root: Option<PathBuf>,
    /// Local machine name
    pub machine: Option<String>,
    /// Worker count
    pub concurrency: Option<usize>,
    /// Path to config file override
    pub config_path: Option<PathBuf>,
}

/// Resolve configuration from all sources
///
/// Priority (highest to lowest):
/// 1. Command-line overrides
/// 2. Environment variables (`PIGEONHOLE_ROOT`, `PIGEONHOLE_MACHINE`,
///    `PIGEONHOLE_CONCURRENCY`)
/// 3. Explicit config file (`--config`)
/// 4. Global config (`<home>/.config/pigeonhole/config.toml`)
/// 5. Defaults
///
/// Both files are layered key by key, so an explicit file only replaces the
/// settings it names. An unreadable or unparseable global file is warned
/// about and skipped; an explicit `--config` file that cannot be loaded is
/// an error.
pub fn resolve_config(overrides: &ConfigOverrides, home_dir: &Path) -> Result<Config, ConfigError> {
    let global_config_path = global_config_path(home_dir);
    let mut table = toml::Table::new();
    if global_config_path.exists() {
        match load_config_table(&global_config_path) {
            Ok(global) => table = global,
            Err(e) => warn!("Ignoring global config: {e}"),
        }
    }

    let mut source = global_config_path;
    if let Some(path) = &overrides.config_path {
        merge_tables(&mut table, load_config_table(path)?);
        source = path.clone();
    }

    let mut config = table_to_config(table, &source)?;
    apply_env_overrides(&mut config)?;
    apply_cli_overrides(&mut config, overrides);
    validate(&config)?;

    Ok(config)
}

/// Load config from a TOML file
pub fn load_config_file(path: &Path) -> Result<Config, ConfigError> {
    table_to_config(load_config_table(path)?, path)
}

/// Read a config file as a raw table, checking that it deserializes.
fn load_config_table(path: &Path) -> Result<toml::Table, ConfigError> {
    let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let table: toml::Table =
        toml::from_str(&contents).map_err(|source| ConfigError::TomlParse {
            path: path.to_path_buf(),
            source,
        })?;
    table_to_config(table.clone(), path)?;
    Ok(table)
}

fn table_to_config(table: toml::Table, path: &Path) -> Result<Config, ConfigError> {
    toml::Value::Table(table)
        .try_into()
        .map_err(|source| ConfigError::TomlParse {
            path: path.to_path_buf(),
            source,
        })
}

/// Overlay `overlay` onto `base`; nested tables merge, other values replace.
fn merge_tables(base: &mut toml::Table, overlay: toml::Table) {
    for (key, value) in overlay {
        match (base.get_mut(&key), value) {
            (Some(toml::Value::Table(existing)), toml::Value::Table(nested)) => {
                merge_tables(existing, nested);
            }
            (_, value) => {
                base.insert(key, value);
            }
        }
    }
}

/// Apply environment variable overrides
fn apply_env_overrides(config: &mut Config) -> Result<(), ConfigError> {
    if let Some(root) = non_empty_env("PIGEONHOLE_ROOT") {
        config.root.path = Some(PathBuf::from(root));
    }

    if let Some(machine) = non_empty_env("PIGEONHOLE_MACHINE") {
        config.queue.machine = Some(machine);
    }

    if let Some(concurrency) = non_empty_env("PIGEONHOLE_CONCURRENCY") {
        config.receive.concurrency =
            concurrency
                .trim()
                .parse()
                .map_err(|e: std::num::ParseIntError| ConfigError::Invalid {
                    key: "PIGEONHOLE_CONCURRENCY",
                    message: e.to_string(),
                })?;
    }

    Ok(())
}

fn non_empty_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

/// Apply command-line overrides
fn apply_cli_overrides(config: &mut Config, overrides: &ConfigOverrides) {
    if let Some(ref root) = overrides.root {
        config.root.path = Some(root.clone());
    }

    if let Some(ref machine) = overrides.machine {
        config.queue.machine = Some(machine.clone());
    }

    if let Some(concurrency) = overrides.concurrency {
        config.receive.concurrency = concurrency;
    }
}

fn validate(config: &Config) -> Result<(), ConfigError> {
    if config.receive.concurrency == 0 {
        return Err(ConfigError::Invalid {
            key: "receive.concurrency",
            message: "must be at least 1".to_string(),
        });
    }

    if config.receive.backoff_max_ms < config.receive.backoff_base_ms {
        return Err(ConfigError::Invalid {
            key: "receive.backoff_max_ms",
            message: format!(
                "{} is below backoff_base_ms ({})",
                config.receive.backoff_max_ms, config.receive.backoff_base_ms
            ),
        });
    }

    let extension = config.queue.extension.trim_start_matches('.');
    if extension.is_empty() || extension.contains(['/', '\\', '.']) {
        return Err(ConfigError::Invalid {
            key: "queue.extension",
            message: format!("'{}' is not a usable file extension", config.queue.extension),
        });
    }

    if config.root.marker.trim().is_empty() {
        return Err(ConfigError::Invalid {
            key: "root.marker",
            message: "must not be empty".to_string(),
        });
    }

    Ok(())
}
