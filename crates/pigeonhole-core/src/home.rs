//! Home directory resolution
//!
//! The global configuration file lives under the home directory. Tests and
//! custom deployments point it elsewhere with `PIGEONHOLE_HOME`.
//!
//! # Precedence
//!
//! 1. `PIGEONHOLE_HOME` environment variable (if set and non-empty)
//! 2. `dirs::home_dir()` platform default

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

/// Environment variable overriding the home directory.
pub const HOME_ENV: &str = "PIGEONHOLE_HOME";

/// Get the home directory for pigeonhole configuration.
///
/// # Errors
///
/// Returns an error if `PIGEONHOLE_HOME` is unset and the platform home
/// directory cannot be determined.
pub fn get_home_dir() -> Result<PathBuf> {
    if let Ok(home) = std::env::var(HOME_ENV) {
        let trimmed = home.trim();
        if !trimmed.is_empty() {
            return Ok(PathBuf::from(trimmed));
        }
    }

    dirs::home_dir().context("Could not determine home directory")
}

/// Global config file location under `home`.
pub fn global_config_path(home: &Path) -> PathBuf {
    home.join(".config").join("pigeonhole").join("config.toml")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::env;

    fn restore(original: Option<String>) {
        unsafe {
            match original {
                Some(v) => env::set_var(HOME_ENV, v),
                None => env::remove_var(HOME_ENV),
            }
        }
    }

    #[test]
    #[serial]
    fn test_home_env_set() {
        let original = env::var(HOME_ENV).ok();
        unsafe { env::set_var(HOME_ENV, "/custom/home") };

        assert_eq!(get_home_dir().unwrap(), PathBuf::from("/custom/home"));

        restore(original);
    }

    #[test]
    #[serial]
    fn test_home_env_blank_uses_platform_default() {
        let original = env::var(HOME_ENV).ok();
        unsafe { env::set_var(HOME_ENV, "   ") };

        assert_eq!(get_home_dir().unwrap(), dirs::home_dir().unwrap());

        restore(original);
    }

    #[test]
    fn test_global_config_path() {
        assert_eq!(
            global_config_path(Path::new("/home/u")),
            PathBuf::from("/home/u/.config/pigeonhole/config.toml")
        );
    }
}
