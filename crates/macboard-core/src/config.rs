//! Application configuration

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use macboard_auth::ControllerOptions;

use crate::error::CoreError;
use crate::Result;

const CONFIG_FILE: &str = "config.json";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Path to the origin-wide session store
    pub database_path: PathBuf,
    /// Watchdog poll interval
    pub watchdog_interval_ms: u64,
    /// How long a surfaced error stays on screen
    pub error_display_ms: u64,
    /// How long startup waits for the first provider push
    pub bootstrap_grace_ms: u64,
}

impl Config {
    pub fn new(data_dir: PathBuf) -> Self {
        Self {
            database_path: data_dir.join("macboard.db"),
            watchdog_interval_ms: 1000,
            error_display_ms: 5000,
            bootstrap_grace_ms: 1500,
        }
    }

    pub fn data_dir() -> PathBuf {
        if let Ok(dir) = std::env::var("MACBOARD_DATA_DIR") {
            return PathBuf::from(dir);
        }

        dirs::data_local_dir()
            .map(|d| d.join("MacBoard"))
            .unwrap_or_else(|| PathBuf::from(".macboard"))
    }

    /// Defaults for `data_dir`, overlaid with `config.json` from that
    /// directory when present, then with environment overrides.
    pub fn load(data_dir: PathBuf) -> Result<Self> {
        let path = data_dir.join(CONFIG_FILE);
        let mut config = if path.exists() {
            Self::from_file(&path)?
        } else {
            Self::new(data_dir)
        };

        config.apply_env(|key| std::env::var(key).ok())?;
        config.validate()?;

        tracing::debug!(
            database = %config.database_path.display(),
            watchdog_interval_ms = config.watchdog_interval_ms,
            "Loaded configuration"
        );

        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        let mut config: Self = serde_json::from_str(&raw)?;

        // An explicitly empty database path keeps the store next to the file
        if config.database_path.as_os_str().is_empty() {
            if let Some(dir) = path.parent() {
                config.database_path = dir.join("macboard.db");
            }
        }

        Ok(config)
    }

    /// Apply `MACBOARD_*` overrides read through `lookup`.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(value) = lookup("MACBOARD_WATCHDOG_INTERVAL_MS") {
            self.watchdog_interval_ms = parse_millis("MACBOARD_WATCHDOG_INTERVAL_MS", &value)?;
        }
        if let Some(value) = lookup("MACBOARD_ERROR_DISPLAY_MS") {
            self.error_display_ms = parse_millis("MACBOARD_ERROR_DISPLAY_MS", &value)?;
        }
        if let Some(value) = lookup("MACBOARD_BOOTSTRAP_GRACE_MS") {
            self.bootstrap_grace_ms = parse_millis("MACBOARD_BOOTSTRAP_GRACE_MS", &value)?;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.watchdog_interval_ms == 0 {
            return Err(CoreError::Config(
                "watchdog interval must be greater than zero".to_string(),
            ));
        }
        if self.database_path.as_os_str().is_empty() {
            return Err(CoreError::Config("database path is empty".to_string()));
        }
        Ok(())
    }

    pub fn watchdog_interval(&self) -> Duration {
        Duration::from_millis(self.watchdog_interval_ms)
    }

    pub fn error_display_window(&self) -> Duration {
        Duration::from_millis(self.error_display_ms)
    }

    pub fn bootstrap_grace(&self) -> Duration {
        Duration::from_millis(self.bootstrap_grace_ms)
    }

    pub fn controller_options(&self) -> ControllerOptions {
        ControllerOptions {
            bootstrap_grace: self.bootstrap_grace(),
            error_display_window: self.error_display_window(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::new(Self::data_dir())
    }
}

fn parse_millis(key: &str, value: &str) -> Result<u64> {
    value
        .trim()
        .parse()
        .map_err(|_| {
            CoreError::Config(format!(
                "{key} must be a number of milliseconds, got {value:?}"
            ))
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_defaults() {
        let config = Config::new(PathBuf::from("/tmp/macboard"));

        assert_eq!(config.database_path, PathBuf::from("/tmp/macboard/macboard.db"));
        assert_eq!(config.watchdog_interval(), Duration::from_secs(1));
        assert_eq!(config.error_display_window(), Duration::from_secs(5));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_env_overrides() {
        let mut config = Config::new(PathBuf::from("/tmp/macboard"));
        let env: HashMap<&str, &str> = [
            ("MACBOARD_WATCHDOG_INTERVAL_MS", "250"),
            ("MACBOARD_ERROR_DISPLAY_MS", " 3000 "),
        ]
        .into_iter()
        .collect();

        config
            .apply_env(|key| env.get(key).map(|v| v.to_string()))
            .unwrap();

        assert_eq!(config.watchdog_interval_ms, 250);
        assert_eq!(config.error_display_ms, 3000);
        assert_eq!(config.bootstrap_grace_ms, 1500);
    }

    #[test]
    fn test_invalid_override_is_config_error() {
        let mut config = Config::new(PathBuf::from("/tmp/macboard"));
        let result = config.apply_env(|key| {
            (key == "MACBOARD_WATCHDOG_INTERVAL_MS").then(|| "soon".to_string())
        });

        assert!(matches!(result, Err(CoreError::Config(_))));
    }

    #[test]
    fn test_zero_interval_is_rejected() {
        let mut config = Config::new(PathBuf::from("/tmp/macboard"));
        config.watchdog_interval_ms = 0;
        assert!(matches!(config.validate(), Err(CoreError::Config(_))));
    }

    #[test]
    fn test_partial_config_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE);
        std::fs::write(&path, r#"{ "watchdog_interval_ms": 500 }"#).unwrap();

        let config = Config::from_file(&path).unwrap();
        assert_eq!(config.watchdog_interval_ms, 500);
        assert_eq!(config.error_display_ms, 5000);
        assert!(!config.database_path.as_os_str().is_empty());
    }
}
