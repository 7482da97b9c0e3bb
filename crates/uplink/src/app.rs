//! Application context for CLI command execution.
//!
//! Resolves the effective [`UplinkConfig`] once per invocation: an explicit
//! `--config` path, else the nearest `.uplink/config.yaml` found walking up
//! from the working directory, else built-in defaults.

use crate::config::UplinkConfig;
use crate::error::Result;
use std::path::{Path, PathBuf};

/// Maximum directory depth to walk up when searching for a config file
pub const MAX_TRAVERSAL_DEPTH: usize = 256;

/// Resolved settings for one invocation.
#[derive(Debug, Clone)]
pub struct App {
    config: UplinkConfig,
    config_path: Option<PathBuf>,
}

impl App {
    /// Resolves configuration for `working_dir`.
    ///
    /// # Errors
    ///
    /// Returns an error if the chosen config file cannot be read or is
    /// invalid. A missing explicit file is an error; no file at all is not.
    pub async fn from_directory(working_dir: &Path, explicit: Option<&Path>) -> Result<Self> {
        let config_path = match explicit {
            Some(path) => Some(path.to_path_buf()),
            None => find_config_file(working_dir),
        };
        let config = match &config_path {
            Some(path) => UplinkConfig::load(path).await?,
            None => UplinkConfig::default(),
        };
        Ok(Self {
            config,
            config_path,
        })
    }

    /// Effective configuration before command-line overrides.
    #[must_use]
    pub fn config(&self) -> &UplinkConfig {
        &self.config
    }

    /// Config file in use, if any.
    #[must_use]
    pub fn config_path(&self) -> Option<&Path> {
        self.config_path.as_deref()
    }
}

/// Nearest `.uplink/config.yaml` at or above `start`.
#[must_use]
pub fn find_config_file(start: &Path) -> Option<PathBuf> {
    start
        .ancestors()
        .take(MAX_TRAVERSAL_DEPTH)
        .map(UplinkConfig::default_path)
        .find(|candidate| candidate.is_file())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{CONFIG_DIR_NAME, CONFIG_FILE_NAME};
    use tempfile::TempDir;

    #[tokio::test]
    async fn config_found_in_parent_directory() {
        let temp = TempDir::new().unwrap();
        let config_dir = temp.path().join(CONFIG_DIR_NAME);
        tokio::fs::create_dir_all(&config_dir).await.unwrap();
        tokio::fs::write(config_dir.join(CONFIG_FILE_NAME), "namespace: OPS\n")
            .await
            .unwrap();
        let nested = temp.path().join("a").join("b");
        tokio::fs::create_dir_all(&nested).await.unwrap();

        let app = App::from_directory(&nested, None).await.unwrap();
        assert_eq!(app.config().namespace, "OPS");
        assert!(app.config_path().is_some());
    }

    #[tokio::test]
    async fn defaults_without_config_file() {
        let temp = TempDir::new().unwrap();
        // Only guaranteed config-free if no ancestor of the temp dir has one.
        if find_config_file(temp.path()).is_none() {
            let app = App::from_directory(temp.path(), None).await.unwrap();
            assert_eq!(app.config(), &UplinkConfig::default());
        }
    }

    #[tokio::test]
    async fn explicit_missing_config_fails() {
        let temp = TempDir::new().unwrap();
        let missing = temp.path().join("missing.yaml");
        assert!(App::from_directory(temp.path(), Some(missing.as_path())).await.is_err());
    }
}
