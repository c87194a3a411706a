pub mod ble_config;
pub mod timeout_config;

use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use log::{error, info, warn};
use serde::{Deserialize, Serialize};
use tokio::fs;

use crate::config::ble_config::BleConfig;
use crate::config::timeout_config::TimeoutConfig;
use crate::utils::ensure_parent_dir;

const CONFIG_DIR_NAME: &str = "wifi-ble-provisioner";
const CONFIG_FILE_NAME: &str = "config.json";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub ble: BleConfig,
    pub timeouts: TimeoutConfig,
}

impl AppConfig {
    /// Default location of the configuration file.
    pub fn default_path() -> Result<PathBuf> {
        let config_dir =
            dirs::config_dir().ok_or_else(|| anyhow!("No configuration directory on this platform"))?;
        Ok(config_dir.join(CONFIG_DIR_NAME).join(CONFIG_FILE_NAME))
    }

    /// Loads the config from a configuration file, falling back to defaults when it does not exist.
    pub async fn load_config(file_path: &Path) -> Result<Self> {
        if !file_path.exists() {
            warn!("Config file not found at {:?}, using default.", file_path);
            return Ok(Self::default());
        }

        let config_json = fs::read_to_string(file_path)
            .await
            .with_context(|| format!("Failed to read config file {:?}", file_path))?;
        let config: Self = serde_json::from_str(&config_json)
            .with_context(|| format!("Invalid config file {:?}", file_path))?;

        info!("Config loaded from {:?}", file_path);
        Ok(config)
    }

    /// Saves the current config to a configuration file.
    pub async fn save_config(&self, file_path: &Path) -> Result<()> {
        ensure_parent_dir(file_path).await?;

        let config_json = match serde_json::to_string_pretty(&self) {
            Ok(json) => json,
            Err(e) => {
                error!("Failed to serialize config to JSON: {}", e);
                return Err(e.into());
            }
        };

        fs::write(file_path, config_json).await?;

        info!("Config saved to {:?}.", file_path);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::bluetooth::StatusRevision;
    use crate::core::bluetooth::constants::UUID_WIFI_SERVICE;

    fn scratch_path(name: &str) -> PathBuf {
        std::env::temp_dir()
            .join(format!("wifi-ble-provisioner-{}-{}", name, std::process::id()))
            .join(CONFIG_FILE_NAME)
    }

    #[tokio::test]
    async fn missing_file_yields_defaults() {
        let path = scratch_path("missing");
        let config = AppConfig::load_config(&path).await.unwrap();
        assert_eq!(config, AppConfig::default());
        assert_eq!(config.ble.service_uuid, UUID_WIFI_SERVICE);
    }

    #[tokio::test]
    async fn partial_file_fills_in_defaults() {
        let path = scratch_path("partial");
        ensure_parent_dir(&path).await.unwrap();
        fs::write(
            &path,
            r#"{ "ble": { "status_revision": "legacy" }, "timeouts": { "operation_secs": 2 } }"#,
        )
        .await
        .unwrap();

        let config = AppConfig::load_config(&path).await.unwrap();
        assert_eq!(config.ble.status_revision, StatusRevision::Legacy);
        assert_eq!(config.ble.characteristic_uuid, BleConfig::default().characteristic_uuid);
        assert_eq!(config.timeouts.operation_secs, 2);
        assert_eq!(config.timeouts.connect_secs, TimeoutConfig::default().connect_secs);

        fs::remove_dir_all(path.parent().unwrap()).await.unwrap();
    }

    #[tokio::test]
    async fn saved_config_loads_back() {
        let path = scratch_path("saved");
        let mut config = AppConfig::default();
        config.ble.min_rssi = -60;
        config.ble.stop_scan_on_match = false;

        config.save_config(&path).await.unwrap();
        assert_eq!(AppConfig::load_config(&path).await.unwrap(), config);

        fs::remove_dir_all(path.parent().unwrap()).await.unwrap();
    }

    #[tokio::test]
    async fn malformed_file_is_an_error() {
        let path = scratch_path("malformed");
        ensure_parent_dir(&path).await.unwrap();
        fs::write(&path, "{ not json").await.unwrap();

        assert!(AppConfig::load_config(&path).await.is_err());

        fs::remove_dir_all(path.parent().unwrap()).await.unwrap();
    }
}
