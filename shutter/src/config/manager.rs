use std::sync::Arc;
use tokio::fs;
use tracing::debug;

use super::Config;
use crate::errors::{ConfigError, Result, ShutterError};

#[derive(Debug)]
pub struct ConfigManager {
    current_config: Arc<Config>,
}

impl ConfigManager {
    pub async fn new(config_path: &str) -> Result<Self> {
        let config = Self::load_configuration(config_path).await?;
        Ok(Self {
            current_config: Arc::new(config),
        })
    }

    pub fn get_current_config(&self) -> Arc<Config> {
        self.current_config.clone()
    }

    async fn load_configuration(config_path: &str) -> Result<Config> {
        let content = fs::read_to_string(config_path).await.map_err(|e| {
            ShutterError::Config(ConfigError::LoadFailed {
                path: config_path.to_string(),
                reason: e.to_string(),
            })
        })?;

        let config: Config = toml::from_str(&content).map_err(|e| {
            ShutterError::Config(ConfigError::ParseError {
                reason: e.to_string(),
            })
        })?;

        Self::validate(&config)?;

        debug!("Loaded configuration from {}", config_path);

        Ok(config)
    }

    fn validate(config: &Config) -> Result<()> {
        if config.regions.is_empty() && config.instances.is_empty() {
            return Err(ShutterError::Config(ConfigError::MissingRequired {
                field: "regions".to_string(),
            }));
        }

        if !config.api_endpoint.contains("{region}") {
            return Err(ShutterError::Config(ConfigError::InvalidValue {
                field: "api_endpoint".to_string(),
                reason: "must contain a {region} placeholder".to_string(),
            }));
        }

        // Offsite defaults must be complete when offsite is on globally;
        // a per-instance override switching it on is checked by the resolver.
        if config.defaults.offsite_enabled {
            if config.defaults.offsite_region.is_none() {
                return Err(ShutterError::Config(ConfigError::MissingRequired {
                    field: "defaults.offsite_region".to_string(),
                }));
            }
            if config.defaults.offsite_frequency.is_none() {
                return Err(ShutterError::Config(ConfigError::MissingRequired {
                    field: "defaults.offsite_frequency".to_string(),
                }));
            }
            if config.defaults.offsite_retention_count.is_none() {
                return Err(ShutterError::Config(ConfigError::MissingRequired {
                    field: "defaults.offsite_retention_count".to_string(),
                }));
            }
        }

        for pinned in &config.instances {
            if pinned.id.is_none() && pinned.name.is_none() {
                return Err(ShutterError::Config(ConfigError::InvalidValue {
                    field: "instances".to_string(),
                    reason: format!(
                        "pinned instance in {} needs an id or a name",
                        pinned.region
                    ),
                }));
            }
        }

        Ok(())
    }
}
