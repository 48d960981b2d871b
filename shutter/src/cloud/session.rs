//! Per-region provider session registry
//!
//! One session (HTTP client + resolved regional endpoint) per region,
//! created lazily on first use and reused for the rest of the run. The map
//! is guarded by a mutex held across initialization, so two tasks touching
//! the same region for the first time cannot build duplicate sessions.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::config::Config;
use crate::errors::{OperationError, Result, ShutterError};

#[derive(Debug)]
pub struct RegionSession {
    pub region: String,
    pub base_url: String,
    pub client: reqwest::Client,
}

pub struct RegionSessions {
    endpoint_template: String,
    request_timeout: Duration,
    sessions: Mutex<HashMap<String, Arc<RegionSession>>>,
}

impl RegionSessions {
    pub fn new(config: &Config) -> Self {
        Self {
            endpoint_template: config.api_endpoint.clone(),
            request_timeout: Duration::from_secs(config.request_timeout_seconds),
            sessions: Mutex::new(HashMap::new()),
        }
    }

    /// Session for `region`, initializing it at most once per run.
    pub async fn get(&self, region: &str) -> Result<Arc<RegionSession>> {
        let mut sessions = self.sessions.lock().await;

        if let Some(session) = sessions.get(region) {
            debug!("Region {} has already been initialized", region);
            return Ok(session.clone());
        }

        let base_url = self
            .endpoint_template
            .replace("{region}", region)
            .trim_end_matches('/')
            .to_string();

        let client = reqwest::Client::builder()
            .timeout(self.request_timeout)
            .build()
            .map_err(|e| {
                ShutterError::Operation(OperationError::RequestFailed {
                    region: region.to_string(),
                    operation: "init_session".to_string(),
                    reason: e.to_string(),
                })
            })?;

        let session = Arc::new(RegionSession {
            region: region.to_string(),
            base_url,
            client,
        });

        sessions.insert(region.to_string(), session.clone());
        info!("Initialized session for region {}", region);

        Ok(session)
    }

    #[cfg(test)]
    pub async fn initialized_regions(&self) -> Vec<String> {
        let sessions = self.sessions.lock().await;
        sessions.keys().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PolicyDefaults;
    use crate::policy::Frequency;

    fn test_config() -> Config {
        Config {
            regions: vec!["us-east-1".to_string()],
            api_endpoint: "https://compute.{region}.cloud.test".to_string(),
            api_key: "secret".to_string(),
            request_timeout_seconds: 5,
            copy_wait_timeout_seconds: 60,
            concurrency_limit: 4,
            log_level: "info".to_string(),
            defaults: PolicyDefaults {
                frequency: Frequency::Daily,
                retention_count: 7,
                root_volume_selector: "/dev/sda1".to_string(),
                delete_old_snapshots: true,
                offsite_enabled: false,
                offsite_region: None,
                offsite_frequency: None,
                offsite_retention_count: None,
            },
            instances: Vec::new(),
        }
    }

    #[tokio::test]
    async fn test_session_initialized_once_per_region() {
        let sessions = RegionSessions::new(&test_config());

        let first = sessions.get("us-east-1").await.unwrap();
        let second = sessions.get("us-east-1").await.unwrap();
        assert!(Arc::ptr_eq(&first, &second));

        assert_eq!(first.base_url, "https://compute.us-east-1.cloud.test");
        assert_eq!(sessions.initialized_regions().await.len(), 1);

        sessions.get("eu-west-1").await.unwrap();
        assert_eq!(sessions.initialized_regions().await.len(), 2);
    }
}
