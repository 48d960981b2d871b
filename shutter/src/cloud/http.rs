//! HTTP implementation of the cloud operations boundary
//!
//! Talks to the provider's regional compute API with bearer-token auth.
//! Wire payloads are deserialized into local types at this boundary, and
//! every timestamp is normalized to UTC here: offset-carrying RFC 3339
//! first, with a naive-UTC fallback for providers that omit the offset.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, Utc};
use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::json;
use std::collections::HashMap;
use std::sync::Arc;

use super::session::RegionSessions;
use super::{CloudOps, DiscoveredInstance, InstanceHandle, Snapshot, SnapshotStatus, Volume};
use crate::errors::{OperationError, Result, ShutterError};

pub struct HttpCloudClient {
    api_key: String,
    sessions: Arc<RegionSessions>,
}

#[derive(Debug, Deserialize)]
struct ApiInstanceList {
    instances: Vec<ApiInstance>,
}

#[derive(Debug, Deserialize)]
struct ApiInstance {
    id: String,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    tags: HashMap<String, String>,
}

#[derive(Debug, Deserialize)]
struct ApiVolumeList {
    volumes: Vec<ApiVolume>,
}

#[derive(Debug, Deserialize)]
struct ApiVolume {
    id: String,
    device: String,
    #[serde(default)]
    size_gb: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct ApiSnapshotList {
    snapshots: Vec<ApiSnapshot>,
}

#[derive(Debug, Deserialize)]
struct ApiSnapshot {
    id: String,
    #[serde(default)]
    volume_id: Option<String>,
    created_at: String,
    status: String,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    tags: HashMap<String, String>,
}

/// Normalize a provider timestamp to UTC. Accepts RFC 3339 with an offset,
/// or a naive `YYYY-mm-ddTHH:MM:SS` / `YYYY-mm-dd HH:MM:SS` treated as UTC.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }

    for format in ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, format) {
            return Some(DateTime::from_naive_utc_and_offset(naive, Utc));
        }
    }

    None
}

impl HttpCloudClient {
    pub fn new(api_key: String, sessions: Arc<RegionSessions>) -> Self {
        Self { api_key, sessions }
    }

    fn request_failed(region: &str, operation: &str, reason: String) -> ShutterError {
        ShutterError::Operation(OperationError::RequestFailed {
            region: region.to_string(),
            operation: operation.to_string(),
            reason,
        })
    }

    async fn check(
        response: reqwest::Response,
        region: &str,
        operation: &str,
    ) -> Result<reqwest::Response> {
        if response.status().is_success() {
            return Ok(response);
        }

        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        Err(Self::request_failed(
            region,
            operation,
            format!("HTTP {}: {}", status, body),
        ))
    }

    async fn get_json<T: for<'de> Deserialize<'de>>(
        &self,
        region: &str,
        path: &str,
        query: &[(&str, &str)],
        operation: &str,
    ) -> Result<T> {
        let session = self.sessions.get(region).await?;
        let url = format!("{}{}", session.base_url, path);

        let response = session
            .client
            .get(&url)
            .query(query)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .send()
            .await
            .map_err(|e| Self::request_failed(region, operation, e.to_string()))?;

        let response = Self::check(response, region, operation).await?;

        response
            .json::<T>()
            .await
            .map_err(|e| Self::request_failed(region, operation, e.to_string()))
    }

    async fn post_json<T: for<'de> Deserialize<'de>>(
        &self,
        region: &str,
        path: &str,
        payload: serde_json::Value,
        operation: &str,
    ) -> Result<T> {
        let session = self.sessions.get(region).await?;
        let url = format!("{}{}", session.base_url, path);

        let response = session
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&payload)
            .send()
            .await
            .map_err(|e| Self::request_failed(region, operation, e.to_string()))?;

        let response = Self::check(response, region, operation).await?;

        response
            .json::<T>()
            .await
            .map_err(|e| Self::request_failed(region, operation, e.to_string()))
    }

    fn convert_instance(raw: ApiInstance, region: &str) -> DiscoveredInstance {
        let name = raw
            .name
            .or_else(|| raw.tags.get("Name").cloned())
            .unwrap_or_else(|| raw.id.clone());

        DiscoveredInstance {
            handle: InstanceHandle {
                id: raw.id,
                name,
                region: region.to_string(),
            },
            tags: raw.tags,
        }
    }

    fn convert_snapshot(raw: ApiSnapshot, region: &str, operation: &str) -> Result<Snapshot> {
        let created_at = parse_timestamp(&raw.created_at).ok_or_else(|| {
            Self::request_failed(
                region,
                operation,
                format!("unparseable timestamp '{}' on {}", raw.created_at, raw.id),
            )
        })?;

        Ok(Snapshot {
            id: raw.id,
            volume_id: raw.volume_id,
            created_at,
            status: SnapshotStatus::parse(&raw.status),
            description: raw.description,
            tags: raw.tags,
        })
    }

    fn convert_snapshots(
        raw: ApiSnapshotList,
        region: &str,
        operation: &str,
    ) -> Result<Vec<Snapshot>> {
        raw.snapshots
            .into_iter()
            .map(|s| Self::convert_snapshot(s, region, operation))
            .collect()
    }
}

#[async_trait]
impl CloudOps for HttpCloudClient {
    async fn list_instances(&self, region: &str) -> Result<Vec<DiscoveredInstance>> {
        let list: ApiInstanceList = self
            .get_json(region, "/v1/instances", &[], "list_instances")
            .await?;

        Ok(list
            .instances
            .into_iter()
            .map(|raw| Self::convert_instance(raw, region))
            .collect())
    }

    async fn find_instance_by_id(
        &self,
        region: &str,
        id: &str,
    ) -> Result<Option<DiscoveredInstance>> {
        let session = self.sessions.get(region).await?;
        let url = format!("{}/v1/instances/{}", session.base_url, id);

        let response = session
            .client
            .get(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .send()
            .await
            .map_err(|e| Self::request_failed(region, "find_instance_by_id", e.to_string()))?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }

        let response = Self::check(response, region, "find_instance_by_id").await?;
        let raw: ApiInstance = response
            .json()
            .await
            .map_err(|e| Self::request_failed(region, "find_instance_by_id", e.to_string()))?;

        Ok(Some(Self::convert_instance(raw, region)))
    }

    async fn find_instance_by_name(
        &self,
        region: &str,
        name: &str,
    ) -> Result<Option<DiscoveredInstance>> {
        let list: ApiInstanceList = self
            .get_json(
                region,
                "/v1/instances",
                &[("name", name)],
                "find_instance_by_name",
            )
            .await?;

        Ok(list
            .instances
            .into_iter()
            .next()
            .map(|raw| Self::convert_instance(raw, region)))
    }

    async fn list_volumes(&self, instance: &InstanceHandle) -> Result<Vec<Volume>> {
        let path = format!("/v1/instances/{}/volumes", instance.id);
        let list: ApiVolumeList = self
            .get_json(&instance.region, &path, &[], "list_volumes")
            .await?;

        Ok(list
            .volumes
            .into_iter()
            .map(|v| Volume {
                id: v.id,
                device: v.device,
                size_gb: v.size_gb,
            })
            .collect())
    }

    async fn list_snapshots_by_volume(
        &self,
        region: &str,
        volume_id: &str,
    ) -> Result<Vec<Snapshot>> {
        let list: ApiSnapshotList = self
            .get_json(
                region,
                "/v1/snapshots",
                &[("volume_id", volume_id)],
                "list_snapshots_by_volume",
            )
            .await?;

        Self::convert_snapshots(list, region, "list_snapshots_by_volume")
    }

    async fn list_snapshots_by_tag(
        &self,
        region: &str,
        key: &str,
        value: &str,
    ) -> Result<Vec<Snapshot>> {
        let list: ApiSnapshotList = self
            .get_json(
                region,
                "/v1/snapshots",
                &[("tag_key", key), ("tag_value", value)],
                "list_snapshots_by_tag",
            )
            .await?;

        Self::convert_snapshots(list, region, "list_snapshots_by_tag")
    }

    async fn get_snapshot(&self, region: &str, snapshot_id: &str) -> Result<Snapshot> {
        let path = format!("/v1/snapshots/{}", snapshot_id);
        let raw: ApiSnapshot = self.get_json(region, &path, &[], "get_snapshot").await?;
        Self::convert_snapshot(raw, region, "get_snapshot")
    }

    async fn create_snapshot(
        &self,
        region: &str,
        volume_id: &str,
        description: &str,
        tags: &HashMap<String, String>,
    ) -> Result<Snapshot> {
        let payload = json!({
            "volume_id": volume_id,
            "description": description,
            "tags": tags,
        });

        let raw: ApiSnapshot = self
            .post_json(region, "/v1/snapshots", payload, "create_snapshot")
            .await?;
        Self::convert_snapshot(raw, region, "create_snapshot")
    }

    async fn copy_snapshot(
        &self,
        source_region: &str,
        snapshot_id: &str,
        dest_region: &str,
        description: &str,
        tags: &HashMap<String, String>,
    ) -> Result<Snapshot> {
        let path = format!("/v1/snapshots/{}/copy", snapshot_id);
        let payload = json!({
            "destination_region": dest_region,
            "description": description,
            "tags": tags,
        });

        let raw: ApiSnapshot = self
            .post_json(source_region, &path, payload, "copy_snapshot")
            .await?;
        Self::convert_snapshot(raw, dest_region, "copy_snapshot")
    }

    async fn delete_snapshot(&self, region: &str, snapshot_id: &str) -> Result<()> {
        let session = self.sessions.get(region).await?;
        let url = format!("{}/v1/snapshots/{}", session.base_url, snapshot_id);

        let response = session
            .client
            .delete(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .send()
            .await
            .map_err(|e| Self::request_failed(region, "delete_snapshot", e.to_string()))?;

        Self::check(response, region, "delete_snapshot").await?;
        Ok(())
    }
}
