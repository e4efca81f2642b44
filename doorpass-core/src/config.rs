//! Dashboard configuration.
//!
//! Device address, ports and reconciliation policies are injected here
//! rather than compiled in. The file format is TOML; every key is optional.

use crate::notice::{NoticeMergePolicy, NOTICE_CAPACITY};
use crate::pass::PassType;
use crate::{DoorPassError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// How concurrent load responses for one method are reconciled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReconcilePolicy {
    /// Apply a response only if no later-issued load has been applied.
    #[default]
    LatestIssued,
    /// Apply every response as it lands; the last one to arrive wins.
    LastLanding,
}

/// A voice pass known at startup. Voice passes have no remote store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VoicePassSeed {
    pub id: u64,
    pub name: String,
    #[serde(rename = "type", default = "default_voice_type")]
    pub pass_type: PassType,
    pub expiry_time: String,
}

fn default_voice_type() -> PassType {
    PassType::MultiplePass
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DashboardConfig {
    /// Host name or address of the lock controller.
    pub device_host: String,
    /// Port serving the pass endpoints and the action push channel.
    pub data_port: u16,
    /// Port serving the camera stream.
    pub stream_port: u16,
    /// Per-request timeout; `None` leaves the HTTP client default.
    pub request_timeout_secs: Option<u64>,
    pub reconcile_policy: ReconcilePolicy,
    pub notice_policy: NoticeMergePolicy,
    pub notice_capacity: usize,
    /// Interval of the expiry sweep over local-only passes.
    pub expiry_sweep_secs: u64,
    pub voice_passes: Vec<VoicePassSeed>,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            device_host: "192.168.50.190".to_string(),
            data_port: 8000,
            stream_port: 8080,
            request_timeout_secs: None,
            reconcile_policy: ReconcilePolicy::default(),
            notice_policy: NoticeMergePolicy::default(),
            notice_capacity: NOTICE_CAPACITY,
            expiry_sweep_secs: 60,
            voice_passes: Vec::new(),
        }
    }
}

impl DashboardConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        let config: Self =
            toml_dep::from_str(content).map_err(|e| DoorPassError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.device_host.trim().is_empty() {
            return Err(DoorPassError::Config("device_host is empty".to_string()));
        }
        if self.notice_capacity == 0 {
            return Err(DoorPassError::Config(
                "notice_capacity must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// Base URL of the pass endpoints.
    pub fn data_url(&self) -> String {
        format!("http://{}:{}", self.device_host, self.data_port)
    }

    /// WebSocket URL of the action push channel.
    pub fn push_url(&self) -> String {
        format!("ws://{}:{}/ws/actions", self.device_host, self.data_port)
    }

    /// MJPEG camera stream URL.
    pub fn stream_url(&self) -> String {
        format!("http://{}:{}/video_feed", self.device_host, self.stream_port)
    }
}
