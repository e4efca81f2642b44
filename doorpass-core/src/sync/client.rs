//! HTTP client for the lock controller's pass endpoints.

use crate::config::DashboardConfig;
use crate::pass::Method;
use crate::sync::models::{CreateRequest, DeleteRequest, LoadRequest, UpdateRequest, WireRecord};
use crate::sync::remote::PassRemote;
use crate::{DoorPassError, Result};
use async_trait::async_trait;
use serde::Serialize;
use std::time::Duration;

/// [`PassRemote`] backed by the controller's HTTP API.
pub struct HttpRemote {
    client: reqwest::Client,
    base_url: String,
}

impl HttpRemote {
    /// Create a client for `base_url`. Without a timeout requests wait
    /// indefinitely.
    pub fn new(base_url: &str, timeout: Option<Duration>) -> Result<Self> {
        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder
            .build()
            .map_err(|e| DoorPassError::Transport(e.to_string()))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn from_config(config: &DashboardConfig) -> Result<Self> {
        Self::new(
            &config.data_url(),
            config.request_timeout_secs.map(Duration::from_secs),
        )
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    // --- Internal helpers ---

    async fn post_json<T: Serialize + ?Sized>(&self, path: &str, body: &T) -> Result<Vec<u8>> {
        let url = format!("{}{}", self.base_url, path);
        let resp = self
            .client
            .post(&url)
            .json(body)
            .send()
            .await
            .map_err(|e| DoorPassError::Transport(format!("POST {}: {}", path, e)))?;

        Self::read_success(resp).await
    }

    async fn get(&self, path: &str) -> Result<Vec<u8>> {
        let url = format!("{}{}", self.base_url, path);
        let resp = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| DoorPassError::Transport(format!("GET {}: {}", path, e)))?;

        Self::read_success(resp).await
    }

    async fn read_success(resp: reqwest::Response) -> Result<Vec<u8>> {
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_else(|_| "unknown".to_string());
            return Err(DoorPassError::Remote {
                status: status.as_u16(),
                body,
            });
        }

        let bytes = resp
            .bytes()
            .await
            .map_err(|e| DoorPassError::Transport(e.to_string()))?;
        Ok(bytes.to_vec())
    }
}

#[async_trait]
impl PassRemote for HttpRemote {
    async fn load(&self, method: Method) -> Result<Vec<WireRecord>> {
        let response = self
            .post_json("/update_database", &LoadRequest { method })
            .await?;
        serde_json::from_slice(&response).map_err(|e| {
            DoorPassError::Serialization(format!("Invalid {} record set: {}", method, e))
        })
    }

    async fn create(&self, request: &CreateRequest) -> Result<()> {
        self.post_json("/add_entry", request).await?;
        Ok(())
    }

    async fn update(&self, request: &UpdateRequest) -> Result<()> {
        self.post_json("/edit_entry", request).await?;
        Ok(())
    }

    async fn delete(&self, request: &DeleteRequest) -> Result<()> {
        self.post_json("/delete_entry", request).await?;
        Ok(())
    }

    async fn qr_image(&self, id: u64) -> Result<Vec<u8>> {
        self.get(&format!("/qr_code/{}", id)).await
    }
}
