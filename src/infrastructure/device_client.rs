// HTTP client for the treadmill's local JSON API
use crate::application::device_source::DeviceSource;
use crate::domain::error::DeviceError;
use crate::infrastructure::config::DeviceSettings;
use anyhow::{Context, Result};
use async_trait::async_trait;
use serde_json::Value;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct DeviceClient {
    base_url: String,
    client: reqwest::Client,
}

impl DeviceClient {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client,
        })
    }

    pub fn from_settings(settings: &DeviceSettings) -> Result<Self> {
        Self::new(settings.base_url(), settings.request_timeout())
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

#[async_trait]
impl DeviceSource for DeviceClient {
    async fn get_json(&self, path: &str) -> Result<Value, DeviceError> {
        let url = self.url(path);
        tracing::debug!("GET {}", url);

        let response = self
            .client
            .get(&url)
            .header("Accept", "application/json")
            .send()
            .await
            .map_err(|e| DeviceError::connectivity(&url, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(DeviceError::connectivity(&url, format!("HTTP {}", status)));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| DeviceError::connectivity(&url, e))?;

        let body: Value =
            serde_json::from_slice(&bytes).map_err(|e| DeviceError::malformed(path, e))?;
        if !body.is_object() {
            return Err(DeviceError::malformed(path, "expected a JSON object"));
        }

        Ok(body)
    }

    fn describe(&self) -> String {
        self.base_url.clone()
    }
}
