// Device source trait for fetching raw device bodies
use crate::domain::error::DeviceError;
use async_trait::async_trait;
use serde_json::Value;

#[async_trait]
pub trait DeviceSource: Send + Sync {
    /// Fetch one endpoint and return its parsed JSON object.
    ///
    /// Fails as a whole; a partially read body is never returned.
    async fn get_json(&self, path: &str) -> Result<Value, DeviceError>;

    /// Human-readable target, e.g. `http://10.0.0.2:5678`
    fn describe(&self) -> String;
}
