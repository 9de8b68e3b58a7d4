// Device domain model - identity reported by the treadmill
use crate::domain::error::DeviceError;
use serde::Serialize;
use serde_json::Value;

pub const DEVICE_PATH: &str = "/api/v1/device";
pub const HA_PATH: &str = "/api/v1/ha";
pub const SERVER_PATH: &str = "/api/v1/server";

pub const MANUFACTURER: &str = "AthliOS, Inc.";
pub const ATTRIBUTION: &str = "Data from AthliOS";

/// Identity returned by the device endpoint during setup
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeviceIdentity {
    pub name: String,
    pub serial: String,
    pub basis_id: Option<String>,
    pub model: Option<String>,
}

impl DeviceIdentity {
    /// Parse the device endpoint body. A body without `serial` is rejected.
    pub fn from_response(name: &str, body: &Value) -> Result<Self, DeviceError> {
        let object = body
            .as_object()
            .ok_or_else(|| DeviceError::malformed("device", "expected a JSON object"))?;

        let serial = object
            .get("serial")
            .and_then(scalar_text)
            .ok_or_else(|| DeviceError::Unexpected("device response has no serial".to_string()))?;

        Ok(Self {
            name: name.to_string(),
            serial,
            basis_id: object.get("basis_id").and_then(scalar_text),
            model: object.get("Model").and_then(scalar_text),
        })
    }

    pub fn title(&self) -> String {
        format!(
            "{} Basis ID {}",
            self.name,
            self.basis_id.as_deref().unwrap_or("unknown")
        )
    }

    /// Prefix for entity unique ids; falls back to the serial when the
    /// device reports no basis id
    pub fn entity_prefix(&self) -> &str {
        self.basis_id.as_deref().unwrap_or(&self.serial)
    }
}

fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}
