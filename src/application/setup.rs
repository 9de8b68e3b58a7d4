// Setup use case - validate the device once before polling starts
use crate::application::device_source::DeviceSource;
use crate::domain::device::{DEVICE_PATH, DeviceIdentity};
use crate::domain::error::DeviceError;
use thiserror::Error;
use tracing::{debug, info};

#[derive(Debug, Error)]
pub enum SetupError {
    #[error("cannot connect to device: {0}")]
    CannotConnect(DeviceError),

    #[error("unexpected error while validating device: {0}")]
    Unknown(DeviceError),
}

impl SetupError {
    /// Stable key shown to the operator
    pub fn error_key(&self) -> &'static str {
        match self {
            Self::CannotConnect(_) => "cannot_connect",
            Self::Unknown(_) => "unknown",
        }
    }
}

/// Query the identity endpoint and make sure it looks like a treadmill.
///
/// A device that answers without a `serial` is treated as unreachable.
pub async fn validate_device(
    source: &dyn DeviceSource,
    name: &str,
) -> Result<DeviceIdentity, SetupError> {
    debug!("Validating device at {}", source.describe());
    let body = source.get_json(DEVICE_PATH).await.map_err(|e| {
        if e.is_connectivity() {
            SetupError::CannotConnect(e)
        } else {
            SetupError::Unknown(e)
        }
    })?;

    if body.get("serial").is_none_or(|serial| serial.is_null()) {
        return Err(SetupError::CannotConnect(DeviceError::Unexpected(format!(
            "{} returned no serial",
            source.describe()
        ))));
    }

    let identity = DeviceIdentity::from_response(name, &body).map_err(SetupError::Unknown)?;
    info!(
        "Found {} (serial {}, model {})",
        identity.title(),
        identity.serial,
        identity.model.as_deref().unwrap_or("unknown")
    );
    Ok(identity)
}
