// Device error taxonomy shared by the client, the normalizer and the poller
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DeviceError {
    /// Network unreachable, timeout or a non-2xx status.
    #[error("cannot reach device at {url}: {reason}")]
    Connectivity { url: String, reason: String },

    /// Body is not JSON, not an object, or missing entirely.
    #[error("malformed response from {endpoint}: {reason}")]
    MalformedResponse { endpoint: String, reason: String },

    #[error("unexpected device data: {0}")]
    Unexpected(String),
}

impl DeviceError {
    pub fn connectivity(url: impl Into<String>, reason: impl ToString) -> Self {
        Self::Connectivity {
            url: url.into(),
            reason: reason.to_string(),
        }
    }

    pub fn malformed(endpoint: impl Into<String>, reason: impl ToString) -> Self {
        Self::MalformedResponse {
            endpoint: endpoint.into(),
            reason: reason.to_string(),
        }
    }

    pub fn is_connectivity(&self) -> bool {
        matches!(self, Self::Connectivity { .. })
    }

    /// Short machine-readable category, used in logs and the read API
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Connectivity { .. } => "connectivity",
            Self::MalformedResponse { .. } => "malformed_response",
            Self::Unexpected(_) => "unexpected",
        }
    }
}
