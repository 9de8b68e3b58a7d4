// Snapshot domain model - one coherent view of the treadmill
use serde::{Serialize, Serializer};
use std::time::Duration;

/// Result of one successful poll cycle.
///
/// A snapshot is never mutated after normalization; a newer tick replaces it
/// as a whole.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Snapshot {
    pub current_profile: String,
    pub status: bool,
    pub screensaver: bool,
    pub workout_name: Option<String>,
    pub phase: Option<String>,
    pub heart_rate: Option<i64>,
    #[serde(serialize_with = "serialize_seconds")]
    pub duration: Option<Duration>,
    /// `Some(0.0)` when no workout is running, unlike the other workout fields.
    pub speed: Option<f64>,
    /// Same default as `speed`.
    pub grade: Option<f64>,
    /// Passed through from the device without interpretation
    pub inactive_time: Option<serde_json::Value>,
}

fn serialize_seconds<S: Serializer>(value: &Option<Duration>, serializer: S) -> Result<S::Ok, S::Error> {
    match value {
        Some(duration) => serializer.serialize_some(&duration.as_secs()),
        None => serializer.serialize_none(),
    }
}

/// Render a duration as `H:MM:SS`
pub fn format_duration(duration: Duration) -> String {
    let total = duration.as_secs();
    format!("{}:{:02}:{:02}", total / 3600, (total % 3600) / 60, total % 60)
}
