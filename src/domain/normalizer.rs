// Normalizer - raw device bodies to a flat Snapshot
use crate::domain::error::DeviceError;
use crate::domain::snapshot::Snapshot;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::time::Duration;

/// Name of the body carrying profile, workout and screensaver state
pub const HA_BODY: &str = "ha";
/// Name of the body carrying `inactive_time`
pub const SERVER_BODY: &str = "server";

const EMPTY_PROFILE: &str = "empty";
const MANUAL_PRESET: &str = "Manual";

/// Parsed JSON bodies from one tick, keyed by endpoint name
pub type RawBodies = BTreeMap<String, Value>;

/// Workout-derived fields. Speed and grade read as zero when idle.
struct WorkoutFields {
    name: Option<String>,
    phase: Option<String>,
    heart_rate: Option<i64>,
    duration: Option<Duration>,
    speed: Option<f64>,
    grade: Option<f64>,
}

impl WorkoutFields {
    fn idle() -> Self {
        Self {
            name: None,
            phase: None,
            heart_rate: None,
            duration: None,
            speed: Some(0.0),
            grade: Some(0.0),
        }
    }

    fn from_object(workout: &Map<String, Value>) -> Result<Self, DeviceError> {
        let name = optional_string(workout, "current_preset_name")?;
        let phase = if name.as_deref() == Some(MANUAL_PRESET) {
            None
        } else {
            optional_string(workout, "current_phase_name")?
        };

        Ok(Self {
            name,
            phase,
            heart_rate: optional_integer(workout, "heart_rate")?,
            duration: optional_duration(workout, "duration")?,
            speed: optional_float(workout, "speed")?,
            grade: optional_float(workout, "grade")?,
        })
    }
}

/// Build a snapshot from the `ha` and `server` bodies of one tick.
///
/// Pure: the same bodies always produce an identical snapshot.
pub fn normalize(bodies: &RawBodies) -> Result<Snapshot, DeviceError> {
    let ha = body_object(bodies, HA_BODY)?;
    let server = body_object(bodies, SERVER_BODY)?;

    let workout = ha.get("workout").filter(|w| !w.is_null());
    let fields = match workout.and_then(Value::as_object) {
        Some(object) => WorkoutFields::from_object(object)?,
        None => WorkoutFields::idle(),
    };

    Ok(Snapshot {
        current_profile: profile_name(ha.get("current_profile"))?,
        status: workout.is_some(),
        screensaver: ha.get("screensaver").is_some_and(is_truthy),
        workout_name: fields.name,
        phase: fields.phase,
        heart_rate: fields.heart_rate,
        duration: fields.duration,
        speed: fields.speed,
        grade: fields.grade,
        inactive_time: present(server, "inactive_time").cloned(),
    })
}

fn body_object<'a>(bodies: &'a RawBodies, name: &str) -> Result<&'a Map<String, Value>, DeviceError> {
    bodies
        .get(name)
        .ok_or_else(|| DeviceError::malformed(name, "response missing"))?
        .as_object()
        .ok_or_else(|| DeviceError::malformed(name, "expected a JSON object"))
}

/// JSON truthiness: null, false, zero and empty containers are false
pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(items) => !items.is_empty(),
        Value::Object(fields) => !fields.is_empty(),
    }
}

fn profile_name(profile: Option<&Value>) -> Result<String, DeviceError> {
    let profile = match profile {
        Some(value) if is_truthy(value) => value,
        _ => return Ok(EMPTY_PROFILE.to_string()),
    };

    let object = profile
        .as_object()
        .ok_or_else(|| DeviceError::Unexpected(format!("current_profile is not an object: {}", profile)))?;

    Ok(format!(
        "{} {}",
        profile_part(object, "first_name")?,
        profile_part(object, "last_name")?
    ))
}

fn profile_part(profile: &Map<String, Value>, key: &str) -> Result<String, DeviceError> {
    match profile.get(key) {
        Some(Value::String(s)) => Ok(s.clone()),
        Some(Value::Null) | None => Err(DeviceError::Unexpected(format!(
            "current_profile is missing {}",
            key
        ))),
        Some(other) => Ok(other.to_string()),
    }
}

fn present<'a>(object: &'a Map<String, Value>, key: &str) -> Option<&'a Value> {
    object.get(key).filter(|v| !v.is_null())
}

fn wrong_type(key: &str, expected: &str, value: &Value) -> DeviceError {
    DeviceError::Unexpected(format!("{} should be {}, got {}", key, expected, value))
}

fn optional_string(object: &Map<String, Value>, key: &str) -> Result<Option<String>, DeviceError> {
    match present(object, key) {
        None => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.clone())),
        Some(other) => Err(wrong_type(key, "a string", other)),
    }
}

fn optional_float(object: &Map<String, Value>, key: &str) -> Result<Option<f64>, DeviceError> {
    match present(object, key) {
        None => Ok(None),
        Some(value) => value
            .as_f64()
            .map(Some)
            .ok_or_else(|| wrong_type(key, "a number", value)),
    }
}

fn optional_integer(object: &Map<String, Value>, key: &str) -> Result<Option<i64>, DeviceError> {
    match present(object, key) {
        None => Ok(None),
        Some(value) => value
            .as_i64()
            .or_else(|| value.as_f64().map(|f| f.round() as i64))
            .map(Some)
            .ok_or_else(|| wrong_type(key, "a number", value)),
    }
}

fn optional_duration(object: &Map<String, Value>, key: &str) -> Result<Option<Duration>, DeviceError> {
    let Some(seconds) = optional_float(object, key)? else {
        return Ok(None);
    };
    if !seconds.is_finite() || seconds < 0.0 {
        return Err(DeviceError::Unexpected(format!(
            "{} should be a non-negative number of seconds, got {}",
            key, seconds
        )));
    }
    // Halves round to even, so 2.5 -> 2 and 3.5 -> 4
    Ok(Some(Duration::from_secs(seconds.round_ties_even() as u64)))
}
