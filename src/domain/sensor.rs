// Sensor descriptors - what each published value looks like to readers
use crate::domain::snapshot::{Snapshot, format_duration};
use serde::{Deserialize, Serialize};

const MEASUREMENT: Option<&str> = Some("measurement");

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum SensorKey {
    Status,
    Screensaver,
    InactiveTime,
    CurrentProfile,
    Workout,
    Phase,
    Heartrate,
    Duration,
    Speed,
    Grade,
}

impl SensorKey {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Status => "Status",
            Self::Screensaver => "Screensaver",
            Self::InactiveTime => "InactiveTime",
            Self::CurrentProfile => "CurrentProfile",
            Self::Workout => "Workout",
            Self::Phase => "Phase",
            Self::Heartrate => "Heartrate",
            Self::Duration => "Duration",
            Self::Speed => "Speed",
            Self::Grade => "Grade",
        }
    }

    /// Case-insensitive lookup, so `heartrate` and `Heartrate` both match
    pub fn parse(key: &str) -> Option<Self> {
        descriptions()
            .map(|d| d.key)
            .find(|k| k.as_str().eq_ignore_ascii_case(key))
    }

    /// Read this sensor's value out of a snapshot
    pub fn read(&self, snapshot: &Snapshot) -> SensorValue {
        match self {
            Self::Status => SensorValue::Flag(snapshot.status),
            Self::Screensaver => SensorValue::Flag(snapshot.screensaver),
            Self::InactiveTime => snapshot
                .inactive_time
                .clone()
                .map_or(SensorValue::Unknown, SensorValue::Raw),
            Self::CurrentProfile => SensorValue::Text(snapshot.current_profile.clone()),
            Self::Workout => snapshot
                .workout_name
                .clone()
                .map_or(SensorValue::Unknown, SensorValue::Text),
            Self::Phase => snapshot
                .phase
                .clone()
                .map_or(SensorValue::Unknown, SensorValue::Text),
            Self::Heartrate => snapshot
                .heart_rate
                .map_or(SensorValue::Unknown, SensorValue::Integer),
            Self::Duration => snapshot
                .duration
                .map_or(SensorValue::Unknown, |d| SensorValue::Text(format_duration(d))),
            Self::Speed => snapshot.speed.map_or(SensorValue::Unknown, SensorValue::Number),
            Self::Grade => snapshot.grade.map_or(SensorValue::Unknown, SensorValue::Number),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SensorPlatform {
    Sensor,
    BinarySensor,
}

/// Current value of one sensor; serializes to a bare JSON value
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum SensorValue {
    Unknown,
    Flag(bool),
    Text(String),
    Integer(i64),
    Number(f64),
    Raw(serde_json::Value),
}

impl SensorValue {
    pub fn is_on(&self) -> bool {
        matches!(self, Self::Flag(true))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum UnitSystem {
    #[default]
    Metric,
    Imperial,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SensorDescription {
    pub key: SensorKey,
    pub platform: SensorPlatform,
    pub label: &'static str,
    pub icon: &'static str,
    /// Shown instead of `icon` while a binary sensor is off
    pub icon_alt: Option<&'static str>,
    pub device_class: Option<&'static str>,
    pub unit_metric: Option<&'static str>,
    pub unit_imperial: Option<&'static str>,
    pub enabled: bool,
    pub state_class: Option<&'static str>,
}

impl SensorDescription {
    pub fn unit(&self, units: UnitSystem) -> Option<&'static str> {
        match units {
            UnitSystem::Metric => self.unit_metric,
            UnitSystem::Imperial => self.unit_imperial,
        }
    }
}

const fn sensor(
    key: SensorKey,
    label: &'static str,
    icon: &'static str,
    device_class: Option<&'static str>,
    unit_metric: Option<&'static str>,
    unit_imperial: Option<&'static str>,
) -> SensorDescription {
    SensorDescription {
        key,
        platform: SensorPlatform::Sensor,
        label,
        icon,
        icon_alt: None,
        device_class,
        unit_metric,
        unit_imperial,
        enabled: true,
        state_class: MEASUREMENT,
    }
}

const fn binary_sensor(
    key: SensorKey,
    label: &'static str,
    icon: &'static str,
    icon_alt: &'static str,
    device_class: &'static str,
) -> SensorDescription {
    SensorDescription {
        key,
        platform: SensorPlatform::BinarySensor,
        label,
        icon,
        icon_alt: Some(icon_alt),
        device_class: Some(device_class),
        unit_metric: None,
        unit_imperial: None,
        enabled: true,
        state_class: MEASUREMENT,
    }
}

pub const BINARY_SENSOR_TYPES: &[SensorDescription] = &[
    binary_sensor(
        SensorKey::Status,
        "Treadmill Status",
        "mdi:run-fast",
        "mdi:pause-octagon",
        "athlios__occupancy",
    ),
    binary_sensor(
        SensorKey::Screensaver,
        "Screensaver",
        "mdi:sleep",
        "mdi:sleep-off",
        "athlios__screensaver",
    ),
];

pub const SENSOR_TYPES: &[SensorDescription] = &[
    sensor(SensorKey::InactiveTime, "Inactive Time", "mdi:information-variant", None, Some("s"), Some("s")),
    sensor(SensorKey::CurrentProfile, "Current Profile", "mdi:account", Some("athlios__profile"), None, None),
    sensor(SensorKey::Workout, "Workout", "mdi:information-variant", None, None, None),
    sensor(SensorKey::Phase, "Phase", "mdi:information-variant", None, None, None),
    sensor(SensorKey::Heartrate, "Heart rate", "mdi:heart-pulse", None, Some("bpm"), Some("bpm")),
    sensor(SensorKey::Duration, "Duration", "mdi:clock-start", None, None, None),
    sensor(SensorKey::Speed, "Speed", "mdi:speedometer", None, Some("km/h"), Some("mph")),
    sensor(SensorKey::Grade, "Grade", "mdi:angle-acute", None, Some("%"), Some("%")),
];

/// Every descriptor, binary sensors first
pub fn descriptions() -> impl Iterator<Item = &'static SensorDescription> {
    BINARY_SENSOR_TYPES.iter().chain(SENSOR_TYPES.iter())
}
