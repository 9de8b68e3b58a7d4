// Entity adapter - one generic reader over the sensor descriptor table
use crate::domain::device::{ATTRIBUTION, DeviceIdentity, MANUFACTURER};
use crate::domain::sensor::{
    SensorDescription, SensorKey, SensorPlatform, SensorValue, UnitSystem, descriptions,
};
use crate::domain::snapshot::Snapshot;
use serde::Serialize;
use std::sync::Arc;

#[derive(Debug, Clone)]
pub struct SensorEntity {
    description: &'static SensorDescription,
    device: Arc<DeviceIdentity>,
    units: UnitSystem,
}

/// What an external reader sees for one entity
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EntityState {
    pub key: SensorKey,
    pub platform: SensorPlatform,
    pub name: String,
    pub unique_id: String,
    pub value: SensorValue,
    pub icon: &'static str,
    pub unit: Option<&'static str>,
    pub device_class: Option<&'static str>,
    pub state_class: Option<&'static str>,
    pub enabled_default: bool,
    pub attribution: &'static str,
    pub device: DeviceInfo,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeviceInfo {
    pub identifier: String,
    pub name: String,
    pub manufacturer: &'static str,
    pub model: Option<String>,
}

impl SensorEntity {
    pub fn new(
        description: &'static SensorDescription,
        device: Arc<DeviceIdentity>,
        units: UnitSystem,
    ) -> Self {
        Self {
            description,
            device,
            units,
        }
    }

    pub fn key(&self) -> SensorKey {
        self.description.key
    }

    pub fn name(&self) -> String {
        format!("{} {}", self.device.name, self.description.label)
    }

    pub fn unique_id(&self) -> String {
        format!("{}-{}", self.device.entity_prefix(), self.description.key.as_str()).to_lowercase()
    }

    /// Unknown until the first snapshot is published
    pub fn value(&self, snapshot: Option<&Snapshot>) -> SensorValue {
        snapshot.map_or(SensorValue::Unknown, |s| self.description.key.read(s))
    }

    pub fn icon(&self, value: &SensorValue) -> &'static str {
        match (self.description.platform, self.description.icon_alt) {
            (SensorPlatform::BinarySensor, Some(alt)) if !value.is_on() => alt,
            _ => self.description.icon,
        }
    }

    pub fn state(&self, snapshot: Option<&Snapshot>) -> EntityState {
        let value = self.value(snapshot);
        EntityState {
            key: self.description.key,
            platform: self.description.platform,
            name: self.name(),
            unique_id: self.unique_id(),
            icon: self.icon(&value),
            value,
            unit: self.description.unit(self.units),
            device_class: self.description.device_class,
            state_class: self.description.state_class,
            enabled_default: self.description.enabled,
            attribution: ATTRIBUTION,
            device: DeviceInfo {
                identifier: self.device.serial.clone(),
                name: self.device.name.clone(),
                manufacturer: MANUFACTURER,
                model: self.device.model.clone(),
            },
        }
    }
}

/// One entity per descriptor, sharing the device identity
pub fn build_entities(device: Arc<DeviceIdentity>, units: UnitSystem) -> Vec<SensorEntity> {
    descriptions()
        .map(|description| SensorEntity::new(description, device.clone(), units))
        .collect()
}
