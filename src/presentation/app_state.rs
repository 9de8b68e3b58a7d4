// Application state for HTTP handlers
use crate::application::poller::PollerHandle;
use crate::domain::device::DeviceIdentity;
use crate::domain::entity::SensorEntity;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub device: Arc<DeviceIdentity>,
    pub poller: PollerHandle,
    pub entities: Vec<SensorEntity>,
}
