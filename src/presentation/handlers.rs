// HTTP request handlers
use crate::application::poller::PollStatus;
use crate::domain::device::DeviceIdentity;
use crate::domain::entity::EntityState;
use crate::domain::sensor::SensorKey;
use crate::domain::snapshot::Snapshot;
use crate::presentation::app_state::AppState;
use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use serde::Serialize;
use std::sync::Arc;

#[derive(Debug, Serialize)]
pub struct SnapshotResponse {
    pub title: String,
    pub device: DeviceIdentity,
    /// Null until the first successful poll
    pub snapshot: Option<Snapshot>,
    pub status: PollStatus,
}

/// Health check endpoint
pub async fn health_check() -> &'static str {
    "ok"
}

/// Latest snapshot together with poll health
pub async fn current_snapshot(State(state): State<Arc<AppState>>) -> Json<SnapshotResponse> {
    let poll = state.poller.state();
    Json(SnapshotResponse {
        title: state.device.title(),
        device: state.device.as_ref().clone(),
        snapshot: poll.snapshot.as_deref().cloned(),
        status: poll.status,
    })
}

/// All entity states, read from a single snapshot
pub async fn list_entities(State(state): State<Arc<AppState>>) -> Json<Vec<EntityState>> {
    let snapshot = state.poller.snapshot();
    Json(
        state
            .entities
            .iter()
            .map(|entity| entity.state(snapshot.as_deref()))
            .collect(),
    )
}

pub async fn get_entity(
    Path(key): Path<String>,
    State(state): State<Arc<AppState>>,
) -> Result<Json<EntityState>, StatusCode> {
    let key = SensorKey::parse(&key).ok_or(StatusCode::NOT_FOUND)?;
    let snapshot = state.poller.snapshot();

    state
        .entities
        .iter()
        .find(|entity| entity.key() == key)
        .map(|entity| Json(entity.state(snapshot.as_deref())))
        .ok_or(StatusCode::NOT_FOUND)
}
