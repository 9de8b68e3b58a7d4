// Main entry point - Device setup, polling and the read API
mod application;
mod domain;
mod infrastructure;
mod presentation;

use std::{net::SocketAddr, sync::Arc};

use anyhow::Context;
use axum::{Router, routing::get};
use tokio::signal::unix::{SignalKind, signal};
use tokio::sync::oneshot;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use crate::application::poller::{Poller, PollerHandle};
use crate::application::setup::validate_device;
use crate::domain::entity::build_entities;
use crate::infrastructure::config::{AppConfig, load_config};
use crate::infrastructure::device_client::DeviceClient;
use crate::presentation::app_state::AppState;
use crate::presentation::handlers::{current_snapshot, get_entity, health_check, list_entities};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // Load configuration
    let config = load_config()?;

    // Validate the device once; setup errors are the only ones that stop us
    let client = Arc::new(DeviceClient::from_settings(&config.device)?);
    let identity = match validate_device(client.as_ref(), &config.device.name).await {
        Ok(identity) => Arc::new(identity),
        Err(e) => {
            tracing::error!("Device setup failed ({}): {}", e.error_key(), e);
            return Err(e.into());
        }
    };

    // Wait for the first refresh before serving anything
    let mut poller = Poller::new(client, config.poll.poller_config());
    if let Err(e) = poller.start().await {
        tracing::warn!("First poll failed, entities stay unknown until the device answers: {}", e.reason);
    }

    tokio::spawn(log_activity(poller.handle()));

    let state = Arc::new(AppState {
        device: identity.clone(),
        poller: poller.handle(),
        entities: build_entities(identity, config.units),
    });

    let router = Router::new()
        .route("/healthz", get(health_check))
        .route("/snapshot", get(current_snapshot))
        .route("/entities", get(list_entities))
        .route("/entities/:key", get(get_entity))
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    let addr: SocketAddr = config
        .server
        .bind
        .parse()
        .with_context(|| format!("Invalid bind address {}", config.server.bind))?;
    tracing::info!("Serving treadmill entities on {}", addr);

    let (stop_tx, stop_rx) = oneshot::channel::<()>();
    let listener = tokio::net::TcpListener::bind(addr).await?;
    let server = tokio::spawn(async move {
        axum::serve(listener, router)
            .with_graceful_shutdown(async {
                let _ = stop_rx.await;
            })
            .await
    });

    // SIGHUP re-reads the config and retargets the poller if the device or interval changed
    let mut hangup = signal(SignalKind::hangup())?;
    let mut current = config;
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            _ = hangup.recv() => {
                match reload_poller(&current, &mut poller).await {
                    Ok(Some(config)) => current = config,
                    Ok(None) => tracing::info!("Device and poll settings unchanged"),
                    Err(e) => tracing::error!("Config reload failed: {:#}", e),
                }
            }
        }
    }

    let status = poller.handle().status();
    tracing::info!(
        "Shutting down (last successful poll: {:?}, failed polls in a row: {})",
        status.last_success,
        status.consecutive_failures
    );
    poller.stop().await;
    let _ = stop_tx.send(());
    server.await??;
    Ok(())
}

/// Returns the new config when the device target or poll interval changed
async fn reload_poller(
    current: &AppConfig,
    poller: &mut Poller,
) -> anyhow::Result<Option<AppConfig>> {
    let config = load_config()?;
    if config.device.base_url() == current.device.base_url()
        && config.device.request_timeout_secs == current.device.request_timeout_secs
        && config.poll.interval_secs == current.poll.interval_secs
    {
        return Ok(None);
    }

    let client = Arc::new(DeviceClient::from_settings(&config.device)?);
    if let Err(e) = poller.reconfigure(client, config.poll.poller_config()).await {
        tracing::warn!("First poll after reload failed: {}", e.reason);
    }
    Ok(Some(config))
}

/// Logs workouts starting and ending
async fn log_activity(mut handle: PollerHandle) {
    let mut active = handle.snapshot().is_some_and(|s| s.status);
    while handle.changed().await {
        let Some(snapshot) = handle.snapshot() else {
            continue;
        };
        if snapshot.status == active {
            continue;
        }
        active = snapshot.status;
        if active {
            tracing::info!(
                "Workout started: {}",
                snapshot.workout_name.as_deref().unwrap_or("unnamed")
            );
        } else {
            tracing::info!("Workout ended");
        }
    }
}
