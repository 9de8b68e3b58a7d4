// Poller - periodic fetch, normalize and publish of the treadmill snapshot
use crate::application::device_source::DeviceSource;
use crate::domain::device::{HA_PATH, SERVER_PATH};
use crate::domain::error::DeviceError;
use crate::domain::normalizer::{HA_BODY, RawBodies, SERVER_BODY, normalize};
use crate::domain::snapshot::Snapshot;
use chrono::{DateTime, Utc};
use futures::future::try_join_all;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(2);

#[derive(Debug, Clone)]
pub struct PollerConfig {
    pub interval: Duration,
    /// `(body name, relative path)` pairs fetched on every tick
    pub endpoints: Vec<(String, String)>,
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self {
            interval: DEFAULT_INTERVAL,
            endpoints: vec![
                (HA_BODY.to_string(), HA_PATH.to_string()),
                (SERVER_BODY.to_string(), SERVER_PATH.to_string()),
            ],
        }
    }
}

/// Why and when a tick failed
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PollError {
    pub kind: &'static str,
    pub reason: String,
    pub at: DateTime<Utc>,
}

impl From<DeviceError> for PollError {
    fn from(err: DeviceError) -> Self {
        Self {
            kind: err.kind(),
            reason: err.to_string(),
            at: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PollStatus {
    /// Failed ticks since the last successful one
    pub consecutive_failures: u32,
    pub last_error: Option<PollError>,
    pub last_success: Option<DateTime<Utc>>,
}

/// Snapshot and poll health, always published together
#[derive(Debug, Clone, Default)]
pub struct PollState {
    pub snapshot: Option<Arc<Snapshot>>,
    pub status: PollStatus,
}

/// Read-only view of a poller's latest state. Cheap to clone.
#[derive(Debug, Clone)]
pub struct PollerHandle {
    rx: watch::Receiver<PollState>,
}

impl PollerHandle {
    pub fn snapshot(&self) -> Option<Arc<Snapshot>> {
        self.rx.borrow().snapshot.clone()
    }

    pub fn status(&self) -> PollStatus {
        self.rx.borrow().status.clone()
    }

    pub fn state(&self) -> PollState {
        self.rx.borrow().clone()
    }

    /// Wait for the next publish. Returns false once the poller is gone.
    pub async fn changed(&mut self) -> bool {
        self.rx.changed().await.is_ok()
    }
}

struct Running {
    shutdown: watch::Sender<bool>,
    task: JoinHandle<()>,
}

pub struct Poller {
    source: Arc<dyn DeviceSource>,
    config: PollerConfig,
    state: Arc<watch::Sender<PollState>>,
    running: Option<Running>,
}

impl Poller {
    pub fn new(source: Arc<dyn DeviceSource>, config: PollerConfig) -> Self {
        let (state, _) = watch::channel(PollState::default());
        Self {
            source,
            config,
            state: Arc::new(state),
            running: None,
        }
    }

    pub fn handle(&self) -> PollerHandle {
        PollerHandle {
            rx: self.state.subscribe(),
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.is_some()
    }

    /// Run the first tick, wait for it, then keep polling in the background.
    ///
    /// The recurring cycle starts whatever the first tick's outcome; the
    /// returned result only reports that outcome.
    pub async fn start(&mut self) -> Result<(), PollError> {
        if self.running.is_some() {
            debug!("Poller already running for {}", self.source.describe());
            return Ok(());
        }

        info!(
            "Polling {} every {:?}",
            self.source.describe(),
            self.config.interval
        );
        let first = run_tick(self.source.as_ref(), &self.config.endpoints, &self.state).await;

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let task = tokio::spawn(poll_loop(
            self.source.clone(),
            self.config.clone(),
            self.state.clone(),
            shutdown_rx,
        ));
        self.running = Some(Running {
            shutdown: shutdown_tx,
            task,
        });

        first
    }

    /// Cancel the recurring cycle. In-flight requests are abandoned and
    /// nothing is published once this returns.
    pub async fn stop(&mut self) {
        let Some(running) = self.running.take() else {
            return;
        };

        let _ = running.shutdown.send(true);
        if let Err(e) = running.task.await {
            warn!("Poll task ended abnormally: {}", e);
        }
        info!("Stopped polling {}", self.source.describe());
    }

    /// Point the poller at a new device and/or interval and restart the cycle.
    ///
    /// Reader handles stay valid; the last snapshot is kept until the new
    /// target's first tick replaces it.
    pub async fn reconfigure(
        &mut self,
        source: Arc<dyn DeviceSource>,
        config: PollerConfig,
    ) -> Result<(), PollError> {
        let was_running = self.is_running();
        self.stop().await;
        info!(
            "Retargeting poller from {} to {}",
            self.source.describe(),
            source.describe()
        );
        self.source = source;
        self.config = config;

        if was_running {
            self.start().await
        } else {
            Ok(())
        }
    }
}

impl Drop for Poller {
    fn drop(&mut self) {
        if let Some(running) = self.running.take() {
            running.task.abort();
        }
    }
}

async fn poll_loop(
    source: Arc<dyn DeviceSource>,
    config: PollerConfig,
    state: Arc<watch::Sender<PollState>>,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut interval = tokio::time::interval_at(Instant::now() + config.interval, config.interval);
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = shutdown.changed() => break,
            _ = interval.tick() => {}
        }

        let started = Instant::now();
        tokio::select! {
            _ = shutdown.changed() => {
                debug!("Abandoning in-flight tick on shutdown");
                break;
            }
            _ = run_tick(source.as_ref(), &config.endpoints, &state) => {}
        }

        let elapsed = started.elapsed();
        if elapsed > config.interval {
            warn!(
                "Tick took {:?}, longer than the {:?} interval; skipping missed ticks",
                elapsed, config.interval
            );
        }
    }
}

/// One tick: fetch every endpoint concurrently, normalize only if all
/// succeeded, then publish the snapshot or record the failure.
async fn run_tick(
    source: &dyn DeviceSource,
    endpoints: &[(String, String)],
    state: &watch::Sender<PollState>,
) -> Result<(), PollError> {
    let fetches = endpoints.iter().map(|(name, path)| async move {
        let body = source.get_json(path).await?;
        Ok::<_, DeviceError>((name.clone(), body))
    });

    let outcome = try_join_all(fetches)
        .await
        .and_then(|bodies| normalize(&bodies.into_iter().collect::<RawBodies>()));

    match outcome {
        Ok(snapshot) => {
            debug!(
                "Device state: status={} speed={:?} heart_rate={:?}",
                snapshot.status, snapshot.speed, snapshot.heart_rate
            );
            let snapshot = Arc::new(snapshot);
            state.send_modify(|current| {
                if current.status.consecutive_failures > 0 {
                    info!(
                        "Device reachable again after {} failed polls",
                        current.status.consecutive_failures
                    );
                }
                current.snapshot = Some(snapshot);
                current.status.consecutive_failures = 0;
                current.status.last_success = Some(Utc::now());
            });
            Ok(())
        }
        Err(err) => {
            let error = PollError::from(err);
            state.send_modify(|current| {
                current.status.consecutive_failures += 1;
                if current.status.consecutive_failures == 1 {
                    warn!("Device poll failed ({}): {}", error.kind, error.reason);
                } else {
                    debug!(
                        "Device poll failed again ({} in a row): {}",
                        current.status.consecutive_failures, error.reason
                    );
                }
                current.status.last_error = Some(error.clone());
            });
            Err(error)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use serde_json::{Value, json};
    use std::collections::HashMap;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// In-memory device: returns whatever body or error is configured per path
    struct FakeDevice {
        label: String,
        responses: Mutex<HashMap<String, Result<Value, DeviceError>>>,
        delay: Duration,
        calls: AtomicUsize,
        in_flight: AtomicUsize,
        max_in_flight: AtomicUsize,
    }

    impl FakeDevice {
        fn new(label: &str, ha: Value, server: Value) -> Arc<Self> {
            Self::with_delay(label, ha, server, Duration::ZERO)
        }

        fn with_delay(label: &str, ha: Value, server: Value, delay: Duration) -> Arc<Self> {
            let mut responses = HashMap::new();
            responses.insert(HA_PATH.to_string(), Ok(ha));
            responses.insert(SERVER_PATH.to_string(), Ok(server));
            Arc::new(Self {
                label: label.to_string(),
                responses: Mutex::new(responses),
                delay,
                calls: AtomicUsize::new(0),
                in_flight: AtomicUsize::new(0),
                max_in_flight: AtomicUsize::new(0),
            })
        }

        fn respond(&self, path: &str, response: Result<Value, DeviceError>) {
            self.responses.lock().unwrap().insert(path.to_string(), response);
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl DeviceSource for FakeDevice {
        async fn get_json(&self, path: &str) -> Result<Value, DeviceError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if path == HA_PATH {
                let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                self.max_in_flight.fetch_max(now, Ordering::SeqCst);
            }
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            if path == HA_PATH {
                self.in_flight.fetch_sub(1, Ordering::SeqCst);
            }

            self.responses
                .lock()
                .unwrap()
                .get(path)
                .cloned()
                .unwrap_or_else(|| Err(DeviceError::connectivity(path, "not found")))
        }

        fn describe(&self) -> String {
            self.label.clone()
        }
    }

    fn workout_body() -> Value {
        json!({
            "workout": {
                "current_preset_name": "5K",
                "current_phase_name": "Warmup",
                "heart_rate": 120,
                "duration": 61.4,
                "speed": 8.5,
                "grade": 1.0
            },
            "screensaver": false,
            "current_profile": {"first_name": "Jane", "last_name": "Doe"}
        })
    }

    fn idle_body() -> Value {
        json!({"workout": null, "screensaver": true, "current_profile": null})
    }

    fn refused() -> Result<Value, DeviceError> {
        Err(DeviceError::connectivity("http://127.0.0.1:5678/api/v1/server", "connection refused"))
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_publishes_first_snapshot() {
        let device = FakeDevice::new("fake", workout_body(), json!({"inactive_time": 300}));
        let mut poller = Poller::new(device.clone(), PollerConfig::default());
        let handle = poller.handle();
        assert!(handle.snapshot().is_none());

        poller.start().await.unwrap();

        let snapshot = handle.snapshot().unwrap();
        assert_eq!(snapshot.current_profile, "Jane Doe");
        assert_eq!(snapshot.duration, Some(Duration::from_secs(61)));
        assert_eq!(snapshot.inactive_time, Some(300.into()));
        assert_eq!(handle.status().consecutive_failures, 0);
        assert!(handle.status().last_success.is_some());
        assert_eq!(device.calls(), 2);

        poller.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_fetch_keeps_previous_snapshot() {
        let device = FakeDevice::new("fake", workout_body(), json!({"inactive_time": 300}));
        let mut poller = Poller::new(device.clone(), PollerConfig::default());
        let handle = poller.handle();
        poller.start().await.unwrap();
        let before = handle.snapshot().unwrap();

        // ha would now normalize differently, but server fails
        device.respond(HA_PATH, Ok(idle_body()));
        device.respond(SERVER_PATH, refused());
        tokio::time::sleep(Duration::from_millis(2100)).await;

        let status = handle.status();
        assert_eq!(status.consecutive_failures, 1);
        assert_eq!(status.last_error.as_ref().unwrap().kind, "connectivity");
        assert_eq!(*handle.snapshot().unwrap(), *before);

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(handle.status().consecutive_failures, 2);
        assert_eq!(*handle.snapshot().unwrap(), *before);

        poller.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_recovery_resets_failure_count() {
        let device = FakeDevice::new("fake", workout_body(), json!({"inactive_time": 300}));
        device.respond(HA_PATH, refused());
        let mut poller = Poller::new(device.clone(), PollerConfig::default());
        let handle = poller.handle();

        let first = poller.start().await;
        assert!(first.is_err());
        assert!(poller.is_running());
        assert!(handle.snapshot().is_none());
        assert_eq!(handle.status().consecutive_failures, 1);

        device.respond(HA_PATH, Ok(idle_body()));
        tokio::time::sleep(Duration::from_millis(2100)).await;

        let snapshot = handle.snapshot().unwrap();
        assert!(!snapshot.status);
        assert_eq!(snapshot.speed, Some(0.0));
        let status = handle.status();
        assert_eq!(status.consecutive_failures, 0);
        assert!(status.last_error.is_some());

        poller.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_malformed_body_fails_tick() {
        let device = FakeDevice::new("fake", idle_body(), json!([1, 2, 3]));
        let mut poller = Poller::new(device, PollerConfig::default());
        let err = poller.start().await.unwrap_err();
        assert_eq!(err.kind, "malformed_response");
        assert!(poller.handle().snapshot().is_none());
        poller.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_nothing_published_after_stop() {
        let device = FakeDevice::new("fake", idle_body(), json!({"inactive_time": 45}));
        let mut poller = Poller::new(device.clone(), PollerConfig::default());
        let handle = poller.handle();
        poller.start().await.unwrap();
        poller.stop().await;
        assert!(!poller.is_running());

        let calls = device.calls();
        device.respond(HA_PATH, Ok(workout_body()));
        tokio::time::sleep(Duration::from_secs(10)).await;

        assert_eq!(device.calls(), calls);
        assert!(!handle.snapshot().unwrap().status);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_abandons_slow_tick() {
        let device = FakeDevice::with_delay(
            "slow",
            idle_body(),
            json!({"inactive_time": 45}),
            Duration::from_secs(1),
        );
        let mut poller = Poller::new(device.clone(), PollerConfig::default());
        let handle = poller.handle();
        poller.start().await.unwrap();
        let published = handle.snapshot().unwrap();

        // Let the next tick start, then stop while its requests are pending
        device.respond(HA_PATH, Ok(workout_body()));
        tokio::time::sleep(Duration::from_millis(2500)).await;
        poller.stop().await;
        tokio::time::sleep(Duration::from_secs(5)).await;

        assert!(Arc::ptr_eq(&handle.snapshot().unwrap(), &published));
    }

    #[tokio::test(start_paused = true)]
    async fn test_ticks_never_overlap() {
        let device = FakeDevice::with_delay(
            "sluggish",
            idle_body(),
            json!({"inactive_time": 45}),
            Duration::from_secs(5),
        );
        let mut poller = Poller::new(device.clone(), PollerConfig::default());
        poller.start().await.unwrap();

        tokio::time::sleep(Duration::from_secs(30)).await;
        poller.stop().await;

        assert_eq!(device.max_in_flight.load(Ordering::SeqCst), 1);
        // 2 calls per tick, and a 5s tick can't run more than once per 5s
        assert!(device.calls() <= 2 * 7);
    }

    #[tokio::test(start_paused = true)]
    async fn test_reconfigure_keeps_handles() {
        let first = FakeDevice::new("first", idle_body(), json!({"inactive_time": 1}));
        let mut poller = Poller::new(first.clone(), PollerConfig::default());
        let handle = poller.handle();
        poller.start().await.unwrap();

        let second = FakeDevice::new("second", workout_body(), json!({"inactive_time": 2}));
        poller.reconfigure(second.clone(), PollerConfig::default()).await.unwrap();
        assert!(poller.is_running());
        assert_eq!(handle.snapshot().unwrap().inactive_time, Some(2.into()));

        let first_calls = first.calls();
        tokio::time::sleep(Duration::from_millis(4100)).await;
        assert_eq!(first.calls(), first_calls);
        assert_eq!(second.calls(), 6);

        poller.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_reconfigure_applies_new_interval() {
        let device = FakeDevice::new("fake", idle_body(), json!({"inactive_time": 1}));
        let mut poller = Poller::new(device.clone(), PollerConfig::default());
        poller.start().await.unwrap();

        let faster = PollerConfig {
            interval: Duration::from_secs(1),
            ..PollerConfig::default()
        };
        poller.reconfigure(device.clone(), faster).await.unwrap();
        let calls = device.calls();

        // 1s ticks: four more in 4.1s where the 2s default would give two
        tokio::time::sleep(Duration::from_millis(4100)).await;
        assert_eq!(device.calls() - calls, 2 * 4);

        poller.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_tick_fetches_run_concurrently() {
        let device = FakeDevice::with_delay(
            "slow",
            idle_body(),
            json!({"inactive_time": 45}),
            Duration::from_secs(1),
        );
        let mut poller = Poller::new(device.clone(), PollerConfig::default());

        let started = Instant::now();
        poller.start().await.unwrap();

        // Two 1s fetches back to back would take 2s
        assert!(started.elapsed() < Duration::from_millis(1500));
        assert_eq!(device.calls(), 2);

        poller.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_string_inactive_time_is_published() {
        let device = FakeDevice::new("fake", idle_body(), json!({"inactive_time": "300"}));
        let mut poller = Poller::new(device, PollerConfig::default());
        let handle = poller.handle();

        poller.start().await.unwrap();

        assert_eq!(handle.snapshot().unwrap().inactive_time, Some(json!("300")));
        assert_eq!(handle.status().consecutive_failures, 0);

        poller.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_handle_observes_changes() {
        let device = FakeDevice::new("fake", idle_body(), json!({"inactive_time": 45}));
        let mut poller = Poller::new(device.clone(), PollerConfig::default());
        let mut handle = poller.handle();

        poller.start().await.unwrap();
        assert!(handle.changed().await);
        assert!(!handle.snapshot().unwrap().status);

        device.respond(HA_PATH, Ok(workout_body()));
        assert!(handle.changed().await);
        assert!(handle.snapshot().unwrap().status);

        poller.stop().await;
        drop(poller);
        assert!(!handle.changed().await);
    }
}
