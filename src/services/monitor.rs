//! Live monitoring session: sample polling, history window, staleness guard.
//!
//! One session exists at a time. Installing a resolved location bumps a
//! generation counter, clears the history window, and (re)spawns a poll task
//! that fetches a sample immediately and then on a fixed interval. Every
//! completion re-validates the captured generation under the write lock
//! before touching shared state, so a completion that outlived its location
//! (changed or cleared mid-flight) is discarded rather than applied. This is
//! the only staleness mechanism; there are no "mounted" flags.
//!
//! Poll failures flip `connected` to false and leave the last good sample
//! and history visible; the next tick retries automatically.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, RwLock};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use utoipa::ToSchema;

use crate::errors::AppError;
use crate::services::resolver::ResolvedLocation;

/// Session identifier sent as the `location` query parameter, kept for
/// compatibility with the backend API shape.
const DYNAMIC_LOCATION: &str = "dynamic-location";

// ---------------------------------------------------------------------------
// Samples and history
// ---------------------------------------------------------------------------

/// One environmental reading from the backend. Read-only to this service;
/// superseded every poll cycle.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Sample {
    /// Backend timestamp; filled with receipt time when absent.
    #[serde(default = "Utc::now")]
    pub timestamp: DateTime<Utc>,
    /// Air temperature in °C
    pub temperature: f64,
    /// Relative humidity in %
    pub humidity: f64,
    /// Soil moisture in %
    pub soil_moisture: f64,
    /// Crop stress index, 0–100
    pub csi: f64,
    /// Backend status band ("Healthy", "Moderate", "High Risk", "Critical")
    pub status: String,
    pub location_name: String,
    pub region: String,
    /// Backend-raised alert text, empty/absent when none
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alert: Option<String>,
}

/// Charting projection of a [`Sample`].
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct HistoryPoint {
    /// Wall-clock label for the chart x-axis ("%H:%M:%S")
    pub time: String,
    pub temperature: f64,
    pub humidity: f64,
    pub soil_moisture: f64,
    pub csi: f64,
}

impl HistoryPoint {
    pub fn from_sample(sample: &Sample, at: DateTime<Utc>) -> Self {
        Self {
            time: at.format("%H:%M:%S").to_string(),
            temperature: sample.temperature,
            humidity: sample.humidity,
            soil_moisture: sample.soil_moisture,
            csi: sample.csi,
        }
    }
}

/// Bounded FIFO window of recent samples for charting. Oldest evicted first;
/// cleared whenever the resolved location changes.
#[derive(Debug, Clone)]
pub struct SampleHistory {
    points: VecDeque<HistoryPoint>,
    capacity: usize,
}

impl SampleHistory {
    pub fn new(capacity: usize) -> Self {
        Self {
            points: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub fn push(&mut self, point: HistoryPoint) {
        while self.points.len() >= self.capacity {
            self.points.pop_front();
        }
        self.points.push_back(point);
    }

    pub fn clear(&mut self) {
        self.points.clear();
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn to_vec(&self) -> Vec<HistoryPoint> {
        self.points.iter().cloned().collect()
    }
}

// ---------------------------------------------------------------------------
// Shared session state
// ---------------------------------------------------------------------------

/// Current monitoring session. Mutated only by the engine (resolution,
/// clearing) and by poll completions that pass the generation check.
#[derive(Debug)]
pub struct MonitorState {
    /// Bumped on every location change/clear; in-flight completions that
    /// captured an older value discard themselves.
    pub generation: u64,
    pub location: Option<ResolvedLocation>,
    pub latest: Option<Sample>,
    pub history: SampleHistory,
    pub connected: bool,
    pub last_updated: Option<DateTime<Utc>>,
}

impl MonitorState {
    pub fn new(history_capacity: usize) -> Self {
        Self {
            generation: 0,
            location: None,
            latest: None,
            history: SampleHistory::new(history_capacity),
            connected: false,
            last_updated: None,
        }
    }

    /// Apply a completed fetch, unless it is stale. Returns whether the
    /// result was applied.
    pub fn apply_fetch(
        &mut self,
        generation: u64,
        result: Result<Sample, AppError>,
        at: DateTime<Utc>,
    ) -> bool {
        if generation != self.generation {
            tracing::debug!(
                "Discarding stale poll completion (generation {} != {})",
                generation,
                self.generation
            );
            return false;
        }

        match result {
            Ok(sample) => {
                self.connected = true;
                self.history.push(HistoryPoint::from_sample(&sample, at));
                self.latest = Some(sample);
                self.last_updated = Some(at);
            }
            Err(e) => {
                // Stale-but-visible: keep the last good sample and history.
                tracing::warn!("Live sample fetch failed: {}", e);
                self.connected = false;
            }
        }
        true
    }
}

pub type SharedMonitorState = Arc<RwLock<MonitorState>>;

// ---------------------------------------------------------------------------
// Live-data backend client
// ---------------------------------------------------------------------------

/// Client for the live-data backend (`GET /api/live-data`).
#[derive(Debug, Clone)]
pub struct LiveDataClient {
    client: reqwest::Client,
    base_url: String,
}

impl LiveDataClient {
    pub fn new(client: reqwest::Client, base_url: &str) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub async fn fetch_sample(&self, location: &ResolvedLocation) -> Result<Sample, AppError> {
        let url = format!("{}/api/live-data", self.base_url);
        let lat = location.coordinate.lat.to_string();
        let lng = location.coordinate.lng.to_string();
        let response = self
            .client
            .get(&url)
            .query(&[
                ("location", DYNAMIC_LOCATION),
                ("lat", lat.as_str()),
                ("lng", lng.as_str()),
                ("location_name", location.label.as_str()),
            ])
            .send()
            .await
            .map_err(|e| {
                AppError::ExternalServiceError(format!("live-data request failed: {}", e))
            })?;

        if !response.status().is_success() {
            return Err(AppError::ExternalServiceError(format!(
                "live-data backend returned HTTP {}",
                response.status()
            )));
        }

        response.json::<Sample>().await.map_err(|e| {
            AppError::ExternalServiceError(format!("live-data JSON parse error: {}", e))
        })
    }
}

// ---------------------------------------------------------------------------
// Monitor engine
// ---------------------------------------------------------------------------

/// Owns the session state and the cancellable poll task.
pub struct MonitorEngine {
    state: SharedMonitorState,
    task: Mutex<Option<JoinHandle<()>>>,
    client: LiveDataClient,
    poll_interval: Duration,
}

impl MonitorEngine {
    pub fn new(client: LiveDataClient, poll_interval: Duration, history_capacity: usize) -> Self {
        Self {
            state: Arc::new(RwLock::new(MonitorState::new(history_capacity))),
            task: Mutex::new(None),
            client,
            poll_interval,
        }
    }

    pub fn state(&self) -> SharedMonitorState {
        self.state.clone()
    }

    /// Install a newly resolved location: bump the generation (invalidating
    /// any in-flight completion), reset the window, and restart polling.
    pub async fn set_location(&self, location: ResolvedLocation) {
        let generation = {
            let mut s = self.state.write().await;
            s.generation += 1;
            s.location = Some(location.clone());
            s.latest = None;
            s.history.clear();
            s.last_updated = None;
            s.generation
        };

        let handle = tokio::spawn(poll_loop(
            self.state.clone(),
            self.client.clone(),
            location,
            generation,
            self.poll_interval,
        ));

        let mut task = self.task.lock().await;
        if let Some(previous) = task.replace(handle) {
            previous.abort();
        }

        tracing::info!("Monitoring session started (generation {})", generation);
    }

    /// Stop monitoring. Idempotent; pending completions for the old
    /// generation discard themselves.
    pub async fn clear(&self) {
        {
            let mut s = self.state.write().await;
            s.generation += 1;
            s.location = None;
            s.latest = None;
            s.history.clear();
            s.connected = false;
            s.last_updated = None;
        }

        let mut task = self.task.lock().await;
        if let Some(previous) = task.take() {
            previous.abort();
        }

        tracing::info!("Monitoring session cleared");
    }
}

/// Fixed-interval poll loop for one generation. The first tick fires
/// immediately; a fetch outlasting the interval delays the next tick rather
/// than bursting. Exits as soon as the generation moves on.
async fn poll_loop(
    state: SharedMonitorState,
    client: LiveDataClient,
    location: ResolvedLocation,
    generation: u64,
    poll_interval: Duration,
) {
    let mut ticker = tokio::time::interval(poll_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        ticker.tick().await;

        if state.read().await.generation != generation {
            return;
        }

        let result = client.fetch_sample(&location).await;
        let now = Utc::now();

        let mut s = state.write().await;
        if !s.apply_fetch(generation, result, now) {
            return;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::geocode::{Coordinate, ProviderKind};
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn location(label: &str) -> ResolvedLocation {
        ResolvedLocation {
            coordinate: Coordinate {
                lat: 16.3067,
                lng: 80.4365,
            },
            label: label.to_string(),
            viewport: None,
            source: ProviderKind::OpenGeocoder,
        }
    }

    fn sample(n: usize) -> Sample {
        Sample {
            timestamp: Utc::now(),
            temperature: n as f64,
            humidity: 50.0,
            soil_moisture: 50.0,
            csi: 10.0,
            status: "Healthy".to_string(),
            location_name: "Guntur".to_string(),
            region: "India".to_string(),
            alert: None,
        }
    }

    fn sample_body(temperature: f64) -> serde_json::Value {
        serde_json::json!({
            "temperature": temperature,
            "humidity": 55.0,
            "soil_moisture": 45.0,
            "csi": 22.5,
            "status": "Healthy",
            "location_name": "Guntur",
            "region": "India",
            "alert": ""
        })
    }

    #[test]
    fn test_history_evicts_oldest_first() {
        let mut history = SampleHistory::new(24);
        let now = Utc::now();
        for n in 1..=30 {
            history.push(HistoryPoint::from_sample(&sample(n), now));
        }

        assert_eq!(history.len(), 24);
        // After 30 appends at capacity 24, the head is the 7th appended point.
        let points = history.to_vec();
        assert_eq!(points[0].temperature, 7.0);
        assert_eq!(points[23].temperature, 30.0);
    }

    #[test]
    fn test_history_under_capacity_keeps_all() {
        let mut history = SampleHistory::new(24);
        let now = Utc::now();
        for n in 1..=5 {
            history.push(HistoryPoint::from_sample(&sample(n), now));
        }
        assert_eq!(history.len(), 5);
        assert_eq!(history.to_vec()[0].temperature, 1.0);
    }

    #[test]
    fn test_apply_fetch_success_updates_state() {
        let mut state = MonitorState::new(24);
        state.generation = 3;

        let now = Utc::now();
        assert!(state.apply_fetch(3, Ok(sample(1)), now));
        assert!(state.connected);
        assert_eq!(state.history.len(), 1);
        assert!(state.latest.is_some());
        assert_eq!(state.last_updated, Some(now));
    }

    #[test]
    fn test_apply_fetch_failure_keeps_stale_data_visible() {
        let mut state = MonitorState::new(24);
        state.generation = 1;
        let now = Utc::now();
        state.apply_fetch(1, Ok(sample(1)), now);

        let applied = state.apply_fetch(
            1,
            Err(AppError::ExternalServiceError("timeout".to_string())),
            Utc::now(),
        );
        assert!(applied);
        assert!(!state.connected);
        // Last good sample and history remain displayed.
        assert!(state.latest.is_some());
        assert_eq!(state.history.len(), 1);
        assert_eq!(state.last_updated, Some(now));
    }

    #[test]
    fn test_stale_completion_is_discarded() {
        let mut state = MonitorState::new(24);
        state.generation = 1;

        // Location changed (generation bumped) while a fetch was in flight.
        state.generation = 2;
        state.history.clear();

        assert!(!state.apply_fetch(1, Ok(sample(9)), Utc::now()));
        assert!(state.history.is_empty());
        assert!(state.latest.is_none());
        assert!(!state.connected);
    }

    #[tokio::test]
    async fn test_set_location_resets_history() {
        let client = LiveDataClient::new(reqwest::Client::new(), "http://127.0.0.1:9");
        let engine = MonitorEngine::new(client, Duration::from_secs(3600), 24);

        let state = engine.state();

        // Seed some history under the first location.
        engine.set_location(location("first")).await;
        {
            let mut s = state.write().await;
            let generation = s.generation;
            for n in 1..=5 {
                s.apply_fetch(generation, Ok(sample(n)), Utc::now());
            }
            assert_eq!(s.history.len(), 5);
        }

        engine.set_location(location("second")).await;
        {
            let s = state.read().await;
            assert_eq!(s.history.len(), 0);
            assert!(s.latest.is_none());
            assert_eq!(s.location.as_ref().unwrap().label, "second");
        }

        engine.clear().await;
    }

    #[tokio::test]
    async fn test_in_flight_result_for_old_location_never_lands() {
        let client = LiveDataClient::new(reqwest::Client::new(), "http://127.0.0.1:9");
        let engine = MonitorEngine::new(client, Duration::from_secs(3600), 24);

        let state = engine.state();

        engine.set_location(location("L1")).await;
        let old_generation = state.read().await.generation;

        // Poll A for L1 is in flight while the location changes to L2.
        engine.set_location(location("L2")).await;

        // Poll A now completes; it must not append to L2's history.
        {
            let mut s = state.write().await;
            assert!(!s.apply_fetch(old_generation, Ok(sample(1)), Utc::now()));
        }
        {
            let s = state.read().await;
            assert!(s.history.is_empty());
            assert!(s.latest.is_none());
        }

        engine.clear().await;
    }

    #[tokio::test]
    async fn test_clear_is_idempotent() {
        let client = LiveDataClient::new(reqwest::Client::new(), "http://127.0.0.1:9");
        let engine = MonitorEngine::new(client, Duration::from_secs(3600), 24);

        let state = engine.state();

        engine.set_location(location("L1")).await;
        engine.clear().await;
        engine.clear().await;

        let s = state.read().await;
        assert!(s.location.is_none());
        assert!(s.history.is_empty());
        assert!(!s.connected);
    }

    #[tokio::test]
    async fn test_poll_loop_fetches_immediately_and_repeats() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/live-data"))
            .and(query_param("location_name", "Guntur"))
            .respond_with(ResponseTemplate::new(200).set_body_json(sample_body(31.5)))
            .mount(&server)
            .await;

        let client = LiveDataClient::new(reqwest::Client::new(), &server.uri());
        let engine = MonitorEngine::new(client, Duration::from_millis(25), 24);
        let state = engine.state();
        engine.set_location(location("Guntur")).await;

        // First fetch happens at once, not after one interval.
        tokio::time::sleep(Duration::from_millis(15)).await;
        {
            let s = state.read().await;
            assert!(s.connected, "first fetch should land immediately");
            assert_eq!(s.history.len(), 1);
            assert_eq!(s.latest.as_ref().unwrap().temperature, 31.5);
        }

        // And keeps ticking on the interval.
        tokio::time::sleep(Duration::from_millis(80)).await;
        {
            let s = state.read().await;
            assert!(s.history.len() >= 3);
        }

        engine.clear().await;
    }

    #[tokio::test]
    async fn test_poll_failure_marks_disconnected_then_recovers() {
        let server = MockServer::start().await;
        // First response fails, subsequent ones succeed.
        Mock::given(method("GET"))
            .and(path("/api/live-data"))
            .respond_with(ResponseTemplate::new(500))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/live-data"))
            .respond_with(ResponseTemplate::new(200).set_body_json(sample_body(29.0)))
            .mount(&server)
            .await;

        let client = LiveDataClient::new(reqwest::Client::new(), &server.uri());
        let engine = MonitorEngine::new(client, Duration::from_millis(25), 24);
        let state = engine.state();
        engine.set_location(location("Guntur")).await;

        tokio::time::sleep(Duration::from_millis(15)).await;
        assert!(!state.read().await.connected);

        tokio::time::sleep(Duration::from_millis(60)).await;
        {
            let s = state.read().await;
            assert!(s.connected, "next tick should recover connectivity");
            assert!(!s.history.is_empty());
        }

        engine.clear().await;
    }
}
