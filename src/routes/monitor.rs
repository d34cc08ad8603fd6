//! Monitoring session HTTP endpoints.
//!
//! - POST   /api/v1/monitor/location — resolve a free-text query and start polling
//! - POST   /api/v1/monitor/pin      — monitor a map-clicked coordinate
//! - GET    /api/v1/monitor/status   — session snapshot (sample, history, alerts)
//! - DELETE /api/v1/monitor/location — stop monitoring

use axum::extract::State;
use axum::Json;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use utoipa::ToSchema;

use crate::config::AppConfig;
use crate::errors::AppError;
use crate::services::alerts::{self, Alert};
use crate::services::geocode::{Coordinate, Viewport};
use crate::services::monitor::{HistoryPoint, MonitorEngine, Sample};
use crate::services::resolver::{Resolution, ResolvedLocation, Resolver};

/// Zoom used when a resolution carries no viewport to fit.
const DEFAULT_ZOOM: u8 = 15;

/// Shared application state.
#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) resolver: Arc<Resolver>,
    pub(crate) engine: Arc<MonitorEngine>,
    pub(crate) config: Arc<AppConfig>,
}

// ---------------------------------------------------------------------------
// Request / response types
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize, ToSchema)]
pub struct ResolveRequest {
    /// Free-text location query ("village, town, area...")
    pub query: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct PinRequest {
    pub lat: f64,
    pub lng: f64,
}

/// How the map should refocus after a resolution.
#[derive(Debug, Serialize, ToSchema)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MapFocus {
    /// Fit the returned bounding box
    FitBounds { viewport: Viewport },
    /// Center on the point at a fixed zoom
    Center { coordinate: Coordinate, zoom: u8 },
}

impl MapFocus {
    fn for_location(location: &ResolvedLocation) -> Self {
        match location.viewport {
            Some(viewport) => MapFocus::FitBounds { viewport },
            None => MapFocus::Center {
                coordinate: location.coordinate,
                zoom: DEFAULT_ZOOM,
            },
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ResolveResponse {
    /// A provider produced a usable location; polling has started.
    Resolved {
        location: ResolvedLocation,
        focus: MapFocus,
    },
    /// Every provider was exhausted. Recoverable by retrying with more
    /// administrative detail; not an error.
    NotFound { message: String },
}

/// Snapshot of the monitoring session for the dashboard.
#[derive(Debug, Serialize, ToSchema)]
pub struct MonitorStatusResponse {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<ResolvedLocation>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latest: Option<Sample>,
    /// Alerts recomputed from the latest sample (empty when no sample yet)
    pub alerts: Vec<Alert>,
    /// True iff at least one alert is critical
    pub critical: bool,
    pub history: Vec<HistoryPoint>,
    pub connected: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_updated: Option<DateTime<Utc>>,
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// Resolve a free-text query and start monitoring the result.
#[utoipa::path(
    post,
    path = "/api/v1/monitor/location",
    tag = "Monitor",
    request_body = ResolveRequest,
    responses(
        (status = 200, description = "Resolution outcome", body = ResolveResponse),
        (status = 400, description = "Blank query", body = crate::errors::ErrorResponse),
    )
)]
pub async fn resolve_location(
    State(state): State<AppState>,
    Json(request): Json<ResolveRequest>,
) -> Result<Json<ResolveResponse>, AppError> {
    match state.resolver.resolve(&request.query).await {
        Resolution::Resolved(location) => {
            let focus = MapFocus::for_location(&location);
            state.engine.set_location(location.clone()).await;
            Ok(Json(ResolveResponse::Resolved { location, focus }))
        }
        Resolution::NotFound { query } => Ok(Json(ResolveResponse::NotFound {
            message: Resolver::not_found_message(&query),
        })),
        Resolution::Noop => Err(AppError::BadRequest(
            "Location query must not be empty".to_string(),
        )),
    }
}

/// Monitor a map-clicked coordinate (reverse-geocoded label, or pinned).
#[utoipa::path(
    post,
    path = "/api/v1/monitor/pin",
    tag = "Monitor",
    request_body = PinRequest,
    responses(
        (status = 200, description = "Pinned location now monitored", body = ResolveResponse),
        (status = 400, description = "Coordinate out of range", body = crate::errors::ErrorResponse),
    )
)]
pub async fn pin_location(
    State(state): State<AppState>,
    Json(request): Json<PinRequest>,
) -> Result<Json<ResolveResponse>, AppError> {
    let coordinate =
        Coordinate::new(request.lat, request.lng).map_err(AppError::BadRequest)?;

    let location = state.resolver.resolve_click(coordinate).await;
    let focus = MapFocus::for_location(&location);
    state.engine.set_location(location.clone()).await;

    Ok(Json(ResolveResponse::Resolved { location, focus }))
}

/// Current session snapshot: latest sample, alerts, rolling history.
#[utoipa::path(
    get,
    path = "/api/v1/monitor/status",
    tag = "Monitor",
    responses(
        (status = 200, description = "Current monitoring state", body = MonitorStatusResponse),
    )
)]
pub async fn monitor_status(State(state): State<AppState>) -> Json<MonitorStatusResponse> {
    let shared = state.engine.state();
    let s = shared.read().await;

    let alert_list = s.latest.as_ref().map(alerts::evaluate).unwrap_or_default();
    let critical = alerts::has_critical(&alert_list);

    Json(MonitorStatusResponse {
        location: s.location.clone(),
        latest: s.latest.clone(),
        alerts: alert_list,
        critical,
        history: s.history.to_vec(),
        connected: s.connected,
        last_updated: s.last_updated,
    })
}

/// Stop monitoring and clear the session. Idempotent.
#[utoipa::path(
    delete,
    path = "/api/v1/monitor/location",
    tag = "Monitor",
    responses(
        (status = 204, description = "Session cleared"),
    )
)]
pub async fn clear_location(State(state): State<AppState>) -> axum::http::StatusCode {
    state.engine.clear().await;
    axum::http::StatusCode::NO_CONTENT
}
