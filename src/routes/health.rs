use axum::extract::State;
use axum::Json;
use serde::Serialize;
use utoipa::ToSchema;

use crate::routes::monitor::AppState;

/// Health check response.
#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    /// Service status ("ok", or "degraded" when Google geocoding is unavailable)
    pub status: String,
    /// API version
    pub version: String,
    /// Whether the Google-backed geocoding providers are configured
    pub geocoding: bool,
}

/// Health check endpoint.
///
/// Reports "degraded" (still 200) when the Google Maps key is missing:
/// structured geocoding and place search are disabled, but the open
/// geocoder and the live-data poller keep working.
#[utoipa::path(
    get,
    path = "/api/v1/health",
    tag = "Health",
    responses(
        (status = 200, description = "Service is healthy", body = HealthResponse),
    )
)]
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let geocoding = state.config.google_maps_api_key.is_some();

    Json(HealthResponse {
        status: if geocoding {
            "ok".to_string()
        } else {
            "degraded".to_string()
        },
        version: env!("CARGO_PKG_VERSION").to_string(),
        geocoding,
    })
}
