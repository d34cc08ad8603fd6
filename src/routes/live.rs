//! Live-data backend endpoints.
//!
//! - GET /api/live-data — one simulated sensor sample for the requested location
//! - GET /api/locations — known monitoring locations

use axum::extract::{Query, State};
use axum::Json;
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use crate::routes::monitor::AppState;
use crate::services::geocode::Coordinate;
use crate::services::monitor::Sample;
use crate::services::sensor;

#[derive(Debug, Deserialize, IntoParams)]
pub struct LiveDataQuery {
    /// Session identifier (unused by the generator, kept for API compatibility)
    #[allow(dead_code)]
    pub location: Option<String>,
    #[allow(dead_code)]
    pub lat: Option<f64>,
    #[allow(dead_code)]
    pub lng: Option<f64>,
    /// Display name echoed back in the sample
    pub location_name: Option<String>,
}

/// A known monitoring location.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct KnownLocation {
    pub name: String,
    pub coordinate: Coordinate,
}

/// Fetch the current simulated sensor sample.
#[utoipa::path(
    get,
    path = "/api/live-data",
    tag = "LiveData",
    params(LiveDataQuery),
    responses(
        (status = 200, description = "Current sensor sample", body = Sample),
    )
)]
pub async fn get_live_data(
    State(state): State<AppState>,
    Query(query): Query<LiveDataQuery>,
) -> Json<Sample> {
    let name = query
        .location_name
        .filter(|n| !n.trim().is_empty())
        .unwrap_or_else(|| "Unknown field".to_string());

    Json(sensor::generate_sample(&name, &state.config.default_region))
}

/// List the preset monitoring locations.
#[utoipa::path(
    get,
    path = "/api/locations",
    tag = "LiveData",
    responses(
        (status = 200, description = "Known locations", body = [KnownLocation]),
    )
)]
pub async fn list_locations(State(_state): State<AppState>) -> Json<Vec<KnownLocation>> {
    Json(known_locations())
}

/// Monitoring sites in the default service area (Guntur district).
fn known_locations() -> Vec<KnownLocation> {
    vec![
        KnownLocation {
            name: "Guntur".to_string(),
            coordinate: Coordinate {
                lat: 16.3067,
                lng: 80.4365,
            },
        },
        KnownLocation {
            name: "Tenali".to_string(),
            coordinate: Coordinate {
                lat: 16.2430,
                lng: 80.6400,
            },
        },
        KnownLocation {
            name: "Mangalagiri".to_string(),
            coordinate: Coordinate {
                lat: 16.4300,
                lng: 80.5680,
            },
        },
        KnownLocation {
            name: "Narasaraopet".to_string(),
            coordinate: Coordinate {
                lat: 16.2350,
                lng: 80.0490,
            },
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_locations_have_valid_coordinates() {
        let locations = known_locations();
        assert!(!locations.is_empty());
        for loc in locations {
            assert!(
                Coordinate::new(loc.coordinate.lat, loc.coordinate.lng).is_ok(),
                "{} has an invalid coordinate",
                loc.name
            );
        }
    }
}
