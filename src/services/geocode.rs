//! Geocoding provider clients.
//!
//! Three independent providers sit behind the [`LocationProvider`] enum:
//!
//! - [`StructuredGeocoder`] — Google Geocoding API (forward + reverse)
//! - [`PlaceSearch`] — Google Places "Find Place from Text" (keyword/POI lookup)
//! - [`OpenGeocoder`] — OpenStreetMap Nominatim (no key required)
//!
//! Every lookup catches its own transport and decode failures and returns
//! `None` so that one provider's outage never aborts the resolver's fallback
//! chain. Base URLs are injectable for tests.

use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, USER_AGENT};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

const GOOGLE_GEOCODE_URL: &str = "https://maps.googleapis.com/maps/api/geocode/json";
const GOOGLE_FIND_PLACE_URL: &str =
    "https://maps.googleapis.com/maps/api/place/findplacefromtext/json";
const NOMINATIM_SEARCH_URL: &str = "https://nominatim.openstreetmap.org/search";

// ---------------------------------------------------------------------------
// Geographic types
// ---------------------------------------------------------------------------

/// A WGS84 point. Field names match the Google Maps wire format.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Coordinate {
    pub lat: f64,
    pub lng: f64,
}

impl Coordinate {
    /// Validated constructor; rejects out-of-range latitude/longitude.
    pub fn new(lat: f64, lng: f64) -> Result<Self, String> {
        if !(-90.0..=90.0).contains(&lat) {
            return Err(format!("latitude {} out of range [-90, 90]", lat));
        }
        if !(-180.0..=180.0).contains(&lng) {
            return Err(format!("longitude {} out of range [-180, 180]", lng));
        }
        Ok(Self { lat, lng })
    }
}

/// Bounding box returned by a geocoder, used to fit the map viewport.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Viewport {
    pub northeast: Coordinate,
    pub southwest: Coordinate,
}

/// Which provider produced a resolved location.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum ProviderKind {
    StructuredGeocoder,
    PlaceSearch,
    OpenGeocoder,
    /// Synthesized from a raw map click (reverse geocoding unavailable).
    Pinned,
}

/// A single usable candidate from any provider.
#[derive(Debug, Clone)]
pub struct ProviderHit {
    pub coordinate: Coordinate,
    pub label: String,
    pub viewport: Option<Viewport>,
}

// ---------------------------------------------------------------------------
// Google Geocoding API (structured geocoder)
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct GoogleGeocodeResponse {
    status: String,
    #[serde(default)]
    results: Vec<GoogleResult>,
}

#[derive(Debug, Deserialize)]
struct GoogleResult {
    formatted_address: Option<String>,
    geometry: GoogleGeometry,
}

#[derive(Debug, Deserialize)]
struct GoogleGeometry {
    location: Coordinate,
    viewport: Option<Viewport>,
}

/// Client for the Google Geocoding API (address → coordinate and back).
#[derive(Debug, Clone)]
pub struct StructuredGeocoder {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl StructuredGeocoder {
    pub fn new(client: reqwest::Client, api_key: &str) -> Self {
        Self::with_base_url(client, api_key, GOOGLE_GEOCODE_URL)
    }

    pub fn with_base_url(client: reqwest::Client, api_key: &str, base_url: &str) -> Self {
        Self {
            client,
            base_url: base_url.to_string(),
            api_key: api_key.to_string(),
        }
    }

    /// Forward geocode a free-text address. `None` on any failure or no match.
    pub async fn geocode(&self, address: &str) -> Option<ProviderHit> {
        self.query(&[("address", address), ("key", self.api_key.as_str())], address)
            .await
    }

    /// Reverse geocode a coordinate into a human-readable address.
    pub async fn reverse(&self, coordinate: Coordinate) -> Option<ProviderHit> {
        let latlng = format!("{},{}", coordinate.lat, coordinate.lng);
        self.query(
            &[("latlng", latlng.as_str()), ("key", self.api_key.as_str())],
            &latlng,
        )
        .await
    }

    async fn query(&self, params: &[(&str, &str)], what: &str) -> Option<ProviderHit> {
        let response = match self.client.get(&self.base_url).query(params).send().await {
            Ok(r) => r,
            Err(e) => {
                tracing::warn!("Structured geocoder request failed for '{}': {}", what, e);
                return None;
            }
        };

        if !response.status().is_success() {
            tracing::warn!(
                "Structured geocoder returned HTTP {} for '{}'",
                response.status(),
                what
            );
            return None;
        }

        let body: GoogleGeocodeResponse = match response.json().await {
            Ok(b) => b,
            Err(e) => {
                tracing::warn!("Structured geocoder decode error for '{}': {}", what, e);
                return None;
            }
        };

        if body.status != "OK" {
            tracing::debug!(
                "Structured geocoder status '{}' for '{}'",
                body.status,
                what
            );
            return None;
        }

        let first = body.results.into_iter().next()?;
        Some(ProviderHit {
            coordinate: first.geometry.location,
            label: first.formatted_address.unwrap_or_else(|| what.to_string()),
            viewport: first.geometry.viewport,
        })
    }
}

// ---------------------------------------------------------------------------
// Google Places Find Place (keyword / POI search)
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct FindPlaceResponse {
    status: String,
    #[serde(default)]
    candidates: Vec<PlaceCandidate>,
}

#[derive(Debug, Deserialize)]
struct PlaceCandidate {
    formatted_address: Option<String>,
    name: Option<String>,
    geometry: GoogleGeometry,
}

/// Client for the Google Places "Find Place from Text" API.
#[derive(Debug, Clone)]
pub struct PlaceSearch {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl PlaceSearch {
    pub fn new(client: reqwest::Client, api_key: &str) -> Self {
        Self::with_base_url(client, api_key, GOOGLE_FIND_PLACE_URL)
    }

    pub fn with_base_url(client: reqwest::Client, api_key: &str, base_url: &str) -> Self {
        Self {
            client,
            base_url: base_url.to_string(),
            api_key: api_key.to_string(),
        }
    }

    /// Find the best place candidate for a keyword query.
    pub async fn find_place(&self, query: &str) -> Option<ProviderHit> {
        let response = match self
            .client
            .get(&self.base_url)
            .query(&[
                ("input", query),
                ("inputtype", "textquery"),
                ("fields", "formatted_address,geometry,name"),
                ("key", self.api_key.as_str()),
            ])
            .send()
            .await
        {
            Ok(r) => r,
            Err(e) => {
                tracing::warn!("Place search request failed for '{}': {}", query, e);
                return None;
            }
        };

        if !response.status().is_success() {
            tracing::warn!(
                "Place search returned HTTP {} for '{}'",
                response.status(),
                query
            );
            return None;
        }

        let body: FindPlaceResponse = match response.json().await {
            Ok(b) => b,
            Err(e) => {
                tracing::warn!("Place search decode error for '{}': {}", query, e);
                return None;
            }
        };

        if body.status != "OK" {
            tracing::debug!("Place search status '{}' for '{}'", body.status, query);
            return None;
        }

        let first = body.candidates.into_iter().next()?;
        let label = first
            .formatted_address
            .or(first.name)
            .unwrap_or_else(|| query.to_string());
        Some(ProviderHit {
            coordinate: first.geometry.location,
            label,
            viewport: first.geometry.viewport,
        })
    }
}

// ---------------------------------------------------------------------------
// Nominatim (open geocoder)
// ---------------------------------------------------------------------------

/// Nominatim returns lat/lon as JSON strings.
#[derive(Debug, Deserialize)]
struct NominatimCandidate {
    lat: String,
    lon: String,
    display_name: Option<String>,
}

/// Client for the OpenStreetMap Nominatim search API. Needs no key; used as
/// the final fallback and as the only provider in degraded (keyless) mode.
#[derive(Debug, Clone)]
pub struct OpenGeocoder {
    client: reqwest::Client,
    base_url: String,
    user_agent: String,
}

impl OpenGeocoder {
    pub fn new(client: reqwest::Client, user_agent: &str) -> Self {
        Self::with_base_url(client, user_agent, NOMINATIM_SEARCH_URL)
    }

    pub fn with_base_url(client: reqwest::Client, user_agent: &str, base_url: &str) -> Self {
        Self {
            client,
            base_url: base_url.to_string(),
            user_agent: user_agent.to_string(),
        }
    }

    /// Search for a location; returns the first candidate with valid lat/lon.
    pub async fn search(&self, query: &str) -> Option<ProviderHit> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        if let Ok(ua) = HeaderValue::from_str(&self.user_agent) {
            headers.insert(USER_AGENT, ua);
        }

        let response = match self
            .client
            .get(&self.base_url)
            .headers(headers)
            .query(&[("format", "json"), ("limit", "1"), ("q", query)])
            .send()
            .await
        {
            Ok(r) => r,
            Err(e) => {
                tracing::warn!("Open geocoder request failed for '{}': {}", query, e);
                return None;
            }
        };

        if !response.status().is_success() {
            tracing::warn!(
                "Open geocoder returned HTTP {} for '{}'",
                response.status(),
                query
            );
            return None;
        }

        let candidates: Vec<NominatimCandidate> = match response.json().await {
            Ok(c) => c,
            Err(e) => {
                tracing::warn!("Open geocoder decode error for '{}': {}", query, e);
                return None;
            }
        };

        let first = candidates.into_iter().next()?;
        let lat = first.lat.parse::<f64>().ok()?;
        let lng = first.lon.parse::<f64>().ok()?;

        Some(ProviderHit {
            coordinate: Coordinate { lat, lng },
            label: first
                .display_name
                .unwrap_or_else(|| query.trim().to_string()),
            // Nominatim bounding boxes are not used for viewport fitting;
            // open-geocoder hits center the map at the default zoom instead.
            viewport: None,
        })
    }
}

// ---------------------------------------------------------------------------
// Provider polymorphism
// ---------------------------------------------------------------------------

/// One entry in the resolver's ordered fallback list.
#[derive(Debug, Clone)]
pub enum LocationProvider {
    Structured(StructuredGeocoder),
    Place(PlaceSearch),
    Open(OpenGeocoder),
}

impl LocationProvider {
    pub fn kind(&self) -> ProviderKind {
        match self {
            LocationProvider::Structured(_) => ProviderKind::StructuredGeocoder,
            LocationProvider::Place(_) => ProviderKind::PlaceSearch,
            LocationProvider::Open(_) => ProviderKind::OpenGeocoder,
        }
    }

    /// Whether the resolver should retry this provider with the default
    /// region appended when the raw query misses.
    pub fn region_retry(&self) -> bool {
        match self {
            LocationProvider::Structured(_) => true,
            LocationProvider::Place(_) => false,
            LocationProvider::Open(_) => true,
        }
    }

    /// Look up a query. Failures of any kind collapse to `None`.
    pub async fn lookup(&self, query: &str) -> Option<ProviderHit> {
        match self {
            LocationProvider::Structured(g) => g.geocode(query).await,
            LocationProvider::Place(p) => p.find_place(query).await,
            LocationProvider::Open(o) => o.search(query).await,
        }
    }
}
