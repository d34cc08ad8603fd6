//! Location resolution with ordered provider fallback.
//!
//! A free-text query runs through the provider chain strictly sequentially
//! and short-circuits on the first usable hit:
//!
//! 1. Structured geocoder, raw query
//! 2. Structured geocoder, query with the default region appended
//!    (skipped when the query already names the region)
//! 3. Place search, raw query
//! 4. Open geocoder, raw query, then with the region appended (same skip)
//!
//! Exhausting the chain is a normal outcome ([`Resolution::NotFound`]), not
//! an error. Map clicks resolve through reverse geocoding and can never fail
//! terminally: a miss synthesizes a "Pinned (lat, lng)" label.

use serde::Serialize;
use utoipa::ToSchema;

use crate::services::geocode::{
    Coordinate, LocationProvider, ProviderHit, ProviderKind, StructuredGeocoder, Viewport,
};

/// The current monitoring target: a coordinate plus display label.
/// Immutable; a new resolution replaces it wholesale.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ResolvedLocation {
    pub coordinate: Coordinate,
    pub label: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub viewport: Option<Viewport>,
    pub source: ProviderKind,
}

/// Outcome of resolving a free-text query.
#[derive(Debug)]
pub enum Resolution {
    Resolved(ResolvedLocation),
    /// Every provider was exhausted. Terminal and user-visible; the caller
    /// surfaces a message naming the query.
    NotFound { query: String },
    /// Empty or whitespace-only query: no request issued, no state change.
    Noop,
}

/// Runs the ordered provider fallback chain.
pub struct Resolver {
    providers: Vec<LocationProvider>,
    /// Reverse geocoder for map clicks; absent in degraded (keyless) mode.
    reverse_geocoder: Option<StructuredGeocoder>,
    region: String,
}

impl Resolver {
    pub fn new(
        providers: Vec<LocationProvider>,
        reverse_geocoder: Option<StructuredGeocoder>,
        region: &str,
    ) -> Self {
        Self {
            providers,
            reverse_geocoder,
            region: region.to_string(),
        }
    }

    /// Resolve a free-text query through the fallback chain.
    pub async fn resolve(&self, raw_query: &str) -> Resolution {
        let query = raw_query.trim();
        if query.is_empty() {
            return Resolution::Noop;
        }

        let augmented = if contains_word(query, &self.region) {
            None
        } else {
            Some(format!("{}, {}", query, self.region))
        };

        for provider in &self.providers {
            if let Some(hit) = provider.lookup(query).await {
                tracing::info!(
                    "Resolved '{}' via {:?}: {}",
                    query,
                    provider.kind(),
                    hit.label
                );
                return Resolution::Resolved(resolved_from_hit(hit, provider.kind()));
            }

            if provider.region_retry() {
                if let Some(with_region) = &augmented {
                    if let Some(hit) = provider.lookup(with_region).await {
                        tracing::info!(
                            "Resolved '{}' via {:?} (region-augmented): {}",
                            query,
                            provider.kind(),
                            hit.label
                        );
                        return Resolution::Resolved(resolved_from_hit(hit, provider.kind()));
                    }
                }
            }
        }

        tracing::info!("No provider resolved '{}'", query);
        Resolution::NotFound {
            query: query.to_string(),
        }
    }

    /// Resolve a direct map click. Reverse geocoding gives a human label;
    /// on a miss the raw coordinate is pinned, so this never fails.
    pub async fn resolve_click(&self, coordinate: Coordinate) -> ResolvedLocation {
        if let Some(geocoder) = &self.reverse_geocoder {
            if let Some(hit) = geocoder.reverse(coordinate).await {
                return resolved_from_hit(hit, ProviderKind::StructuredGeocoder);
            }
        }

        ResolvedLocation {
            coordinate,
            label: format!("Pinned ({:.4}, {:.4})", coordinate.lat, coordinate.lng),
            viewport: None,
            source: ProviderKind::Pinned,
        }
    }

    /// Guidance shown when the chain is exhausted.
    pub fn not_found_message(query: &str) -> String {
        format!(
            "No location found for \"{}\". Try adding district/state.",
            query
        )
    }
}

fn resolved_from_hit(hit: ProviderHit, source: ProviderKind) -> ResolvedLocation {
    ResolvedLocation {
        coordinate: hit.coordinate,
        label: hit.label,
        viewport: hit.viewport,
        source,
    }
}

/// Case-insensitive whole-word containment check, used to skip the
/// region-augmented retry when the query already names the region.
fn contains_word(haystack: &str, word: &str) -> bool {
    let needle = word.to_lowercase();
    haystack
        .to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .any(|w| w == needle)
}
