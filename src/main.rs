// AgriGuard monitoring API v0.1
use axum::{
    routing::{get, post},
    Router,
};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tower_http::cors::{Any, CorsLayer};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

mod config;
mod errors;
mod routes;
mod services;

use config::AppConfig;
use routes::monitor::AppState;
use services::geocode::{LocationProvider, OpenGeocoder, PlaceSearch, StructuredGeocoder};
use services::monitor::{LiveDataClient, MonitorEngine};
use services::resolver::Resolver;

/// AgriGuard API — OpenAPI specification.
#[derive(OpenApi)]
#[openapi(
    info(
        title = "AgriGuard API",
        version = "0.1.0",
        description = "Real-time crop stress monitoring API. Resolves free-text \
            locations through a geocoding fallback chain (Google Geocoding, Google \
            Places, OpenStreetMap Nominatim), polls live sensor samples for the \
            resolved coordinate on a fixed interval, keeps a rolling chart window, \
            and classifies threshold-based alerts.",
        license(name = "MIT"),
    ),
    tags(
        (name = "Health", description = "Service health check"),
        (name = "Monitor", description = "Monitoring session: location resolution, status, alerts"),
        (name = "LiveData", description = "Simulated sensor backend"),
    ),
    paths(
        routes::health::health_check,
        routes::monitor::resolve_location,
        routes::monitor::pin_location,
        routes::monitor::monitor_status,
        routes::monitor::clear_location,
        routes::live::get_live_data,
        routes::live::list_locations,
    ),
    components(
        schemas(
            routes::health::HealthResponse,
            routes::monitor::ResolveRequest,
            routes::monitor::PinRequest,
            routes::monitor::ResolveResponse,
            routes::monitor::MapFocus,
            routes::monitor::MonitorStatusResponse,
            routes::live::KnownLocation,
            services::geocode::Coordinate,
            services::geocode::Viewport,
            services::geocode::ProviderKind,
            services::resolver::ResolvedLocation,
            services::monitor::Sample,
            services::monitor::HistoryPoint,
            services::alerts::Alert,
            services::alerts::AlertLevel,
            errors::ErrorResponse,
        )
    )
)]
struct ApiDoc;

#[tokio::main]
async fn main() {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "agriguard_api=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Arc::new(AppConfig::from_env());

    let http = reqwest::Client::builder()
        .build()
        .expect("Failed to build HTTP client");

    // Provider chain in priority order. Without a Google key the service
    // runs degraded: only the open geocoder remains, and the health
    // endpoint reports it.
    let mut providers = Vec::new();
    let mut reverse_geocoder = None;
    match &config.google_maps_api_key {
        Some(key) => {
            let geocoder = StructuredGeocoder::new(http.clone(), key);
            providers.push(LocationProvider::Structured(geocoder.clone()));
            providers.push(LocationProvider::Place(PlaceSearch::new(http.clone(), key)));
            reverse_geocoder = Some(geocoder);
        }
        None => {
            tracing::warn!(
                "GOOGLE_MAPS_API_KEY not set — structured geocoding, place search, \
                 and reverse geocoding disabled; falling back to the open geocoder"
            );
        }
    }
    providers.push(LocationProvider::Open(OpenGeocoder::new(
        http.clone(),
        &config.geocoder_user_agent,
    )));

    let resolver = Arc::new(Resolver::new(
        providers,
        reverse_geocoder,
        &config.default_region,
    ));

    let live_client = LiveDataClient::new(http, &config.backend_url);
    let engine = Arc::new(MonitorEngine::new(
        live_client,
        Duration::from_millis(config.poll_interval_ms),
        config.history_capacity,
    ));

    let app_state = AppState {
        resolver,
        engine,
        config: config.clone(),
    };

    // CORS — dashboard frontend issues GET/POST/DELETE only
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([
            axum::http::Method::GET,
            axum::http::Method::POST,
            axum::http::Method::DELETE,
        ])
        .allow_headers(Any);

    let app = Router::new()
        .route("/api/v1/health", get(routes::health::health_check))
        .route(
            "/api/v1/monitor/location",
            post(routes::monitor::resolve_location).delete(routes::monitor::clear_location),
        )
        .route("/api/v1/monitor/pin", post(routes::monitor::pin_location))
        .route("/api/v1/monitor/status", get(routes::monitor::monitor_status))
        .route("/api/live-data", get(routes::live::get_live_data))
        .route("/api/locations", get(routes::live::list_locations))
        .with_state(app_state)
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .layer(cors);

    // Start server
    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    tracing::info!("API server listening on {}", addr);
    tracing::info!(
        "Swagger UI available at http://localhost:{}/swagger-ui/",
        config.port
    );

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind TCP listener");
    axum::serve(listener, app)
        .await
        .expect("Server terminated unexpectedly");
}
