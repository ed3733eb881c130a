use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::{
    extract::Query,
    http::{Method, StatusCode},
    response::{IntoResponse, Json, Response},
    routing::get,
    Extension, Router,
};
use hyper::Server;
use serde::Deserialize;
use serde_json::json;
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};
use tracing::{info, warn};

use crate::cache::ResultCache;
use crate::classifier::PostcodeClass;
use crate::common::constants;
use crate::common::error::Result;
use crate::common::types::{AddressQuery, CancellationFlag, ResolveOutcome};
use crate::config::Config;
use crate::metrics;
use crate::pipeline::CascadeOrchestrator;
use crate::providers::{GeocoderProvider, LicensedProvider, LocalProvider, PlacesProvider};

/// Shared per-process state. Each request builds its own query and
/// cancellation flag; nothing here is mutated per request except the cache.
pub struct AppState {
    pub orchestrator: CascadeOrchestrator,
    pub cache: ResultCache,
    pub places: Arc<PlacesProvider>,
    pub config: Config,
}

impl AppState {
    /// Composition root: wires the full provider set into the cascade
    pub fn from_config(config: Config) -> Result<Self> {
        let mut orchestrator = CascadeOrchestrator::new(config.pipeline.clone());
        let places = Arc::new(PlacesProvider::new(&config.providers.places)?);

        orchestrator.register(Arc::new(LicensedProvider::new(&config.providers.licensed)?));
        orchestrator.register(Arc::new(GeocoderProvider::new(&config.providers.geocoder)?));
        orchestrator.register(places.clone());
        orchestrator.register(Arc::new(LocalProvider::new()));

        let cache = ResultCache::new(Duration::from_secs(config.pipeline.cache_ttl_secs));
        Ok(Self {
            orchestrator,
            cache,
            places,
            config,
        })
    }
}

/// Health check endpoint
async fn health() -> impl IntoResponse {
    Json(json!({
        "status": "healthy",
        "service": "uk-address-service",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

fn bad_request(message: &str) -> Response {
    (
        StatusCode::BAD_REQUEST,
        Json(json!({
            "success": false,
            "error": message,
            "timestamp": chrono::Utc::now().to_rfc3339(),
        })),
    )
        .into_response()
}

/// The success envelope: recoverable provider trouble still lands here with
/// an empty suggestion list, never as a client-visible error.
fn success_envelope(outcome: &ResolveOutcome, started: Instant) -> Response {
    Json(json!({
        "success": true,
        "data": {
            "suggestions": outcome.candidates,
            "provider": outcome.provider_used.map(|p| p.as_str()).unwrap_or("none"),
            "fallbackAttempted": outcome.fallback_attempted,
            "total": outcome.candidates.len(),
        },
        "responseTime": started.elapsed().as_millis() as u64,
        "timestamp": chrono::Utc::now().to_rfc3339(),
    }))
    .into_response()
}

async fn resolve_and_respond(
    state: &AppState,
    query: AddressQuery,
    started: Instant,
) -> Response {
    if let Some(cached) = state.cache.get(&query.raw, &query.country_hint) {
        info!(query = %query.raw, "serving cached suggestions");
        return success_envelope(&cached, started);
    }

    let outcome = state
        .orchestrator
        .resolve(&query, &CancellationFlag::new())
        .await;
    state
        .cache
        .insert(&query.raw, &query.country_hint, outcome.clone());
    success_envelope(&outcome, started)
}

#[derive(Debug, Deserialize)]
struct SearchParams {
    query: Option<String>,
    limit: Option<usize>,
    country: Option<String>,
}

async fn search(
    Extension(state): Extension<Arc<AppState>>,
    Query(params): Query<SearchParams>,
) -> Response {
    let started = Instant::now();
    metrics::request_served("search");

    let raw = params.query.unwrap_or_default();
    let raw = raw.trim();
    let len = raw.chars().count();
    if len < constants::MIN_QUERY_LEN {
        return bad_request("query parameter is required and must be at least 2 characters");
    }
    if len > constants::MAX_QUERY_LEN {
        return bad_request("query must be at most 200 characters");
    }

    let request_id = uuid::Uuid::new_v4();
    let query = AddressQuery::new(
        raw,
        params.country.as_deref(),
        Some(params.limit.unwrap_or(state.config.pipeline.default_limit)),
    );
    info!(
        %request_id,
        query = %query.raw,
        classification = ?query.classification,
        "address search request"
    );

    resolve_and_respond(&state, query, started).await
}

#[derive(Debug, Deserialize)]
struct PostcodeParams {
    postcode: Option<String>,
    limit: Option<usize>,
}

async fn postcode(
    Extension(state): Extension<Arc<AppState>>,
    Query(params): Query<PostcodeParams>,
) -> Response {
    let started = Instant::now();
    metrics::request_served("postcode");

    let raw = params.postcode.unwrap_or_default();
    let raw = raw.trim();
    if raw.is_empty() {
        return bad_request("postcode parameter is required");
    }

    let query = AddressQuery::new(
        raw,
        None,
        Some(params.limit.unwrap_or(state.config.pipeline.postcode_limit)),
    );
    // This endpoint is postcode-only; anything else is a malformed request
    if !matches!(
        query.classification,
        PostcodeClass::FullPostcode | PostcodeClass::PartialPostcode
    ) {
        return bad_request("invalid postcode format, expected a full or partial UK postcode");
    }

    info!(postcode = %query.raw, "postcode lookup request");
    resolve_and_respond(&state, query, started).await
}

#[derive(Debug, Deserialize)]
struct DetailsParams {
    id: Option<String>,
}

async fn details(
    Extension(state): Extension<Arc<AppState>>,
    Query(params): Query<DetailsParams>,
) -> Response {
    let started = Instant::now();
    metrics::request_served("details");

    let Some(id) = params.id.filter(|id| !id.trim().is_empty()) else {
        return bad_request("id parameter is required");
    };

    match state.places.details(id.trim()).await {
        Ok(candidate) => Json(json!({
            "success": true,
            "data": candidate,
            "responseTime": started.elapsed().as_millis() as u64,
            "timestamp": chrono::Utc::now().to_rfc3339(),
        }))
        .into_response(),
        Err(e) => {
            warn!("place details lookup failed: {e}");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({
                    "success": false,
                    "error": e.to_string(),
                    "timestamp": chrono::Utc::now().to_rfc3339(),
                })),
            )
                .into_response()
        }
    }
}

/// Create the HTTP server with all routes
pub fn create_server(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET])
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health))
        .route("/search", get(search))
        .route("/postcode", get(postcode))
        .route("/details", get(details))
        .layer(Extension(state))
        .layer(ServiceBuilder::new().layer(cors))
}

/// Start the HTTP server on the specified port
pub async fn start_server(state: Arc<AppState>, port: u16) -> anyhow::Result<()> {
    let app = create_server(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));

    println!("🚀 Address service running on http://localhost:{port}");
    println!("💚 Health check: http://localhost:{port}/health");
    println!("🔎 Search:       http://localhost:{port}/search?query=SW1A+1AA");
    println!("📮 Postcode:     http://localhost:{port}/postcode?postcode=SW1A+1AA");

    Server::bind(&addr).serve(app.into_make_service()).await?;

    Ok(())
}
