use std::collections::HashMap;
use std::sync::Arc;

use axum::{
    body::Body,
    extract::{Path, Query, Request, State},
    http::{header, HeaderMap, HeaderValue, Method, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Json, Response},
    routing::get,
    Router,
};
use log::{info, warn};
use reqwest::Client;
use serde::Serialize;
use tower_http::services::ServeDir;

use crate::config::{Config, SERVICE_NAME};
use crate::error::{GatewayError, Result};
use crate::relay::StreamRelay;
use crate::track::Track;
use crate::upstream::UpstreamClient;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub upstream: UpstreamClient,
    pub relay: StreamRelay,
}

impl AppState {
    pub fn new(config: Config) -> Self {
        let upstream = UpstreamClient::new(
            Client::new(),
            &config.upstream_base_url,
            config.upstream_timeout,
            config.search_limit,
        );
        let relay = StreamRelay::new(
            upstream.clone(),
            config.stream_connect_timeout,
            config.stream_idle_timeout,
        );

        Self {
            config: Arc::new(config),
            upstream,
            relay,
        }
    }
}

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub service: String,
    pub version: String,
}

pub fn create_router(state: AppState) -> Router {
    let web = ServeDir::new(&state.config.web_path).append_index_html_on_directories(true);

    Router::new()
        .route("/api/health", get(health))
        .route("/api/search", get(search))
        .route("/api/stream/", get(stream_missing_id))
        .route("/api/stream/*id", get(stream))
        .fallback_service(web)
        .layer(middleware::from_fn(cors))
        .with_state(state)
}

// Fixed CORS policy on every response; OPTIONS never reaches a handler.
async fn cors(request: Request, next: Next) -> Response {
    let mut response = if request.method() == Method::OPTIONS {
        Response::new(Body::empty())
    } else {
        next.run(request).await
    };

    let headers = response.headers_mut();
    headers.insert(header::ACCESS_CONTROL_ALLOW_ORIGIN, HeaderValue::from_static("*"));
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_METHODS,
        HeaderValue::from_static("GET, POST, OPTIONS"),
    );
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_HEADERS,
        HeaderValue::from_static("Content-Type, Range"),
    );
    headers.insert(
        header::ACCESS_CONTROL_EXPOSE_HEADERS,
        HeaderValue::from_static("Content-Length, Content-Range"),
    );
    response
}

// GET /api/health - Liveness and version
async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        service: SERVICE_NAME.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

// GET /api/search?q=<query> - Search the upstream catalog
async fn search(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
) -> Result<Json<Vec<Track>>> {
    let query = params
        .get("q")
        .map(|q| q.trim())
        .filter(|q| !q.is_empty())
        .ok_or_else(|| GatewayError::ClientInput("Missing query parameter 'q'".to_string()))?;

    info!("Searching for: {}", query);

    let tracks: Vec<Track> = state
        .upstream
        .search_songs(query)
        .await
        .map_err(|e| {
            warn!("Search for {:?} failed: {}", query, e);
            e
        })?
        .into_iter()
        .map(Track::from)
        .collect();

    info!("Found {} tracks for: {}", tracks.len(), query);
    Ok(Json(tracks))
}

// GET /api/stream/*id - Relay the track's audio from the CDN
// IDs are opaque and may contain '/'; one trailing '/' is dropped.
async fn stream(
    State(state): State<AppState>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> Result<Response> {
    let id = id.strip_suffix('/').unwrap_or(&id).trim();
    if id.is_empty() {
        return Err(missing_track_id());
    }

    info!("Streaming track: {}", id);
    state
        .relay
        .open(id, headers.get(header::RANGE).cloned())
        .await
        .map_err(|e| {
            warn!("Stream for {} failed: {}", id, e);
            e
        })
}

// GET /api/stream/ - No ID given
async fn stream_missing_id() -> Response {
    missing_track_id().into_response()
}

fn missing_track_id() -> GatewayError {
    GatewayError::ClientInput("Missing track ID".to_string())
}
