//! In-process stand-in for the catalog API and the audio CDN.

use std::convert::Infallible;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::{
    body::Body,
    extract::{RawQuery, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use bytes::Bytes;
use futures::stream;
use serde_json::Value;
use tokio::net::TcpListener;

/// Placeholder replaced by the mock's own base URL in canned bodies.
pub const BASE_PLACEHOLDER: &str = "{base}";

#[derive(Clone, Default)]
pub struct MockUpstream {
    search_body: Option<String>,
    song_body: Option<String>,
    catalog_status: Option<StatusCode>,
    audio: Vec<u8>,
    audio_status: Option<StatusCode>,
    audio_delay: Option<Duration>,
    endless_audio: bool,
    audio_body_dropped: Arc<AtomicBool>,
    catalog_hits: Arc<AtomicUsize>,
    audio_hits: Arc<AtomicUsize>,
    last_query: Arc<Mutex<Option<String>>>,
    last_range: Arc<Mutex<Option<String>>>,
}

impl MockUpstream {
    pub fn with_search(mut self, body: Value) -> Self {
        self.search_body = Some(body.to_string());
        self
    }

    pub fn with_raw_search(mut self, body: &str) -> Self {
        self.search_body = Some(body.to_string());
        self
    }

    pub fn with_song(mut self, body: Value) -> Self {
        self.song_body = Some(body.to_string());
        self
    }

    pub fn with_catalog_status(mut self, status: StatusCode) -> Self {
        self.catalog_status = Some(status);
        self
    }

    pub fn with_audio(mut self, audio: &[u8]) -> Self {
        self.audio = audio.to_vec();
        self
    }

    pub fn with_audio_status(mut self, status: StatusCode) -> Self {
        self.audio_status = Some(status);
        self
    }

    /// Holds back the audio response headers for `delay`.
    pub fn with_audio_delay(mut self, delay: Duration) -> Self {
        self.audio_delay = Some(delay);
        self
    }

    /// Serves a never-ending audio body and records when it is dropped.
    pub fn with_endless_audio(mut self) -> Self {
        self.endless_audio = true;
        self
    }
}

/// Flags the shared bool when the served body goes away.
struct DropFlag(Arc<AtomicBool>);

impl Drop for DropFlag {
    fn drop(&mut self) {
        self.0.store(true, Ordering::SeqCst);
    }
}

pub struct MockServer {
    pub base_url: String,
    upstream: MockUpstream,
}

impl MockServer {
    pub fn catalog_hits(&self) -> usize {
        self.upstream.catalog_hits.load(Ordering::SeqCst)
    }

    pub fn audio_hits(&self) -> usize {
        self.upstream.audio_hits.load(Ordering::SeqCst)
    }

    pub fn last_query(&self) -> Option<String> {
        self.upstream.last_query.lock().unwrap().clone()
    }

    pub fn last_range(&self) -> Option<String> {
        self.upstream.last_range.lock().unwrap().clone()
    }

    pub fn audio_body_dropped(&self) -> bool {
        self.upstream.audio_body_dropped.load(Ordering::SeqCst)
    }
}

pub async fn spawn_mock(mut upstream: MockUpstream) -> MockServer {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let base_url = format!("http://{}", listener.local_addr().unwrap());

    upstream.search_body = upstream
        .search_body
        .map(|body| body.replace(BASE_PLACEHOLDER, &base_url));
    upstream.song_body = upstream
        .song_body
        .map(|body| body.replace(BASE_PLACEHOLDER, &base_url));

    let router = Router::new()
        .route("/search/songs", get(search))
        .route("/songs", get(song))
        .route("/audio", get(audio))
        .with_state(upstream.clone());

    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });

    MockServer { base_url, upstream }
}

fn catalog_response(state: &MockUpstream, query: Option<String>, body: &Option<String>) -> Response {
    state.catalog_hits.fetch_add(1, Ordering::SeqCst);
    *state.last_query.lock().unwrap() = query;

    match (body, state.catalog_status) {
        (Some(body), status) => (
            status.unwrap_or(StatusCode::OK),
            [(header::CONTENT_TYPE, "application/json")],
            body.clone(),
        )
            .into_response(),
        (None, Some(status)) => status.into_response(),
        (None, None) => StatusCode::NOT_FOUND.into_response(),
    }
}

async fn search(State(state): State<MockUpstream>, RawQuery(query): RawQuery) -> Response {
    catalog_response(&state, query, &state.search_body)
}

async fn song(State(state): State<MockUpstream>, RawQuery(query): RawQuery) -> Response {
    catalog_response(&state, query, &state.song_body)
}

async fn audio(State(state): State<MockUpstream>, headers: HeaderMap) -> Response {
    state.audio_hits.fetch_add(1, Ordering::SeqCst);
    let range = headers
        .get(header::RANGE)
        .and_then(|value| value.to_str().ok())
        .map(str::to_string);
    *state.last_range.lock().unwrap() = range.clone();

    if let Some(delay) = state.audio_delay {
        tokio::time::sleep(delay).await;
    }
    if let Some(status) = state.audio_status {
        return status.into_response();
    }
    if state.endless_audio {
        let guard = DropFlag(state.audio_body_dropped.clone());
        let chunks = stream::unfold(guard, |guard| async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            Some((Ok::<_, Infallible>(Bytes::from_static(&[0xAA; 1024])), guard))
        });
        return (
            [(header::CONTENT_TYPE, "application/octet-stream")],
            Body::from_stream(chunks),
        )
            .into_response();
    }

    let total = state.audio.len();
    if let Some((start, end)) = range.as_deref().and_then(|r| parse_simple_range(r, total)) {
        return (
            StatusCode::PARTIAL_CONTENT,
            [
                (header::CONTENT_TYPE, "application/octet-stream".to_string()),
                (header::CONTENT_RANGE, format!("bytes {}-{}/{}", start, end, total)),
            ],
            state.audio[start..=end].to_vec(),
        )
            .into_response();
    }
    if range.is_some() {
        return StatusCode::RANGE_NOT_SATISFIABLE.into_response();
    }

    (
        [(header::CONTENT_TYPE, "application/octet-stream")],
        state.audio.clone(),
    )
        .into_response()
}

/// Handles `bytes=<start>-<end>` and `bytes=<start>-` only.
fn parse_simple_range(range: &str, total: usize) -> Option<(usize, usize)> {
    let spec = range.strip_prefix("bytes=")?;
    let (start, end) = spec.split_once('-')?;
    let start: usize = start.parse().ok()?;
    let end: usize = if end.is_empty() {
        total.checked_sub(1)?
    } else {
        end.parse::<usize>().ok()?.min(total.checked_sub(1)?)
    };
    (start <= end).then_some((start, end))
}
