//! Resolves a track ID to its best audio link and relays the CDN's bytes.

use std::io;
use std::pin::Pin;
use std::time::Duration;

use axum::{
    body::Body,
    http::{header, HeaderValue, StatusCode},
    response::Response,
};
use bytes::Bytes;
use futures::{stream, Stream, StreamExt};
use log::{debug, error, info, warn};

use crate::error::{GatewayError, Result};
use crate::quality::{select_highest_by_upstream_order, QualityVariant};
use crate::upstream::UpstreamClient;

const AUDIO_CONTENT_TYPE: &str = "audio/mpeg";

type CdnStream = Pin<Box<dyn Stream<Item = reqwest::Result<Bytes>> + Send>>;

#[derive(Debug, Clone)]
pub struct StreamRelay {
    upstream: UpstreamClient,
    connect_timeout: Duration,
    idle_timeout: Duration,
}

impl StreamRelay {
    pub fn new(upstream: UpstreamClient, connect_timeout: Duration, idle_timeout: Duration) -> Self {
        Self {
            upstream,
            connect_timeout,
            idle_timeout,
        }
    }

    /// Resolves `id` to the audio variant the catalog ranks highest.
    pub async fn resolve(&self, id: &str) -> Result<QualityVariant> {
        let variants = self.upstream.song_download_variants(id).await?;
        select_highest_by_upstream_order(&variants)
            .filter(|variant| !variant.url.is_empty())
            .cloned()
            .ok_or_else(|| GatewayError::NotFound(id.to_string()))
    }

    /// Resolves `id` and opens the CDN link, returning a response whose body
    /// is the CDN body relayed chunk by chunk. `range` is forwarded as-is.
    pub async fn open(&self, id: &str, range: Option<HeaderValue>) -> Result<Response> {
        let variant = self.resolve(id).await?;
        info!("Proxying audio for {} ({}) from: {}", id, variant.quality_label, variant.url);

        let mut request = self.upstream.http().get(&variant.url);
        if let Some(range) = range {
            request = request.header(header::RANGE, range);
        }

        let response = tokio::time::timeout(self.connect_timeout, request.send())
            .await
            .map_err(|_| {
                error!("CDN did not respond within {:?}: {}", self.connect_timeout, variant.url);
                GatewayError::StreamUnavailable(format!("timed out opening {}", variant.url))
            })?
            .map_err(|e| {
                error!("Stream error for {}: {}", id, e);
                GatewayError::StreamUnavailable(e.to_string())
            })?;

        let status = response.status();
        if status == StatusCode::RANGE_NOT_SATISFIABLE {
            return Err(GatewayError::RangeNotSatisfiable);
        }
        if !status.is_success() {
            error!("CDN answered {} for {}", status, variant.url);
            return Err(GatewayError::StreamUnavailable(format!("CDN status {}", status)));
        }

        let partial = status == StatusCode::PARTIAL_CONTENT;
        let mut builder = Response::builder()
            .status(if partial { StatusCode::PARTIAL_CONTENT } else { StatusCode::OK })
            .header(header::CONTENT_TYPE, AUDIO_CONTENT_TYPE)
            .header(header::ACCEPT_RANGES, "bytes");

        if let Some(length) = response.content_length().filter(|length| *length > 0) {
            builder = builder.header(header::CONTENT_LENGTH, length.to_string());
        }
        if partial {
            if let Some(content_range) = response.headers().get(header::CONTENT_RANGE) {
                builder = builder.header(header::CONTENT_RANGE, content_range.clone());
            }
        }

        let body = idle_bounded(Box::pin(response.bytes_stream()), self.idle_timeout, id.to_string());
        builder
            .body(Body::from_stream(body))
            .map_err(|e| GatewayError::StreamUnavailable(e.to_string()))
    }
}

/// Ends the relay with an error when the CDN stalls longer than `idle`
/// between chunks. Dropping the returned stream (client gone) drops the
/// CDN connection with it.
fn idle_bounded(
    cdn: CdnStream,
    idle: Duration,
    id: String,
) -> impl Stream<Item = io::Result<Bytes>> + Send + 'static {
    stream::unfold(Some((cdn, 0u64)), move |state| {
        let id = id.clone();
        async move {
            let (mut cdn, relayed) = state?;
            match tokio::time::timeout(idle, cdn.next()).await {
                Ok(Some(Ok(chunk))) => {
                    let relayed = relayed + chunk.len() as u64;
                    Some((Ok(chunk), Some((cdn, relayed))))
                }
                Ok(Some(Err(e))) => {
                    warn!("Stream for {} aborted after {} bytes: {}", id, relayed, e);
                    Some((Err(io::Error::other(e)), None))
                }
                Ok(None) => {
                    debug!("Stream for {} finished, {} bytes relayed", id, relayed);
                    None
                }
                Err(_) => {
                    warn!("Stream for {} stalled for {:?} after {} bytes", id, idle, relayed);
                    Some((
                        Err(io::Error::new(io::ErrorKind::TimedOut, "CDN stalled")),
                        None,
                    ))
                }
            }
        }
    })
}
