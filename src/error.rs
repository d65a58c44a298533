//! Gateway failure taxonomy and its mapping onto HTTP responses.

use axum::{
    http::{header, StatusCode},
    response::{IntoResponse, Response},
};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum GatewayError {
    /// A required request parameter was missing or blank.
    #[error("{0}")]
    ClientInput(String),

    /// The catalog API could not be reached or answered with an HTTP error.
    #[error("Upstream unavailable: {0}")]
    UpstreamUnavailable(#[from] reqwest::Error),

    /// The catalog API answered with a body that does not match its schema.
    #[error("Malformed upstream response: {0}")]
    UpstreamMalformedResponse(String),

    /// The track ID resolved to no playable audio variant.
    #[error("Song not found: {0}")]
    NotFound(String),

    /// The CDN fetch failed after the track was resolved.
    #[error("Stream unavailable: {0}")]
    StreamUnavailable(String),

    /// The CDN rejected the forwarded byte range.
    #[error("Requested range not satisfiable")]
    RangeNotSatisfiable,
}

pub type Result<T> = std::result::Result<T, GatewayError>;

impl GatewayError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            GatewayError::ClientInput(_) => StatusCode::BAD_REQUEST,
            GatewayError::NotFound(_) => StatusCode::NOT_FOUND,
            GatewayError::RangeNotSatisfiable => StatusCode::RANGE_NOT_SATISFIABLE,
            GatewayError::UpstreamUnavailable(_)
            | GatewayError::UpstreamMalformedResponse(_)
            | GatewayError::StreamUnavailable(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Text sent to the client. Upstream details stay in the server log.
    fn public_message(&self) -> String {
        match self {
            GatewayError::ClientInput(message) => message.clone(),
            GatewayError::UpstreamUnavailable(_) => "Upstream request failed".to_string(),
            GatewayError::UpstreamMalformedResponse(_) => {
                "Failed to parse upstream response".to_string()
            }
            GatewayError::NotFound(_) => "Song not found".to_string(),
            GatewayError::StreamUnavailable(_) => "Failed to stream".to_string(),
            GatewayError::RangeNotSatisfiable => self.to_string(),
        }
    }
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        (
            self.status_code(),
            [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
            self.public_message(),
        )
            .into_response()
    }
}
