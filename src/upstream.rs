//! Client for the upstream music catalog API.
//!
//! Two endpoints are consumed:
//! - `GET {base}/search/songs?query=<q>&limit=<n>` for search
//! - `GET {base}/songs?id=<id>` to resolve a track's download links

use std::time::Duration;

use log::{debug, error, warn};
use reqwest::Client;
use serde::{de::DeserializeOwned, Deserialize, Deserializer};
use serde_json::Value;

use crate::error::{GatewayError, Result};
use crate::quality::QualityVariant;

const SUCCESS_STATUS: &str = "SUCCESS";

/// One record of the search endpoint's `data.results` array.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchRecord {
    #[serde(default, deserialize_with = "lenient_string")]
    pub id: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub name: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub duration: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub primary_artists: String,
    #[serde(default, deserialize_with = "lenient_variants")]
    pub image: Vec<QualityVariant>,
}

#[derive(Debug, Default, Deserialize)]
struct SearchEnvelope {
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    data: Option<SearchData>,
}

#[derive(Debug, Default, Deserialize)]
struct SearchData {
    #[serde(default)]
    results: Option<Vec<SearchRecord>>,
}

#[derive(Debug, Default, Deserialize)]
struct SongEnvelope {
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    data: Option<Vec<SongRecord>>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SongRecord {
    #[serde(default, deserialize_with = "lenient_variants")]
    download_url: Vec<QualityVariant>,
}

/// An absent status is tolerated; an explicit one must read `SUCCESS`.
fn is_success(status: Option<&str>) -> bool {
    status.map_or(true, |s| s.eq_ignore_ascii_case(SUCCESS_STATUS))
}

#[derive(Debug, Clone)]
pub struct UpstreamClient {
    client: Client,
    base_url: String,
    timeout: Duration,
    search_limit: u32,
}

impl UpstreamClient {
    pub fn new(client: Client, base_url: &str, timeout: Duration, search_limit: u32) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            timeout,
            search_limit,
        }
    }

    pub fn http(&self) -> &Client {
        &self.client
    }

    /// Searches the catalog. A non-success envelope or a missing result list
    /// is an empty result, not an error.
    pub async fn search_songs(&self, query: &str) -> Result<Vec<SearchRecord>> {
        let url = format!("{}/search/songs", self.base_url);
        let limit = self.search_limit.to_string();
        let envelope: SearchEnvelope = self
            .get_json(&url, &[("query", query), ("limit", limit.as_str())])
            .await?;

        if !is_success(envelope.status.as_deref()) {
            warn!(
                "Search for {:?} returned status {:?}",
                query,
                envelope.status.unwrap_or_default()
            );
            return Ok(Vec::new());
        }

        Ok(envelope
            .data
            .and_then(|data| data.results)
            .unwrap_or_default())
    }

    /// Looks up a track's audio download variants, in upstream order.
    /// Fails with `NotFound` when the catalog reports no usable record.
    pub async fn song_download_variants(&self, id: &str) -> Result<Vec<QualityVariant>> {
        let url = format!("{}/songs", self.base_url);
        let envelope: SongEnvelope = self.get_json(&url, &[("id", id)]).await?;

        if !is_success(envelope.status.as_deref()) {
            return Err(GatewayError::NotFound(format!(
                "{} (status {:?})",
                id,
                envelope.status.unwrap_or_default()
            )));
        }

        let variants = envelope
            .data
            .and_then(|records| records.into_iter().next())
            .map(|record| record.download_url)
            .unwrap_or_default();

        if variants.is_empty() {
            return Err(GatewayError::NotFound(id.to_string()));
        }

        Ok(variants)
    }

    /// Issues a bounded GET and decodes the JSON body. The body is read to
    /// completion before decoding so the connection is released on every path.
    /// A non-2xx reply whose body still decodes is handed back to the caller,
    /// whose envelope status check decides; otherwise it is `UpstreamUnavailable`.
    async fn get_json<T: DeserializeOwned>(&self, url: &str, params: &[(&str, &str)]) -> Result<T> {
        debug!("GET {} {:?}", url, params);

        let response = self
            .client
            .get(url)
            .query(params)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| {
                error!("Upstream request to {} {:?} failed: {}", url, params, e);
                GatewayError::UpstreamUnavailable(e)
            })?;

        let http_error = response.error_for_status_ref().err();

        let body = response.bytes().await.map_err(|e| {
            error!("Failed to read upstream body from {} {:?}: {}", url, params, e);
            GatewayError::UpstreamUnavailable(e)
        })?;

        match (serde_json::from_slice(&body), http_error) {
            (Ok(decoded), None) => Ok(decoded),
            (Ok(decoded), Some(e)) => {
                warn!("Upstream {} {:?} answered {}, using its envelope", url, params, e);
                Ok(decoded)
            }
            (Err(e), None) => {
                error!("Failed to parse upstream response from {} {:?}: {}", url, params, e);
                Err(GatewayError::UpstreamMalformedResponse(e.to_string()))
            }
            (Err(_), Some(e)) => {
                error!("Upstream request to {} {:?} failed: {}", url, params, e);
                Err(GatewayError::UpstreamUnavailable(e))
            }
        }
    }
}

/// Accepts a string, a number, or null for text fields.
fn lenient_string<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::String(s) => s,
        Value::Number(n) => n.to_string(),
        _ => String::new(),
    })
}

/// Accepts a variant list, a bare link string, or null. Entries that are
/// not variant objects are skipped so one bad entry does not sink the record.
fn lenient_variants<'de, D>(deserializer: D) -> std::result::Result<Vec<QualityVariant>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::Array(items) => items
            .into_iter()
            .filter_map(|item| serde_json::from_value(item).ok())
            .collect(),
        Value::String(link) if !link.is_empty() => vec![QualityVariant::new("", link)],
        _ => Vec::new(),
    })
}
