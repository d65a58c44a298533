use serde::Serialize;

use crate::quality::select_highest_by_upstream_order;
use crate::upstream::SearchRecord;

/// A search hit in the gateway's stable output shape.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Track {
    pub id: String,
    pub title: String,
    pub artist: String,
    #[serde(rename = "duration")]
    pub duration_seconds: u64,
    pub thumbnail_url: String,
}

impl From<SearchRecord> for Track {
    /// Never fails: a bad duration becomes 0 and a missing image list
    /// becomes an empty thumbnail.
    fn from(record: SearchRecord) -> Self {
        let thumbnail_url = select_highest_by_upstream_order(&record.image)
            .map(|variant| variant.url.clone())
            .unwrap_or_default();

        Self {
            duration_seconds: parse_duration_seconds(&record.duration),
            id: record.id,
            title: record.name,
            artist: record.primary_artists,
            thumbnail_url,
        }
    }
}

/// Parses the leading decimal digits of `raw` ("215", "215.4", " 215s").
/// Anything without leading digits, or too large to fit, is 0.
pub fn parse_duration_seconds(raw: &str) -> u64 {
    let trimmed = raw.trim_start();
    let trimmed = trimmed.strip_prefix('+').unwrap_or(trimmed);
    let digits_end = trimmed
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(trimmed.len());
    trimmed[..digits_end].parse().unwrap_or(0)
}
