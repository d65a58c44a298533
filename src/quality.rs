use serde::Deserialize;

/// One representation of an asset (an image resolution or an audio bitrate)
/// as listed by the catalog API.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct QualityVariant {
    #[serde(rename = "quality", default)]
    pub quality_label: String,
    #[serde(rename = "link", default)]
    pub url: String,
}

impl QualityVariant {
    pub fn new(quality_label: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            quality_label: quality_label.into(),
            url: url.into(),
        }
    }
}

/// Picks the best variant by trusting the catalog's ordering: variants are
/// listed in ascending quality, so the last one wins. Labels are never parsed
/// or compared. An empty list yields no selection; callers decide whether that
/// is fatal.
pub fn select_highest_by_upstream_order(variants: &[QualityVariant]) -> Option<&QualityVariant> {
    variants.last()
}
