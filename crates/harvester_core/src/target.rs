use serde::{Deserialize, Serialize};

pub type TargetId = u64;

/// Placeholder the input files use for "no value".
pub const PLACEHOLDER: &str = "N/A";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TargetKind {
    /// A search query run against the listing service.
    ListingQuery,
    /// A business website scanned for a contact email.
    SiteContact,
}

/// One unit of harvest work, created from an input row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
    pub id: TargetId,
    pub kind: TargetKind,
    /// The input cell exactly as read; echoed into the output.
    pub raw: String,
    /// Absolute URL to fetch. `None` when the input had no usable value.
    pub primary_url: Option<String>,
    /// Set when the input row itself could not be read.
    pub defect: Option<String>,
}

impl Target {
    pub fn site_contact(id: TargetId, raw: impl Into<String>) -> Self {
        let raw = raw.into();
        let primary_url = normalize_url(&raw);
        Self {
            id,
            kind: TargetKind::SiteContact,
            raw,
            primary_url,
            defect: None,
        }
    }

    pub fn listing_query(id: TargetId, raw: impl Into<String>, base_url: &str) -> Self {
        let raw = raw.into();
        let primary_url = listing_url(base_url, &raw);
        Self {
            id,
            kind: TargetKind::ListingQuery,
            raw,
            primary_url,
            defect: None,
        }
    }

    pub fn malformed(
        id: TargetId,
        kind: TargetKind,
        raw: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self {
            id,
            kind,
            raw: raw.into(),
            primary_url: None,
            defect: Some(reason.into()),
        }
    }
}

/// Empty cells and `N/A` (any case) carry no target.
pub fn is_placeholder(value: &str) -> bool {
    let trimmed = value.trim();
    trimmed.is_empty() || trimmed.eq_ignore_ascii_case(PLACEHOLDER)
}

/// Turn a website cell into an absolute URL, prefixing `https://` when the
/// value has no scheme. Validation is left to the fetcher.
pub fn normalize_url(raw: &str) -> Option<String> {
    if is_placeholder(raw) {
        return None;
    }
    let trimmed = raw.trim();
    let lower = trimmed.to_ascii_lowercase();
    if lower.starts_with("http://") || lower.starts_with("https://") {
        Some(trimmed.to_string())
    } else {
        Some(format!("https://{}", trimmed.trim_start_matches('/')))
    }
}

/// Search URL for a listing query: `{base_url}/{form-encoded query}`.
pub fn listing_url(base_url: &str, query: &str) -> Option<String> {
    if is_placeholder(query) {
        return None;
    }
    let encoded: String = url::form_urlencoded::byte_serialize(query.trim().as_bytes()).collect();
    let base = base_url.trim_end_matches('/');
    Some(format!("{base}/{encoded}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scheme_is_prefixed_when_missing() {
        assert_eq!(normalize_url("example.com").as_deref(), Some("https://example.com"));
        assert_eq!(
            normalize_url("  www.example.com/contact ").as_deref(),
            Some("https://www.example.com/contact")
        );
    }

    #[test]
    fn existing_scheme_is_kept() {
        assert_eq!(normalize_url("http://plain.example").as_deref(), Some("http://plain.example"));
        assert_eq!(normalize_url("HTTPS://Loud.example").as_deref(), Some("HTTPS://Loud.example"));
    }

    #[test]
    fn placeholders_have_no_url() {
        assert_eq!(normalize_url(""), None);
        assert_eq!(normalize_url("   "), None);
        assert_eq!(normalize_url("N/A"), None);
        assert_eq!(normalize_url("n/a"), None);
    }

    #[test]
    fn listing_queries_are_form_encoded() {
        assert_eq!(
            listing_url("https://www.google.com/maps/search/", "restaurants in Lahore").as_deref(),
            Some("https://www.google.com/maps/search/restaurants+in+Lahore")
        );
        assert_eq!(
            listing_url("https://maps.example", "caf\u{e9} & bar").as_deref(),
            Some("https://maps.example/caf%C3%A9+%26+bar")
        );
        assert_eq!(listing_url("https://maps.example", "n/a"), None);
    }
}
