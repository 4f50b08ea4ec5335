use harvester_core::Anchor;
use scraper::{Html, Selector};
use url::Url;

const DEFAULT_MAX_ANCHORS: usize = 5_000;

/// Collect `<a href>` elements in document order with whitespace-collapsed
/// text and hrefs resolved against `base_url`.
pub fn extract_anchors(html: &str, base_url: Option<&str>) -> Vec<Anchor> {
    extract_anchors_limited(html, base_url, DEFAULT_MAX_ANCHORS)
}

pub fn extract_anchors_limited(html: &str, base_url: Option<&str>, max_anchors: usize) -> Vec<Anchor> {
    let Ok(selector) = Selector::parse("a[href]") else {
        return Vec::new();
    };
    let document = Html::parse_document(html);
    let base_url = base_url.and_then(|b| Url::parse(b).ok());

    document
        .select(&selector)
        .filter_map(|element| {
            let href = element.value().attr("href")?;
            let url = resolve_url(href, base_url.as_ref())?;
            Some(Anchor {
                text: collapse_whitespace(element.text()),
                href: url.into(),
            })
        })
        .take(max_anchors)
        .collect()
}

fn resolve_url(reference: &str, base: Option<&Url>) -> Option<Url> {
    let trimmed = reference.trim();
    if trimmed.is_empty() {
        return None;
    }
    let lower = trimmed.to_ascii_lowercase();
    if lower.starts_with('#') || lower.starts_with("javascript:") {
        return None;
    }
    if let Ok(url) = Url::parse(trimmed) {
        return Some(url);
    }
    base.and_then(|base| base.join(trimmed).ok())
}

fn collapse_whitespace<'a>(pieces: impl Iterator<Item = &'a str>) -> String {
    let mut out = String::new();
    for word in pieces.flat_map(str::split_whitespace) {
        if !out.is_empty() {
            out.push(' ');
        }
        out.push_str(word);
    }
    out
}
