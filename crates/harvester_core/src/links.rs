use std::collections::HashSet;

use serde::{Deserialize, Serialize};

pub const DEFAULT_KEYWORDS: [&str; 4] = ["contact", "about", "get in touch", "reach us"];

/// An anchor element as found in a rendered page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Anchor {
    pub text: String,
    /// Absolute, resolved URL.
    pub href: String,
}

impl Anchor {
    pub fn new(text: impl Into<String>, href: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            href: href.into(),
        }
    }
}

/// Picks candidate secondary pages by matching anchor text against keywords.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkSelector {
    keywords: Vec<String>,
}

impl LinkSelector {
    pub fn new<I, S>(keywords: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let keywords = keywords
            .into_iter()
            .map(|k| k.as_ref().trim().to_lowercase())
            .filter(|k| !k.is_empty())
            .collect();
        Self { keywords }
    }

    /// Hrefs of anchors whose text contains any keyword, case-insensitively,
    /// in document order. Only http(s) targets qualify and each href is
    /// returned once.
    pub fn select(&self, anchors: &[Anchor]) -> Vec<String> {
        let mut seen = HashSet::new();
        anchors
            .iter()
            .filter(|anchor| is_fetchable(&anchor.href))
            .filter(|anchor| {
                let text = anchor.text.to_lowercase();
                self.keywords.iter().any(|k| text.contains(k.as_str()))
            })
            .filter(|anchor| seen.insert(anchor.href.as_str()))
            .map(|anchor| anchor.href.clone())
            .collect()
    }
}

impl Default for LinkSelector {
    fn default() -> Self {
        Self::new(DEFAULT_KEYWORDS)
    }
}

pub fn select_links<S: AsRef<str>>(anchors: &[Anchor], keywords: &[S]) -> Vec<String> {
    LinkSelector::new(keywords).select(anchors)
}

fn is_fetchable(href: &str) -> bool {
    let lower = href.trim_start().to_ascii_lowercase();
    lower.starts_with("http://") || lower.starts_with("https://")
}
