use std::sync::LazyLock;

use regex::Regex;

/// `local-part @ domain . tld`. Best effort; not an RFC 5322 validator.
pub const EMAIL_PATTERN: &str = r"[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}";

/// Retina asset names such as `logo@2x.png` match the pattern.
const IMAGE_SUFFIXES: [&str; 4] = [".png", ".jpg", ".jpeg", ".gif"];
const MAX_EMAIL_LEN: usize = 100;

static EMAIL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(EMAIL_PATTERN).expect("email pattern is valid"));

/// Scans text for email-shaped strings.
#[derive(Debug, Clone, Copy, Default)]
pub struct EmailMatcher;

impl EmailMatcher {
    /// Every plausible match in order of appearance, lowercased, duplicates
    /// removed.
    pub fn all_matches(&self, text: &str) -> Vec<String> {
        let mut found: Vec<String> = Vec::new();
        for candidate in EMAIL_RE.find_iter(text).map(|m| m.as_str()) {
            if !is_plausible(candidate) {
                continue;
            }
            let email = normalize_email(candidate);
            if !found.contains(&email) {
                found.push(email);
            }
        }
        found
    }
}

/// Domains and, in practice, local parts are case-insensitive.
pub fn normalize_email(raw: &str) -> String {
    raw.trim().to_lowercase()
}

fn is_plausible(candidate: &str) -> bool {
    if candidate.len() >= MAX_EMAIL_LEN {
        return false;
    }
    let lower = candidate.to_ascii_lowercase();
    !IMAGE_SUFFIXES.iter().any(|suffix| lower.ends_with(suffix))
}
