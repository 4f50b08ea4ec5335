use std::sync::LazyLock;

use regex::{Regex, RegexBuilder};

use crate::Anchor;

/// North-American style numbers with an optional country prefix, e.g.
/// `+1 (555) 010-2030` or `555.010.2030`.
pub const PHONE_PATTERN: &str = r"(\+\d{1,3}[-.]?)?\s*\(?\d{3}\)?[-.]?\s*\d{3}[-.]?\s*\d{4}";

static PHONE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(PHONE_PATTERN).expect("phone pattern is valid"));

/// Profile networks recognised in anchor hrefs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum SocialNetwork {
    Facebook,
    Instagram,
    Twitter,
    Linkedin,
    Youtube,
}

impl SocialNetwork {
    pub const ALL: [SocialNetwork; 5] = [
        SocialNetwork::Facebook,
        SocialNetwork::Instagram,
        SocialNetwork::Twitter,
        SocialNetwork::Linkedin,
        SocialNetwork::Youtube,
    ];

    /// Field name used in records.
    pub fn field(self) -> &'static str {
        match self {
            SocialNetwork::Facebook => "facebook",
            SocialNetwork::Instagram => "instagram",
            SocialNetwork::Twitter => "twitter",
            SocialNetwork::Linkedin => "linkedin",
            SocialNetwork::Youtube => "youtube",
        }
    }

    fn pattern(self) -> &'static str {
        match self {
            SocialNetwork::Facebook => r"facebook\.com/[A-Za-z0-9.]+",
            SocialNetwork::Instagram => r"instagram\.com/[A-Za-z0-9_]+",
            SocialNetwork::Twitter => r"twitter\.com/[A-Za-z0-9_]+",
            SocialNetwork::Linkedin => r"linkedin\.com/[A-Za-z0-9_]+",
            SocialNetwork::Youtube => r"youtube\.com/[A-Za-z0-9_]+",
        }
    }

    fn regex(self) -> &'static Regex {
        &SOCIAL_RES[self as usize]
    }
}

static SOCIAL_RES: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    SocialNetwork::ALL
        .iter()
        .map(|network| {
            RegexBuilder::new(network.pattern())
                .case_insensitive(true)
                .build()
                .expect("social pattern is valid")
        })
        .collect()
});

/// Phone-shaped strings in page text, trimmed, first occurrence kept.
pub fn phone_numbers(text: &str) -> Vec<String> {
    let mut found: Vec<String> = Vec::new();
    for candidate in PHONE_RE.find_iter(text).map(|m| m.as_str().trim()) {
        if !found.iter().any(|f| f == candidate) {
            found.push(candidate.to_string());
        }
    }
    found
}

/// Hrefs of anchors pointing at `network`, in document order, each once.
pub fn social_links(network: SocialNetwork, anchors: &[Anchor]) -> Vec<String> {
    let mut found: Vec<String> = Vec::new();
    for anchor in anchors {
        if network.regex().is_match(&anchor.href) && !found.contains(&anchor.href) {
            found.push(anchor.href.clone());
        }
    }
    found
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn phones_in_common_layouts_are_found() {
        let text = "Call +1 (555) 010-2030 or 555.010.4040. Fax: 5550102030";
        assert_eq!(
            phone_numbers(text),
            vec!["+1 (555) 010-2030", "555.010.4040", "5550102030"]
        );
    }

    #[test]
    fn repeated_phones_are_kept_once() {
        let text = "Office 555-010-2030\nFooter 555-010-2030";
        assert_eq!(phone_numbers(text), vec!["555-010-2030"]);
        assert!(phone_numbers("Open 9 to 5, est. 1998").is_empty());
    }

    #[test]
    fn social_links_match_case_insensitively_and_dedupe() {
        let anchors = vec![
            Anchor::new("Like us", "https://www.Facebook.com/CornerBakery"),
            Anchor::new("Follow", "https://instagram.com/corner_bakery"),
            Anchor::new("Like us again", "https://www.Facebook.com/CornerBakery"),
            Anchor::new("Home", "https://corner.example/"),
        ];
        assert_eq!(
            social_links(SocialNetwork::Facebook, &anchors),
            vec!["https://www.Facebook.com/CornerBakery"]
        );
        assert_eq!(
            social_links(SocialNetwork::Instagram, &anchors),
            vec!["https://instagram.com/corner_bakery"]
        );
        assert!(social_links(SocialNetwork::Youtube, &anchors).is_empty());
    }

    #[test]
    fn bare_network_domains_are_not_profiles() {
        let anchors = vec![Anchor::new("Twitter", "https://twitter.com/")];
        assert!(social_links(SocialNetwork::Twitter, &anchors).is_empty());
    }
}
