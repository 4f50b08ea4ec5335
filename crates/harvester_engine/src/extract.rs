use std::time::Duration;

use engine_logging::{engine_debug, engine_warn};
use futures_util::{future, stream, StreamExt};
use harvester_core::{
    phone_numbers, social_links, ContactSettings, EmailMatcher, FailureKind, Fields, LinkSelector,
    ListingSelectors, NavigationPolicy, SocialNetwork, PLACEHOLDER,
};
use scraper::{ElementRef, Html, Selector};

use crate::{FetchedPage, Fetcher};

/// What an extractor may use beyond the page it was handed.
pub struct ExtractContext<'a> {
    pub fetcher: &'a dyn Fetcher,
    pub navigation: NavigationPolicy,
    pub timeout: Duration,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Extraction {
    Found(Vec<Fields>),
    NotFound,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ExtractError {
    #[error("malformed content: {0}")]
    MalformedContent(String),
}

impl ExtractError {
    pub fn kind(&self) -> FailureKind {
        match self {
            ExtractError::MalformedContent(_) => FailureKind::MalformedContent,
        }
    }
}

/// Turns a fetched page into field maps. Nothing found is `NotFound`, not an
/// error.
#[async_trait::async_trait]
pub trait Extractor: Send + Sync {
    async fn extract(
        &self,
        page: &FetchedPage,
        ctx: &ExtractContext<'_>,
    ) -> Result<Extraction, ExtractError>;
}

/// `{name, address}` pairs from a listing results page.
#[derive(Debug, Clone, Default)]
pub struct ListingExtractor {
    selectors: ListingSelectors,
}

impl ListingExtractor {
    pub fn new(selectors: ListingSelectors) -> Self {
        Self { selectors }
    }

    fn entries(&self, html: &str) -> Result<Vec<Fields>, ExtractError> {
        let container = parse_selector(&self.selectors.container)?;
        let name = parse_selector(&self.selectors.name)?;
        let address = parse_selector(&self.selectors.address)?;

        let document = Html::parse_document(html);
        let entries = document
            .select(&container)
            .map(|entry| {
                let mut fields = Fields::new();
                fields.insert("name".to_string(), child_text(entry, &name));
                fields.insert("address".to_string(), child_text(entry, &address));
                fields
            })
            .collect();
        Ok(entries)
    }
}

#[async_trait::async_trait]
impl Extractor for ListingExtractor {
    async fn extract(
        &self,
        page: &FetchedPage,
        _ctx: &ExtractContext<'_>,
    ) -> Result<Extraction, ExtractError> {
        let entries = self.entries(&page.content)?;
        engine_debug!("{} listing entries on {}", entries.len(), page.final_url);
        if entries.is_empty() {
            Ok(Extraction::NotFound)
        } else {
            Ok(Extraction::Found(entries))
        }
    }
}

fn parse_selector(css: &str) -> Result<Selector, ExtractError> {
    Selector::parse(css).map_err(|err| ExtractError::MalformedContent(format!("selector {css:?}: {err}")))
}

fn child_text(entry: ElementRef<'_>, selector: &Selector) -> String {
    entry
        .select(selector)
        .next()
        .map(|child| child.text().flat_map(str::split_whitespace).collect::<Vec<_>>().join(" "))
        .filter(|text| !text.is_empty())
        .unwrap_or_else(|| PLACEHOLDER.to_string())
}

/// Separator for multi-valued contact fields.
const LIST_SEPARATOR: &str = ", ";

/// First email found on the site's contact-like pages, plus the phone numbers
/// and social profiles seen on the way.
///
/// Fields of a found record: `email`, `emails` (every address on the page
/// that had one), `page`, and when present `phones` and one entry per
/// [`SocialNetwork`]. Phones come from the primary page and every candidate
/// visited; social profiles from the primary page's anchors.
#[derive(Debug, Clone)]
pub struct ContactEmailExtractor {
    selector: LinkSelector,
    matcher: EmailMatcher,
    max_candidates: Option<usize>,
    scan_primary_page: bool,
}

/// What one page contributed.
struct PageScan {
    url: String,
    emails: Vec<String>,
    phones: Vec<String>,
}

impl ContactEmailExtractor {
    pub fn new(settings: &ContactSettings) -> Self {
        Self {
            selector: LinkSelector::new(&settings.keywords),
            matcher: EmailMatcher,
            max_candidates: settings.max_candidates,
            scan_primary_page: settings.scan_primary_page,
        }
    }

    fn scan(&self, page: &FetchedPage) -> PageScan {
        PageScan {
            url: page.final_url.clone(),
            emails: self.matcher.all_matches(&page.content),
            phones: phone_numbers(&page_text(&page.content)),
        }
    }

    /// A candidate that cannot be fetched simply yields nothing.
    async fn scan_candidate(&self, link: String, ctx: &ExtractContext<'_>) -> Option<PageScan> {
        match ctx.fetcher.fetch(&link, ctx.navigation, ctx.timeout).await {
            Ok(page) => Some(self.scan(&page)),
            Err(err) => {
                engine_warn!("Skipping candidate {}: {}", link, err);
                None
            }
        }
    }
}

fn found(email: String, scan: PageScan, mut details: Fields) -> Extraction {
    details.insert("email".to_string(), email);
    details.insert("emails".to_string(), scan.emails.join(LIST_SEPARATOR));
    details.insert("page".to_string(), scan.url);
    Extraction::Found(vec![details])
}

/// Phones and social profiles gathered so far, as fields.
fn details(phones: &[String], primary: &FetchedPage) -> Fields {
    let mut fields = Fields::new();
    if !phones.is_empty() {
        fields.insert("phones".to_string(), phones.join(LIST_SEPARATOR));
    }
    for network in SocialNetwork::ALL {
        let links = social_links(network, &primary.anchors);
        if !links.is_empty() {
            fields.insert(network.field().to_string(), links.join(LIST_SEPARATOR));
        }
    }
    fields
}

fn merge(into: &mut Vec<String>, more: Vec<String>) {
    for value in more {
        if !into.contains(&value) {
            into.push(value);
        }
    }
}

/// Text content with element boundaries kept as line breaks.
fn page_text(html: &str) -> String {
    Html::parse_document(html)
        .root_element()
        .text()
        .collect::<Vec<_>>()
        .join("\n")
}

#[async_trait::async_trait]
impl Extractor for ContactEmailExtractor {
    async fn extract(
        &self,
        page: &FetchedPage,
        ctx: &ExtractContext<'_>,
    ) -> Result<Extraction, ExtractError> {
        let mut primary = self.scan(page);
        let mut phones = std::mem::take(&mut primary.phones);
        if self.scan_primary_page {
            if let Some(email) = primary.emails.first().cloned() {
                return Ok(found(email, primary, details(&phones, page)));
            }
        }

        let mut candidates = self.selector.select(&page.anchors);
        if let Some(max) = self.max_candidates {
            candidates.truncate(max);
        }
        if candidates.is_empty() {
            engine_debug!("No contact links on {}", page.final_url);
            return Ok(Extraction::NotFound);
        }

        // Candidates are visited one at a time; the stream stops at the first
        // page with an email.
        let mut scans = std::pin::pin!(stream::iter(candidates)
            .then(|link| self.scan_candidate(link, ctx))
            .filter_map(future::ready));

        while let Some(mut scan) = scans.next().await {
            merge(&mut phones, std::mem::take(&mut scan.phones));
            if let Some(email) = scan.emails.first().cloned() {
                return Ok(found(email, scan, details(&phones, page)));
            }
        }
        Ok(Extraction::NotFound)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn listing_entries_fill_missing_children_with_placeholder() {
        let html = r#"
            <div class="section-result">
              <h3 class="section-result-title"> Corner   Bakery </h3>
              <span class="section-result-location">1 Main St</span>
            </div>
            <div class="section-result">
              <h3 class="section-result-title">Night Owl Cafe</h3>
            </div>"#;
        let entries = ListingExtractor::default().entries(html).expect("valid selectors");
        let pairs: Vec<(&str, &str)> = entries
            .iter()
            .map(|f| (f["name"].as_str(), f["address"].as_str()))
            .collect();
        assert_eq!(
            pairs,
            vec![("Corner Bakery", "1 Main St"), ("Night Owl Cafe", "N/A")]
        );
    }

    #[test]
    fn invalid_selector_is_malformed_content() {
        let extractor = ListingExtractor::new(ListingSelectors {
            container: "div[".to_string(),
            ..ListingSelectors::default()
        });
        let err = extractor.entries("<p></p>").unwrap_err();
        assert_eq!(err.kind(), FailureKind::MalformedContent);
    }

    #[test]
    fn page_text_keeps_numbers_out_of_markup() {
        let html = r#"<div data-id="5550102030"><span>Tel</span><b>555-010-4040</b></div>"#;
        assert_eq!(phone_numbers(&page_text(html)), vec!["555-010-4040"]);
    }
}
