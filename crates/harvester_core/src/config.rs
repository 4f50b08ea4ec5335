use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::links::DEFAULT_KEYWORDS;
use crate::retry::{RetryPolicy, SLOW_RENDER_DELAY_MS};
use crate::TargetKind;

pub const DEFAULT_CONCURRENCY: usize = 3;
pub const DEFAULT_TIMEOUT_MS: u64 = 120_000;
pub const DEFAULT_LISTING_BASE_URL: &str = "https://www.google.com/maps/search/";

/// When a navigated page counts as ready for extraction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NavigationPolicy {
    NetworkIdle,
    FixedDelay { delay_ms: u64 },
}

impl NavigationPolicy {
    /// `0` selects `NetworkIdle`.
    pub fn from_settle_ms(settle_ms: u64) -> Self {
        if settle_ms == 0 {
            NavigationPolicy::NetworkIdle
        } else {
            NavigationPolicy::FixedDelay {
                delay_ms: settle_ms,
            }
        }
    }

    pub fn settle_delay(&self) -> Option<Duration> {
        match self {
            NavigationPolicy::NetworkIdle => None,
            NavigationPolicy::FixedDelay { delay_ms } => Some(Duration::from_millis(*delay_ms)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FetcherKind {
    #[default]
    Browser,
    Http,
}

/// CSS selectors for the listing results page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ListingSelectors {
    pub container: String,
    pub name: String,
    pub address: String,
}

impl Default for ListingSelectors {
    fn default() -> Self {
        Self {
            container: ".section-result".to_string(),
            name: ".section-result-title".to_string(),
            address: ".section-result-location".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContactSettings {
    pub navigation: NavigationPolicy,
    pub retry: RetryPolicy,
    pub keywords: Vec<String>,
    /// Visit at most this many candidate pages per site.
    pub max_candidates: Option<usize>,
    /// Also scan the site's landing page before its candidate pages.
    pub scan_primary_page: bool,
}

impl Default for ContactSettings {
    fn default() -> Self {
        Self {
            navigation: NavigationPolicy::FixedDelay {
                delay_ms: SLOW_RENDER_DELAY_MS,
            },
            retry: RetryPolicy::default_for(TargetKind::SiteContact),
            keywords: DEFAULT_KEYWORDS.iter().map(|k| k.to_string()).collect(),
            max_candidates: None,
            scan_primary_page: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ListingSettings {
    pub navigation: NavigationPolicy,
    pub retry: RetryPolicy,
    pub base_url: String,
    pub selectors: ListingSelectors,
}

impl Default for ListingSettings {
    fn default() -> Self {
        Self {
            navigation: NavigationPolicy::FixedDelay { delay_ms: 3_000 },
            retry: RetryPolicy::default_for(TargetKind::ListingQuery),
            base_url: DEFAULT_LISTING_BASE_URL.to_string(),
            selectors: ListingSelectors::default(),
        }
    }
}

/// Everything a harvest run can be tuned with. Every field has a default so a
/// config file only needs the values it changes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HarvestConfig {
    pub concurrency: usize,
    pub timeout_ms: u64,
    /// Wall-clock budget for the whole run.
    pub deadline_ms: Option<u64>,
    pub fetcher: FetcherKind,
    pub chrome_path: Option<PathBuf>,
    pub contact: ContactSettings,
    pub listing: ListingSettings,
}

impl Default for HarvestConfig {
    fn default() -> Self {
        Self {
            concurrency: DEFAULT_CONCURRENCY,
            timeout_ms: DEFAULT_TIMEOUT_MS,
            deadline_ms: None,
            fetcher: FetcherKind::default(),
            chrome_path: None,
            contact: ContactSettings::default(),
            listing: ListingSettings::default(),
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("concurrency must be at least 1")]
    ZeroConcurrency,
    #[error("timeout must be greater than zero")]
    ZeroTimeout,
    #[error("listing base url is not absolute: {0}")]
    ListingBaseUrl(String),
}

impl HarvestConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.concurrency == 0 {
            return Err(ConfigError::ZeroConcurrency);
        }
        if self.timeout_ms == 0 {
            return Err(ConfigError::ZeroTimeout);
        }
        if url::Url::parse(&self.listing.base_url).is_err() {
            return Err(ConfigError::ListingBaseUrl(self.listing.base_url.clone()));
        }
        Ok(())
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn deadline(&self) -> Option<Duration> {
        self.deadline_ms.map(Duration::from_millis)
    }

    pub fn navigation_for(&self, kind: TargetKind) -> NavigationPolicy {
        match kind {
            TargetKind::ListingQuery => self.listing.navigation,
            TargetKind::SiteContact => self.contact.navigation,
        }
    }

    pub fn retry_for(&self, kind: TargetKind) -> RetryPolicy {
        match kind {
            TargetKind::ListingQuery => self.listing.retry,
            TargetKind::SiteContact => self.contact.retry,
        }
    }
}
