//! Harvester core: targets, records, the per-target state machine and the
//! pure selection and matching helpers. No IO happens here.
mod config;
mod contact;
mod email;
mod links;
mod record;
mod report;
mod retry;
mod state;
mod target;

pub use config::{
    ConfigError, ContactSettings, FetcherKind, HarvestConfig, ListingSelectors, ListingSettings,
    NavigationPolicy, DEFAULT_CONCURRENCY, DEFAULT_LISTING_BASE_URL, DEFAULT_TIMEOUT_MS,
};
pub use contact::{phone_numbers, social_links, SocialNetwork, PHONE_PATTERN};
pub use email::{normalize_email, EmailMatcher, EMAIL_PATTERN};
pub use links::{select_links, Anchor, LinkSelector, DEFAULT_KEYWORDS};
pub use record::{ExtractedRecord, FailureKind, Fields, RecordStatus};
pub use report::{HarvestReport, ReportBuilder};
pub use retry::{Backoff, RetryPolicy, SLOW_RENDER_DELAY_MS};
pub use state::{advance, TargetEvent, TargetState};
pub use target::{
    is_placeholder, listing_url, normalize_url, Target, TargetId, TargetKind, PLACEHOLDER,
};
