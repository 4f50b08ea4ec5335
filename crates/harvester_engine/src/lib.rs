//! Harvester engine: fetchers, extractors, the coordinator and CSV IO.
mod browser;
mod coordinator;
mod decode;
mod extract;
mod fetch;
mod links;
mod mock;
mod persist;
mod sink;
mod source;
mod types;

pub use browser::{BrowserFetcher, BrowserSession, BrowserSettings};
pub use coordinator::Coordinator;
pub use decode::{decode_html, DecodedHtml};
pub use extract::{
    ContactEmailExtractor, ExtractContext, ExtractError, Extraction, Extractor, ListingExtractor,
};
pub use fetch::{FetchSettings, Fetcher, HttpFetcher, DEFAULT_USER_AGENT};
pub use links::{extract_anchors, extract_anchors_limited};
pub use mock::{MockFetcher, MockResponse};
pub use persist::{ensure_output_dir, write_atomic, PersistError};
pub use sink::{
    header, render_csv, render_manifest, write_manifest, write_results, SinkError, ERROR_CELL,
};
pub use source::{input_column, read_targets, read_targets_from, SourceError};
pub use types::{FetchError, FetchedPage};
pub use tokio_util::sync::CancellationToken;
