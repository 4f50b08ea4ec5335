use std::path::PathBuf;

use clap::{Parser, ValueEnum};
use harvester_core::{FetcherKind, TargetKind};

/// Harvest business listings or contact emails from a CSV of targets.
#[derive(Parser, Debug)]
#[command(name = "harvest", version)]
pub struct Args {
    /// CSV with a `Query` (listing) or `Website` (contact) column
    #[arg(short, long)]
    pub input: PathBuf,

    #[arg(short, long, value_enum)]
    pub mode: Mode,

    /// Result CSV, replaced atomically
    #[arg(short, long)]
    pub output: PathBuf,

    /// Targets processed at once
    #[arg(short, long)]
    pub concurrency: Option<usize>,

    /// Per-fetch timeout in milliseconds
    #[arg(short, long)]
    pub timeout: Option<u64>,

    /// RON file with harvest settings; flags override its values
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Wait after navigation before reading the page, in milliseconds; 0 waits for network idle
    #[arg(long)]
    pub settle_ms: Option<u64>,

    /// Extra fetch attempts per target after a failure
    #[arg(long)]
    pub retries: Option<u32>,

    /// Cancel whatever is unfinished after this many milliseconds
    #[arg(long)]
    pub deadline_ms: Option<u64>,

    #[arg(long, value_enum)]
    pub fetcher: Option<FetcherArg>,

    /// Chromium executable
    #[arg(long)]
    pub chrome: Option<PathBuf>,

    /// Also write a JSON run manifest here
    #[arg(long)]
    pub manifest: Option<PathBuf>,

    #[arg(short, long)]
    pub verbose: bool,

    #[arg(long)]
    pub log_file: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Mode {
    Listing,
    Contact,
}

impl Mode {
    pub fn target_kind(self) -> TargetKind {
        match self {
            Mode::Listing => TargetKind::ListingQuery,
            Mode::Contact => TargetKind::SiteContact,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum FetcherArg {
    Browser,
    Http,
}

impl From<FetcherArg> for FetcherKind {
    fn from(arg: FetcherArg) -> Self {
        match arg {
            FetcherArg::Browser => FetcherKind::Browser,
            FetcherArg::Http => FetcherKind::Http,
        }
    }
}
