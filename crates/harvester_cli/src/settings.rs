use std::fs;
use std::path::{Path, PathBuf};

use engine_logging::engine_info;
use harvester_core::{ConfigError, HarvestConfig, NavigationPolicy};
use thiserror::Error;

use crate::args::Args;

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("cannot read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("cannot parse config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: ron::error::SpannedError,
    },
    #[error(transparent)]
    Invalid(#[from] ConfigError),
}

/// Config file values (or defaults) with command-line flags on top.
pub fn resolve(args: &Args) -> Result<HarvestConfig, SettingsError> {
    let mut config = match &args.config {
        Some(path) => load_config(path)?,
        None => HarvestConfig::default(),
    };
    apply_overrides(&mut config, args);
    config.validate()?;
    Ok(config)
}

pub fn load_config(path: &Path) -> Result<HarvestConfig, SettingsError> {
    let content = fs::read_to_string(path).map_err(|source| SettingsError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let config = ron::from_str(&content).map_err(|source| SettingsError::Parse {
        path: path.to_path_buf(),
        source,
    })?;
    engine_info!("Loaded settings from {:?}", path);
    Ok(config)
}

fn apply_overrides(config: &mut HarvestConfig, args: &Args) {
    if let Some(concurrency) = args.concurrency {
        config.concurrency = concurrency;
    }
    if let Some(timeout) = args.timeout {
        config.timeout_ms = timeout;
    }
    if let Some(settle_ms) = args.settle_ms {
        let navigation = NavigationPolicy::from_settle_ms(settle_ms);
        config.contact.navigation = navigation;
        config.listing.navigation = navigation;
    }
    if let Some(retries) = args.retries {
        config.contact.retry.max_retries = retries;
        config.listing.retry.max_retries = retries;
    }
    if let Some(deadline) = args.deadline_ms {
        config.deadline_ms = Some(deadline);
    }
    if let Some(fetcher) = args.fetcher {
        config.fetcher = fetcher.into();
    }
    if let Some(chrome) = &args.chrome {
        config.chrome_path = Some(chrome.clone());
    }
}
