mod args;
mod settings;

use std::io::Write;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use engine_logging::{engine_error, engine_info, engine_warn, LogDestination};
use harvester_core::{FetcherKind, HarvestConfig};
use harvester_engine::{
    read_targets, write_manifest, write_results, BrowserFetcher, BrowserSettings,
    CancellationToken, Coordinator, FetchSettings, Fetcher, HttpFetcher,
};
use log::LevelFilter;

use crate::args::Args;

/// The input file could not be read.
const EXIT_INPUT: u8 = 2;
/// Results could not be written.
const EXIT_OUTPUT: u8 = 3;

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    let level = if args.verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };
    let destination = match &args.log_file {
        Some(path) => LogDestination::Both(path.clone()),
        None => LogDestination::Terminal,
    };
    engine_logging::initialize(destination, level);

    match run(args).await {
        Ok(code) => code,
        Err(err) => {
            engine_error!("{:#}", err);
            ExitCode::FAILURE
        }
    }
}

async fn run(args: Args) -> anyhow::Result<ExitCode> {
    let config = settings::resolve(&args).context("invalid settings")?;
    let kind = args.mode.target_kind();

    let targets = match read_targets(&args.input, kind, &config.listing.base_url) {
        Ok(targets) => targets,
        Err(err) => {
            engine_error!("{}", err);
            return Ok(ExitCode::from(EXIT_INPUT));
        }
    };

    let fetcher = build_fetcher(&config)?;
    let coordinator = Coordinator::new(fetcher, &config)?;

    let cancel = CancellationToken::new();
    let interrupt = {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                engine_warn!("Interrupted, cancelling remaining targets");
                cancel.cancel();
            }
        })
    };
    let report = coordinator.run_with_cancel(&targets, cancel).await;
    interrupt.abort();

    if let Err(err) = write_results(&args.output, kind, &targets, &report) {
        engine_error!("{}", err);
        if let Some(rendered) = err.rendered() {
            let mut stdout = std::io::stdout().lock();
            let _ = stdout.write_all(rendered.as_bytes());
            let _ = stdout.flush();
        }
        return Ok(ExitCode::from(EXIT_OUTPUT));
    }
    if let Some(path) = &args.manifest {
        if let Err(err) = write_manifest(path, &targets, &report) {
            engine_error!("{}", err);
            return Ok(ExitCode::from(EXIT_OUTPUT));
        }
        engine_info!("Manifest written to {:?}", path);
    }

    println!("{report}");
    Ok(ExitCode::SUCCESS)
}

fn build_fetcher(config: &HarvestConfig) -> anyhow::Result<Arc<dyn Fetcher>> {
    let fetcher: Arc<dyn Fetcher> = match config.fetcher {
        FetcherKind::Browser => Arc::new(BrowserFetcher::new(BrowserSettings {
            chrome_path: config.chrome_path.clone(),
        })),
        FetcherKind::Http => Arc::new(
            HttpFetcher::new(FetchSettings::default()).context("cannot build http client")?,
        ),
    };
    Ok(fetcher)
}
