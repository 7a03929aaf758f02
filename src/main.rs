mod config;
mod error;
mod extract;
mod session;
mod sink;
mod types;

use std::path::PathBuf;

use clap::Parser;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use crate::config::{parse_delay, Config};
use crate::error::Result;
use crate::extract::{CombinationDriver, RunSummary};
use crate::session::ChromeSession;
use crate::sink::{archive, SeriesWriter};
use crate::types::FilterCombination;

/// Scrape every SRX price index series into CSV files.
#[derive(Debug, Parser)]
#[command(version, about)]
struct Cli {
    /// Save page source of failed combinations for offline diagnosis
    #[arg(short, long)]
    debug: bool,

    /// Seconds to pause between page and combination actions
    #[arg(long, value_name = "SECONDS")]
    delay: Option<String>,

    /// Pagination ceiling per combination
    #[arg(long)]
    max_pages: Option<usize>,

    /// Attempts per page read
    #[arg(long)]
    max_retries: Option<u32>,

    /// Directory for the CSV artifacts
    #[arg(long, value_name = "DIR")]
    output_dir: Option<PathBuf>,

    /// Show the browser window
    #[arg(long)]
    headed: bool,
}

impl Cli {
    fn apply(self, cfg: &mut Config) -> Result<()> {
        if self.debug {
            cfg.debug = true;
        }
        if let Some(raw) = self.delay {
            cfg.delay = parse_delay(&raw)?;
        }
        if let Some(n) = self.max_pages {
            cfg.max_pages = n;
        }
        if let Some(n) = self.max_retries {
            cfg.max_retries = n;
        }
        if let Some(dir) = self.output_dir {
            cfg.output_dir = dir;
        }
        if self.headed {
            cfg.headless = false;
        }
        cfg.validate()
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let cfg = match Config::from_env().and_then(|mut cfg| cli.apply(&mut cfg).map(|_| cfg)) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Config error: {e}");
            std::process::exit(1);
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(&cfg.log_level))
        .init();

    if let Err(e) = run(cfg).await {
        error!("Fatal error: {e}");
        std::process::exit(1);
    }
}

async fn run(cfg: Config) -> Result<()> {
    let combinations = FilterCombination::all();
    info!(
        combinations = combinations.len(),
        delay_secs = cfg.delay.as_secs_f64(),
        debug = cfg.debug,
        max_pages = cfg.max_pages,
        "SRX PRICE INDEX SCRAPER - STARTING ({} combinations)",
        combinations.len(),
    );

    let output_dir = cfg.output_dir.clone();
    let writer = SeriesWriter::new(&cfg.output_dir)?;
    let session = ChromeSession::launch(&cfg)?;
    let driver = CombinationDriver::new(session, cfg);

    let outcomes = driver.run_all(&combinations).await;

    let mut written = Vec::new();
    for outcome in &outcomes {
        if let Some(series) = outcome.series() {
            match writer.write(&outcome.combination, series) {
                Ok(path) => written.push(path),
                Err(e) => warn!(combination = %outcome.combination.slug(), "Failed to save series: {e}"),
            }
        }
    }

    if written.is_empty() {
        warn!("No series saved, skipping archive");
    } else if let Err(e) = archive::bundle(&output_dir, &written) {
        error!("Failed to create archive: {e}");
    }

    RunSummary::from_outcomes(&outcomes).log();
    Ok(())
}
