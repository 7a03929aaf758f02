use std::path::PathBuf;
use std::time::Duration;

use crate::error::{AppError, Result};

pub const BASE_URL: &str = "https://www.srx.com.sg/price-index";

/// Prefix shared by every output artifact name.
pub const ARTIFACT_PREFIX: &str = "srx_price_index";

/// DOM selectors of the price index page.
pub mod selectors {
    pub const PROPERTY_TYPE: &str = "#table-property-type";
    pub const SALE_TYPE: &str = "#table-sale-resale";
    pub const MARKET_SEGMENT: &str = "#table-market-segments";
    /// The "Next" item stays visible on the last page; only content comparison tells it apart.
    pub const NEXT_PAGE: &str = "#pagination-next-button";
    pub const TABLE_ROWS: &str = "table tr";
}

/// Minimum pacing applied when running under CI, where the site answers slower.
pub const CI_MIN_DELAY_SECS: f64 = 4.0;

/// Poll interval used while waiting for table content to change.
pub const CHANGE_POLL_INTERVAL_MS: u64 = 250;

#[derive(Debug, Clone)]
pub struct Config {
    pub base_url: String,
    pub log_level: String,
    /// Pacing between page and combination actions (DELAY_SECONDS)
    pub delay: Duration,
    /// Persist page source when a combination fails (DEBUG)
    pub debug: bool,
    /// Pagination ceiling per combination (MAX_PAGES)
    pub max_pages: usize,
    /// Attempts per page read before giving up (MAX_RETRIES)
    pub max_retries: u32,
    /// Consecutive "next" activations without content change that end a walk (STALL_THRESHOLD)
    pub stall_threshold: u32,
    /// Unparseable rows tolerated within one combination (MAX_BAD_ROWS)
    pub max_bad_rows: usize,
    /// Bound on reload detection after a filter change (RELOAD_TIMEOUT_SECS)
    pub reload_timeout: Duration,
    /// Bound on content change after a "next" activation (PAGE_TIMEOUT_SECS)
    pub page_timeout: Duration,
    /// Safety bound on one combination's selection + pagination (COMBINATION_TIMEOUT_SECS)
    pub combination_timeout: Duration,
    pub output_dir: PathBuf,
    pub debug_dir: PathBuf,
    pub headless: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            base_url: BASE_URL.to_string(),
            log_level: "info".to_string(),
            delay: Duration::from_secs(2),
            debug: false,
            max_pages: 200,
            max_retries: 3,
            stall_threshold: 2,
            max_bad_rows: 5,
            reload_timeout: Duration::from_secs(20),
            page_timeout: Duration::from_secs(5),
            combination_timeout: Duration::from_secs(600),
            output_dir: PathBuf::from("output"),
            debug_dir: PathBuf::from("debug"),
            headless: true,
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let defaults = Config::default();

        let mut cfg = Self {
            base_url: std::env::var("SRX_BASE_URL").unwrap_or(defaults.base_url),
            log_level: std::env::var("LOG_LEVEL").unwrap_or(defaults.log_level),
            delay: match std::env::var("DELAY_SECONDS") {
                Ok(v) => parse_delay(&v)?,
                Err(_) => defaults.delay,
            },
            debug: env_flag("DEBUG").unwrap_or(defaults.debug),
            max_pages: env_parse("MAX_PAGES", defaults.max_pages)?,
            max_retries: env_parse("MAX_RETRIES", defaults.max_retries)?,
            stall_threshold: env_parse("STALL_THRESHOLD", defaults.stall_threshold)?,
            max_bad_rows: env_parse("MAX_BAD_ROWS", defaults.max_bad_rows)?,
            reload_timeout: Duration::from_secs(env_parse(
                "RELOAD_TIMEOUT_SECS",
                defaults.reload_timeout.as_secs(),
            )?),
            page_timeout: Duration::from_secs(env_parse(
                "PAGE_TIMEOUT_SECS",
                defaults.page_timeout.as_secs(),
            )?),
            combination_timeout: Duration::from_secs(env_parse(
                "COMBINATION_TIMEOUT_SECS",
                defaults.combination_timeout.as_secs(),
            )?),
            output_dir: std::env::var("OUTPUT_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.output_dir),
            debug_dir: std::env::var("DEBUG_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.debug_dir),
            headless: env_flag("HEADLESS").unwrap_or(defaults.headless),
        };

        if env_flag("CI").unwrap_or(false) {
            cfg.apply_ci();
        }
        cfg.validate()?;
        Ok(cfg)
    }

    /// CI runs get slower pacing and always keep debug dumps.
    pub fn apply_ci(&mut self) {
        let min = Duration::from_secs_f64(CI_MIN_DELAY_SECS);
        if self.delay < min {
            self.delay = min;
        }
        self.debug = true;
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_pages == 0 {
            return Err(AppError::Config("MAX_PAGES must be at least 1".to_string()));
        }
        if self.max_retries == 0 {
            return Err(AppError::Config("MAX_RETRIES must be at least 1".to_string()));
        }
        if self.stall_threshold == 0 {
            return Err(AppError::Config("STALL_THRESHOLD must be at least 1".to_string()));
        }
        Ok(())
    }
}

pub fn parse_delay(raw: &str) -> Result<Duration> {
    let secs = raw
        .trim()
        .parse::<f64>()
        .map_err(|_| AppError::Config(format!("DELAY_SECONDS must be a number, got {raw:?}")))?;
    if !secs.is_finite() || secs < 0.0 {
        return Err(AppError::Config(format!("DELAY_SECONDS must be non-negative, got {raw:?}")));
    }
    Ok(Duration::from_secs_f64(secs))
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> Result<T> {
    match std::env::var(key) {
        Ok(v) => v
            .trim()
            .parse::<T>()
            .map_err(|_| AppError::Config(format!("{key} must be a valid number, got {v:?}"))),
        Err(_) => Ok(default),
    }
}

fn env_flag(key: &str) -> Option<bool> {
    std::env::var(key).ok().map(|v| parse_flag(&v))
}

fn parse_flag(raw: &str) -> bool {
    matches!(raw.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on")
}
