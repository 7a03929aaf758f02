use tracing::{error, info, warn};

use crate::config::Config;
use crate::error::{ExtractionError, SelectionError};
use crate::extract::paginator::PaginationWalker;
use crate::extract::parser;
use crate::extract::reconcile::reconcile;
use crate::extract::selector::FilterSelector;
use crate::session::PageSession;
use crate::sink::DebugDump;
use crate::types::{ExtractionOutcome, FilterCombination, TimeSeries};

/// Runs every filter combination against one page session, one at a time.
pub struct CombinationDriver<S: PageSession> {
    session: S,
    cfg: Config,
    debug_dump: Option<DebugDump>,
}

impl<S: PageSession> CombinationDriver<S> {
    pub fn new(session: S, cfg: Config) -> Self {
        let debug_dump = cfg.debug.then(|| DebugDump::new(&cfg.debug_dir));
        Self { session, cfg, debug_dump }
    }

    #[cfg(test)]
    pub fn session(&self) -> &S {
        &self.session
    }

    /// One outcome per combination, in input order. Never aborts early.
    pub async fn run_all(&self, combinations: &[FilterCombination]) -> Vec<ExtractionOutcome> {
        let total = combinations.len();
        let mut outcomes = Vec::with_capacity(total);

        for (i, combination) in combinations.iter().enumerate() {
            info!(
                combination = %combination.slug(),
                "COMBINATION [{}/{}] {}",
                i + 1,
                total,
                combination,
            );

            let result = self.extract(combination).await;
            match &result {
                Ok(series) => info!(
                    combination = %combination.slug(),
                    rows = series.len(),
                    "Series complete: {} rows",
                    series.len(),
                ),
                Err(e) => {
                    error!(combination = %combination.slug(), kind = e.kind(), "Series failed: {e}");
                    self.dump_page(combination).await;
                }
            }
            outcomes.push(ExtractionOutcome { combination: *combination, result });

            if i + 1 < total {
                tokio::time::sleep(self.cfg.delay).await;
            }
        }

        outcomes
    }

    /// Extract one combination within the per-combination time budget.
    pub async fn extract(&self, combination: &FilterCombination) -> Result<TimeSeries, ExtractionError> {
        let budget = self.cfg.combination_timeout;
        match tokio::time::timeout(budget, self.extract_unbounded(combination)).await {
            Ok(result) => result,
            Err(_) => Err(ExtractionError::Timeout(budget)),
        }
    }

    async fn extract_unbounded(&self, combination: &FilterCombination) -> Result<TimeSeries, ExtractionError> {
        // A fresh load resets filters and pagination left over from the previous combination.
        if let Err(e) = self.session.open().await {
            return Err(SelectionError::Session(e).into());
        }

        FilterSelector::new(&self.session, &self.cfg).select(combination).await?;

        let mut walker = PaginationWalker::new(&self.session, &self.cfg);
        let mut records = Vec::new();
        let mut raw_rows = 0usize;
        let mut markers = 0usize;
        let mut bad_rows = 0usize;

        while let Some(rows) = walker.next_page().await? {
            raw_rows += rows.len();
            for raw in &rows {
                if parser::is_marker(raw) {
                    markers += 1;
                    continue;
                }
                match parser::parse(raw) {
                    Ok(record) => records.push(record),
                    Err(e) => {
                        bad_rows += 1;
                        warn!(combination = %combination.slug(), bad_rows, "Skipping row: {e}");
                        if bad_rows > self.cfg.max_bad_rows {
                            return Err(ExtractionError::TooManyBadRows {
                                count: bad_rows,
                                limit: self.cfg.max_bad_rows,
                            });
                        }
                    }
                }
            }
            info!(
                combination = %combination.slug(),
                page = walker.pages_read(),
                rows = rows.len(),
                total = raw_rows,
                "Page {}: {} rows (total {})",
                walker.pages_read(),
                rows.len(),
                raw_rows,
            );
        }

        let reconciled = reconcile(records);
        info!(
            combination = %combination.slug(),
            pages = walker.pages_read(),
            raw_rows,
            markers,
            bad_rows,
            duplicates = reconciled.duplicates,
            conflicts = reconciled.conflicts,
            "Extraction complete: {} periods from {} page(s)",
            reconciled.series.len(),
            walker.pages_read(),
        );

        if reconciled.series.is_empty() {
            return Err(ExtractionError::NoData);
        }
        Ok(reconciled.series)
    }

    async fn dump_page(&self, combination: &FilterCombination) {
        let Some(dump) = &self.debug_dump else { return };
        match self.session.snapshot().await {
            Ok(html) => {
                if let Err(e) = dump.save(combination, &html).await {
                    warn!(combination = %combination.slug(), "Could not save debug page source: {e}");
                }
            }
            Err(e) => warn!(combination = %combination.slug(), "Could not capture page source: {e}"),
        }
        match self.session.screenshot().await {
            Ok(png) => {
                if let Err(e) = dump.save_screenshot(combination, &png).await {
                    warn!(combination = %combination.slug(), "Could not save debug screenshot: {e}");
                }
            }
            Err(e) => warn!(combination = %combination.slug(), "Could not capture screenshot: {e}"),
        }
    }
}

// ---------------------------------------------------------------------------
// Run summary
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
pub struct RunSummary {
    /// (slug, periods extracted)
    pub succeeded: Vec<(String, usize)>,
    /// (slug, error kind)
    pub failed: Vec<(String, &'static str)>,
}

impl RunSummary {
    pub fn from_outcomes(outcomes: &[ExtractionOutcome]) -> Self {
        let mut summary = RunSummary::default();
        for outcome in outcomes {
            let slug = outcome.combination.slug();
            match &outcome.result {
                Ok(series) => summary.succeeded.push((slug, series.len())),
                Err(e) => summary.failed.push((slug, e.kind())),
            }
        }
        summary
    }

    pub fn total(&self) -> usize {
        self.succeeded.len() + self.failed.len()
    }

    pub fn log(&self) {
        info!(
            total = self.total(),
            succeeded = self.succeeded.len(),
            failed = self.failed.len(),
            "SCRAPING COMPLETED: {} combinations, {} succeeded, {} failed",
            self.total(),
            self.succeeded.len(),
            self.failed.len(),
        );
        for (slug, rows) in &self.succeeded {
            info!("  ok    {slug}: {rows} rows");
        }
        for (slug, kind) in &self.failed {
            warn!("  FAIL  {slug}: {kind}");
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::config::selectors;
    use crate::session::fake::FakeSite;
    use crate::types::{MarketSegment, Period, PropertyType, RawRow, SaleType};

    fn cfg() -> Config {
        Config {
            delay: Duration::ZERO,
            reload_timeout: Duration::from_millis(10),
            page_timeout: Duration::from_millis(10),
            ..Config::default()
        }
    }

    fn overlap_pages() -> Vec<Vec<RawRow>> {
        vec![
            vec![
                RawRow::new("Jan 1995", "100.0", ""),
                RawRow::new("Feb 1995", "101.2", "1.2%"),
            ],
            vec![
                RawRow::new("Feb 1995", "101.2", "1.2%"),
                RawRow::new("Mar 1995", "99.8", "-1.4%"),
            ],
        ]
    }

    #[tokio::test]
    async fn overlapping_pages_reconcile_to_three_periods() {
        let combo = FilterCombination::all()[0];
        let site = FakeSite::new().with_pages(&combo, overlap_pages());
        let driver = CombinationDriver::new(site, cfg());

        let series = driver.extract(&combo).await.unwrap();
        let got: Vec<(Period, f64, Option<f64>)> = series
            .records()
            .iter()
            .map(|r| (r.period, r.value, r.percent_change))
            .collect();
        assert_eq!(
            got,
            vec![
                (Period::new(1, 1995).unwrap(), 100.0, None),
                (Period::new(2, 1995).unwrap(), 101.2, Some(1.2)),
                (Period::new(3, 1995).unwrap(), 99.8, Some(-1.4)),
            ]
        );
    }

    #[tokio::test]
    async fn empty_date_rows_are_skipped_silently() {
        let combo = FilterCombination::all()[0];
        let site = FakeSite::new().with_pages(
            &combo,
            vec![vec![
                RawRow::new("Jan 1995", "100.0", ""),
                RawRow::new("", "", ""),
                RawRow::new("", "No data", ""),
                RawRow::new("Feb 1995", "101.0", "1.0%"),
            ]],
        );
        let driver = CombinationDriver::new(site, Config { max_bad_rows: 0, ..cfg() });

        let series = driver.extract(&combo).await.unwrap();
        assert_eq!(series.len(), 2);
    }

    #[tokio::test]
    async fn failing_selection_does_not_stop_the_run() {
        let combos = vec![
            FilterCombination::new(PropertyType::Hdb, SaleType::AllSale, MarketSegment::All),
            FilterCombination::new(PropertyType::Hdb, SaleType::Resale, MarketSegment::All),
            FilterCombination::new(PropertyType::PrivateLanded, SaleType::AllSale, MarketSegment::All),
        ];
        let site = FakeSite::new()
            .without_option(selectors::SALE_TYPE, "Resale")
            .with_pages(&combos[0], overlap_pages())
            .with_pages(&combos[2], overlap_pages());
        let driver = CombinationDriver::new(site, cfg());

        let outcomes = driver.run_all(&combos).await;
        assert_eq!(outcomes.len(), 3);
        assert!(outcomes[0].is_success());
        assert!(matches!(
            outcomes[1].result,
            Err(ExtractionError::Selection(SelectionError::ValueNotAvailable { .. }))
        ));
        assert!(outcomes[2].is_success());
        assert_eq!(outcomes[2].series().map(TimeSeries::len), Some(3));
        // Each combination starts from a fresh page load.
        assert_eq!(driver.session().opens(), 3);
    }

    #[tokio::test]
    async fn too_many_bad_rows_fail_the_combination() {
        let combo = FilterCombination::all()[0];
        let site = FakeSite::new().with_pages(
            &combo,
            vec![vec![
                RawRow::new("Jan 1995", "oops", ""),
                RawRow::new("Feb 1995", "n/a", ""),
                RawRow::new("Mar 1995", "99.0", ""),
            ]],
        );
        let driver = CombinationDriver::new(site, Config { max_bad_rows: 1, ..cfg() });

        let err = driver.extract(&combo).await.unwrap_err();
        assert!(matches!(err, ExtractionError::TooManyBadRows { count: 2, limit: 1 }));
    }

    #[tokio::test]
    async fn bad_rows_under_the_limit_are_dropped() {
        let combo = FilterCombination::all()[0];
        let site = FakeSite::new().with_pages(
            &combo,
            vec![vec![
                RawRow::new("Jan 1995", "oops", ""),
                RawRow::new("Feb 1995", "98.0", ""),
            ]],
        );
        let driver = CombinationDriver::new(site, Config { max_bad_rows: 1, ..cfg() });

        let series = driver.extract(&combo).await.unwrap();
        assert_eq!(series.len(), 1);
    }

    #[tokio::test]
    async fn pagination_failure_discards_partial_series() {
        let combo = FilterCombination::all()[0];
        let site = FakeSite::new().endless();
        let driver = CombinationDriver::new(site, Config { max_pages: 2, ..cfg() });

        let outcomes = driver.run_all(&[combo]).await;
        assert!(outcomes[0].series().is_none());
        assert_eq!(
            outcomes[0].result.as_ref().err().map(ExtractionError::kind),
            Some("page_limit_exceeded")
        );
    }

    #[tokio::test]
    async fn missing_data_is_a_failure() {
        let combo = FilterCombination::all()[0];
        let driver = CombinationDriver::new(FakeSite::new(), cfg());

        let err = driver.extract(&combo).await.unwrap_err();
        assert!(matches!(err, ExtractionError::NoData));
    }

    #[tokio::test]
    async fn slow_combination_times_out_and_the_run_continues() {
        let slow = FilterCombination::all()[1];
        let fast = FilterCombination::all()[0];
        let site = FakeSite::new()
            .with_pages(&slow, vec![vec![RawRow::new("Jan 2001", "140.0", "")]])
            .with_pages(&fast, overlap_pages())
            .slow_reads_for(&slow, Duration::from_millis(500));
        let driver = CombinationDriver::new(
            site,
            Config { combination_timeout: Duration::from_millis(50), ..cfg() },
        );

        let outcomes = driver.run_all(&[slow, fast]).await;
        assert_eq!(
            outcomes[0].result.as_ref().err().map(ExtractionError::kind),
            Some("timeout")
        );
        assert!(outcomes[1].is_success());
        assert_eq!(driver.session().opens(), 2);
    }

    #[tokio::test]
    async fn summary_counts_outcomes() {
        let combos = FilterCombination::all();
        let site = FakeSite::new().with_pages(&combos[0], overlap_pages());
        let driver = CombinationDriver::new(site, cfg());

        let outcomes = driver.run_all(&combos[..2]).await;
        let summary = RunSummary::from_outcomes(&outcomes);
        assert_eq!(summary.total(), 2);
        assert_eq!(summary.succeeded, vec![(combos[0].slug(), 3)]);
        assert_eq!(summary.failed, vec![(combos[1].slug(), "no_data")]);
    }

    #[tokio::test]
    async fn debug_mode_dumps_failed_pages() {
        let dir = std::env::temp_dir().join(format!("srx-driver-debug-{}", std::process::id()));
        let combo = FilterCombination::all()[1];
        let driver = CombinationDriver::new(
            FakeSite::new(),
            Config { debug: true, debug_dir: dir.clone(), ..cfg() },
        );

        let outcomes = driver.run_all(&[combo]).await;
        assert!(!outcomes[0].is_success());
        assert!(dir.join(format!("{}_page_source.html", combo.slug())).exists());
        assert!(dir.join(format!("{}_screenshot.png", combo.slug())).exists());

        std::fs::remove_dir_all(&dir).unwrap();
    }
}
