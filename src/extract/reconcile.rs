use std::collections::BTreeMap;

use tracing::warn;

use crate::types::{Period, PeriodRecord, TimeSeries};

/// Values closer than this are treated as the same observation.
const VALUE_TOLERANCE: f64 = 1e-9;

#[derive(Debug)]
pub struct Reconciled {
    pub series: TimeSeries,
    /// Records collapsed into an earlier period, conflicting or not.
    pub duplicates: usize,
    /// Collapsed records whose value differed from the one they replaced.
    pub conflicts: usize,
}

/// Collapse records to one per period (last seen wins) and sort ascending.
pub fn reconcile<I>(records: I) -> Reconciled
where
    I: IntoIterator<Item = PeriodRecord>,
{
    let mut by_period: BTreeMap<Period, PeriodRecord> = BTreeMap::new();
    let mut duplicates = 0usize;
    let mut conflicts = 0usize;

    for record in records {
        let period = record.period;
        let new_value = record.value;
        if let Some(previous) = by_period.insert(period, record) {
            duplicates += 1;
            if (previous.value - new_value).abs() > VALUE_TOLERANCE {
                conflicts += 1;
                warn!(
                    period = %period,
                    kept = new_value,
                    dropped = previous.value,
                    "Conflicting values for {period}: keeping {new_value}, dropping {}",
                    previous.value,
                );
            }
        }
    }

    Reconciled {
        series: TimeSeries::from_sorted(by_period.into_values().collect()),
        duplicates,
        conflicts,
    }
}
