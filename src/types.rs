use serde::Serialize;

use crate::config::ARTIFACT_PREFIX;
use crate::error::ExtractionError;

// ---------------------------------------------------------------------------
// Filter dimensions
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PropertyType {
    PrivateNonLanded,
    PrivateLanded,
    Hdb,
}

impl PropertyType {
    pub const ALL: [PropertyType; 3] = [
        PropertyType::PrivateNonLanded,
        PropertyType::PrivateLanded,
        PropertyType::Hdb,
    ];

    /// Visible option text in the site's dropdown.
    pub fn label(self) -> &'static str {
        match self {
            PropertyType::PrivateNonLanded => "Private Non-Landed",
            PropertyType::PrivateLanded => "Private Landed",
            PropertyType::Hdb => "HDB",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SaleType {
    AllSale,
    Resale,
}

impl SaleType {
    pub const ALL: [SaleType; 2] = [SaleType::AllSale, SaleType::Resale];

    pub fn label(self) -> &'static str {
        match self {
            SaleType::AllSale => "All Sale",
            SaleType::Resale => "Resale",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MarketSegment {
    All,
    CoreCentral,
    RestOfCentral,
    OutsideCentral,
}

impl MarketSegment {
    pub const ALL: [MarketSegment; 4] = [
        MarketSegment::All,
        MarketSegment::CoreCentral,
        MarketSegment::RestOfCentral,
        MarketSegment::OutsideCentral,
    ];

    pub fn label(self) -> &'static str {
        match self {
            MarketSegment::All => "All",
            MarketSegment::CoreCentral => "Core Central",
            MarketSegment::RestOfCentral => "Rest of Central",
            MarketSegment::OutsideCentral => "Outside Central",
        }
    }
}

fn slug_part(label: &str) -> String {
    label.replace(' ', "_").to_lowercase()
}

/// One data slice of the price index table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FilterCombination {
    pub property_type: PropertyType,
    pub sale_type: SaleType,
    pub market_segment: MarketSegment,
}

impl FilterCombination {
    pub fn new(property_type: PropertyType, sale_type: SaleType, market_segment: MarketSegment) -> Self {
        Self { property_type, sale_type, market_segment }
    }

    /// Full cross-product, property type outermost, market segment innermost.
    pub fn all() -> Vec<FilterCombination> {
        let mut out = Vec::with_capacity(
            PropertyType::ALL.len() * SaleType::ALL.len() * MarketSegment::ALL.len(),
        );
        for property_type in PropertyType::ALL {
            for sale_type in SaleType::ALL {
                for market_segment in MarketSegment::ALL {
                    out.push(FilterCombination::new(property_type, sale_type, market_segment));
                }
            }
        }
        out
    }

    /// Stable identifier, e.g. `private_non-landed_all_sale_core_central`.
    pub fn slug(&self) -> String {
        format!(
            "{}_{}_{}",
            slug_part(self.property_type.label()),
            slug_part(self.sale_type.label()),
            slug_part(self.market_segment.label()),
        )
    }

    /// Output file name for this combination's series.
    pub fn artifact_name(&self) -> String {
        format!("{ARTIFACT_PREFIX}_{}.txt", self.slug())
    }
}

impl std::fmt::Display for FilterCombination {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} | {} | {}",
            self.property_type.label(),
            self.sale_type.label(),
            self.market_segment.label(),
        )
    }
}

// ---------------------------------------------------------------------------
// Rows and records
// ---------------------------------------------------------------------------

/// Cell text of one table row, as rendered.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct RawRow {
    pub date_text: String,
    pub value_text: String,
    pub change_text: String,
}

impl RawRow {
    pub fn new(date: &str, value: &str, change: &str) -> Self {
        Self {
            date_text: date.to_string(),
            value_text: value.to_string(),
            change_text: change.to_string(),
        }
    }
}

pub const MONTH_ABBR: [&str; 12] = [
    "jan", "feb", "mar", "apr", "may", "jun", "jul", "aug", "sep", "oct", "nov", "dec",
];

/// Canonical observation key. Field order gives `(year, month)` ordering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Period {
    year: i32,
    month: u8,
}

impl Period {
    pub fn new(month: u8, year: i32) -> Option<Self> {
        (1..=12).contains(&month).then_some(Self { year, month })
    }
}

/// `nov-2025`
impl std::fmt::Display for Period {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}-{}", MONTH_ABBR[usize::from(self.month - 1)], self.year)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PeriodRecord {
    pub period: Period,
    pub value: f64,
    /// `None` when the site shows no change; distinct from `Some(0.0)`.
    pub percent_change: Option<f64>,
}

// ---------------------------------------------------------------------------
// Series
// ---------------------------------------------------------------------------

/// Strictly ascending, duplicate-free records for one combination.
/// Only the reconciler builds these.
#[derive(Debug, Clone, PartialEq)]
pub struct TimeSeries {
    records: Vec<PeriodRecord>,
}

impl TimeSeries {
    pub(crate) fn from_sorted(records: Vec<PeriodRecord>) -> Self {
        debug_assert!(records.windows(2).all(|w| w[0].period < w[1].period));
        Self { records }
    }

    pub fn records(&self) -> &[PeriodRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn first_period(&self) -> Option<Period> {
        self.records.first().map(|r| r.period)
    }

    pub fn last_period(&self) -> Option<Period> {
        self.records.last().map(|r| r.period)
    }
}

/// One CSV line of an output artifact.
#[derive(Debug, Serialize)]
pub struct SeriesRow {
    #[serde(rename = "Date")]
    pub date: String,
    #[serde(rename = "Index Value")]
    pub value: f64,
    #[serde(rename = "Change")]
    pub change: Option<f64>,
}

impl From<&PeriodRecord> for SeriesRow {
    fn from(r: &PeriodRecord) -> Self {
        Self {
            date: r.period.to_string(),
            value: r.value,
            change: r.percent_change,
        }
    }
}

// ---------------------------------------------------------------------------
// Outcomes
// ---------------------------------------------------------------------------

#[derive(Debug)]
pub struct ExtractionOutcome {
    pub combination: FilterCombination,
    pub result: Result<TimeSeries, ExtractionError>,
}

impl ExtractionOutcome {
    #[cfg(test)]
    pub fn is_success(&self) -> bool {
        self.result.is_ok()
    }

    pub fn series(&self) -> Option<&TimeSeries> {
        self.result.as_ref().ok()
    }
}
