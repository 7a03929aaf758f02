use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Browser error: {0}")]
    Browser(String),

    #[error("CSV write error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Archive error: {0}")]
    Archive(#[from] zip::result::ZipError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, AppError>;

/// Failures reported by a page session adapter.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SessionError {
    #[error("no element matches {0}")]
    NotFound(String),

    #[error("option {value:?} not offered by {selector}")]
    OptionMissing { selector: String, value: String },

    #[error("data table not present")]
    TableMissing,

    #[error("driver error: {0}")]
    Driver(String),
}

#[derive(Debug, Error)]
pub enum SelectionError {
    #[error("filter control not found: {control}")]
    ControlNotFound { control: &'static str },

    #[error("value {value:?} not available for {control}")]
    ValueNotAvailable { control: &'static str, value: String },

    #[error("table did not reload within {0:?}")]
    ReloadTimeout(Duration),

    #[error("session failure during selection: {0}")]
    Session(#[from] SessionError),
}

#[derive(Debug, Error)]
pub enum PaginationError {
    #[error("page {page} unreadable after {attempts} attempts: {reason}")]
    PageReadFailed {
        page: usize,
        attempts: u32,
        reason: String,
    },

    #[error("pagination exceeded the {limit}-page ceiling")]
    PageLimitExceeded { limit: usize },
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ParseError {
    #[error("unparseable date {0:?}")]
    UnparseableDate(String),

    #[error("unparseable value {0:?}")]
    UnparseableValue(String),

    #[error("unparseable percent change {0:?}")]
    UnparseableChange(String),
}

/// Why a single filter combination produced no series.
#[derive(Debug, Error)]
pub enum ExtractionError {
    #[error(transparent)]
    Selection(#[from] SelectionError),

    #[error(transparent)]
    Pagination(#[from] PaginationError),

    #[error("{count} unparseable rows (limit {limit})")]
    TooManyBadRows { count: usize, limit: usize },

    #[error("combination exceeded its {0:?} time budget")]
    Timeout(Duration),

    #[error("no data rows found")]
    NoData,
}

impl ExtractionError {
    /// Short label used by the run summary.
    pub fn kind(&self) -> &'static str {
        match self {
            ExtractionError::Selection(SelectionError::ControlNotFound { .. }) => "control_not_found",
            ExtractionError::Selection(SelectionError::ValueNotAvailable { .. }) => "value_not_available",
            ExtractionError::Selection(SelectionError::ReloadTimeout(_)) => "reload_timeout",
            ExtractionError::Selection(SelectionError::Session(_)) => "session",
            ExtractionError::Pagination(PaginationError::PageReadFailed { .. }) => "page_read_failed",
            ExtractionError::Pagination(PaginationError::PageLimitExceeded { .. }) => "page_limit_exceeded",
            ExtractionError::TooManyBadRows { .. } => "too_many_bad_rows",
            ExtractionError::Timeout(_) => "timeout",
            ExtractionError::NoData => "no_data",
        }
    }
}
