pub mod chrome;
#[cfg(test)]
pub mod fake;

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::time::Duration;

use async_trait::async_trait;

use crate::error::SessionError;
use crate::types::RawRow;

pub use chrome::ChromeSession;

/// Opaque reference to a located page control.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControlHandle {
    pub selector: String,
}

impl ControlHandle {
    pub fn new(selector: &str) -> Self {
        Self { selector: selector.to_string() }
    }
}

/// Observable table state used for reload detection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PageState {
    pub row_count: usize,
    fingerprint: u64,
}

impl PageState {
    pub fn of(rows: &[RawRow]) -> Self {
        let mut hasher = DefaultHasher::new();
        rows.hash(&mut hasher);
        Self {
            row_count: rows.len(),
            fingerprint: hasher.finish(),
        }
    }

    /// State of a page without a readable table.
    pub fn empty() -> Self {
        Self::of(&[])
    }
}

/// Capability interface over one stateful rendering of the price index page.
///
/// Every method may suspend while the underlying browser works. Implementations
/// are not required to tolerate concurrent calls: one driver owns one session.
#[async_trait]
pub trait PageSession: Send + Sync {
    /// Load the target page from scratch, resetting filters and pagination.
    async fn open(&self) -> Result<(), SessionError>;

    async fn find_control(&self, selector: &str) -> Result<Option<ControlHandle>, SessionError>;

    /// Select the option whose visible label is `label`.
    /// Returns whether the control's value actually changed.
    async fn set_value(&self, control: &ControlHandle, label: &str) -> Result<bool, SessionError>;

    /// False when the control is hidden or marked disabled.
    async fn is_enabled(&self, control: &ControlHandle) -> Result<bool, SessionError>;

    async fn click(&self, control: &ControlHandle) -> Result<(), SessionError>;

    /// Data rows of the current table page, in document order.
    async fn read_rows(&self) -> Result<Vec<RawRow>, SessionError>;

    /// Wait until the table no longer matches `observed`, up to `timeout`.
    async fn wait_for_change(&self, observed: &PageState, timeout: Duration) -> bool;

    /// Raw page source, for offline diagnosis.
    async fn snapshot(&self) -> Result<String, SessionError>;

    /// PNG capture of the viewport, for offline diagnosis.
    async fn screenshot(&self) -> Result<Vec<u8>, SessionError>;
}

/// Current table state, treating an unreadable table as empty.
pub async fn observe<S: PageSession + ?Sized>(session: &S) -> PageState {
    match session.read_rows().await {
        Ok(rows) => PageState::of(&rows),
        Err(_) => PageState::empty(),
    }
}
