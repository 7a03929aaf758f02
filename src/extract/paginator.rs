use std::future::Future;

use tracing::{debug, info, warn};

use crate::config::{selectors, Config};
use crate::error::{PaginationError, SessionError};
use crate::session::{PageSession, PageState};
use crate::types::RawRow;

/// Walks the paginated table one page per call.
///
/// The walk is finite and single-use: once it has returned `None` or an error
/// every later call returns `None`. Starting over requires a fresh filter
/// selection and a new walker.
pub struct PaginationWalker<'a, S: PageSession + ?Sized> {
    session: &'a S,
    cfg: &'a Config,
    pages_read: usize,
    previous: Option<PageState>,
    finished: bool,
}

impl<'a, S: PageSession + ?Sized> PaginationWalker<'a, S> {
    pub fn new(session: &'a S, cfg: &'a Config) -> Self {
        Self {
            session,
            cfg,
            pages_read: 0,
            previous: None,
            finished: false,
        }
    }

    pub fn pages_read(&self) -> usize {
        self.pages_read
    }

    /// Rows of the next page, or `None` at end of data.
    pub async fn next_page(&mut self) -> Result<Option<Vec<RawRow>>, PaginationError> {
        if self.finished {
            return Ok(None);
        }
        let result = self.advance().await;
        if !matches!(result, Ok(Some(_))) {
            self.finished = true;
        }
        result
    }

    async fn advance(&mut self) -> Result<Option<Vec<RawRow>>, PaginationError> {
        let Some(previous) = self.previous else {
            let rows = self.read_page(1).await?;
            return Ok(self.accept(rows));
        };

        let session = self.session;
        let page = self.pages_read + 1;
        let mut stalls = 0u32;

        loop {
            let next = self
                .retrying(page, "locate next control", || session.find_control(selectors::NEXT_PAGE))
                .await?;
            let Some(next) = next else {
                info!(pages = self.pages_read, "No next control, last page reached");
                return Ok(None);
            };
            let next = &next;

            if !self.retrying(page, "inspect next control", || session.is_enabled(next)).await? {
                info!(pages = self.pages_read, "Next control disabled, last page reached");
                return Ok(None);
            }

            self.retrying(page, "activate next control", || session.click(next)).await?;
            tokio::time::sleep(self.cfg.delay).await;

            // A slow render can outlast the wait, so the table is read either way.
            let settled = session.wait_for_change(&previous, self.cfg.page_timeout).await;
            let rows = self.read_page(page).await?;
            if PageState::of(&rows) != previous {
                if !settled {
                    debug!(page, "Page changed after the wait timed out");
                }
                if self.pages_read >= self.cfg.max_pages && !rows.is_empty() {
                    return Err(PaginationError::PageLimitExceeded { limit: self.cfg.max_pages });
                }
                return Ok(self.accept(rows));
            }

            stalls += 1;
            debug!(page, stalls, "Next activation left the table unchanged");
            if stalls >= self.cfg.stall_threshold {
                info!(
                    pages = self.pages_read,
                    "Table unchanged after {stalls} next activations, treating as end of data"
                );
                return Ok(None);
            }
        }
    }

    async fn read_page(&self, page: usize) -> Result<Vec<RawRow>, PaginationError> {
        let session = self.session;
        self.retrying(page, "read table rows", || session.read_rows()).await
    }

    /// Record a freshly read page. An empty page ends the walk.
    fn accept(&mut self, rows: Vec<RawRow>) -> Option<Vec<RawRow>> {
        if rows.is_empty() {
            info!(pages = self.pages_read, "Empty page, no more data");
            return None;
        }
        self.pages_read += 1;
        self.previous = Some(PageState::of(&rows));
        debug!(page = self.pages_read, rows = rows.len(), "Page read");
        Some(rows)
    }

    /// Run a page interaction with bounded attempts and pacing between them.
    async fn retrying<T, F, Fut>(&self, page: usize, what: &str, mut op: F) -> Result<T, PaginationError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, SessionError>>,
    {
        let attempts = self.cfg.max_retries.max(1);
        let mut last_error = None;

        for attempt in 1..=attempts {
            match op().await {
                Ok(v) => return Ok(v),
                Err(e) => {
                    warn!(page, attempt, attempts, error = %e, "Failed to {what}");
                    last_error = Some(e);
                    if attempt < attempts {
                        tokio::time::sleep(self.cfg.delay).await;
                    }
                }
            }
        }

        Err(PaginationError::PageReadFailed {
            page,
            attempts,
            reason: last_error.map(|e| e.to_string()).unwrap_or_default(),
        })
    }
}
