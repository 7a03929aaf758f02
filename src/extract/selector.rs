use tracing::debug;

use crate::config::{selectors, Config};
use crate::error::{SelectionError, SessionError};
use crate::session::{observe, PageSession};
use crate::types::FilterCombination;

/// Applies one filter combination to the page's dropdowns.
pub struct FilterSelector<'a, S: PageSession + ?Sized> {
    session: &'a S,
    cfg: &'a Config,
}

impl<'a, S: PageSession + ?Sized> FilterSelector<'a, S> {
    pub fn new(session: &'a S, cfg: &'a Config) -> Self {
        Self { session, cfg }
    }

    /// Select all three values in fixed order and confirm the table reloaded.
    ///
    /// When every control already shows the requested value no reload is
    /// expected, and only the pacing delay is applied.
    pub async fn select(&self, combination: &FilterCombination) -> Result<(), SelectionError> {
        let before = observe(self.session).await;
        let mut changed_any = false;

        for (control, selector, label) in controls(combination) {
            let handle = self
                .session
                .find_control(selector)
                .await?
                .ok_or(SelectionError::ControlNotFound { control })?;

            let changed = match self.session.set_value(&handle, label).await {
                Ok(changed) => changed,
                Err(SessionError::OptionMissing { .. }) => {
                    return Err(SelectionError::ValueNotAvailable {
                        control,
                        value: label.to_string(),
                    })
                }
                Err(SessionError::NotFound(_)) => {
                    return Err(SelectionError::ControlNotFound { control })
                }
                Err(e) => return Err(e.into()),
            };
            debug!(control, value = label, changed, "Filter set");

            if changed {
                changed_any = true;
                tokio::time::sleep(self.cfg.delay).await;
            }
        }

        if changed_any {
            if !self.session.wait_for_change(&before, self.cfg.reload_timeout).await {
                return Err(SelectionError::ReloadTimeout(self.cfg.reload_timeout));
            }
        } else {
            debug!("Filters already in place, no reload expected");
        }

        tokio::time::sleep(self.cfg.delay).await;
        Ok(())
    }
}

fn controls(c: &FilterCombination) -> [(&'static str, &'static str, &'static str); 3] {
    [
        ("property type", selectors::PROPERTY_TYPE, c.property_type.label()),
        ("sale type", selectors::SALE_TYPE, c.sale_type.label()),
        ("market segment", selectors::MARKET_SEGMENT, c.market_segment.label()),
    ]
}
