//! Scripted in-memory site for exercising the extraction state machine.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use crate::config::selectors;
use crate::error::SessionError;
use crate::session::{ControlHandle, PageSession, PageState};
use crate::types::{FilterCombination, MarketSegment, PropertyType, RawRow, SaleType};

type Key = (String, String, String);

struct State {
    options: HashMap<&'static str, Vec<String>>,
    defaults: HashMap<&'static str, String>,
    selected: HashMap<&'static str, String>,
    datasets: HashMap<Key, Vec<Vec<RawRow>>>,
    page: usize,
    next_present: bool,
    next_always_enabled: bool,
    endless: bool,
    stuck: bool,
    reload_ignored: bool,
    slow_render: bool,
    slow_reads: Option<(Key, Duration)>,
    read_failures: u32,
    clicks: usize,
    opens: usize,
}

impl State {
    fn key(&self) -> Key {
        let get = |sel: &str| self.selected.get(sel).cloned().unwrap_or_default();
        (
            get(selectors::PROPERTY_TYPE),
            get(selectors::SALE_TYPE),
            get(selectors::MARKET_SEGMENT),
        )
    }

    fn page_count(&self) -> usize {
        self.datasets.get(&self.key()).map_or(0, Vec::len)
    }

    fn rows(&self) -> Vec<RawRow> {
        if self.endless {
            return vec![RawRow::new(&format!("Jan {}", 1900 + self.page), "100.0", "")];
        }
        self.datasets
            .get(&self.key())
            .and_then(|pages| pages.get(self.page))
            .cloned()
            .unwrap_or_default()
    }

    fn has_next_page(&self) -> bool {
        self.endless || self.page + 1 < self.page_count()
    }
}

fn key_of(c: &FilterCombination) -> Key {
    (
        c.property_type.label().to_string(),
        c.sale_type.label().to_string(),
        c.market_segment.label().to_string(),
    )
}

pub struct FakeSite {
    state: Mutex<State>,
}

impl FakeSite {
    /// All three filter controls with every option; first option selected.
    pub fn new() -> Self {
        let mut options = HashMap::new();
        options.insert(
            selectors::PROPERTY_TYPE,
            PropertyType::ALL.iter().map(|p| p.label().to_string()).collect::<Vec<_>>(),
        );
        options.insert(
            selectors::SALE_TYPE,
            SaleType::ALL.iter().map(|s| s.label().to_string()).collect(),
        );
        options.insert(
            selectors::MARKET_SEGMENT,
            MarketSegment::ALL.iter().map(|m| m.label().to_string()).collect(),
        );
        let defaults: HashMap<&'static str, String> = options
            .iter()
            .map(|(k, v)| (*k, v[0].clone()))
            .collect();

        Self {
            state: Mutex::new(State {
                options,
                selected: defaults.clone(),
                defaults,
                datasets: HashMap::new(),
                page: 0,
                next_present: true,
                next_always_enabled: false,
                endless: false,
                stuck: false,
                reload_ignored: false,
                slow_render: false,
                slow_reads: None,
                read_failures: 0,
                clicks: 0,
                opens: 0,
            }),
        }
    }

    /// Pages served for the default selection.
    pub fn with_default_pages(self, pages: Vec<Vec<RawRow>>) -> Self {
        let key = self.state.lock().unwrap().key();
        self.state.lock().unwrap().datasets.insert(key, pages);
        self
    }

    pub fn with_pages(self, combination: &FilterCombination, pages: Vec<Vec<RawRow>>) -> Self {
        self.state.lock().unwrap().datasets.insert(key_of(combination), pages);
        self
    }

    pub fn without_option(self, selector: &'static str, label: &str) -> Self {
        if let Some(opts) = self.state.lock().unwrap().options.get_mut(selector) {
            opts.retain(|o| o != label);
        }
        self
    }

    pub fn without_control(self, selector: &'static str) -> Self {
        self.state.lock().unwrap().options.remove(selector);
        self
    }

    pub fn without_next(self) -> Self {
        self.state.lock().unwrap().next_present = false;
        self
    }

    /// "Next" stays enabled on the last page and clicking it changes nothing.
    pub fn never_disables_next(self) -> Self {
        self.state.lock().unwrap().next_always_enabled = true;
        self
    }

    /// Every click yields a fresh page.
    pub fn endless(self) -> Self {
        self.state.lock().unwrap().endless = true;
        self
    }

    /// Clicking "next" never advances.
    pub fn stuck(self) -> Self {
        let mut state = self.state.lock().unwrap();
        state.stuck = true;
        state.next_always_enabled = true;
        drop(state);
        self
    }

    /// Changing a filter never changes the rendered table.
    pub fn ignoring_reloads(self) -> Self {
        self.state.lock().unwrap().reload_ignored = true;
        self
    }

    /// Pages change on click but every wait for the change times out.
    pub fn slow_render(self) -> Self {
        self.state.lock().unwrap().slow_render = true;
        self
    }

    /// Table reads for `combination` take `delay` each.
    pub fn slow_reads_for(self, combination: &FilterCombination, delay: Duration) -> Self {
        self.state.lock().unwrap().slow_reads = Some((key_of(combination), delay));
        self
    }

    pub fn failing_reads(self, n: u32) -> Self {
        self.state.lock().unwrap().read_failures = n;
        self
    }

    pub fn clicks(&self) -> usize {
        self.state.lock().unwrap().clicks
    }

    pub fn opens(&self) -> usize {
        self.state.lock().unwrap().opens
    }
}

#[async_trait]
impl PageSession for FakeSite {
    async fn open(&self) -> Result<(), SessionError> {
        let mut state = self.state.lock().unwrap();
        state.selected = state.defaults.clone();
        state.page = 0;
        state.opens += 1;
        Ok(())
    }

    async fn find_control(&self, selector: &str) -> Result<Option<ControlHandle>, SessionError> {
        let state = self.state.lock().unwrap();
        let present = if selector == selectors::NEXT_PAGE {
            state.next_present
        } else {
            state.options.contains_key(selector)
        };
        Ok(present.then(|| ControlHandle::new(selector)))
    }

    async fn set_value(&self, control: &ControlHandle, label: &str) -> Result<bool, SessionError> {
        let mut state = self.state.lock().unwrap();
        let (key, offered) = match state.options.get_key_value(control.selector.as_str()) {
            Some((k, opts)) => (*k, opts.iter().any(|o| o == label)),
            None => return Err(SessionError::NotFound(control.selector.clone())),
        };
        if !offered {
            return Err(SessionError::OptionMissing {
                selector: control.selector.clone(),
                value: label.to_string(),
            });
        }
        if state.selected.get(key).map(String::as_str) == Some(label) {
            return Ok(false);
        }
        if state.reload_ignored {
            return Ok(true);
        }
        state.selected.insert(key, label.to_string());
        state.page = 0;
        Ok(true)
    }

    async fn is_enabled(&self, control: &ControlHandle) -> Result<bool, SessionError> {
        let state = self.state.lock().unwrap();
        if control.selector == selectors::NEXT_PAGE {
            return Ok(state.next_always_enabled || state.has_next_page());
        }
        Ok(true)
    }

    async fn click(&self, control: &ControlHandle) -> Result<(), SessionError> {
        let mut state = self.state.lock().unwrap();
        if control.selector == selectors::NEXT_PAGE {
            state.clicks += 1;
            if !state.stuck && state.has_next_page() {
                state.page += 1;
            }
        }
        Ok(())
    }

    async fn read_rows(&self) -> Result<Vec<RawRow>, SessionError> {
        let lag = {
            let state = self.state.lock().unwrap();
            state
                .slow_reads
                .as_ref()
                .filter(|(key, _)| *key == state.key())
                .map(|(_, delay)| *delay)
        };
        if let Some(delay) = lag {
            tokio::time::sleep(delay).await;
        }

        let mut state = self.state.lock().unwrap();
        if state.read_failures > 0 {
            state.read_failures -= 1;
            return Err(SessionError::Driver("transient read failure".to_string()));
        }
        Ok(state.rows())
    }

    async fn wait_for_change(&self, observed: &PageState, _timeout: Duration) -> bool {
        let state = self.state.lock().unwrap();
        !state.slow_render && PageState::of(&state.rows()) != *observed
    }

    async fn screenshot(&self) -> Result<Vec<u8>, SessionError> {
        Ok(b"\x89PNG fake".to_vec())
    }

    async fn snapshot(&self) -> Result<String, SessionError> {
        let state = self.state.lock().unwrap();
        Ok(format!("<html><body>page {}</body></html>", state.page + 1))
    }
}
