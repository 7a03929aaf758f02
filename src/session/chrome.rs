use std::sync::Arc;
use std::time::Duration;

use anyhow::anyhow;
use async_trait::async_trait;
use headless_chrome::protocol::cdp::Page::CaptureScreenshotFormatOption;
use headless_chrome::{Browser, LaunchOptions, Tab};
use serde::Deserialize;
use tokio::time::Instant;
use tracing::{debug, info};

use crate::config::{selectors, Config, CHANGE_POLL_INTERVAL_MS};
use crate::error::{AppError, Result, SessionError};
use crate::session::{ControlHandle, PageSession, PageState};
use crate::types::RawRow;

const FIND_SCRIPT: &str = r#"(() => document.querySelector(__SEL__) ? 'found' : 'missing')()"#;

const SELECT_SCRIPT: &str = r#"(() => {
  const el = document.querySelector(__SEL__);
  if (!el) return 'missing';
  const opt = Array.from(el.options || []).find(o => o.text.trim() === __VAL__);
  if (!opt) return 'no-option';
  if (el.value === opt.value) return 'unchanged';
  el.value = opt.value;
  el.dispatchEvent(new Event('input', { bubbles: true }));
  el.dispatchEvent(new Event('change', { bubbles: true }));
  return 'changed';
})()"#;

const ENABLED_SCRIPT: &str = r#"(() => {
  const el = document.querySelector(__SEL__);
  if (!el) return 'missing';
  const style = window.getComputedStyle(el);
  const cls = String(el.className || '').toLowerCase();
  const off = el.disabled === true
    || el.getAttribute('aria-disabled') === 'true'
    || cls.includes('disabled')
    || style.display === 'none'
    || style.visibility === 'hidden';
  return off ? 'disabled' : 'enabled';
})()"#;

const CLICK_SCRIPT: &str = r#"(() => {
  const el = document.querySelector(__SEL__);
  if (!el) return 'missing';
  el.click();
  return 'clicked';
})()"#;

const ROWS_SCRIPT: &str = r#"(() => {
  if (!document.querySelector('table')) return JSON.stringify({ table: false, rows: [] });
  const rows = Array.from(document.querySelectorAll(__SEL__)).map(tr =>
    Array.from(tr.querySelectorAll('td')).map(td => (td.innerText || '').trim()));
  return JSON.stringify({ table: true, rows });
})()"#;

/// Clicks the first visible cookie/consent dismiss control, if any.
const CONSENT_SCRIPT: &str = r#"(() => {
  const words = ['accept', 'ok', 'got it'];
  const candidates = Array.from(document.querySelectorAll('button, a.close'));
  for (const el of candidates) {
    const text = (el.innerText || '').trim().toLowerCase();
    const cls = String(el.className || '').toLowerCase();
    const visible = el.offsetParent !== null;
    if (visible && (words.some(w => text.includes(w)) || cls.includes('accept') || el.matches('a.close'))) {
      el.click();
      return 'dismissed';
    }
  }
  return 'none';
})()"#;

#[derive(Deserialize)]
struct TableDump {
    table: bool,
    rows: Vec<Vec<String>>,
}

/// Headless Chrome rendering of the price index page.
///
/// `headless_chrome` is a blocking API; every call is moved onto the blocking
/// pool so the async driver never stalls the runtime.
pub struct ChromeSession {
    // Dropping the browser kills the Chrome process.
    _browser: Browser,
    tab: Arc<Tab>,
    url: String,
    settle: Duration,
}

impl ChromeSession {
    pub fn launch(cfg: &Config) -> Result<Self> {
        let options = LaunchOptions::default_builder()
            .headless(cfg.headless)
            .window_size(Some((1920, 1080)))
            .build()
            .map_err(|e| AppError::Browser(e.to_string()))?;

        let browser = Browser::new(options).map_err(|e| AppError::Browser(e.to_string()))?;
        let tab = browser.new_tab().map_err(|e| AppError::Browser(e.to_string()))?;
        info!(headless = cfg.headless, "Chrome session started");

        Ok(Self {
            _browser: browser,
            tab,
            url: cfg.base_url.clone(),
            settle: cfg.delay * 2,
        })
    }

    async fn blocking<T, F>(&self, f: F) -> std::result::Result<T, SessionError>
    where
        F: FnOnce(&Tab) -> anyhow::Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let tab = Arc::clone(&self.tab);
        tokio::task::spawn_blocking(move || f(&tab))
            .await
            .map_err(|e| SessionError::Driver(e.to_string()))?
            .map_err(|e| SessionError::Driver(e.to_string()))
    }

    async fn run_script(&self, template: &'static str, selector: &str, value: Option<&str>) -> std::result::Result<String, SessionError> {
        let mut script = template.replace("__SEL__", &js_string(selector));
        if let Some(v) = value {
            script = script.replace("__VAL__", &js_string(v));
        }
        self.blocking(move |tab| eval_string(tab, &script)).await
    }
}

#[async_trait]
impl PageSession for ChromeSession {
    async fn open(&self) -> std::result::Result<(), SessionError> {
        let url = self.url.clone();
        debug!("Navigating to {url}");
        self.blocking(move |tab| {
            tab.navigate_to(&url)?.wait_until_navigated()?;
            Ok(())
        })
        .await?;

        // Scripts populate the table after the load event.
        tokio::time::sleep(self.settle).await;

        let consent = self.blocking(|tab| eval_string(tab, CONSENT_SCRIPT)).await?;
        if consent == "dismissed" {
            info!("Dismissed consent dialog");
            tokio::time::sleep(Duration::from_secs(1)).await;
        }
        Ok(())
    }

    async fn find_control(&self, selector: &str) -> std::result::Result<Option<ControlHandle>, SessionError> {
        let status = self.run_script(FIND_SCRIPT, selector, None).await?;
        Ok((status == "found").then(|| ControlHandle::new(selector)))
    }

    async fn set_value(&self, control: &ControlHandle, label: &str) -> std::result::Result<bool, SessionError> {
        match self.run_script(SELECT_SCRIPT, &control.selector, Some(label)).await?.as_str() {
            "changed" => Ok(true),
            "unchanged" => Ok(false),
            "no-option" => Err(SessionError::OptionMissing {
                selector: control.selector.clone(),
                value: label.to_string(),
            }),
            "missing" => Err(SessionError::NotFound(control.selector.clone())),
            other => Err(SessionError::Driver(format!("unexpected select result {other:?}"))),
        }
    }

    async fn is_enabled(&self, control: &ControlHandle) -> std::result::Result<bool, SessionError> {
        match self.run_script(ENABLED_SCRIPT, &control.selector, None).await?.as_str() {
            "enabled" => Ok(true),
            "disabled" => Ok(false),
            "missing" => Err(SessionError::NotFound(control.selector.clone())),
            other => Err(SessionError::Driver(format!("unexpected state {other:?}"))),
        }
    }

    async fn click(&self, control: &ControlHandle) -> std::result::Result<(), SessionError> {
        match self.run_script(CLICK_SCRIPT, &control.selector, None).await?.as_str() {
            "clicked" => Ok(()),
            _ => Err(SessionError::NotFound(control.selector.clone())),
        }
    }

    async fn read_rows(&self) -> std::result::Result<Vec<RawRow>, SessionError> {
        let json = self.run_script(ROWS_SCRIPT, selectors::TABLE_ROWS, None).await?;
        let dump: TableDump =
            serde_json::from_str(&json).map_err(|e| SessionError::Driver(e.to_string()))?;
        if !dump.table {
            return Err(SessionError::TableMissing);
        }
        Ok(dump.rows.into_iter().filter_map(cells_to_row).collect())
    }

    async fn wait_for_change(&self, observed: &PageState, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let poll = Duration::from_millis(CHANGE_POLL_INTERVAL_MS);
        loop {
            if let Ok(rows) = self.read_rows().await {
                if PageState::of(&rows) != *observed {
                    return true;
                }
            }
            if Instant::now() >= deadline {
                return false;
            }
            tokio::time::sleep(poll).await;
        }
    }

    async fn snapshot(&self) -> std::result::Result<String, SessionError> {
        self.blocking(|tab| tab.get_content()).await
    }

    async fn screenshot(&self) -> std::result::Result<Vec<u8>, SessionError> {
        self.blocking(|tab| tab.capture_screenshot(CaptureScreenshotFormatOption::Png, None, None, true))
            .await
    }
}

fn eval_string(tab: &Tab, script: &str) -> anyhow::Result<String> {
    let result = tab.evaluate(script, false)?;
    match result.value {
        Some(serde_json::Value::String(s)) => Ok(s),
        other => Err(anyhow!("script returned {other:?}")),
    }
}

/// Quote `s` as a JavaScript string literal.
fn js_string(s: &str) -> String {
    serde_json::Value::String(s.to_string()).to_string()
}

/// Rows with fewer than two `td` cells are layout (header rows use `th`).
fn cells_to_row(cells: Vec<String>) -> Option<RawRow> {
    if cells.len() < 2 {
        return None;
    }
    let mut it = cells.into_iter();
    Some(RawRow {
        date_text: it.next().unwrap_or_default(),
        value_text: it.next().unwrap_or_default(),
        change_text: it.next().unwrap_or_default(),
    })
}
