use crate::browser::monitor::ChangeMonitor;
use crate::browser::navigation::NavigationManager;
use crate::core::config::BrowserConfig;
use crate::core::{DomWrite, ElementHandle, FieldWrite, PageDriver, WriteOutcome};
use crate::dom::Document;
use crate::errors::{AutomationError, Result};
use crate::forms::ChangeFeed;
use crate::types::{ImageFormat, PageCapabilities, ScreenshotRequest, Viewport};
use crate::utils::javascript::JavaScriptRunner;
use async_trait::async_trait;
use headless_chrome::protocol::cdp::Page;
use headless_chrome::{Browser, LaunchOptions, Tab};
use serde::Deserialize;
use serde_json::{json, Value};
use std::ffi::OsStr;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

/// Applies one batch of writes. Input/change events and deferred clicks run only after
/// every field of the batch has been written.
const WRITE_BATCH_SCRIPT: &str = r#"
(function(batch) {
    const touched = new Set();
    const clicks = [];
    const setNativeValue = (el, value) => {
        const descriptor = Object.getOwnPropertyDescriptor(Object.getPrototypeOf(el), 'value');
        if (descriptor && descriptor.set) {
            descriptor.set.call(el, value);
        } else {
            el.value = value;
        }
    };
    const outcomes = batch.map((field) => {
        try {
            field.writes.forEach((w) => {
                const el = document.querySelector(w.selector);
                if (!el) throw new Error('element not found: ' + w.selector);
                if (el.disabled) throw new Error('element is disabled: ' + w.selector);
                switch (w.op) {
                    case 'setValue':
                        if (el.isContentEditable) {
                            el.textContent = w.value;
                        } else if ('value' in el) {
                            setNativeValue(el, w.value);
                        } else {
                            el.textContent = w.value;
                        }
                        touched.add(el);
                        break;
                    case 'setChecked':
                        if (!('checked' in el)) throw new Error('element is not checkable: ' + w.selector);
                        el.checked = w.checked;
                        touched.add(el);
                        break;
                    case 'selectOptions': {
                        const options = Array.from(el.options || []);
                        const missing = w.values.find((v) => !options.some((o) => o.value === v));
                        if (missing !== undefined) throw new Error('select has no option with value ' + missing);
                        options.forEach((o) => { o.selected = w.values.includes(o.value); });
                        touched.add(el);
                        break;
                    }
                    case 'setAttribute':
                        el.setAttribute(w.name, w.value);
                        break;
                    case 'click':
                        clicks.push(el);
                        break;
                    default:
                        throw new Error('unknown write ' + w.op);
                }
            });
            return {field: field.field, error: null};
        } catch (e) {
            return {field: field.field, error: String(e && e.message ? e.message : e)};
        }
    });
    touched.forEach((el) => {
        el.dispatchEvent(new Event('input', {bubbles: true}));
        el.dispatchEvent(new Event('change', {bubbles: true}));
    });
    clicks.forEach((el) => el.click());
    return outcomes;
})"#;

#[derive(Deserialize)]
struct RawOutcome {
    field: String,
    error: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawViewport {
    width: u32,
    height: u32,
    device_scale_factor: f64,
}

fn write_payload(write: &DomWrite) -> Value {
    let selector = &write.target().selector;
    match write {
        DomWrite::SetValue { value, .. } => json!({"op": "setValue", "selector": selector, "value": value}),
        DomWrite::SetChecked { checked, .. } => {
            json!({"op": "setChecked", "selector": selector, "checked": checked})
        }
        DomWrite::SelectOptions { values, .. } => {
            json!({"op": "selectOptions", "selector": selector, "values": values})
        }
        DomWrite::SetAttribute { name, value, .. } => {
            json!({"op": "setAttribute", "selector": selector, "name": name, "value": value})
        }
        DomWrite::Click { .. } => json!({"op": "click", "selector": selector}),
    }
}

fn capture_format(format: ImageFormat) -> Page::CaptureScreenshotFormatOption {
    match format {
        ImageFormat::Png => Page::CaptureScreenshotFormatOption::Png,
        ImageFormat::Jpeg => Page::CaptureScreenshotFormatOption::Jpeg,
        ImageFormat::Webp => Page::CaptureScreenshotFormatOption::Webp,
    }
}

/// Page driver backed by a headless Chrome tab.
pub struct ChromePage {
    _browser: Browser,
    tab: Arc<Tab>,
    monitor: ChangeMonitor,
    feed: Option<ChangeFeed>,
}

impl ChromePage {
    pub fn launch(config: &BrowserConfig) -> Result<Self> {
        let window_size_arg = format!(
            "--window-size={},{}",
            config.viewport.width, config.viewport.height
        );
        let user_agent_arg = config
            .user_agent
            .as_ref()
            .map(|ua| format!("--user-agent={}", ua));

        let mut args = vec![
            OsStr::new("--no-sandbox"),
            OsStr::new("--disable-dev-shm-usage"),
            OsStr::new(&window_size_arg),
        ];
        if let Some(ref ua_arg) = user_agent_arg {
            args.push(OsStr::new(ua_arg));
        }
        if config.disable_images {
            args.push(OsStr::new("--blink-settings=imagesEnabled=false"));
        }
        for arg in &config.args {
            args.push(OsStr::new(arg));
        }

        let launch_options = LaunchOptions::default_builder()
            .headless(config.headless)
            .args(args)
            .build()
            .map_err(|e| AutomationError::ChromeError(format!("invalid launch options: {}", e)))?;
        let browser = Browser::new(launch_options)
            .map_err(|e| AutomationError::ChromeError(format!("failed to launch chrome: {}", e)))?;
        let tab = browser.new_tab().map_err(AutomationError::from_any_error)?;

        info!("chrome launched (headless: {})", config.headless);
        Ok(Self {
            _browser: browser,
            tab,
            monitor: ChangeMonitor::new(),
            feed: None,
        })
    }

    pub fn tab(&self) -> &Arc<Tab> {
        &self.tab
    }

    async fn run_on_element(&self, target: &ElementHandle, body: &str) -> Result<()> {
        let script = format!(
            "(function() {{ const el = document.querySelector({}); if (!el) return false; {} return true; }})()",
            JavaScriptRunner::js_string(&target.selector),
            body
        );
        match JavaScriptRunner::execute(&self.tab, &script).await? {
            Value::Bool(true) => Ok(()),
            _ => Err(AutomationError::ElementNotFound {
                query: target.selector.clone(),
                candidates: Vec::new(),
            }),
        }
    }
}

#[async_trait]
impl PageDriver for ChromePage {
    async fn snapshot(&mut self) -> Result<Document> {
        let html: String = JavaScriptRunner::execute_json(&self.tab, "document.documentElement.outerHTML").await?;
        Ok(Document::parse(&html))
    }

    async fn navigate(&mut self, url: &str) -> Result<()> {
        let tab = Arc::clone(&self.tab);
        let target = url.to_string();
        tokio::task::spawn_blocking(move || -> anyhow::Result<()> {
            tab.navigate_to(&target)?;
            tab.wait_until_navigated()?;
            Ok(())
        })
        .await
        .map_err(|e| AutomationError::NavigationFailed(e.to_string()))?
        .map_err(|e| AutomationError::NavigationFailed(e.to_string()))?;

        if self.feed.is_some() {
            self.monitor.start(&self.tab).await?;
        }
        debug!("chrome navigated to {}", url);
        Ok(())
    }

    async fn wait_for_load(&mut self, timeout: Duration) -> Result<()> {
        let result =
            NavigationManager::wait_for_navigation_complete(&self.tab, timeout.as_millis() as u64).await?;
        debug!("{} ready after {} ms", result.url, result.duration_ms);
        Ok(())
    }

    async fn click(&mut self, target: &ElementHandle) -> Result<()> {
        self.run_on_element(target, "el.scrollIntoView({block: 'center'}); el.click();")
            .await
    }

    async fn apply_writes(&mut self, batch: &[FieldWrite]) -> Result<Vec<WriteOutcome>> {
        let payload: Vec<Value> = batch
            .iter()
            .map(|field| {
                json!({
                    "field": field.field,
                    "writes": field.writes.iter().map(write_payload).collect::<Vec<_>>(),
                })
            })
            .collect();
        let script = format!("{}({})", WRITE_BATCH_SCRIPT.trim(), Value::Array(payload));
        let raw: Vec<RawOutcome> = JavaScriptRunner::execute_json(&self.tab, &script).await?;
        Ok(raw
            .into_iter()
            .map(|o| match o.error {
                None => WriteOutcome::ok(o.field),
                Some(error) => WriteOutcome::failed(o.field, error),
            })
            .collect())
    }

    async fn submit(&mut self, form: &ElementHandle) -> Result<()> {
        self.run_on_element(
            form,
            "const owner = el.closest('form') || el; if (owner.requestSubmit) { owner.requestSubmit(); } else { owner.submit(); }",
        )
        .await
    }

    async fn screenshot(&mut self, request: &ScreenshotRequest) -> Result<Vec<u8>> {
        let tab = Arc::clone(&self.tab);
        let format = capture_format(request.format);
        let quality = match request.format {
            ImageFormat::Png => None,
            _ => Some(u32::from(request.quality)),
        };
        let clip = request.region.map(|r| Page::Viewport {
            x: r.x,
            y: r.y,
            width: r.width,
            height: r.height,
            scale: 1.0,
        });
        tokio::task::spawn_blocking(move || tab.capture_screenshot(format, quality, clip, true))
            .await
            .map_err(|e| AutomationError::ScreenshotFailed(e.to_string()))?
            .map_err(|e| AutomationError::ScreenshotFailed(e.to_string()))
    }

    async fn url(&mut self) -> Result<String> {
        Ok(self.tab.get_url())
    }

    async fn title(&mut self) -> Result<String> {
        JavaScriptRunner::execute_json(&self.tab, "document.title").await
    }

    async fn viewport(&mut self) -> Result<Viewport> {
        let raw: RawViewport = JavaScriptRunner::execute_json(
            &self.tab,
            "({width: window.innerWidth, height: window.innerHeight, deviceScaleFactor: window.devicePixelRatio})",
        )
        .await?;
        Ok(Viewport {
            width: raw.width,
            height: raw.height,
            device_scale_factor: raw.device_scale_factor,
        })
    }

    async fn attach_change_feed(&mut self, feed: ChangeFeed) -> Result<()> {
        self.monitor.start(&self.tab).await?;
        self.feed = Some(feed);
        Ok(())
    }

    async fn flush_changes(&mut self) -> Result<()> {
        let Some(feed) = &self.feed else {
            return Ok(());
        };
        for change in self.monitor.take_changes(&self.tab).await? {
            feed.notify(change);
        }
        Ok(())
    }

    fn capabilities(&self) -> PageCapabilities {
        PageCapabilities {
            supports_javascript: true,
            supports_screenshots: true,
            supports_change_tracking: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::Document;

    #[test]
    fn write_payload_carries_selector_and_op() {
        let doc = Document::parse("<input id='a'>");
        let node = doc.select_first("#a").unwrap().unwrap();
        let write = DomWrite::SetChecked {
            target: ElementHandle::new(&doc, node),
            checked: true,
        };
        assert_eq!(
            write_payload(&write),
            json!({"op": "setChecked", "selector": "#a", "checked": true})
        );
    }
}
