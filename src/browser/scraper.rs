use super::manager::BrowserError;
use super::{PageEvent, PageSurface};
use crate::session::StoredCookie;
use async_trait::async_trait;
use headless_chrome::protocol::cdp::types::Event;
use headless_chrome::protocol::cdp::{Network, Page};
use headless_chrome::Tab;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::broadcast;

const EVENT_BUFFER: usize = 64;

/// A Chrome tab exposed as a [`PageSurface`]
///
/// headless_chrome is a blocking client, so every call is moved onto tokio's
/// blocking pool. Page events are forwarded from the CDP listener into a
/// broadcast channel.
pub struct ChromeSurface {
    tab: Arc<Tab>,
    tabs: Arc<Mutex<Vec<Arc<Tab>>>>,
    events: broadcast::Sender<PageEvent>,
    closed: AtomicBool,
}

impl ChromeSurface {
    /// Wrap a freshly created tab and start forwarding its page events
    pub fn attach(tab: Arc<Tab>, tabs: Arc<Mutex<Vec<Arc<Tab>>>>) -> Result<Self, BrowserError> {
        let (events, _) = broadcast::channel(EVENT_BUFFER);
        let sender = events.clone();

        // The tab owns the listener and drops it on close
        tab.add_event_listener(Arc::new(move |event: &Event| match event {
            Event::PageFrameNavigated(navigated) => {
                let frame = &navigated.params.frame;
                let _ = sender.send(PageEvent::Navigated {
                    url: frame.url.clone(),
                    main_frame: frame.parent_id.is_none(),
                });
            }
            Event::PageDomContentEventFired(_) => {
                let _ = sender.send(PageEvent::ContentLoaded);
            }
            _ => {}
        }))
        .map_err(|e| BrowserError::TabCreationError(format!("event listener: {}", e)))?;

        Ok(Self {
            tab,
            tabs,
            events,
            closed: AtomicBool::new(false),
        })
    }

    /// Run a blocking tab operation off the async runtime
    async fn blocking<T, F>(&self, f: F) -> Result<T, BrowserError>
    where
        F: FnOnce(&Tab) -> Result<T, BrowserError> + Send + 'static,
        T: Send + 'static,
    {
        let tab = self.tab.clone();
        tokio::task::spawn_blocking(move || f(&tab))
            .await
            .map_err(|e| BrowserError::TaskFailed(e.to_string()))?
    }

    async fn eval_value(&self, script: String) -> Result<serde_json::Value, BrowserError> {
        self.blocking(move |tab| {
            let result = tab
                .evaluate(&script, false)
                .map_err(|e| BrowserError::JavaScriptError(e.to_string()))?;
            Ok(result.value.unwrap_or(serde_json::Value::Null))
        })
        .await
    }

    fn mark_closed(&self) {
        if !self.closed.swap(true, Ordering::SeqCst) {
            let _ = self.events.send(PageEvent::Closed);
        }
    }
}

/// Quote a CSS selector as a JS string literal
fn js_string(value: &str) -> String {
    serde_json::Value::String(value.to_string()).to_string()
}

fn cookie_param(cookie: &StoredCookie) -> Result<Network::CookieParam, BrowserError> {
    let mut value = serde_json::json!({
        "name": cookie.name,
        "value": cookie.value,
        "domain": cookie.domain,
        "path": cookie.path,
        "secure": cookie.secure,
        "httpOnly": cookie.http_only,
    });
    if let Some(expires) = cookie.expires {
        value["expires"] = serde_json::json!(expires);
    }
    serde_json::from_value(value).map_err(|e| BrowserError::CookieError(e.to_string()))
}

#[async_trait]
impl PageSurface for ChromeSurface {
    async fn navigate(&self, url: &str) -> Result<(), BrowserError> {
        let url = url.to_string();
        self.blocking(move |tab| {
            tab.navigate_to(&url)
                .map_err(|e| BrowserError::NavigationError(format!("Failed to navigate to {}: {}", url, e)))?;
            tab.wait_until_navigated()
                .map_err(|e| BrowserError::NavigationError(format!("Navigation timeout for {}: {}", url, e)))?;
            Ok(())
        })
        .await
    }

    async fn current_url(&self) -> Result<String, BrowserError> {
        self.blocking(|tab| Ok(tab.get_url())).await
    }

    async fn content(&self) -> Result<String, BrowserError> {
        self.blocking(|tab| {
            tab.get_content()
                .map_err(|e| BrowserError::HtmlExtractionError(e.to_string()))
        })
        .await
    }

    async fn evaluate(&self, script: &str) -> Result<serde_json::Value, BrowserError> {
        self.eval_value(script.to_string()).await
    }

    async fn text_content(&self, selector: &str) -> Result<Option<String>, BrowserError> {
        let script = format!(
            "(() => {{ const el = document.querySelector({}); return el ? el.innerText : null; }})()",
            js_string(selector)
        );
        Ok(self.eval_value(script).await?.as_str().map(str::to_string))
    }

    async fn attribute(
        &self,
        selector: &str,
        name: &str,
    ) -> Result<Option<String>, BrowserError> {
        let script = format!(
            "(() => {{ const el = document.querySelector({}); return el ? el.getAttribute({}) : null; }})()",
            js_string(selector),
            js_string(name)
        );
        Ok(self.eval_value(script).await?.as_str().map(str::to_string))
    }

    async fn scroll_to_bottom(&self) -> Result<(), BrowserError> {
        self.eval_value("window.scrollTo(0, document.body.scrollHeight);".to_string())
            .await
            .map(|_| ())
            .map_err(|e| BrowserError::JavaScriptError(format!("Scroll failed: {}", e)))
    }

    async fn screenshot_element(&self, selector: &str) -> Result<Vec<u8>, BrowserError> {
        let selector = selector.to_string();
        self.blocking(move |tab| {
            let element = tab
                .find_element(&selector)
                .map_err(|_| BrowserError::ElementNotFound(selector.clone()))?;
            element
                .capture_screenshot(Page::CaptureScreenshotFormatOption::Png)
                .map_err(|e| BrowserError::ScreenshotError(e.to_string()))
        })
        .await
    }

    async fn cookies(&self) -> Result<Vec<StoredCookie>, BrowserError> {
        self.blocking(|tab| {
            let cookies = tab
                .get_cookies()
                .map_err(|e| BrowserError::CookieError(e.to_string()))?;
            Ok(cookies
                .into_iter()
                .map(|c| StoredCookie {
                    name: c.name,
                    value: c.value,
                    domain: c.domain,
                    path: c.path,
                    expires: (c.expires > 0.0).then_some(c.expires),
                    http_only: c.http_only,
                    secure: c.secure,
                })
                .collect())
        })
        .await
    }

    async fn set_cookies(&self, cookies: &[StoredCookie]) -> Result<(), BrowserError> {
        let params = cookies
            .iter()
            .map(cookie_param)
            .collect::<Result<Vec<_>, _>>()?;
        self.blocking(move |tab| {
            tab.set_cookies(params)
                .map_err(|e| BrowserError::CookieError(e.to_string()))
        })
        .await
    }

    async fn local_storage(&self) -> Result<BTreeMap<String, String>, BrowserError> {
        let value = self
            .eval_value("JSON.stringify(Object.assign({}, window.localStorage))".to_string())
            .await?;
        match value.as_str() {
            Some(raw) => serde_json::from_str(raw)
                .map_err(|e| BrowserError::JavaScriptError(format!("localStorage: {}", e))),
            None => Ok(BTreeMap::new()),
        }
    }

    async fn set_local_storage(
        &self,
        entries: &BTreeMap<String, String>,
    ) -> Result<(), BrowserError> {
        if entries.is_empty() {
            return Ok(());
        }
        let payload = serde_json::to_string(entries)
            .map_err(|e| BrowserError::JavaScriptError(e.to_string()))?;
        let script = format!(
            "(() => {{ const entries = {}; for (const [k, v] of Object.entries(entries)) {{ window.localStorage.setItem(k, v); }} return true; }})()",
            payload
        );
        self.eval_value(script).await.map(|_| ())
    }

    fn subscribe(&self) -> broadcast::Receiver<PageEvent> {
        self.events.subscribe()
    }

    async fn is_closed(&self) -> bool {
        if self.closed.load(Ordering::SeqCst) {
            return true;
        }
        let tab = self.tab.clone();
        let tabs = self.tabs.clone();
        let gone = tokio::task::spawn_blocking(move || {
            let listed = tabs
                .lock()
                .map(|open| open.iter().any(|t| t.get_target_id() == tab.get_target_id()))
                .unwrap_or(false);
            !listed || tab.get_target_info().is_err()
        })
        .await
        .unwrap_or(true);

        if gone {
            self.mark_closed();
        }
        gone
    }

    async fn close(&self) -> Result<(), BrowserError> {
        if self.closed.load(Ordering::SeqCst) {
            return Ok(());
        }
        let result = self
            .blocking(|tab| {
                tab.close(true)
                    .map(|_| ())
                    .map_err(|e| BrowserError::TaskFailed(format!("close tab: {}", e)))
            })
            .await;
        self.mark_closed();
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::browser::{BrowserConfig, BrowserManager, BrowserSession};

    #[test]
    fn test_js_string_escapes_quotes() {
        assert_eq!(js_string("a[href='x']"), r#""a[href='x']""#);
        assert_eq!(js_string(r#"div[data-x="y"]"#), r#""div[data-x=\"y\"]""#);
    }

    #[test]
    fn test_cookie_param_maps_fields() {
        let cookie = StoredCookie {
            name: "li_at".to_string(),
            value: "token".to_string(),
            domain: ".linkedin.com".to_string(),
            path: "/".to_string(),
            expires: Some(1_900_000_000.0),
            http_only: true,
            secure: true,
        };
        let param = cookie_param(&cookie).unwrap();
        assert_eq!(param.name, "li_at");
        assert_eq!(param.value, "token");
        assert_eq!(param.domain.as_deref(), Some(".linkedin.com"));
        assert_eq!(param.http_only, Some(true));
    }

    #[tokio::test]
    #[ignore] // Requires Chrome to be installed
    async fn test_basic_navigation() {
        let manager = BrowserManager::launch(BrowserConfig::default()).await.unwrap();
        let surface = manager.open_surface().await.unwrap();

        surface.navigate("https://example.com").await.unwrap();
        let heading = surface.text_content("h1").await.unwrap();
        assert_eq!(heading.as_deref(), Some("Example Domain"));

        surface.close().await.unwrap();
        assert!(surface.is_closed().await);
    }
}
