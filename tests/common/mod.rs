//! Scripted in-process browser used by the integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use rust_post_scraper::browser::{BrowserError, BrowserSession, PageEvent, PageSurface};
use rust_post_scraper::config::SelectorConfig;
use rust_post_scraper::session::StoredCookie;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::broadcast;

pub const BASE_URL: &str = "https://www.linkedin.com";
pub const FEED_URL: &str = "https://www.linkedin.com/feed/";
pub const LOGIN_URL: &str = "https://www.linkedin.com/login";

/// How the fake site behaves
#[derive(Default)]
pub struct Script {
    /// Returned by `content()` on every surface
    pub results_html: String,
    /// Navigating to these links fails
    pub failing_links: HashSet<String>,
    /// Navigation to a link takes this long
    pub delays: HashMap<String, Duration>,
    /// Reading these selectors fails
    pub failing_selectors: HashSet<String>,
    /// These selectors match nothing
    pub missing_selectors: HashSet<String>,
}

#[derive(Default)]
pub struct Counters {
    pub opened: AtomicUsize,
    pub active: AtomicUsize,
    pub max_active: AtomicUsize,
    pub scrolls: AtomicUsize,
}

pub struct MockSurface {
    script: Arc<Script>,
    counters: Arc<Counters>,
    url: Mutex<String>,
    cookies: Mutex<Vec<StoredCookie>>,
    storage: Mutex<BTreeMap<String, String>>,
    events: broadcast::Sender<PageEvent>,
    closed: AtomicBool,
}

impl MockSurface {
    pub fn new(script: Arc<Script>, counters: Arc<Counters>) -> Self {
        let (events, _) = broadcast::channel(64);
        Self {
            script,
            counters,
            url: Mutex::new("about:blank".to_string()),
            cookies: Mutex::new(Vec::new()),
            storage: Mutex::new(BTreeMap::new()),
            events,
            closed: AtomicBool::new(false),
        }
    }

    /// A standalone surface for detector tests
    pub fn standalone(url: &str) -> Arc<Self> {
        let surface = Self::new(Arc::new(Script::default()), Arc::new(Counters::default()));
        surface.set_url(url);
        Arc::new(surface)
    }

    pub fn set_url(&self, url: &str) {
        *self.url.lock().unwrap() = url.to_string();
    }

    pub fn add_cookie(&self, name: &str, value: &str) {
        self.cookies.lock().unwrap().push(cookie(name, value));
    }

    pub fn emit(&self, event: PageEvent) {
        let _ = self.events.send(event);
    }

    pub fn set_storage_entry(&self, key: &str, value: &str) {
        self.storage
            .lock()
            .unwrap()
            .insert(key.to_string(), value.to_string());
    }

    pub fn stored_cookies(&self) -> Vec<StoredCookie> {
        self.cookies.lock().unwrap().clone()
    }

    fn url(&self) -> String {
        self.url.lock().unwrap().clone()
    }

    /// `Some(result)` when the script overrides `selector`
    fn scripted_lookup(&self, selector: &str) -> Option<Result<Option<String>, BrowserError>> {
        if self.script.failing_selectors.contains(selector) {
            return Some(Err(BrowserError::ElementNotFound(format!(
                "scripted failure for {}",
                selector
            ))));
        }
        if self.script.missing_selectors.contains(selector) {
            return Some(Ok(None));
        }
        None
    }
}

pub fn cookie(name: &str, value: &str) -> StoredCookie {
    StoredCookie {
        name: name.to_string(),
        value: value.to_string(),
        domain: ".linkedin.com".to_string(),
        path: "/".to_string(),
        expires: None,
        http_only: true,
        secure: true,
    }
}

#[async_trait]
impl PageSurface for MockSurface {
    async fn navigate(&self, url: &str) -> Result<(), BrowserError> {
        if let Some(delay) = self.script.delays.get(url) {
            tokio::time::sleep(*delay).await;
        }
        if self.script.failing_links.contains(url) {
            return Err(BrowserError::NavigationError(format!("scripted failure for {}", url)));
        }
        self.set_url(url);
        self.emit(PageEvent::Navigated {
            url: url.to_string(),
            main_frame: true,
        });
        self.emit(PageEvent::ContentLoaded);
        Ok(())
    }

    async fn current_url(&self) -> Result<String, BrowserError> {
        Ok(self.url())
    }

    async fn content(&self) -> Result<String, BrowserError> {
        Ok(self.script.results_html.clone())
    }

    async fn evaluate(&self, _script: &str) -> Result<serde_json::Value, BrowserError> {
        Ok(serde_json::Value::Null)
    }

    async fn text_content(&self, selector: &str) -> Result<Option<String>, BrowserError> {
        if let Some(scripted) = self.scripted_lookup(selector) {
            return scripted;
        }
        let sel = SelectorConfig::default();
        let text = if selector == sel.body {
            Some(format!("  Post body at {}\n", self.url()))
        } else if selector == sel.author_name {
            Some("Jane DoeJane Doe".to_string())
        } else if selector == sel.post_time {
            Some("2d •  Edited".to_string())
        } else if selector == sel.likes {
            Some(" 42 ".to_string())
        } else if selector == sel.comments {
            Some("7 comments".to_string())
        } else {
            None
        };
        Ok(text)
    }

    async fn attribute(&self, selector: &str, name: &str) -> Result<Option<String>, BrowserError> {
        if let Some(scripted) = self.scripted_lookup(selector) {
            return scripted;
        }
        let sel = SelectorConfig::default();
        if selector == sel.author_image && name == "src" {
            return Ok(Some("https://media.licdn.com/avatar.jpg".to_string()));
        }
        Ok(None)
    }

    async fn scroll_to_bottom(&self) -> Result<(), BrowserError> {
        self.counters.scrolls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn screenshot_element(&self, _selector: &str) -> Result<Vec<u8>, BrowserError> {
        Ok(vec![0x89, b'P', b'N', b'G'])
    }

    async fn cookies(&self) -> Result<Vec<StoredCookie>, BrowserError> {
        Ok(self.stored_cookies())
    }

    async fn set_cookies(&self, cookies: &[StoredCookie]) -> Result<(), BrowserError> {
        self.cookies.lock().unwrap().extend(cookies.iter().cloned());
        Ok(())
    }

    async fn local_storage(&self) -> Result<BTreeMap<String, String>, BrowserError> {
        Ok(self.storage.lock().unwrap().clone())
    }

    async fn set_local_storage(
        &self,
        entries: &BTreeMap<String, String>,
    ) -> Result<(), BrowserError> {
        self.storage.lock().unwrap().extend(entries.clone());
        Ok(())
    }

    fn subscribe(&self) -> broadcast::Receiver<PageEvent> {
        self.events.subscribe()
    }

    async fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    async fn close(&self) -> Result<(), BrowserError> {
        if !self.closed.swap(true, Ordering::SeqCst) {
            self.counters.active.fetch_sub(1, Ordering::SeqCst);
            self.emit(PageEvent::Closed);
        }
        Ok(())
    }
}

/// Opens [`MockSurface`]s and tracks how many are alive at once
pub struct MockSession {
    pub script: Arc<Script>,
    pub counters: Arc<Counters>,
    surfaces: Mutex<Vec<Arc<MockSurface>>>,
}

impl MockSession {
    pub fn new(script: Script) -> Self {
        Self {
            script: Arc::new(script),
            counters: Arc::new(Counters::default()),
            surfaces: Mutex::new(Vec::new()),
        }
    }

    /// Most recently opened surface, waiting until one exists
    pub async fn last_surface(&self) -> Arc<MockSurface> {
        loop {
            if let Some(surface) = self.surfaces.lock().unwrap().last().cloned() {
                return surface;
            }
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
    }

    pub fn opened(&self) -> usize {
        self.counters.opened.load(Ordering::SeqCst)
    }

    pub fn active(&self) -> usize {
        self.counters.active.load(Ordering::SeqCst)
    }

    pub fn max_active(&self) -> usize {
        self.counters.max_active.load(Ordering::SeqCst)
    }

    pub fn scrolls(&self) -> usize {
        self.counters.scrolls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl BrowserSession for MockSession {
    type Surface = MockSurface;

    async fn open_surface(&self) -> Result<Arc<MockSurface>, BrowserError> {
        self.counters.opened.fetch_add(1, Ordering::SeqCst);
        let active = self.counters.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.counters.max_active.fetch_max(active, Ordering::SeqCst);
        let surface = Arc::new(MockSurface::new(
            self.script.clone(),
            self.counters.clone(),
        ));
        self.surfaces.lock().unwrap().push(surface.clone());
        Ok(surface)
    }
}

/// Results page markup carrying one tracking attribute per identifier
pub fn results_page(identifiers: &[&str]) -> String {
    let cards: String = identifiers
        .iter()
        .map(|id| {
            format!(
                "<div data-view-tracking-scope=\"[{{&quot;breadcrumb&quot;:{{&quot;updateUrn&quot;:&quot;{}&quot;}}}}]\"></div>",
                id
            )
        })
        .collect();
    format!("<html><body>{}</body></html>", cards)
}
