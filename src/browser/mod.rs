//! Browser automation seam
//!
//! The scrape pipeline and the login detector drive pages through the
//! [`BrowserSession`] and [`PageSurface`] traits. [`BrowserManager`] and
//! [`ChromeSurface`] implement them on top of headless Chrome; tests drive the
//! same code with scripted in-process surfaces.
//!
//! # Example
//!
//! ```no_run
//! use rust_post_scraper::browser::{BrowserConfig, BrowserManager, BrowserSession, PageSurface};
//!
//! # async fn run() -> Result<(), rust_post_scraper::browser::BrowserError> {
//! let manager = BrowserManager::new(BrowserConfig::default())?;
//! let surface = manager.open_surface().await?;
//!
//! surface.navigate("https://example.com").await?;
//! let html = surface.content().await?;
//! println!("Extracted {} bytes of HTML", html.len());
//!
//! surface.close().await?;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod manager;
pub mod scraper;

use crate::session::StoredCookie;
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::broadcast;

// Re-export main types for convenience
pub use config::BrowserConfig;
pub use manager::{BrowserError, BrowserManager};
pub use scraper::ChromeSurface;

/// Page lifecycle notifications delivered to subscribers of a surface
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PageEvent {
    /// A frame finished navigating
    Navigated { url: String, main_frame: bool },
    /// DOMContentLoaded fired for the current document
    ContentLoaded,
    /// The surface went away (tab closed, window closed, browser exited)
    Closed,
}

/// One browsing surface (a tab) inside a session
#[async_trait]
pub trait PageSurface: Send + Sync {
    /// Navigate and wait until the main frame settles
    async fn navigate(&self, url: &str) -> Result<(), BrowserError>;

    async fn current_url(&self) -> Result<String, BrowserError>;

    /// Serialized DOM of the current document
    async fn content(&self) -> Result<String, BrowserError>;

    async fn evaluate(&self, script: &str) -> Result<serde_json::Value, BrowserError>;

    /// `innerText` of the first element matching `selector`, `None` when nothing matches
    async fn text_content(&self, selector: &str) -> Result<Option<String>, BrowserError>;

    /// Attribute of the first element matching `selector`
    async fn attribute(&self, selector: &str, name: &str)
        -> Result<Option<String>, BrowserError>;

    /// Scroll to the bottom of the page to trigger lazy loading
    async fn scroll_to_bottom(&self) -> Result<(), BrowserError>;

    /// PNG screenshot of the first element matching `selector`
    async fn screenshot_element(&self, selector: &str) -> Result<Vec<u8>, BrowserError>;

    async fn cookies(&self) -> Result<Vec<StoredCookie>, BrowserError>;

    async fn set_cookies(&self, cookies: &[StoredCookie]) -> Result<(), BrowserError>;

    async fn local_storage(&self) -> Result<BTreeMap<String, String>, BrowserError>;

    async fn set_local_storage(&self, entries: &BTreeMap<String, String>)
        -> Result<(), BrowserError>;

    /// Subscribe to lifecycle events. Each receiver sees every event sent after it subscribed.
    fn subscribe(&self) -> broadcast::Receiver<PageEvent>;

    async fn is_closed(&self) -> bool;

    async fn close(&self) -> Result<(), BrowserError>;
}

/// A browser session able to open ephemeral surfaces
#[async_trait]
pub trait BrowserSession: Send + Sync {
    type Surface: PageSurface + 'static;

    async fn open_surface(&self) -> Result<Arc<Self::Surface>, BrowserError>;
}
