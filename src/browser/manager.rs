use super::config::BrowserConfig;
use super::scraper::ChromeSurface;
use super::BrowserSession;
use async_trait::async_trait;
use headless_chrome::{Browser, LaunchOptions};
use std::ffi::OsStr;
use std::sync::Arc;

/// Manages the Chrome process and tab creation
pub struct BrowserManager {
    browser: Arc<Browser>,
    config: BrowserConfig,
}

impl BrowserManager {
    /// Launch Chrome with the given configuration. Blocks until the process is up.
    pub fn new(config: BrowserConfig) -> Result<Self, BrowserError> {
        let flags = Self::chrome_flags(&config);
        let launch_options = Self::build_launch_options(&config, &flags)?;

        let browser = Browser::new(launch_options)
            .map_err(|e| BrowserError::InitializationError(e.to_string()))?;

        log::info!(
            "Browser launched (headless: {}, window: {}x{})",
            config.headless,
            config.window_size.0,
            config.window_size.1
        );

        Ok(Self {
            browser: Arc::new(browser),
            config,
        })
    }

    /// Launch without blocking the async runtime
    pub async fn launch(config: BrowserConfig) -> Result<Self, BrowserError> {
        tokio::task::spawn_blocking(move || Self::new(config))
            .await
            .map_err(|e| BrowserError::TaskFailed(e.to_string()))?
    }

    /// Owned flag strings; `LaunchOptions` only borrows them
    fn chrome_flags(config: &BrowserConfig) -> Vec<String> {
        let mut flags = config.chrome_flags.clone();
        if config.disable_images {
            flags.push("--blink-settings=imagesEnabled=false".to_string());
        }
        if let Some(ua) = &config.user_agent {
            flags.push(format!("--user-agent={}", ua));
        }
        flags
    }

    /// Build Chrome launch options from our config
    fn build_launch_options<'a>(
        config: &BrowserConfig,
        flags: &'a [String],
    ) -> Result<LaunchOptions<'a>, BrowserError> {
        let args: Vec<&OsStr> = flags.iter().map(OsStr::new).collect();

        LaunchOptions::default_builder()
            .headless(config.headless)
            .window_size(Some(config.window_size))
            // The login window can sit idle for minutes while the user types
            .idle_browser_timeout(config.timeout())
            .args(args)
            .build()
            .map_err(|e| BrowserError::ConfigurationError(e.to_string()))
    }
}

#[async_trait]
impl BrowserSession for BrowserManager {
    type Surface = ChromeSurface;

    async fn open_surface(&self) -> Result<Arc<ChromeSurface>, BrowserError> {
        let browser = self.browser.clone();
        let timeout = self.config.timeout();

        tokio::task::spawn_blocking(move || {
            let tab = browser
                .new_tab()
                .map_err(|e| BrowserError::TabCreationError(e.to_string()))?;
            tab.set_default_timeout(timeout);
            ChromeSurface::attach(tab, browser.get_tabs().clone()).map(Arc::new)
        })
        .await
        .map_err(|e| BrowserError::TaskFailed(e.to_string()))?
    }
}

/// Errors that can occur during browser operations
#[derive(Debug, thiserror::Error)]
pub enum BrowserError {
    #[error("Browser initialization failed: {0}")]
    InitializationError(String),

    #[error("Browser configuration error: {0}")]
    ConfigurationError(String),

    #[error("Tab creation failed: {0}")]
    TabCreationError(String),

    #[error("Navigation error: {0}")]
    NavigationError(String),

    #[error("Element not found: {0}")]
    ElementNotFound(String),

    #[error("Timeout waiting for: {0}")]
    Timeout(String),

    #[error("JavaScript execution error: {0}")]
    JavaScriptError(String),

    #[error("HTML extraction error: {0}")]
    HtmlExtractionError(String),

    #[error("Cookie access failed: {0}")]
    CookieError(String),

    #[error("Screenshot failed: {0}")]
    ScreenshotError(String),

    #[error("Browser task failed: {0}")]
    TaskFailed(String),
}
