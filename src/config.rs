use crate::browser::BrowserConfig;
use crate::error::{Result, ScraperError};
use regex::Regex;
use serde::Deserialize;
use std::fs;
use std::path::Path;
use std::time::Duration;

pub const DEFAULT_CONFIG_PATH: &str = "config.toml";

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct Config {
    /// SQLite database file
    pub database_path: String,
    /// Saved login session (JSON)
    pub session_path: String,
    /// Where post screenshots are written
    pub screenshot_dir: String,
    pub site: SiteConfig,
    pub scrape: ScrapeConfig,
    pub auth: AuthConfig,
    pub selectors: SelectorConfig,
    pub browser: BrowserConfig,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct SiteConfig {
    pub base_url: String,
    pub login_url: String,
    /// Must contain `{keywords}`
    pub search_url_template: String,
    /// Regex matched against the URL of the logged-in home page
    pub logged_in_url_pattern: String,
    /// Cookie that proves an authenticated session
    pub auth_cookie: String,
    /// Saved sessions older than this are rejected
    pub session_max_age_days: i64,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ScrapeConfig {
    /// Upper bound on concurrent extraction workers
    pub max_concurrency: usize,
    /// Scroll rounds when the caller doesn't pass a depth
    pub default_pagination_depth: u32,
    /// Pause after each scroll so lazy results can render
    pub scroll_settle_ms: u64,
    /// Per-item deadline for navigation + extraction, `None` waits indefinitely
    pub item_timeout_secs: Option<u64>,
    pub capture_screenshots: bool,
    /// Body text must be longer than this before fields are read
    pub min_body_chars: usize,
    pub body_poll_ms: u64,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct AuthConfig {
    /// Interval of the cookie/URL poll channel
    pub poll_interval_ms: u64,
}

/// CSS selectors and attribute names the pipeline depends on
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct SelectorConfig {
    /// Attribute on result cards carrying JSON tracking metadata
    pub tracking_attribute: String,
    /// Key inside the tracking metadata holding the post identifier
    pub identifier_key: String,
    pub body: String,
    pub author_name: String,
    pub author_image: String,
    pub post_time: String,
    pub likes: String,
    pub comments: String,
    /// Region captured when screenshots are enabled
    pub screenshot_region: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_path: "posts.db".to_string(),
            session_path: "session.json".to_string(),
            screenshot_dir: "screenshots".to_string(),
            site: SiteConfig::default(),
            scrape: ScrapeConfig::default(),
            auth: AuthConfig::default(),
            selectors: SelectorConfig::default(),
            browser: BrowserConfig::default(),
        }
    }
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            base_url: "https://www.linkedin.com".to_string(),
            login_url: "https://www.linkedin.com/login".to_string(),
            search_url_template:
                "https://www.linkedin.com/search/results/content/?keywords={keywords}&sortBy=%22date_posted%22"
                    .to_string(),
            logged_in_url_pattern: r"^https://(www\.)?linkedin\.com/feed".to_string(),
            auth_cookie: "li_at".to_string(),
            session_max_age_days: 30,
        }
    }
}

impl Default for ScrapeConfig {
    fn default() -> Self {
        Self {
            max_concurrency: 8,
            default_pagination_depth: 3,
            scroll_settle_ms: 2000,
            item_timeout_secs: None,
            capture_screenshots: false,
            min_body_chars: 10,
            body_poll_ms: 250,
        }
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 1500,
        }
    }
}

impl Default for SelectorConfig {
    fn default() -> Self {
        Self {
            tracking_attribute: "data-view-tracking-scope".to_string(),
            identifier_key: "updateUrn".to_string(),
            body: ".update-components-text".to_string(),
            author_name: ".update-components-actor__title span[dir='ltr']".to_string(),
            author_image: ".update-components-actor__avatar-image".to_string(),
            post_time: ".update-components-actor__sub-description".to_string(),
            likes: ".social-details-social-counts__reactions-count".to_string(),
            comments: ".social-details-social-counts__comments".to_string(),
            screenshot_region: ".feed-shared-update-v2".to_string(),
        }
    }
}

impl Config {
    /// Load `config.toml` from the working directory, defaults when absent
    pub fn load() -> Result<Self> {
        Self::load_from(DEFAULT_CONFIG_PATH)
    }

    pub fn load_from(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let config = if path.exists() {
            let content = fs::read_to_string(path)?;
            toml::from_str::<Config>(&content)?
        } else {
            log::debug!("{} not found, using defaults", path.display());
            Self::default()
        };
        config.validate()?;
        Ok(config)
    }

    /// Reject settings the pipeline can't run with
    pub fn validate(&self) -> Result<()> {
        let invalid = |msg: &str| Err(ScraperError::Config(msg.to_string()));

        if self.database_path.trim().is_empty() {
            return invalid("database_path is empty");
        }
        if self.session_path.trim().is_empty() {
            return invalid("session_path is empty");
        }
        if self.site.base_url.trim().is_empty() || self.site.login_url.trim().is_empty() {
            return invalid("site.base_url and site.login_url are required");
        }
        if !self.site.search_url_template.contains("{keywords}") {
            return invalid("site.search_url_template must contain {keywords}");
        }
        if self.site.auth_cookie.trim().is_empty() {
            return invalid("site.auth_cookie is empty");
        }
        if self.site.session_max_age_days <= 0 {
            return invalid("site.session_max_age_days must be positive");
        }
        Regex::new(&self.site.logged_in_url_pattern).map_err(|e| {
            ScraperError::Config(format!("site.logged_in_url_pattern: {}", e))
        })?;
        if self.scrape.max_concurrency == 0 {
            return invalid("scrape.max_concurrency must be at least 1");
        }
        if self.scrape.item_timeout_secs == Some(0) {
            return invalid("scrape.item_timeout_secs must be positive when set");
        }
        if self.auth.poll_interval_ms == 0 {
            return invalid("auth.poll_interval_ms must be positive");
        }
        if self.selectors.tracking_attribute.trim().is_empty()
            || self.selectors.identifier_key.trim().is_empty()
        {
            return invalid("selectors.tracking_attribute and selectors.identifier_key are required");
        }
        Ok(())
    }
}

impl SiteConfig {
    /// Results page URL for a keyword query
    pub fn search_url(&self, keywords: &str) -> String {
        self.search_url_template
            .replace("{keywords}", &urlencoding::encode(keywords.trim()))
    }

    pub fn session_max_age(&self) -> chrono::Duration {
        chrono::Duration::days(self.session_max_age_days)
    }
}

impl ScrapeConfig {
    pub fn scroll_settle(&self) -> Duration {
        Duration::from_millis(self.scroll_settle_ms)
    }

    pub fn item_timeout(&self) -> Option<Duration> {
        self.item_timeout_secs.map(Duration::from_secs)
    }

    pub fn body_poll(&self) -> Duration {
        Duration::from_millis(self.body_poll_ms)
    }
}

impl AuthConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.scrape.max_concurrency, 8);
        assert_eq!(config.auth.poll_interval(), Duration::from_millis(1500));
        assert_eq!(config.site.session_max_age_days, 30);
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config: Config = toml::from_str(
            r#"
            database_path = "data/posts.db"

            [scrape]
            max_concurrency = 3
            capture_screenshots = true

            [browser]
            headless = false
            "#,
        )
        .unwrap();

        assert_eq!(config.database_path, "data/posts.db");
        assert_eq!(config.scrape.max_concurrency, 3);
        assert!(config.scrape.capture_screenshots);
        assert_eq!(config.scrape.scroll_settle_ms, 2000);
        assert!(!config.browser.headless);
        assert_eq!(config.site.auth_cookie, "li_at");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = Config::default();
        config.scrape.max_concurrency = 0;
        assert!(matches!(config.validate(), Err(ScraperError::Config(_))));

        let mut config = Config::default();
        config.site.logged_in_url_pattern = "(unclosed".to_string();
        assert!(matches!(config.validate(), Err(ScraperError::Config(_))));

        let mut config = Config::default();
        config.site.search_url_template = "https://example.com/search".to_string();
        assert!(matches!(config.validate(), Err(ScraperError::Config(_))));
    }

    #[test]
    fn test_load_from_missing_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load_from(dir.path().join("nope.toml")).unwrap();
        assert_eq!(config.database_path, "posts.db");
    }

    #[test]
    fn test_search_url_encodes_keywords() {
        let site = SiteConfig::default();
        let url = site.search_url(" rust & tokio ");
        assert!(url.contains("keywords=rust%20%26%20tokio&"));
    }
}
