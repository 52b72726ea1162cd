use serde::Deserialize;
use std::time::Duration;

/// Upper bound used when navigation timeouts are disabled. Chrome's CDP client needs a
/// finite deadline, a day is long enough for manually gated pages.
const UNBOUNDED_TIMEOUT: Duration = Duration::from_secs(24 * 60 * 60);

/// Configuration for browser instances
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BrowserConfig {
    /// Run browser in headless mode
    pub headless: bool,

    /// Browser window size
    pub window_size: (u32, u32),

    /// Custom user agent
    pub user_agent: Option<String>,

    /// Navigation/action timeout in seconds, `None` waits indefinitely
    pub timeout_seconds: Option<u64>,

    /// Disable image loading for performance
    pub disable_images: bool,

    /// Additional Chrome flags
    pub chrome_flags: Vec<String>,
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            headless: true,
            window_size: (1920, 1080),
            user_agent: Some(
                "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/121.0.0.0 Safari/537.36"
                    .to_string(),
            ),
            timeout_seconds: None,
            disable_images: false,
            chrome_flags: vec![
                "--disable-blink-features=AutomationControlled".to_string(),
                "--disable-dev-shm-usage".to_string(),
            ],
        }
    }
}

impl BrowserConfig {
    /// Configuration for the interactive login window
    pub fn interactive(&self) -> Self {
        let mut config = self.clone();
        config.headless = false;
        config.disable_images = false;
        config
    }

    /// Get timeout as Duration
    pub fn timeout(&self) -> Duration {
        self.timeout_seconds
            .map(Duration::from_secs)
            .unwrap_or(UNBOUNDED_TIMEOUT)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = BrowserConfig::default();
        assert!(config.headless);
        assert_eq!(config.window_size, (1920, 1080));
        assert!(config.user_agent.is_some());
        assert!(config
            .chrome_flags
            .iter()
            .any(|f| f.contains("AutomationControlled")));
    }

    #[test]
    fn test_interactive_mode() {
        let config = BrowserConfig::default().interactive();
        assert!(!config.headless);
        assert!(!config.disable_images);
    }

    #[test]
    fn test_timeout_defaults_to_unbounded() {
        assert_eq!(BrowserConfig::default().timeout(), UNBOUNDED_TIMEOUT);

        let config = BrowserConfig {
            timeout_seconds: Some(5),
            ..BrowserConfig::default()
        };
        assert_eq!(config.timeout(), Duration::from_secs(5));
    }
}
