use crate::browser::{BrowserError, PageSurface};
use crate::config::{Config, SelectorConfig};
use crate::helpers::{clean_meta_text, repair_author_name, screenshot_file_name};
use crate::models::{ContentIdentifier, ExtractedItem};
use log::debug;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Why a single field has no value
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Absent {
    /// Selector matched nothing
    NotFound,
    /// Matched, but the text/attribute was blank
    Empty,
    /// Browser call failed for this field
    Failed(String),
}

pub type FieldResult = Result<String, Absent>;

/// Reads post fields from a loaded single-post page
pub struct ContentExtractor {
    selectors: SelectorConfig,
    min_body_chars: usize,
    body_poll: Duration,
    screenshot_dir: Option<PathBuf>,
}

impl ContentExtractor {
    pub fn new(config: &Config) -> Self {
        Self {
            selectors: config.selectors.clone(),
            min_body_chars: config.scrape.min_body_chars,
            body_poll: config.scrape.body_poll(),
            screenshot_dir: config
                .scrape
                .capture_screenshots
                .then(|| PathBuf::from(&config.screenshot_dir)),
        }
    }

    /// Wait for the body text, then read every field concurrently
    pub async fn extract<S: PageSurface + ?Sized>(
        &self,
        surface: &S,
        identifier: &ContentIdentifier,
        link: &str,
    ) -> Result<ExtractedItem, BrowserError> {
        self.wait_for_body(surface).await?;

        let sel = &self.selectors;
        let (text, author_image, author_name, post_time, likes, comments, screenshot) = tokio::join!(
            read_text(surface, &sel.body),
            read_attribute(surface, &sel.author_image, "src"),
            read_text(surface, &sel.author_name),
            read_text(surface, &sel.post_time),
            read_text(surface, &sel.likes),
            read_text(surface, &sel.comments),
            self.capture_screenshot(surface, identifier),
        );

        Ok(ExtractedItem {
            link: link.to_string(),
            text: present("text", text.map(|t| t.trim().to_string())),
            author_image: present("author_image", author_image),
            author_name: present("author_name", author_name.map(|n| repair_author_name(&n))),
            post_time: present("post_time", post_time.map(|t| clean_meta_text(&t))),
            likes: present("likes", likes.map(|t| clean_meta_text(&t))),
            comments: present("comments", comments.map(|t| clean_meta_text(&t))),
            screenshot: match screenshot {
                Some(result) => present("screenshot", result),
                None => None,
            },
        })
    }

    /// Poll until the body region holds more than `min_body_chars` characters.
    /// No deadline of its own; the pool's per-item timeout applies.
    async fn wait_for_body<S: PageSurface + ?Sized>(&self, surface: &S) -> Result<(), BrowserError> {
        loop {
            if let Some(text) = surface.text_content(&self.selectors.body).await? {
                if text.trim().chars().count() > self.min_body_chars {
                    return Ok(());
                }
            }
            tokio::time::sleep(self.body_poll).await;
        }
    }

    /// `None` when screenshots are disabled
    async fn capture_screenshot<S: PageSurface + ?Sized>(
        &self,
        surface: &S,
        identifier: &ContentIdentifier,
    ) -> Option<FieldResult> {
        let dir = self.screenshot_dir.as_ref()?;
        Some(self.save_screenshot(surface, identifier, dir).await)
    }

    async fn save_screenshot<S: PageSurface + ?Sized>(
        &self,
        surface: &S,
        identifier: &ContentIdentifier,
        dir: &Path,
    ) -> FieldResult {
        let png = surface
            .screenshot_element(&self.selectors.screenshot_region)
            .await
            .map_err(|e| Absent::Failed(e.to_string()))?;
        tokio::fs::create_dir_all(dir)
            .await
            .map_err(|e| Absent::Failed(e.to_string()))?;
        let path = dir.join(screenshot_file_name(identifier.as_str()));
        tokio::fs::write(&path, png)
            .await
            .map_err(|e| Absent::Failed(e.to_string()))?;
        Ok(path.to_string_lossy().into_owned())
    }
}

async fn read_text<S: PageSurface + ?Sized>(surface: &S, selector: &str) -> FieldResult {
    match surface.text_content(selector).await {
        Ok(Some(text)) if !text.trim().is_empty() => Ok(text),
        Ok(Some(_)) => Err(Absent::Empty),
        Ok(None) => Err(Absent::NotFound),
        Err(e) => Err(Absent::Failed(e.to_string())),
    }
}

async fn read_attribute<S: PageSurface + ?Sized>(surface: &S, selector: &str, name: &str) -> FieldResult {
    match surface.attribute(selector, name).await {
        Ok(Some(value)) if !value.trim().is_empty() => Ok(value.trim().to_string()),
        Ok(Some(_)) => Err(Absent::Empty),
        Ok(None) => Err(Absent::NotFound),
        Err(e) => Err(Absent::Failed(e.to_string())),
    }
}

fn present(field: &str, result: FieldResult) -> Option<String> {
    match result {
        Ok(value) if !value.is_empty() => Some(value),
        Ok(_) => {
            debug!("Field {} empty after clean-up", field);
            None
        }
        Err(absent) => {
            debug!("Field {} absent: {:?}", field, absent);
            None
        }
    }
}
