use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Body text written into a result slot whose extraction failed
pub const EXTRACTION_FAILED_MARKER: &str = "[extraction failed]";

/// Opaque token naming one post within a discovery pass (e.g. `urn:li:activity:123`)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ContentIdentifier(String);

impl ContentIdentifier {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Canonical post URL, also the storage de-duplication key
    pub fn canonical_link(&self, base_url: &str) -> String {
        format!("{}/feed/update/{}/", base_url.trim_end_matches('/'), self.0)
    }
}

impl fmt::Display for ContentIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractedItem {
    pub link: String,
    pub text: Option<String>,
    pub author_name: Option<String>,
    pub author_image: Option<String>,
    pub post_time: Option<String>,
    pub likes: Option<String>,
    pub comments: Option<String>,
    pub screenshot: Option<String>,
}

impl ExtractedItem {
    pub fn new(link: impl Into<String>) -> Self {
        Self {
            link: link.into(),
            text: None,
            author_name: None,
            author_image: None,
            post_time: None,
            likes: None,
            comments: None,
            screenshot: None,
        }
    }

    /// Stand-in for an item whose page could not be extracted
    pub fn placeholder(link: impl Into<String>) -> Self {
        Self {
            text: Some(EXTRACTION_FAILED_MARKER.to_string()),
            ..Self::new(link)
        }
    }

    pub fn is_placeholder(&self) -> bool {
        self.text.as_deref() == Some(EXTRACTION_FAILED_MARKER)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredPost {
    pub id: i64,
    pub link: String,
    pub text: Option<String>,
    pub author_name: Option<String>,
    pub author_image: Option<String>,
    pub post_time: Option<String>,
    pub likes: Option<String>,
    pub comments: Option<String>,
    pub screenshot: Option<String>,
    pub description: Option<String>,
    pub keywords: Option<String>,
    /// UTC, `YYYY-MM-DD HH:MM:SS`
    pub captured_at: String,
    pub applied: bool,
    pub saved: bool,
}

/// Composable AND filter for stored posts. `None` fields don't constrain.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PostFilter {
    pub ids: Option<Vec<i64>>,
    /// Case-insensitive substring over post text and author name
    pub search: Option<String>,
    /// Inclusive, compared against the capture date
    pub date_from: Option<NaiveDate>,
    pub date_to: Option<NaiveDate>,
    pub applied: Option<bool>,
    pub saved: Option<bool>,
    pub limit: Option<u32>,
    pub offset: Option<u32>,
}

/// Partial update; only `Some` fields are written
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PostUpdate {
    pub applied: Option<bool>,
    pub saved: Option<bool>,
    pub description: Option<String>,
}

impl PostUpdate {
    pub fn is_empty(&self) -> bool {
        self.applied.is_none() && self.saved.is_none() && self.description.is_none()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersistSummary {
    pub total: usize,
    pub new: usize,
    pub duplicates: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SearchStatus {
    NoResults,
    Complete,
    Partial { failed: usize },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchOutcome {
    pub status: SearchStatus,
    pub items: Vec<ExtractedItem>,
}

impl SearchOutcome {
    pub fn empty() -> Self {
        Self {
            status: SearchStatus::NoResults,
            items: Vec::new(),
        }
    }

    /// Classify a finished extraction batch
    pub fn from_items(items: Vec<ExtractedItem>) -> Self {
        let failed = items.iter().filter(|i| i.is_placeholder()).count();
        let status = match (items.is_empty(), failed) {
            (true, _) => SearchStatus::NoResults,
            (false, 0) => SearchStatus::Complete,
            (false, failed) => SearchStatus::Partial { failed },
        };
        Self { status, items }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthOutcome {
    pub success: bool,
    pub reason: String,
}
