use crate::browser::{BrowserError, PageSurface};
use crate::config::SelectorConfig;
use crate::models::ContentIdentifier;
use log::{debug, info, warn};
use scraper::{Html, Selector};
use serde_json::Value;
use std::collections::HashSet;
use std::time::Duration;

/// Load `depth` extra pages of results, then collect post identifiers
///
/// Each round scrolls to the bottom and waits `settle` for the lazy loader.
/// An empty list means no results; only browser failures are errors.
pub async fn discover_identifiers<S: PageSurface + ?Sized>(
    surface: &S,
    selectors: &SelectorConfig,
    depth: u32,
    settle: Duration,
) -> Result<Vec<ContentIdentifier>, BrowserError> {
    for round in 1..=depth {
        surface.scroll_to_bottom().await?;
        debug!("Scroll {}/{}, waiting {}ms", round, depth, settle.as_millis());
        tokio::time::sleep(settle).await;
    }

    let html = surface.content().await?;
    let identifiers = parse_identifiers(&html, &selectors.tracking_attribute, &selectors.identifier_key);
    info!("Discovered {} unique posts", identifiers.len());
    Ok(identifiers)
}

/// Scan every element carrying `attribute`, parse its JSON and pull out `key`
///
/// Order is first-seen; repeats and malformed metadata are skipped.
pub fn parse_identifiers(html: &str, attribute: &str, key: &str) -> Vec<ContentIdentifier> {
    let selector_str = format!("[{}]", attribute);
    let selector = match Selector::parse(&selector_str) {
        Ok(s) => s,
        Err(e) => {
            warn!("Invalid tracking attribute {:?}: {:?}", attribute, e);
            return Vec::new();
        }
    };

    let document = Html::parse_document(html);
    let mut seen = HashSet::new();
    let mut out = Vec::new();

    for element in document.select(&selector) {
        let Some(raw) = element.value().attr(attribute) else {
            continue;
        };
        let metadata: Value = match serde_json::from_str(raw) {
            Ok(v) => v,
            Err(e) => {
                debug!("Skipping unparseable tracking metadata: {}", e);
                continue;
            }
        };
        if let Some(id) = find_string_field(&metadata, key) {
            if seen.insert(id.to_string()) {
                out.push(ContentIdentifier::new(id));
            }
        }
    }
    out
}

/// Depth-first search for the first non-empty string stored under `key`
fn find_string_field<'a>(value: &'a Value, key: &str) -> Option<&'a str> {
    match value {
        Value::Object(map) => {
            if let Some(found) = map.get(key).and_then(Value::as_str).filter(|s| !s.is_empty()) {
                return Some(found);
            }
            map.values().find_map(|v| find_string_field(v, key))
        }
        Value::Array(items) => items.iter().find_map(|v| find_string_field(v, key)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ATTR: &str = "data-view-tracking-scope";
    const KEY: &str = "updateUrn";

    fn card(metadata: &str) -> String {
        format!(
            "<div {}=\"{}\"><p>post</p></div>",
            ATTR,
            metadata.replace('"', "&quot;")
        )
    }

    #[test]
    fn test_parse_dedupes_in_first_seen_order() {
        let html = format!(
            "<html><body>{}{}{}</body></html>",
            card(r#"{"updateUrn":"urn:li:activity:2"}"#),
            card(r#"{"updateUrn":"urn:li:activity:1"}"#),
            card(r#"{"updateUrn":"urn:li:activity:2"}"#),
        );
        let ids = parse_identifiers(&html, ATTR, KEY);
        let ids: Vec<&str> = ids.iter().map(|i| i.as_str()).collect();
        assert_eq!(ids, vec!["urn:li:activity:2", "urn:li:activity:1"]);
    }

    #[test]
    fn test_parse_skips_malformed_metadata() {
        let html = format!(
            "<html><body>{}{}{}</body></html>",
            card("{not json"),
            card(r#"{"other":"x"}"#),
            card(r#"{"updateUrn":"urn:li:activity:9"}"#),
        );
        let ids = parse_identifiers(&html, ATTR, KEY);
        assert_eq!(ids, vec![ContentIdentifier::new("urn:li:activity:9")]);
    }

    #[test]
    fn test_parse_finds_nested_key() {
        let html = card(
            r#"[{"breadcrumb":{"content":{"updateUrn":"urn:li:activity:5"}}}]"#,
        );
        let ids = parse_identifiers(&html, ATTR, KEY);
        assert_eq!(ids, vec![ContentIdentifier::new("urn:li:activity:5")]);
    }

    #[test]
    fn test_parse_empty_page() {
        assert!(parse_identifiers("<html><body></body></html>", ATTR, KEY).is_empty());
    }
}
