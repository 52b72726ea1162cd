//! Text clean-up helpers for scraped post fields
//!
//! # Examples
//!
//! ```
//! use rust_post_scraper::helpers::{clean_meta_text, repair_author_name};
//!
//! // Names rendered twice back-to-back are halved
//! assert_eq!(repair_author_name("John SmithJohn Smith"), "John Smith");
//!
//! // Separator glyphs and the "Edited" marker are dropped
//! assert_eq!(clean_meta_text("3d •  Edited •"), "3d");
//! ```

/// Glyphs the feed renders between metadata tokens
const SEPARATOR_GLYPHS: &[char] = &['•', '·', '|'];

const EDITED_MARKER: &str = "Edited";

/// Undo the duplicated-name rendering artifact
///
/// The feed sometimes renders the author's name twice (visible text followed by
/// a screen-reader copy), which `innerText` concatenates. Surrounding
/// whitespace is trimmed first; if the trimmed text has an even number of
/// characters and both halves match, keep one half. Parity is judged on the
/// trimmed text, not the raw input.
pub fn repair_author_name(raw: &str) -> String {
    let trimmed = raw.trim();
    let chars: Vec<char> = trimmed.chars().collect();
    let len = chars.len();

    if len > 0 && len % 2 == 0 && chars[..len / 2] == chars[len / 2..] {
        return chars[..len / 2].iter().collect();
    }
    trimmed.to_string()
}

/// Normalize timestamp and counter text: whitespace, separators, edit marker
pub fn clean_meta_text(raw: &str) -> String {
    let without_glyphs: String = raw
        .chars()
        .map(|c| if SEPARATOR_GLYPHS.contains(&c) { ' ' } else { c })
        .collect();

    without_glyphs
        .split_whitespace()
        .filter(|token| *token != EDITED_MARKER)
        .collect::<Vec<_>>()
        .join(" ")
}

/// File-system-safe name for an identifier's screenshot
pub fn screenshot_file_name(identifier: &str) -> String {
    let safe: String = identifier
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' { c } else { '_' })
        .collect();
    format!("{}.png", safe)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_repair_duplicated_name() {
        assert_eq!(repair_author_name("John SmithJohn Smith"), "John Smith");
    }

    #[test]
    fn test_repair_leaves_distinct_name() {
        assert_eq!(repair_author_name("Jane Doe"), "Jane Doe");
    }

    #[test]
    fn test_repair_never_halves_odd_length() {
        // 5 chars, can't be split evenly
        assert_eq!(repair_author_name("AbcAb"), "AbcAb");
        assert_eq!(repair_author_name("aaa"), "aaa");
    }

    #[test]
    fn test_repair_judges_parity_after_trim() {
        // 21 raw chars, 20 once trimmed
        assert_eq!(repair_author_name(" John SmithJohn Smith"), "John Smith");
        assert_eq!(repair_author_name("\tJohn SmithJohn Smith \n"), "John Smith");
        // 20 raw chars, 19 once trimmed
        assert_eq!(repair_author_name("AbcdAbcdAbcdAbcdAbc "), "AbcdAbcdAbcdAbcdAbc");
    }

    #[test]
    fn test_repair_handles_multibyte() {
        assert_eq!(repair_author_name("José ÁlvarezJosé Álvarez"), "José Álvarez");
        assert_eq!(repair_author_name("  Ana  "), "Ana");
        assert_eq!(repair_author_name(""), "");
    }

    #[test]
    fn test_clean_meta_text() {
        assert_eq!(clean_meta_text("2w •\n Edited • "), "2w");
        assert_eq!(clean_meta_text("1,204\n\n reactions"), "1,204 reactions");
        assert_eq!(clean_meta_text("5h · Edited"), "5h");
        // Only the standalone marker is removed
        assert_eq!(clean_meta_text("Editedx 3"), "Editedx 3");
    }

    #[test]
    fn test_screenshot_file_name() {
        assert_eq!(
            screenshot_file_name("urn:li:activity:123"),
            "urn_li_activity_123.png"
        );
    }
}
