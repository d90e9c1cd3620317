//! Field rules for list items. The markup is dictated by the remote listing, so
//! every rule here degrades to `None` instead of failing the item.

use crate::config;
use crate::model::record::RawRecord;
use crate::transform::util::clean_text;

/// Text pulled out of one item block, before any interpretation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawItemBlock {
    pub title: Option<String>,
    pub original_title: Option<String>,
    pub extra_info: Option<String>,
    pub director: Option<String>,
    pub source_rating: Option<String>,
    pub external_rating: Option<String>,
    pub image_url: Option<String>,
    pub detail_link: Option<String>,
    /// `class` attribute of the personal rating element, if the element exists.
    pub personal_rating_class: Option<String>,
}

pub fn parse_item(block: &RawItemBlock) -> RawRecord {
    let original_title = clean_text(block.original_title.as_deref());
    let extra_info = clean_text(block.extra_info.as_deref());

    RawRecord {
        title: clean_text(block.title.as_deref()),
        release_year: original_title.as_deref().and_then(parse_release_year),
        original_title,
        genre: extra_info.as_deref().and_then(parse_genre),
        runtime_minutes: extra_info.as_deref().and_then(parse_runtime),
        director: clean_text(block.director.as_deref()),
        source_rating: block.source_rating.as_deref().and_then(parse_rating),
        external_rating: block.external_rating.as_deref().and_then(parse_rating),
        image_url: clean_text(block.image_url.as_deref()),
        source_link: clean_text(block.detail_link.as_deref()),
        personal_rating: block
            .personal_rating_class
            .as_deref()
            .and_then(parse_personal_rating),
    }
}

/// The year is the last comma-separated token of the original-title field,
/// e.g. `"Shadows of Forgotten Ancestors, 1965"`.
pub fn parse_release_year(original_title: &str) -> Option<i64> {
    original_title
        .rsplit(',')
        .next()
        .map(str::trim)
        .and_then(|token| token.parse::<i64>().ok())
}

/// `"1 год 31 хв"` -> 91, `"45 хв"` -> 45, `"2 години"` -> 120.
pub fn parse_runtime(extra_info: &str) -> Option<i64> {
    let caps = config::RE_RUNTIME.captures(extra_info)?;
    let number = |idx: usize| caps.get(idx).and_then(|m| m.as_str().parse::<i64>().ok());

    match (number(1), number(2), number(3)) {
        (Some(hours), minutes, _) => hours
            .checked_mul(60)
            .and_then(|m| m.checked_add(minutes.unwrap_or(0))),
        (None, _, Some(minutes)) => Some(minutes),
        _ => None,
    }
}

/// Every segment but the last one, which carries the duration. Blank segments
/// are skipped, so `", 30 хв"` has no genre.
pub fn parse_genre(extra_info: &str) -> Option<String> {
    let parts: Vec<&str> = extra_info.split(',').collect();
    if parts.len() < 2 {
        return None;
    }

    let genre = parts[..parts.len() - 1]
        .iter()
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join(", ");

    if genre.is_empty() {
        None
    } else {
        Some(genre)
    }
}

/// Accepts `7`, `7.4`; rejects negatives, extra decimals, dashes and blanks.
pub fn parse_rating(raw: &str) -> Option<f64> {
    let trimmed = raw.trim();
    if !config::RE_RATING.is_match(trimmed) {
        return None;
    }
    trimmed.parse::<f64>().ok()
}

/// Reads the `number-<digits>` class token. An element without such a token
/// yields `None`: a guessed zero would be indistinguishable from a real one.
pub fn parse_personal_rating(class_attr: &str) -> Option<i64> {
    class_attr
        .split_whitespace()
        .filter_map(|token| config::RE_RATING_CLASS.captures(token))
        .find_map(|caps| caps.get(1).and_then(|m| m.as_str().parse::<i64>().ok()))
}
