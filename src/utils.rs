//! Text, date, and filesystem helpers shared by the extractors, the
//! normalizer, and startup.

use crate::error::Result;
use chrono::{DateTime, NaiveDate, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use std::path::Path;
use tokio::fs;
use tracing::{info, instrument};

static WHITESPACE_RUN: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());

/// Collapse every whitespace run to a single space and trim the ends.
///
/// # Examples
///
/// ```ignore
/// assert_eq!(collapse_whitespace("  Nairobi \n\t Summit "), "Nairobi Summit");
/// ```
pub fn collapse_whitespace(s: &str) -> String {
    WHITESPACE_RUN.replace_all(s, " ").trim().to_string()
}

/// Replace every whitespace run with `replacement`, leaving the ends as they are.
pub fn replace_whitespace_runs(s: &str, replacement: &str) -> String {
    WHITESPACE_RUN.replace_all(s, replacement).into_owned()
}

/// Keep at most `max` characters of `s`, never splitting a code point.
pub fn truncate_chars(s: &str, max: usize) -> String {
    match s.char_indices().nth(max) {
        Some((byte_idx, _)) => s[..byte_idx].to_string(),
        None => s.to_string(),
    }
}

/// Truncate a string for logging purposes.
///
/// Long strings are cut to `max` characters with an ellipsis and the count
/// of dropped bytes appended.
pub fn truncate_for_log(s: &str, max: usize) -> String {
    let kept = truncate_chars(s, max);
    if kept.len() == s.len() {
        kept
    } else {
        format!("{}…(+{} bytes)", kept, s.len() - kept.len())
    }
}

/// Best-effort parse of a publication date found on a page or in a feed.
///
/// Accepts RFC 3339 (`datetime` attributes), RFC 2822 (RSS `pubDate`), and
/// a bare `YYYY-MM-DD` taken as midnight UTC.
pub fn parse_published_date(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = DateTime::parse_from_rfc2822(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

/// Ensure a directory exists and is writable.
///
/// Creates the directory if needed, then writes and removes a scratch file.
#[instrument(level = "info", skip_all, fields(path = %path.display()))]
pub async fn ensure_writable_dir(path: &Path) -> Result<()> {
    fs::create_dir_all(path).await?;
    let scratch_path = path.join("..__write_check__");
    fs::write(&scratch_path, b"").await?;
    let _ = fs::remove_file(&scratch_path).await;
    info!("Data directory is writable");
    Ok(())
}
