//! Source table configuration.
//!
//! Sources are data, not code: each entry names its allow-listed domains,
//! seed URLs, politeness delays, and the selectors used to pull items out
//! of its pages. Adding a source means adding a YAML entry.
//!
//! When no `--config` file is given the built-in table in
//! `config/sources.yaml` is used.
//!
//! # Example
//!
//! ```yaml
//! user_agent: "Mozilla/5.0 (compatible; SpotlightAfrica/1.0)"
//! sources:
//!   - name: techcabal
//!     allowed_domains: [techcabal.com, www.techcabal.com]
//!     seed_urls: ["https://techcabal.com/"]
//!     tags: "technology,startup"
//!     rules:
//!       item: "article, .post"
//!       title: "h2, h3, .entry-title"
//!       link: "a"
//! ```

use crate::error::{HarvestError, Result};
use crate::models::ContentType;
use serde::Deserialize;
use std::collections::HashSet;
use std::path::Path;
use tracing::{info, instrument};

pub const DEFAULT_SOURCES_YAML: &str = include_str!("../config/sources.yaml");

pub const DEFAULT_USER_AGENT: &str =
    "Mozilla/5.0 (compatible; SpotlightAfrica/1.0; +https://spotlightafrica.com)";

/// Upper bound for `delay_ms` and `jitter_ms`: one hour.
pub const MAX_DELAY_MS: u64 = 60 * 60 * 1000;

fn default_delay_ms() -> u64 {
    3000
}

fn default_jitter_ms() -> u64 {
    2000
}

fn default_category() -> String {
    "article".to_string()
}

/// How a source's pages are read.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceFormat {
    #[default]
    Html,
    Rss,
}

/// CSS selectors for one HTML source.
///
/// `item` selects the repeating card; every other selector is evaluated
/// inside a matched card.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SelectorRules {
    pub item: String,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    pub link: String,
    #[serde(default)]
    pub image: Option<String>,
    #[serde(default)]
    pub date: Option<String>,
    #[serde(default)]
    pub organizer: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
}

/// One external source.
#[derive(Debug, Clone, Deserialize)]
pub struct SourceConfig {
    pub name: String,
    #[serde(default)]
    pub format: SourceFormat,
    pub allowed_domains: Vec<String>,
    #[serde(default)]
    pub seed_urls: Vec<String>,
    #[serde(default)]
    pub user_agent: Option<String>,
    #[serde(default = "default_delay_ms")]
    pub delay_ms: u64,
    #[serde(default = "default_jitter_ms")]
    pub jitter_ms: u64,
    #[serde(default)]
    pub content_type: ContentType,
    #[serde(default = "default_category")]
    pub category: String,
    #[serde(default)]
    pub tags: String,
    #[serde(default)]
    pub rules: Option<SelectorRules>,
}

/// The whole source table.
#[derive(Debug, Clone, Deserialize)]
pub struct SourcesFile {
    #[serde(default)]
    pub user_agent: Option<String>,
    pub sources: Vec<SourceConfig>,
}

impl SourcesFile {
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let file: SourcesFile = serde_yaml::from_str(yaml)?;
        file.validate()?;
        Ok(file)
    }

    /// Load the table from `path`, or the built-in table when `path` is `None`.
    #[instrument(level = "info", skip_all)]
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let file = match path {
            Some(p) => {
                let yaml = std::fs::read_to_string(p).map_err(|e| {
                    HarvestError::Config(format!("cannot read {}: {e}", p.display()))
                })?;
                Self::from_yaml(&yaml)?
            }
            None => Self::from_yaml(DEFAULT_SOURCES_YAML)?,
        };
        info!(
            sources = file.sources.len(),
            from = %path.map(|p| p.display().to_string()).unwrap_or_else(|| "built-in".to_string()),
            "Loaded source table"
        );
        Ok(file)
    }

    /// Structural checks that do not need URL parsing or selector compilation.
    fn validate(&self) -> Result<()> {
        if self.sources.is_empty() {
            return Err(HarvestError::Config("no sources configured".to_string()));
        }

        let mut names = HashSet::new();
        for s in &self.sources {
            let name = s.name.trim();
            if name.is_empty() {
                return Err(HarvestError::Config("source with empty name".to_string()));
            }
            if !names.insert(name) {
                return Err(HarvestError::Config(format!("duplicate source name {name:?}")));
            }
            if s.allowed_domains.iter().all(|d| d.trim().is_empty()) {
                return Err(HarvestError::Config(format!(
                    "source {name:?} has no allowed domains"
                )));
            }
            if s.delay_ms > MAX_DELAY_MS || s.jitter_ms > MAX_DELAY_MS {
                return Err(HarvestError::Config(format!(
                    "source {name:?}: delay_ms and jitter_ms must be at most {MAX_DELAY_MS}"
                )));
            }
            if s.format == SourceFormat::Html && s.rules.is_none() {
                return Err(HarvestError::Config(format!(
                    "html source {name:?} needs extraction rules"
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_table_loads() {
        let file = SourcesFile::load(None).unwrap();
        let names: Vec<_> = file.sources.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["african-business", "business-daily", "techcabal"]);

        let techcabal = &file.sources[2];
        assert_eq!(techcabal.tags, "technology,startup");
        assert_eq!(techcabal.delay_ms, 3000);
        assert_eq!(techcabal.jitter_ms, 2000);
        assert_eq!(techcabal.content_type, ContentType::News);
    }

    #[test]
    fn test_defaults_applied() {
        let file = SourcesFile::from_yaml(
            r#"
sources:
  - name: feed
    format: rss
    allowed_domains: [example.com]
    seed_urls: ["https://example.com/feed.xml"]
"#,
        )
        .unwrap();
        let s = &file.sources[0];
        assert_eq!(s.format, SourceFormat::Rss);
        assert_eq!(s.delay_ms, 3000);
        assert_eq!(s.category, "article");
        assert_eq!(s.content_type, ContentType::News);
        assert!(s.rules.is_none());
        assert!(file.user_agent.is_none());
    }

    #[test]
    fn test_event_content_type() {
        let file = SourcesFile::from_yaml(
            r#"
sources:
  - name: events
    format: rss
    allowed_domains: [example.com]
    content_type: event
    category: conference
"#,
        )
        .unwrap();
        assert_eq!(file.sources[0].content_type, ContentType::Event);
        assert!(file.sources[0].seed_urls.is_empty());
    }

    #[test]
    fn test_rejects_duplicate_names() {
        let err = SourcesFile::from_yaml(
            r#"
sources:
  - { name: a, format: rss, allowed_domains: [a.com] }
  - { name: a, format: rss, allowed_domains: [b.com] }
"#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("duplicate source name"));
    }

    #[test]
    fn test_rejects_html_without_rules() {
        let err = SourcesFile::from_yaml(
            r#"
sources:
  - { name: a, allowed_domains: [a.com] }
"#,
        )
        .unwrap_err();
        assert!(matches!(err, HarvestError::Config(_)));
    }

    #[test]
    fn test_rejects_empty_table_and_empty_allow_list() {
        assert!(SourcesFile::from_yaml("sources: []").is_err());
        assert!(
            SourcesFile::from_yaml(
                "sources:\n  - { name: a, format: rss, allowed_domains: [] }\n"
            )
            .is_err()
        );
    }

    #[test]
    fn test_rejects_out_of_range_delays() {
        let yaml = |delay: u64, jitter: u64| {
            format!(
                "sources:\n  - {{ name: a, format: rss, allowed_domains: [a.com], delay_ms: {delay}, jitter_ms: {jitter} }}\n"
            )
        };
        assert!(SourcesFile::from_yaml(&yaml(MAX_DELAY_MS, MAX_DELAY_MS)).is_ok());

        let err = SourcesFile::from_yaml(&yaml(u64::MAX, 0)).unwrap_err();
        assert!(err.to_string().contains("delay_ms"));
        let err = SourcesFile::from_yaml(&yaml(3000, MAX_DELAY_MS + 1)).unwrap_err();
        assert!(matches!(err, HarvestError::Config(_)));
    }

    #[test]
    fn test_missing_file_is_config_error() {
        let err = SourcesFile::load(Some(Path::new("/nonexistent/sources.yaml"))).unwrap_err();
        assert!(matches!(err, HarvestError::Config(_)));
    }
}
