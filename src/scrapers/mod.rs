//! Source collectors.
//!
//! One [`SourceCollector`] exists per configured source. A collection run
//! visits the source's seed URLs one after another, waits out the source's
//! politeness delay before each request, and extracts candidate items with
//! the source's extractor:
//!
//! | Format | Module | Input |
//! |--------|--------|-------|
//! | `html` | [`html`] | Listing pages, read with CSS selectors |
//! | `rss`  | [`rss`]  | RSS 2.0 feeds |
//!
//! Redirects are followed only to allow-listed hosts, and links are
//! resolved against the URL that served the final body.
//!
//! A page that fails to fetch or parse is logged and skipped; it never
//! stops the remaining pages, and a collector never returns an error.
//! Items without a title or link are dropped before they leave the
//! collector.

pub mod html;
pub mod rss;

use crate::config::{SourceConfig, SourceFormat};
use crate::error::{HarvestError, Result};
use crate::fetch::{Fetched, PageFetcher, RateLimiter};
use crate::models::{RawFields, SourceDefaults, TransientItem};
use chrono::Utc;
use futures::stream::{self, StreamExt};
use html::ExtractionRules;
use itertools::Itertools;
use std::time::Duration;
use tracing::{debug, info, instrument, warn};
use url::Url;

/// Redirect hops followed per seed before the page is given up.
const MAX_REDIRECTS: usize = 10;

#[derive(Debug)]
enum Extractor {
    Html(ExtractionRules),
    Rss,
}

/// What one collection run produced.
#[derive(Debug, Default)]
pub struct Collection {
    pub items: Vec<TransientItem>,
    pub pages_visited: usize,
    pub pages_failed: usize,
    /// Extracted candidates dropped for a blank title or link.
    pub dropped: usize,
}

#[derive(Debug)]
pub struct SourceCollector {
    defaults: SourceDefaults,
    allowed_domains: Vec<String>,
    seed_urls: Vec<Url>,
    user_agent: String,
    limiter: RateLimiter,
    extractor: Extractor,
}

impl SourceCollector {
    /// Build a collector, rejecting anything that could only fail at run time:
    /// unparsable or off-list seed URLs and selectors that do not compile.
    pub fn from_config(cfg: &SourceConfig, default_user_agent: &str) -> Result<Self> {
        let allowed_domains: Vec<String> = cfg
            .allowed_domains
            .iter()
            .map(|d| d.trim().to_ascii_lowercase())
            .filter(|d| !d.is_empty())
            .collect();

        let mut seed_urls = Vec::with_capacity(cfg.seed_urls.len());
        for raw in &cfg.seed_urls {
            let url = Url::parse(raw.trim()).map_err(|source| HarvestError::Url {
                url: raw.clone(),
                source,
            })?;
            if !matches!(url.scheme(), "http" | "https") {
                return Err(HarvestError::Config(format!(
                    "seed URL {url} of source {:?} is not http(s)",
                    cfg.name
                )));
            }
            if !host_allowed(&allowed_domains, &url) {
                return Err(HarvestError::DomainNotAllowed {
                    url: url.to_string(),
                    source_name: cfg.name.clone(),
                });
            }
            seed_urls.push(url);
        }

        let extractor = match cfg.format {
            SourceFormat::Rss => Extractor::Rss,
            SourceFormat::Html => {
                let rules = cfg.rules.as_ref().ok_or_else(|| {
                    HarvestError::Config(format!("html source {:?} needs extraction rules", cfg.name))
                })?;
                Extractor::Html(ExtractionRules::compile(rules)?)
            }
        };

        Ok(Self {
            defaults: SourceDefaults {
                source_name: cfg.name.trim().to_string(),
                content_type: cfg.content_type,
                category: cfg.category.clone(),
                tags: cfg.tags.clone(),
            },
            allowed_domains,
            seed_urls,
            user_agent: cfg
                .user_agent
                .clone()
                .unwrap_or_else(|| default_user_agent.to_string()),
            limiter: RateLimiter::new(
                Duration::from_millis(cfg.delay_ms),
                Duration::from_millis(cfg.jitter_ms),
            ),
            extractor,
        })
    }

    pub fn name(&self) -> &str {
        &self.defaults.source_name
    }

    /// Visit every seed URL in order and return the valid items found.
    ///
    /// Pages are fetched one at a time, each after the source's politeness
    /// delay. Redirects are followed hop by hop, and only while the target
    /// stays on the allow-list. A page that fails to fetch or parse is
    /// logged and counted, and the remaining seeds are still visited.
    ///
    /// # Arguments
    ///
    /// * `fetcher` - Transport used for every request of this run
    ///
    /// # Returns
    ///
    /// A [`Collection`] holding the items that passed the title/link gate,
    /// first occurrence per fingerprint, plus page and drop counters.
    #[instrument(level = "info", skip_all, fields(source = %self.name()))]
    pub async fn collect<F: PageFetcher + ?Sized>(&self, fetcher: &F) -> Collection {
        info!(pages = self.seed_urls.len(), "Scraping source");
        let harvested_at = Utc::now();

        let pages: Vec<Option<Vec<RawFields>>> = stream::iter(&self.seed_urls)
            .then(|url| async move {
                match self.collect_page(fetcher, url).await {
                    Ok(raw) => Some(raw),
                    Err(e) => {
                        warn!(%url, error = %e, "Page skipped");
                        None
                    }
                }
            })
            .collect()
            .await;

        let mut collection = Collection {
            pages_visited: pages.len(),
            pages_failed: pages.iter().filter(|p| p.is_none()).count(),
            ..Default::default()
        };

        let candidates: Vec<RawFields> = pages.into_iter().flatten().flatten().collect();
        let extracted = candidates.len();
        let valid: Vec<TransientItem> = candidates
            .into_iter()
            .filter_map(|raw| TransientItem::from_fields(raw, &self.defaults, harvested_at))
            .collect();
        collection.dropped = extracted - valid.len();

        collection.items = valid
            .into_iter()
            .unique_by(|item| item.fingerprint.clone())
            .collect();

        info!(
            items = collection.items.len(),
            dropped = collection.dropped,
            pages_failed = collection.pages_failed,
            "Collected source items"
        );
        collection
    }

    /// Fetch one seed, following allow-listed redirects, and extract it
    /// against the URL that actually served the body.
    async fn collect_page<F: PageFetcher + ?Sized>(
        &self,
        fetcher: &F,
        seed: &Url,
    ) -> Result<Vec<RawFields>> {
        let mut url = seed.clone();
        for _ in 0..=MAX_REDIRECTS {
            if !self.allows(&url) {
                return Err(HarvestError::DomainNotAllowed {
                    url: url.to_string(),
                    source_name: self.name().to_string(),
                });
            }
            self.limiter.wait().await;

            info!(%url, "Visiting");
            let fetched = fetcher.fetch(&url, &self.user_agent).await;
            self.limiter.mark();

            match fetched? {
                Fetched::Page(body) => {
                    let raw = match &self.extractor {
                        Extractor::Html(rules) => html::extract_items(&body, &url, rules),
                        Extractor::Rss => rss::extract_items(&body, &url)?,
                    };
                    debug!(%url, candidates = raw.len(), "Page extracted");
                    return Ok(raw);
                }
                Fetched::Redirect(target) => {
                    debug!(from = %url, to = %target, "Following redirect");
                    url = target;
                }
            }
        }
        Err(HarvestError::TooManyRedirects {
            url: seed.to_string(),
        })
    }

    fn allows(&self, url: &Url) -> bool {
        host_allowed(&self.allowed_domains, url)
    }
}

fn host_allowed(allowed: &[String], url: &Url) -> bool {
    url.host_str()
        .is_some_and(|h| allowed.iter().any(|d| d.eq_ignore_ascii_case(h)))
}
