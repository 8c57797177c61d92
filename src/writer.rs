//! Create-if-absent writer.
//!
//! For each normalized item the writer asks the store whether a record of
//! the same kind already carries the item's fingerprint. If one does, the
//! item is dropped; existing records are never updated. Otherwise a full
//! record is built and created once.
//!
//! The count-then-create pair is not atomic. The store's unique
//! constraint on `(source, external_id)` is what actually prevents
//! duplicates; the count only avoids pointless writes.

use crate::error::StoreError;
use crate::models::NormalizedItem;
use crate::store::ContentStore;
use crate::utils::truncate_for_log;
use chrono::Utc;
use std::sync::Arc;
use tracing::{debug, error, info, instrument};

#[derive(Debug)]
pub struct Writer<S> {
    store: Arc<S>,
}

impl<S> Clone for Writer<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
        }
    }
}

impl<S: ContentStore> Writer<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Create the item unless its fingerprint is already stored.
    ///
    /// The existence check is scoped to the item's kind, so a news article
    /// and an event sharing a link are stored independently. An existing
    /// record is left untouched.
    ///
    /// # Arguments
    ///
    /// * `item` - A normalized news or event draft
    ///
    /// # Returns
    ///
    /// `Ok(true)` when a record was created, `Ok(false)` when one already
    /// existed, or the [`StoreError`] from the check or the create. Errors
    /// are logged here; the caller skips the item and carries on.
    #[instrument(level = "debug", skip_all, fields(kind = %item.kind(), fingerprint = %item.external_id()))]
    pub async fn upsert(&self, item: NormalizedItem) -> Result<bool, StoreError> {
        let kind = item.kind();
        let title = truncate_for_log(item.title(), 80);

        let existing = self
            .store
            .count_by_external_key(kind, item.external_id())
            .await
            .inspect_err(|e| error!(%kind, %title, error = %e, "Existence check failed"))?;
        if existing > 0 {
            debug!(%kind, %title, "Already exists");
            return Ok(false);
        }

        let record = item.into_record(Utc::now());
        match self.store.create(record).await {
            Ok(()) => {
                info!(%kind, %title, "Saved new record");
                Ok(true)
            }
            Err(e) => {
                error!(%kind, %title, error = %e, "Failed to save record");
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ContentType, RawFields, RecordKind, SourceDefaults, TransientItem};
    use crate::normalize::normalize;
    use crate::store::MemoryStore;
    use crate::store::test_support::news_draft;

    fn scraped(title: &str, description: &str, link: &str, content_type: ContentType) -> NormalizedItem {
        let defaults = SourceDefaults {
            source_name: "business-daily".to_string(),
            content_type,
            category: "article".to_string(),
            tags: String::new(),
        };
        let raw = RawFields {
            title: title.to_string(),
            description: description.to_string(),
            link: link.to_string(),
            ..Default::default()
        };
        normalize(TransientItem::from_fields(raw, &defaults, Utc::now()).unwrap())
    }

    #[tokio::test]
    async fn test_same_link_is_created_once() {
        let store = Arc::new(MemoryStore::new());
        let writer = Writer::new(Arc::clone(&store));
        let link = "https://www.businessdailyafrica.com/bd/corporate/technology/story-1";

        let first = writer
            .upsert(scraped("Safaricom posts profit", "First take", link, ContentType::News))
            .await
            .unwrap();
        let second = writer
            .upsert(scraped("Safaricom posts record profit", "Updated", link, ContentType::News))
            .await
            .unwrap();

        assert!(first);
        assert!(!second);
        let news = store.news().await;
        assert_eq!(news.len(), 1);
        assert_eq!(news[0].title, "Safaricom posts profit");
        assert_eq!(news[0].excerpt, "First take");
    }

    #[tokio::test]
    async fn test_events_and_news_are_checked_separately() {
        let store = Arc::new(MemoryStore::new());
        let writer = Writer::new(Arc::clone(&store));
        let link = "https://african.business/events/summit";

        assert!(writer
            .upsert(scraped("Summit", "", link, ContentType::Event))
            .await
            .unwrap());
        assert!(!writer
            .upsert(scraped("Summit", "", link, ContentType::Event))
            .await
            .unwrap());
        assert_eq!(store.events().await.len(), 1);
        assert!(store.news().await.is_empty());
    }

    #[tokio::test]
    async fn test_slug_collision_reports_error_without_creating() {
        let store = Arc::new(MemoryStore::new());
        let writer = Writer::new(Arc::clone(&store));

        assert!(writer.upsert(news_draft("techcabal", "fp-1", "same")).await.unwrap());
        let err = writer
            .upsert(news_draft("techcabal", "fp-2", "same"))
            .await
            .unwrap_err();

        assert!(matches!(err, StoreError::SlugTaken { .. }));
        assert_eq!(
            store.count_by_external_key(RecordKind::News, "fp-2").await.unwrap(),
            0
        );
    }
}
