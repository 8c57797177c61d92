//! Storage collaborator for harvested records.
//!
//! The harvester only needs two operations from storage, both on
//! [`ContentStore`]: count records by external key, and create a record.
//! The store, not the writer, is the authority on uniqueness. `create`
//! rejects a second record with the same `(source, external_id)` or the
//! same slug within a kind, even if two writers raced past the count check.
//!
//! # Implementations
//!
//! - [`MemoryStore`]: process-local tables, used by tests and `--once` dry runs
//! - [`JsonFileStore`]: the same tables persisted to the data directory

pub mod json;

pub use json::JsonFileStore;

use crate::error::StoreError;
use crate::models::{ContentRecord, EventRecord, NewsRecord, RecordKind};
use async_trait::async_trait;
use std::collections::HashSet;
use tokio::sync::Mutex;

/// Record counts per kind, for summaries.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StoreTotals {
    pub news: usize,
    pub events: usize,
}

#[async_trait]
pub trait ContentStore: Send + Sync {
    /// Number of records of `kind` whose external id equals `external_id`.
    async fn count_by_external_key(
        &self,
        kind: RecordKind,
        external_id: &str,
    ) -> Result<u64, StoreError>;

    /// Insert a new record, enforcing the per-kind unique constraints.
    async fn create(&self, record: ContentRecord) -> Result<(), StoreError>;

    async fn totals(&self) -> Result<StoreTotals, StoreError>;
}

/// Both record tables plus the unique indexes over them.
#[derive(Debug, Default)]
pub(crate) struct Tables {
    pub(crate) news: Vec<NewsRecord>,
    pub(crate) events: Vec<EventRecord>,
    external_keys: HashSet<(RecordKind, String, String)>,
    slugs: HashSet<(RecordKind, String)>,
}

impl Tables {
    pub(crate) fn from_records(news: Vec<NewsRecord>, events: Vec<EventRecord>) -> Self {
        let mut tables = Tables::default();
        for n in &news {
            tables.index(RecordKind::News, &n.source, &n.external_id, &n.slug);
        }
        for e in &events {
            tables.index(RecordKind::Event, &e.source, &e.external_id, &e.slug);
        }
        tables.news = news;
        tables.events = events;
        tables
    }

    fn index(&mut self, kind: RecordKind, source: &str, external_id: &str, slug: &str) {
        self.external_keys
            .insert((kind, source.to_string(), external_id.to_string()));
        self.slugs.insert((kind, slug.to_string()));
    }

    pub(crate) fn count_by_external_key(&self, kind: RecordKind, external_id: &str) -> u64 {
        let n = match kind {
            RecordKind::News => self
                .news
                .iter()
                .filter(|r| r.external_id == external_id)
                .count(),
            RecordKind::Event => self
                .events
                .iter()
                .filter(|r| r.external_id == external_id)
                .count(),
        };
        n as u64
    }

    /// Check both unique constraints, then insert.
    pub(crate) fn insert(&mut self, record: ContentRecord) -> Result<(), StoreError> {
        let kind = record.kind();
        let key = (
            kind,
            record.source().to_string(),
            record.external_id().to_string(),
        );
        if self.external_keys.contains(&key) {
            return Err(StoreError::DuplicateExternalKey {
                kind,
                source_name: key.1,
                external_id: key.2,
            });
        }
        let slug_key = (kind, record.slug().to_string());
        if self.slugs.contains(&slug_key) {
            return Err(StoreError::SlugTaken {
                kind,
                slug: slug_key.1,
            });
        }

        self.external_keys.insert(key);
        self.slugs.insert(slug_key);
        match record {
            ContentRecord::News(n) => self.news.push(n),
            ContentRecord::Event(e) => self.events.push(e),
        }
        Ok(())
    }

    /// Undo the most recent insert of `kind`, used when persisting it failed.
    pub(crate) fn rollback_last(&mut self, kind: RecordKind) {
        let removed = match kind {
            RecordKind::News => self
                .news
                .pop()
                .map(|n| (n.source, n.external_id, n.slug)),
            RecordKind::Event => self
                .events
                .pop()
                .map(|e| (e.source, e.external_id, e.slug)),
        };
        if let Some((source, external_id, slug)) = removed {
            self.external_keys.remove(&(kind, source, external_id));
            self.slugs.remove(&(kind, slug));
        }
    }

    pub(crate) fn totals(&self) -> StoreTotals {
        StoreTotals {
            news: self.news.len(),
            events: self.events.len(),
        }
    }
}

/// Process-local store. Nothing survives a restart.
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    #[cfg(test)]
    pub async fn news(&self) -> Vec<NewsRecord> {
        self.tables.lock().await.news.clone()
    }

    #[cfg(test)]
    pub async fn events(&self) -> Vec<EventRecord> {
        self.tables.lock().await.events.clone()
    }
}

#[async_trait]
impl ContentStore for MemoryStore {
    async fn count_by_external_key(
        &self,
        kind: RecordKind,
        external_id: &str,
    ) -> Result<u64, StoreError> {
        Ok(self.tables.lock().await.count_by_external_key(kind, external_id))
    }

    async fn create(&self, record: ContentRecord) -> Result<(), StoreError> {
        self.tables.lock().await.insert(record)
    }

    async fn totals(&self) -> Result<StoreTotals, StoreError> {
        Ok(self.tables.lock().await.totals())
    }
}


#[cfg(test)]
mod tests {
    use super::test_support::{event_draft, news_draft};
    use super::*;
    use chrono::Utc;

    #[tokio::test]
    async fn test_create_then_count() {
        let store = MemoryStore::new();
        store
            .create(news_draft("techcabal", "fp-1", "a").into_record(Utc::now()))
            .await
            .unwrap();

        assert_eq!(store.count_by_external_key(RecordKind::News, "fp-1").await.unwrap(), 1);
        assert_eq!(store.count_by_external_key(RecordKind::Event, "fp-1").await.unwrap(), 0);
        assert_eq!(store.count_by_external_key(RecordKind::News, "fp-2").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_duplicate_external_key_is_rejected() {
        let store = MemoryStore::new();
        store
            .create(news_draft("techcabal", "fp-1", "a").into_record(Utc::now()))
            .await
            .unwrap();
        let err = store
            .create(news_draft("techcabal", "fp-1", "b").into_record(Utc::now()))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::DuplicateExternalKey { .. }));
        assert_eq!(store.news().await.len(), 1);
    }

    #[tokio::test]
    async fn test_same_key_allowed_across_kinds_and_sources() {
        let store = MemoryStore::new();
        store
            .create(news_draft("techcabal", "fp-1", "a").into_record(Utc::now()))
            .await
            .unwrap();
        store
            .create(news_draft("business-daily", "fp-1", "b").into_record(Utc::now()))
            .await
            .unwrap();
        store
            .create(event_draft("techcabal", "fp-1", "a").into_record(Utc::now()))
            .await
            .unwrap();
        assert_eq!(
            store.totals().await.unwrap(),
            StoreTotals { news: 2, events: 1 }
        );
    }

    #[tokio::test]
    async fn test_slug_collision_is_rejected() {
        let store = MemoryStore::new();
        store
            .create(news_draft("techcabal", "fp-1", "same-title").into_record(Utc::now()))
            .await
            .unwrap();
        let err = store
            .create(news_draft("techcabal", "fp-2", "same-title").into_record(Utc::now()))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::SlugTaken { .. }));
    }

    #[test]
    fn test_rollback_last_frees_keys() {
        let mut tables = Tables::default();
        tables
            .insert(event_draft("techcabal", "fp-1", "a").into_record(Utc::now()))
            .unwrap();
        tables.rollback_last(RecordKind::Event);
        assert_eq!(tables.totals(), StoreTotals::default());
        tables
            .insert(event_draft("techcabal", "fp-1", "a").into_record(Utc::now()))
            .unwrap();
    }
}
