//! JSON file persistence for harvested records.
//!
//! # Layout
//!
//! ```text
//! data_dir/
//! ├── news.json     # array of NewsRecord
//! └── events.json   # array of EventRecord
//! ```
//!
//! Both files are loaded when the store opens, so the unique indexes
//! survive restarts. Every successful create rewrites the affected file
//! through a temporary file and a rename.

use super::{ContentStore, StoreTotals, Tables};
use crate::error::StoreError;
use crate::models::{ContentRecord, RecordKind};
use async_trait::async_trait;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::sync::Mutex;
use tracing::{error, info, instrument};

const NEWS_FILE: &str = "news.json";
const EVENTS_FILE: &str = "events.json";

#[derive(Debug)]
pub struct JsonFileStore {
    dir: PathBuf,
    tables: Mutex<Tables>,
}

impl JsonFileStore {
    /// Open (or initialise) the store rooted at `dir`.
    #[instrument(level = "info", skip_all, fields(dir = %dir.as_ref().display()))]
    pub async fn open(dir: impl AsRef<Path>) -> Result<Self, StoreError> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir).await?;

        let news = read_table(&dir.join(NEWS_FILE)).await?;
        let events = read_table(&dir.join(EVENTS_FILE)).await?;
        info!(news = news.len(), events = events.len(), "Loaded stored records");

        Ok(Self {
            dir,
            tables: Mutex::new(Tables::from_records(news, events)),
        })
    }

    async fn persist(&self, tables: &Tables, kind: RecordKind) -> Result<(), StoreError> {
        match kind {
            RecordKind::News => write_table(&self.dir.join(NEWS_FILE), &tables.news).await,
            RecordKind::Event => write_table(&self.dir.join(EVENTS_FILE), &tables.events).await,
        }
    }
}

async fn read_table<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>, StoreError> {
    match fs::read_to_string(path).await {
        Ok(body) if body.trim().is_empty() => Ok(Vec::new()),
        Ok(body) => Ok(serde_json::from_str(&body)?),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Vec::new()),
        Err(e) => Err(e.into()),
    }
}

async fn write_table<T: Serialize>(path: &Path, rows: &[T]) -> Result<(), StoreError> {
    let json = serde_json::to_string_pretty(rows)?;
    let tmp = path.with_extension("json.tmp");
    fs::write(&tmp, json).await?;
    fs::rename(&tmp, path).await?;
    Ok(())
}

#[async_trait]
impl ContentStore for JsonFileStore {
    async fn count_by_external_key(
        &self,
        kind: RecordKind,
        external_id: &str,
    ) -> Result<u64, StoreError> {
        Ok(self.tables.lock().await.count_by_external_key(kind, external_id))
    }

    async fn create(&self, record: ContentRecord) -> Result<(), StoreError> {
        let kind = record.kind();
        let mut tables = self.tables.lock().await;
        tables.insert(record)?;
        if let Err(e) = self.persist(&tables, kind).await {
            error!(%kind, error = %e, "Failed to persist record; rolling back");
            tables.rollback_last(kind);
            return Err(e);
        }
        Ok(())
    }

    async fn totals(&self) -> Result<StoreTotals, StoreError> {
        Ok(self.tables.lock().await.totals())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::test_support::{event_draft, news_draft};
    use chrono::Utc;

    #[tokio::test]
    async fn test_open_empty_dir() {
        let tmp = tempfile::tempdir().unwrap();
        let store = JsonFileStore::open(tmp.path()).await.unwrap();
        assert_eq!(store.totals().await.unwrap(), StoreTotals::default());
    }

    #[tokio::test]
    async fn test_records_survive_reopen() {
        let tmp = tempfile::tempdir().unwrap();
        {
            let store = JsonFileStore::open(tmp.path()).await.unwrap();
            store
                .create(news_draft("techcabal", "fp-1", "a").into_record(Utc::now()))
                .await
                .unwrap();
            store
                .create(event_draft("techcabal", "fp-2", "b").into_record(Utc::now()))
                .await
                .unwrap();
        }
        assert!(tmp.path().join(NEWS_FILE).exists());
        assert!(!tmp.path().join("news.json.tmp").exists());

        let reopened = JsonFileStore::open(tmp.path()).await.unwrap();
        assert_eq!(
            reopened.totals().await.unwrap(),
            StoreTotals { news: 1, events: 1 }
        );
        assert_eq!(
            reopened
                .count_by_external_key(RecordKind::News, "fp-1")
                .await
                .unwrap(),
            1
        );

        let err = reopened
            .create(news_draft("techcabal", "fp-1", "other").into_record(Utc::now()))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::DuplicateExternalKey { .. }));
    }

    #[tokio::test]
    async fn test_failed_write_rolls_back_insert() {
        let tmp = tempfile::tempdir().unwrap();
        let store = JsonFileStore::open(tmp.path()).await.unwrap();
        let blocker = tmp.path().join(NEWS_FILE);
        std::fs::create_dir(&blocker).unwrap();

        let err = store
            .create(news_draft("techcabal", "fp-1", "a").into_record(Utc::now()))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Io(_)));
        assert_eq!(
            store.count_by_external_key(RecordKind::News, "fp-1").await.unwrap(),
            0
        );
        assert_eq!(store.totals().await.unwrap(), StoreTotals::default());

        std::fs::remove_dir(&blocker).unwrap();
        store
            .create(news_draft("techcabal", "fp-1", "a").into_record(Utc::now()))
            .await
            .unwrap();
        assert_eq!(
            store.count_by_external_key(RecordKind::News, "fp-1").await.unwrap(),
            1
        );

        let reopened = JsonFileStore::open(tmp.path()).await.unwrap();
        assert_eq!(reopened.totals().await.unwrap().news, 1);
    }

    #[tokio::test]
    async fn test_corrupt_file_fails_open() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(tmp.path().join(NEWS_FILE), "{not json").unwrap();
        let err = JsonFileStore::open(tmp.path()).await.unwrap_err();
        assert!(matches!(err, StoreError::Json(_)));
    }
}
