//! Data models for harvested content.
//!
//! Content moves through three shapes during a cycle:
//! - [`TransientItem`]: what a collector extracted from one page element,
//!   discarded once the cycle ends
//! - [`NormalizedItem`]: a classified, bounded draft ready for the writer
//! - [`ContentRecord`]: the persisted [`NewsRecord`] or [`EventRecord`]
//!
//! Every shape carries the item's fingerprint as `external_id`, which is
//! the only key used for deduplication.

use crate::fingerprint::fingerprint;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Whether an item is listed as an event or as a news article.
///
/// Only the exact tag `"event"` selects [`ContentType::Event`]. Anything
/// else, including an empty tag, is news.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", rename_all = "lowercase")]
pub enum ContentType {
    Event,
    #[default]
    News,
}

impl From<&str> for ContentType {
    fn from(tag: &str) -> Self {
        if tag == "event" {
            ContentType::Event
        } else {
            ContentType::News
        }
    }
}

impl From<String> for ContentType {
    fn from(tag: String) -> Self {
        ContentType::from(tag.as_str())
    }
}

/// The two persisted record kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordKind {
    News,
    Event,
}

impl fmt::Display for RecordKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecordKind::News => f.write_str("news"),
            RecordKind::Event => f.write_str("event"),
        }
    }
}

/// Fields read from a page before any validation.
///
/// Produced by the extractors in [`crate::scrapers`]. Every field may be
/// empty; [`TransientItem::from_fields`] decides what survives.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawFields {
    pub title: String,
    pub description: String,
    pub link: String,
    pub image_url: String,
    pub published: Option<DateTime<Utc>>,
    pub organizer: String,
    pub location: String,
    pub category: String,
}

/// Per-source defaults stamped onto every item a collector emits.
#[derive(Debug, Clone, Default)]
pub struct SourceDefaults {
    pub source_name: String,
    pub content_type: ContentType,
    pub category: String,
    pub tags: String,
}

/// An in-memory content item produced by one collector during one cycle.
#[derive(Debug, Clone, PartialEq)]
pub struct TransientItem {
    pub title: String,
    pub description: String,
    pub link: String,
    pub source_name: String,
    pub source_url: String,
    pub fingerprint: String,
    pub publish_date: DateTime<Utc>,
    pub image_url: String,
    pub tags: String,
    pub organizer: String,
    pub location: String,
    pub content_type: ContentType,
    pub category: String,
}

impl TransientItem {
    /// Build an item from extracted fields, or `None` when the title or the
    /// link is blank after trimming.
    ///
    /// The link is expected to be absolute already; the fingerprint is
    /// derived from it here so every collector uses the same key.
    pub fn from_fields(
        raw: RawFields,
        defaults: &SourceDefaults,
        harvested_at: DateTime<Utc>,
    ) -> Option<Self> {
        let title = raw.title.trim();
        let link = raw.link.trim();
        if title.is_empty() || link.is_empty() {
            return None;
        }

        let category = match raw.category.trim() {
            "" => defaults.category.clone(),
            c => c.to_string(),
        };

        Some(TransientItem {
            title: title.to_string(),
            description: raw.description.trim().to_string(),
            link: link.to_string(),
            source_name: defaults.source_name.clone(),
            source_url: link.to_string(),
            fingerprint: fingerprint(link),
            publish_date: raw.published.unwrap_or(harvested_at),
            image_url: raw.image_url.trim().to_string(),
            tags: defaults.tags.clone(),
            organizer: raw.organizer.trim().to_string(),
            location: raw.location.trim().to_string(),
            content_type: defaults.content_type,
            category,
        })
    }
}

/// A news article ready to be written.
#[derive(Debug, Clone, PartialEq)]
pub struct NewsDraft {
    pub title: String,
    pub slug: String,
    pub excerpt: String,
    pub category: String,
    pub source: String,
    pub source_url: String,
    pub external_id: String,
    pub image_url: String,
    pub tags: String,
    pub published_at: DateTime<Utc>,
}

/// An event listing ready to be written.
#[derive(Debug, Clone, PartialEq)]
pub struct EventDraft {
    pub title: String,
    pub slug: String,
    pub description: String,
    pub category: String,
    pub organizer: String,
    pub location: String,
    pub is_virtual: bool,
    pub link: String,
    pub start_date: DateTime<Utc>,
    pub source: String,
    pub source_url: String,
    pub external_id: String,
    pub image_url: String,
    pub tags: String,
}

/// Output of the normalizer: one draft of the record shape it was classified as.
#[derive(Debug, Clone, PartialEq)]
pub enum NormalizedItem {
    News(NewsDraft),
    Event(EventDraft),
}

impl NormalizedItem {
    pub fn kind(&self) -> RecordKind {
        match self {
            NormalizedItem::News(_) => RecordKind::News,
            NormalizedItem::Event(_) => RecordKind::Event,
        }
    }

    pub fn external_id(&self) -> &str {
        match self {
            NormalizedItem::News(n) => &n.external_id,
            NormalizedItem::Event(e) => &e.external_id,
        }
    }

    pub fn title(&self) -> &str {
        match self {
            NormalizedItem::News(n) => &n.title,
            NormalizedItem::Event(e) => &e.title,
        }
    }

    /// Turn the draft into a full record with a fresh id, published by default.
    pub fn into_record(self, now: DateTime<Utc>) -> ContentRecord {
        match self {
            NormalizedItem::News(d) => ContentRecord::News(NewsRecord {
                id: Uuid::new_v4(),
                title: d.title,
                slug: d.slug,
                content: d.excerpt.clone(),
                excerpt: d.excerpt,
                author: String::new(),
                category: d.category,
                source: d.source,
                source_url: d.source_url,
                external_id: d.external_id,
                image_url: d.image_url,
                tags: d.tags,
                is_public: true,
                published_at: d.published_at,
                created_at: now,
                updated_at: now,
            }),
            NormalizedItem::Event(d) => ContentRecord::Event(EventRecord {
                id: Uuid::new_v4(),
                title: d.title,
                slug: d.slug,
                description: d.description,
                category: d.category,
                organizer: d.organizer,
                location: d.location,
                is_virtual: d.is_virtual,
                link: d.link,
                start_date: d.start_date,
                end_date: None,
                source: d.source,
                source_url: d.source_url,
                external_id: d.external_id,
                image_url: d.image_url,
                tags: d.tags,
                is_published: true,
                created_at: now,
                updated_at: now,
            }),
        }
    }
}

/// A persisted news article.
///
/// `content` starts out as a copy of the excerpt; editors may replace it
/// later, the harvester never does.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewsRecord {
    pub id: Uuid,
    pub title: String,
    pub slug: String,
    pub excerpt: String,
    pub content: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub author: String,
    pub category: String,
    pub source: String,
    pub source_url: String,
    pub external_id: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub image_url: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub tags: String,
    pub is_public: bool,
    pub published_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A persisted event listing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventRecord {
    pub id: Uuid,
    pub title: String,
    pub slug: String,
    pub description: String,
    pub category: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub organizer: String,
    pub location: String,
    pub is_virtual: bool,
    pub link: String,
    pub start_date: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_date: Option<DateTime<Utc>>,
    pub source: String,
    pub source_url: String,
    pub external_id: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub image_url: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub tags: String,
    pub is_published: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A record of either kind, as handed to the storage collaborator.
#[derive(Debug, Clone, PartialEq)]
pub enum ContentRecord {
    News(NewsRecord),
    Event(EventRecord),
}

impl ContentRecord {
    pub fn kind(&self) -> RecordKind {
        match self {
            ContentRecord::News(_) => RecordKind::News,
            ContentRecord::Event(_) => RecordKind::Event,
        }
    }

    pub fn source(&self) -> &str {
        match self {
            ContentRecord::News(n) => &n.source,
            ContentRecord::Event(e) => &e.source,
        }
    }

    pub fn external_id(&self) -> &str {
        match self {
            ContentRecord::News(n) => &n.external_id,
            ContentRecord::Event(e) => &e.external_id,
        }
    }

    pub fn slug(&self) -> &str {
        match self {
            ContentRecord::News(n) => &n.slug,
            ContentRecord::Event(e) => &e.slug,
        }
    }
}
