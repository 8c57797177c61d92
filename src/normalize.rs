//! Classification and shaping of harvested items.
//!
//! [`normalize`] turns a [`TransientItem`] into the record shape it belongs
//! to, derives its slug, and bounds every field to the sizes the stored
//! records allow.

use crate::models::{ContentType, EventDraft, NewsDraft, NormalizedItem, TransientItem};
use crate::utils::{replace_whitespace_runs, truncate_chars};

pub const MAX_SLUG_LEN: usize = 200;
const MAX_NEWS_TITLE_LEN: usize = 500;
const MAX_EVENT_TITLE_LEN: usize = 255;
const MAX_CATEGORY_LEN: usize = 50;
const MAX_SOURCE_LEN: usize = 100;
const MAX_NAME_LEN: usize = 255;
const MAX_URL_LEN: usize = 500;

/// Derive a URL slug from a title.
///
/// Lowercases, replaces each whitespace run with one hyphen, strips single
/// and double quotes, then keeps at most [`MAX_SLUG_LEN`] characters.
/// Uniqueness is left to the store.
///
/// # Examples
///
/// ```ignore
/// assert_eq!(slugify("Kenya's  \"Silicon Savannah\""), "kenyas-silicon-savannah");
/// ```
pub fn slugify(title: &str) -> String {
    let slug = replace_whitespace_runs(&title.to_lowercase(), "-").replace(['\'', '"'], "");
    truncate_chars(&slug, MAX_SLUG_LEN)
}

/// Whether an event location describes an online event.
pub fn is_virtual_location(location: &str) -> bool {
    location.to_lowercase().contains("virtual")
}

/// Classify an item and shape it for the writer.
pub fn normalize(item: TransientItem) -> NormalizedItem {
    let category = truncate_chars(&item.category, MAX_CATEGORY_LEN);
    let source = truncate_chars(&item.source_name, MAX_SOURCE_LEN);
    let source_url = truncate_chars(&item.source_url, MAX_URL_LEN);
    let image_url = truncate_chars(&item.image_url, MAX_URL_LEN);

    match item.content_type {
        ContentType::News => NormalizedItem::News(NewsDraft {
            slug: slugify(&item.title),
            title: truncate_chars(&item.title, MAX_NEWS_TITLE_LEN),
            excerpt: item.description,
            category,
            source,
            source_url,
            external_id: item.fingerprint,
            image_url,
            tags: item.tags,
            published_at: item.publish_date,
        }),
        ContentType::Event => NormalizedItem::Event(EventDraft {
            slug: slugify(&item.title),
            title: truncate_chars(&item.title, MAX_EVENT_TITLE_LEN),
            description: item.description,
            category,
            organizer: truncate_chars(&item.organizer, MAX_NAME_LEN),
            is_virtual: is_virtual_location(&item.location),
            location: truncate_chars(&item.location, MAX_NAME_LEN),
            link: truncate_chars(&item.link, MAX_URL_LEN),
            start_date: item.publish_date,
            source,
            source_url,
            external_id: item.fingerprint,
            image_url,
            tags: item.tags,
        }),
    }
}
