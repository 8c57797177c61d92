//! RSS 2.0 feed extraction.
//!
//! Feed items map directly onto [`RawFields`]: `title`, `link`,
//! `description` (HTML reduced to text), `pubDate`, the first `category`,
//! and `enclosure@url` as the image.

use crate::error::Result;
use crate::models::RawFields;
use crate::scrapers::html::resolve_link;
use crate::utils::{collapse_whitespace, parse_published_date};
use scraper::Html;
use serde::Deserialize;
use tracing::debug;
use url::Url;

#[derive(Debug, Deserialize)]
struct Rss {
    channel: Channel,
}

#[derive(Debug, Deserialize)]
struct Channel {
    #[serde(rename = "item", default)]
    items: Vec<Item>,
}

#[derive(Debug, Deserialize)]
struct Item {
    title: Option<String>,
    link: Option<String>,
    description: Option<String>,
    #[serde(rename = "pubDate")]
    pub_date: Option<String>,
    #[serde(default)]
    category: Vec<String>,
    enclosure: Option<Enclosure>,
}

#[derive(Debug, Deserialize)]
struct Enclosure {
    #[serde(rename = "@url")]
    url: String,
}

/// HTML entities that feeds routinely leak into XML, where they are undefined.
fn scrub_html_entities(xml: &str) -> String {
    xml.replace("&nbsp;", " ")
        .replace("&ndash;", "-")
        .replace("&mdash;", "-")
        .replace("&ldquo;", "\"")
        .replace("&rdquo;", "\"")
        .replace("&lsquo;", "'")
        .replace("&rsquo;", "'")
        .replace("&hellip;", "...")
}

fn html_to_text(fragment: &str) -> String {
    let doc = Html::parse_fragment(fragment);
    collapse_whitespace(&doc.root_element().text().collect::<Vec<_>>().join(" "))
}

/// Parse a feed body into raw item fields.
pub fn extract_items(body: &str, feed_url: &Url) -> Result<Vec<RawFields>> {
    let rss: Rss = quick_xml::de::from_str(&scrub_html_entities(body))?;

    let items: Vec<RawFields> = rss
        .channel
        .items
        .into_iter()
        .map(|it| RawFields {
            title: collapse_whitespace(it.title.as_deref().unwrap_or_default()),
            description: it.description.as_deref().map(html_to_text).unwrap_or_default(),
            link: it
                .link
                .as_deref()
                .and_then(|l| resolve_link(feed_url, l))
                .unwrap_or_default(),
            image_url: it
                .enclosure
                .and_then(|e| resolve_link(feed_url, &e.url))
                .unwrap_or_default(),
            published: it.pub_date.as_deref().and_then(parse_published_date),
            organizer: String::new(),
            location: String::new(),
            category: it
                .category
                .into_iter()
                .map(|c| collapse_whitespace(&c))
                .find(|c| !c.is_empty())
                .unwrap_or_default()
                .to_lowercase(),
        })
        .collect();

    debug!(%feed_url, items = items.len(), "Parsed feed");
    Ok(items)
}
