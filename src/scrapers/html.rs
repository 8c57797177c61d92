//! Selector-driven extraction from HTML listing pages.
//!
//! Every element matching the `item` selector is one candidate. Inside it:
//! - text fields are the concatenated, whitespace-collapsed text of *all*
//!   elements matching the field selector
//! - the link is the first `href` under the `link` selector
//! - the image is the first `src` (or lazy-load `data-src`) under `image`
//! - the date comes from a `datetime`/`content` attribute, else the text
//!
//! Relative URLs are resolved against the page URL before anything else
//! sees them.

use crate::config::SelectorRules;
use crate::error::{HarvestError, Result};
use crate::models::RawFields;
use crate::utils::{collapse_whitespace, parse_published_date};
use scraper::{ElementRef, Html, Selector};
use tracing::debug;
use url::Url;

/// Compiled form of [`SelectorRules`].
#[derive(Debug)]
pub struct ExtractionRules {
    item: Selector,
    title: Selector,
    description: Option<Selector>,
    link: Selector,
    image: Option<Selector>,
    date: Option<Selector>,
    organizer: Option<Selector>,
    location: Option<Selector>,
}

fn compile(field: &'static str, css: &str) -> Result<Selector> {
    Selector::parse(css).map_err(|e| HarvestError::Selector {
        field,
        selector: css.to_string(),
        message: e.to_string(),
    })
}

fn compile_opt(field: &'static str, css: Option<&String>) -> Result<Option<Selector>> {
    css.map(|c| compile(field, c)).transpose()
}

impl ExtractionRules {
    pub fn compile(rules: &SelectorRules) -> Result<Self> {
        Ok(Self {
            item: compile("item", &rules.item)?,
            title: compile("title", &rules.title)?,
            description: compile_opt("description", rules.description.as_ref())?,
            link: compile("link", &rules.link)?,
            image: compile_opt("image", rules.image.as_ref())?,
            date: compile_opt("date", rules.date.as_ref())?,
            organizer: compile_opt("organizer", rules.organizer.as_ref())?,
            location: compile_opt("location", rules.location.as_ref())?,
        })
    }
}

/// Resolve `href` against `base` into an absolute http(s) URL without fragment.
///
/// Returns `None` for blank hrefs, same-page anchors, and non-web schemes
/// such as `mailto:` or `javascript:`.
pub fn resolve_link(base: &Url, href: &str) -> Option<String> {
    let href = href.trim();
    if href.is_empty() || href.starts_with('#') {
        return None;
    }
    let mut url = base.join(href).ok()?;
    if !matches!(url.scheme(), "http" | "https") {
        return None;
    }
    url.set_fragment(None);
    Some(url.to_string())
}

fn child_text(el: ElementRef<'_>, sel: Option<&Selector>) -> String {
    let Some(sel) = sel else {
        return String::new();
    };
    let joined = el
        .select(sel)
        .flat_map(|child| child.text())
        .collect::<Vec<_>>()
        .join(" ");
    collapse_whitespace(&joined)
}

fn child_attr(el: ElementRef<'_>, sel: Option<&Selector>, attrs: &[&str]) -> Option<String> {
    let sel = sel?;
    el.select(sel).find_map(|child| {
        attrs
            .iter()
            .find_map(|a| child.value().attr(a))
            .filter(|v| !v.trim().is_empty())
            .map(str::to_string)
    })
}

fn child_date(el: ElementRef<'_>, sel: Option<&Selector>) -> Option<chrono::DateTime<chrono::Utc>> {
    child_attr(el, sel, &["datetime", "content"])
        .and_then(|raw| parse_published_date(&raw))
        .or_else(|| parse_published_date(&child_text(el, sel)))
}

/// Pull raw fields out of every item card on the page.
///
/// Cards missing a title or link are still returned; the required-field
/// gate lives in [`TransientItem::from_fields`](crate::models::TransientItem::from_fields).
pub fn extract_items(body: &str, page_url: &Url, rules: &ExtractionRules) -> Vec<RawFields> {
    let document = Html::parse_document(body);

    let items: Vec<RawFields> = document
        .select(&rules.item)
        .map(|card| RawFields {
            title: child_text(card, Some(&rules.title)),
            description: child_text(card, rules.description.as_ref()),
            link: child_attr(card, Some(&rules.link), &["href"])
                .and_then(|href| resolve_link(page_url, &href))
                .unwrap_or_default(),
            image_url: child_attr(card, rules.image.as_ref(), &["src", "data-src"])
                .and_then(|src| resolve_link(page_url, &src))
                .unwrap_or_default(),
            published: child_date(card, rules.date.as_ref()),
            organizer: child_text(card, rules.organizer.as_ref()),
            location: child_text(card, rules.location.as_ref()),
            category: String::new(),
        })
        .collect();

    debug!(%page_url, cards = items.len(), "Extracted item cards");
    items
}
