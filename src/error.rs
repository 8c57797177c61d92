//! Error types for the harvesting pipeline.
//!
//! Two enums cover the whole crate:
//! - [`HarvestError`]: anything that can go wrong while configuring,
//!   fetching, or extracting
//! - [`StoreError`]: failures reported by a [`ContentStore`](crate::store::ContentStore)
//!
//! None of these are fatal once the worker runs. The cycle logs them and
//! moves on to the next page, item, or source.

use crate::models::RecordKind;
use thiserror::Error;

/// Errors raised while configuring sources, fetching pages, or parsing them.
#[derive(Debug, Error)]
pub enum HarvestError {
    #[error("request to {url} failed: {source}")]
    Http {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("{url} responded with HTTP {status}")]
    Status { url: String, status: u16 },

    #[error("{url} redirected too many times")]
    TooManyRedirects { url: String },

    #[error("{url} is outside the allow-list of source {source_name}")]
    DomainNotAllowed { url: String, source_name: String },

    #[error("invalid URL {url:?}: {source}")]
    Url {
        url: String,
        #[source]
        source: url::ParseError,
    },

    #[error("invalid {field} selector {selector:?}: {message}")]
    Selector {
        field: &'static str,
        selector: String,
        message: String,
    },

    #[error("feed parse error: {0}")]
    Feed(#[from] quick_xml::DeError),

    #[error("configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),
}

/// Errors reported by the storage collaborator.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{kind} with external id {external_id} from {source_name} already exists")]
    DuplicateExternalKey {
        kind: RecordKind,
        source_name: String,
        external_id: String,
    },

    #[error("{kind} slug {slug:?} is already taken")]
    SlugTaken { kind: RecordKind, slug: String },

    #[error("store I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("store serialization failed: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T, E = HarvestError> = std::result::Result<T, E>;
