//! Stable content fingerprints.
//!
//! A fingerprint is a version-5 UUID in the URL namespace, derived from the
//! item's canonical link alone. Titles and descriptions do not contribute:
//! a retitled page keeps its fingerprint.

use uuid::Uuid;

/// Derive the dedup key for a canonical link.
///
/// # Examples
///
/// ```ignore
/// assert_eq!(fingerprint("https://a.example/x"), fingerprint("https://a.example/x"));
/// ```
pub fn fingerprint(link: &str) -> String {
    Uuid::new_v5(&Uuid::NAMESPACE_URL, link.as_bytes()).to_string()
}
