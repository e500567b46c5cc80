use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};

use crate::util::{collapse_whitespace, normalize_text};

/// Composite fingerprints truncate the content field to this many Unicode
/// characters (code points, not bytes) to bound hash-input size.
const COMPOSITE_CONTENT_CHARS: usize = 500;

/// Counter feeding the nonce for identity-less items, so two of them
/// built in the same nanosecond still fingerprint differently.
static NONCE_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Media attachment declared by a feed entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Enclosure {
    pub url: String,
    pub mime_type: Option<String>,
    pub byte_length: Option<u64>,
}

/// Pre-normalization record emitted by a feed parser.
///
/// Fields arrive exactly as the source declared them — markup, entities,
/// stray whitespace and all. [`RawItem::from_entry`] normalizes them.
#[derive(Debug, Clone, Default)]
pub struct SourceEntry {
    pub guid: Option<String>,
    pub link: Option<String>,
    pub title: Option<String>,
    pub summary: Option<String>,
    pub content: Option<String>,
    pub authors: Vec<String>,
    pub categories: Vec<String>,
    pub enclosure: Option<Enclosure>,
    pub published_at: Option<DateTime<Utc>>,
}

/// Immutable, normalized representation of one extracted feed entry.
///
/// All textual fields have markup stripped, entities decoded, and
/// surrounding whitespace trimmed; a field that normalizes to nothing is
/// absent rather than empty. `content_hash` is the item's deduplication
/// fingerprint, stable across repeated extraction of the same logical
/// entry even when the publisher's whitespace or markup drifts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawItem {
    /// Source-declared unique identifier, authoritative for identity
    /// when present.
    pub guid: Option<String>,
    pub link: Option<String>,
    pub title: Option<String>,
    pub summary: Option<String>,
    pub content: Option<String>,
    pub authors: Vec<String>,
    pub categories: Vec<String>,
    pub enclosure: Option<Enclosure>,
    pub published_at: Option<DateTime<Utc>>,
    /// Hex SHA-256 fingerprint. Derived from `guid` alone when declared,
    /// otherwise from a `link`/`title`/content composite whose content
    /// part is capped at 500 characters — two long articles sharing an
    /// identical 500-char prefix (and no guid) would collide. Known
    /// false-positive risk, accepted.
    pub content_hash: String,
}

impl RawItem {
    /// Normalizes a parser record and computes its fingerprint.
    pub fn from_entry(entry: SourceEntry) -> Self {
        let guid = entry.guid.as_deref().and_then(normalize_text);
        let link = entry.link.as_deref().and_then(normalize_text);
        let title = entry.title.as_deref().and_then(normalize_text);
        let summary = entry.summary.as_deref().and_then(normalize_text);
        let content = entry.content.as_deref().and_then(normalize_text);

        let content_hash = fingerprint(
            guid.as_deref(),
            link.as_deref(),
            title.as_deref(),
            summary.as_deref(),
            content.as_deref(),
        );

        Self {
            guid,
            link,
            title,
            summary,
            content,
            authors: entry
                .authors
                .iter()
                .filter_map(|a| normalize_text(a))
                .collect(),
            categories: entry
                .categories
                .iter()
                .filter_map(|c| normalize_text(c))
                .collect(),
            enclosure: entry.enclosure,
            published_at: entry.published_at,
            content_hash,
        }
    }

    /// An item is deliverable iff it can be identified (guid or link) and
    /// has something to deliver (title, summary, or content).
    pub fn is_valid(&self) -> bool {
        (self.guid.is_some() || self.link.is_some())
            && (self.title.is_some() || self.summary.is_some() || self.content.is_some())
    }
}

/// Deduplication fingerprint per the priority order: guid alone when
/// declared, else a prefixed composite of link, collapsed title, and the
/// first 500 characters of collapsed content-or-summary, else a unique
/// nonce so an identity-less item never aliases another.
fn fingerprint(
    guid: Option<&str>,
    link: Option<&str>,
    title: Option<&str>,
    summary: Option<&str>,
    content: Option<&str>,
) -> String {
    if let Some(guid) = guid {
        let trimmed = guid.trim();
        if !trimmed.is_empty() {
            return hex_digest(&format!("guid:{trimmed}"));
        }
    }

    let mut parts: Vec<String> = Vec::with_capacity(3);
    if let Some(link) = link {
        parts.push(format!("link:{}", link.trim()));
    }
    if let Some(title) = title {
        parts.push(format!("title:{}", collapse_whitespace(title)));
    }
    if let Some(body) = content.or(summary) {
        let collapsed = collapse_whitespace(body);
        let head: String = collapsed.chars().take(COMPOSITE_CONTENT_CHARS).collect();
        parts.push(format!("content:{head}"));
    }

    if parts.is_empty() {
        // No stable identity at all. Hash a unique nonce so the item is
        // never mistaken for a duplicate; it also fails is_valid() and
        // gets dropped upstream.
        let nonce = format!(
            "nonce:{}:{}",
            Utc::now().timestamp_nanos_opt().unwrap_or_default(),
            NONCE_COUNTER.fetch_add(1, Ordering::Relaxed)
        );
        return hex_digest(&nonce);
    }

    hex_digest(&parts.join("|"))
}

fn hex_digest(input: &str) -> String {
    let hash = Sha256::digest(input.as_bytes());
    format!("{hash:x}")
}
