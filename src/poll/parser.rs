use std::collections::HashMap;

use crate::item::{Enclosure, SourceEntry};
use crate::poll::poller::{FeedParser, ParseError};

/// [`FeedParser`] backed by `feed-rs`, which handles both RSS and Atom
/// behind one entry model.
///
/// Emits pre-normalization [`SourceEntry`] records; all text cleanup and
/// fingerprinting happens downstream in [`crate::item::RawItem`].
#[derive(Debug, Default, Clone, Copy)]
pub struct FeedRsParser;

impl FeedRsParser {
    pub fn new() -> Self {
        Self
    }
}

impl FeedParser for FeedRsParser {
    fn parse(
        &self,
        body: &[u8],
        _feed_url: &str,
        _options: &HashMap<String, String>,
    ) -> Result<Vec<SourceEntry>, ParseError> {
        let feed = feed_rs::parser::parse(body).map_err(|e| ParseError(e.to_string()))?;

        let entries = feed
            .entries
            .into_iter()
            .map(|entry| {
                let link = entry
                    .links
                    .iter()
                    .find(|l| l.rel.as_deref() != Some("enclosure"))
                    .map(|l| l.href.clone());

                // Atom models attachments as rel="enclosure" links; RSS
                // enclosures surface through the media extension
                let enclosure = entry
                    .links
                    .iter()
                    .find(|l| l.rel.as_deref() == Some("enclosure"))
                    .map(|l| Enclosure {
                        url: l.href.clone(),
                        mime_type: l.media_type.clone(),
                        byte_length: l.length,
                    })
                    .or_else(|| {
                        entry
                            .media
                            .iter()
                            .flat_map(|m| m.content.iter())
                            .find_map(|c| {
                                c.url.as_ref().map(|url| Enclosure {
                                    url: url.to_string(),
                                    mime_type: c.content_type.as_ref().map(|t| t.to_string()),
                                    byte_length: c.size,
                                })
                            })
                    });

                SourceEntry {
                    guid: if entry.id.is_empty() {
                        None
                    } else {
                        Some(entry.id)
                    },
                    link,
                    title: entry.title.map(|t| t.content),
                    summary: entry.summary.map(|s| s.content),
                    content: entry.content.and_then(|c| c.body),
                    authors: entry.authors.into_iter().map(|a| a.name).collect(),
                    categories: entry.categories.into_iter().map(|c| c.term).collect(),
                    enclosure,
                    published_at: entry.published.or(entry.updated),
                }
            })
            .collect();

        Ok(entries)
    }
}
