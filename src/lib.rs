//! feedpoll — a polling engine for RSS/Atom feeds.
//!
//! Repeatedly checks remote syndication feeds for new content while
//! minimizing redundant traffic and never delivering the same item twice:
//!
//! - **Conditional GET**: `ETag`/`Last-Modified` validators are cached in
//!   an immutable per-feed [`FeedState`] and echoed back on the next poll,
//!   so an unchanged source costs a 304 and no body transfer.
//! - **Backoff**: consecutive failures push the next attempt out
//!   exponentially (60 s doubling, capped at 15 minutes), so one
//!   misbehaving source is never hammered.
//! - **Dedup fingerprints**: every extracted [`RawItem`] carries a
//!   deterministic `content_hash` — guid-based when the source declares
//!   one, composite otherwise — that a durable seen-set keys on.
//!
//! The engine is a library: it owns no CLI, no scheduler cadence, and no
//! storage. The network ([`Transport`]) and the feed-format parser
//! ([`FeedParser`]) are trait seams with default implementations
//! ([`HttpTransport`], [`FeedRsParser`]); persistence is behind the
//! consumer-owned [`SeenSet`] / [`StateStore`] contracts.
//!
//! # Example
//!
//! ```no_run
//! use feedpoll::{FeedConfig, FeedRsParser, FeedState, HttpTransport, Poller};
//!
//! # async fn run() -> anyhow::Result<()> {
//! let poller = Poller::new(HttpTransport::new()?, FeedRsParser::new());
//! let config = FeedConfig::new(1, "https://example.com/feed.xml")?;
//!
//! let result = poller.poll(&config, &FeedState::initial()).await;
//! // Persist result.state, then forward unseen valid items downstream
//! for item in result.valid_items() {
//!     println!("{} {:?}", item.content_hash, item.title);
//! }
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod item;
pub mod poll;
pub mod result;
pub mod state;
pub mod store;
pub mod util;

pub use config::{load_feeds, ConfigError, FeedConfig, FeedDefaults};
pub use item::{Enclosure, RawItem, SourceEntry};
pub use poll::{
    poll_all, FeedParser, FeedRsParser, FetchRequest, HttpTransport, ParseError, PollOutcome,
    Poller, Transport, TransportError, TransportResponse,
};
pub use result::FetchResult;
pub use state::{FeedState, BACKOFF_BASE_SECS, BACKOFF_CAP_SECS};
pub use store::{MemorySeenSet, MemoryStateStore, SeenSet, StateStore};
