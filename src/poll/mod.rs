//! The polling engine: orchestration, collaborator seams, and the
//! default transport/parser implementations.
//!
//! - [`poller`] - the per-feed state machine driver ([`Poller`])
//! - [`transport`] - reqwest-backed [`Transport`] with retries and limits
//! - [`parser`] - feed-rs-backed [`FeedParser`]
//! - [`scheduler`] - one bounded-concurrency pass over many feeds
//!
//! The poller itself performs no I/O beyond the two delegated calls and
//! holds no mutable state, so it can drive any number of *different*
//! feeds concurrently.

mod parser;
mod poller;
mod scheduler;
mod transport;

pub use parser::FeedRsParser;
pub use poller::{
    FeedParser, FetchRequest, ParseError, Poller, Transport, TransportError, TransportResponse,
};
pub use scheduler::{poll_all, PollOutcome};
pub use transport::HttpTransport;
