use futures::stream::{self, StreamExt};

use crate::config::FeedConfig;
use crate::item::RawItem;
use crate::poll::poller::{FeedParser, Poller, Transport};
use crate::result::FetchResult;
use crate::state::FeedState;
use crate::store::{SeenSet, StateStore};

/// Outcome of one feed within a poll pass: the raw poll result plus the
/// items that survived seen-set deduplication.
#[derive(Debug)]
pub struct PollOutcome {
    pub feed_id: i64,
    pub result: FetchResult,
    /// Valid items whose fingerprint had not been seen before this pass.
    pub new_items: Vec<RawItem>,
}

/// Runs one poll pass over `configs` with bounded concurrency.
///
/// For each enabled feed: load its previous state, poll, persist the
/// successor state, then filter valid items through the seen-set —
/// unseen fingerprints are recorded and forwarded, seen ones dropped.
/// Disabled feeds are skipped entirely.
///
/// Each feed appears at most once per pass, which is what serializes
/// per-feed attempts; the caller must not overlap two passes that share
/// a feed. Wall-clock cadence between passes stays with the caller.
///
/// Results come back in completion order, not input order.
pub async fn poll_all<T, P>(
    poller: &Poller<T, P>,
    configs: &[FeedConfig],
    states: &dyn StateStore,
    seen: &dyn SeenSet,
    concurrency: usize,
) -> Vec<PollOutcome>
where
    T: Transport,
    P: FeedParser,
{
    let enabled: Vec<&FeedConfig> = configs.iter().filter(|c| c.enabled).collect();
    let disabled = configs.len() - enabled.len();
    if disabled > 0 {
        tracing::debug!(disabled = disabled, "Skipping disabled feeds");
    }

    stream::iter(enabled)
        .map(|config| async move {
            let previous = states.load(config.id).await.unwrap_or_else(FeedState::initial);
            let result = poller.poll(config, &previous).await;
            states.save(config.id, result.state.clone()).await;

            let mut new_items = Vec::new();
            for item in result.valid_items() {
                if seen.contains(&item.content_hash).await {
                    continue;
                }
                seen.add(&item.content_hash).await;
                new_items.push(item.clone());
            }

            if result.is_error() {
                tracing::warn!(
                    feed_id = config.id,
                    status = result.state.last_status,
                    error_count = result.state.error_count,
                    "Feed poll failed"
                );
            } else {
                tracing::debug!(
                    feed_id = config.id,
                    new_items = new_items.len(),
                    "Feed poll complete"
                );
            }

            PollOutcome {
                feed_id: config.id,
                result,
                new_items,
            }
        })
        .buffer_unordered(concurrency.max(1))
        .collect()
        .await
}
