use std::collections::HashMap;

use crate::item::RawItem;
use crate::state::FeedState;

/// Immutable outcome of one poll attempt: the feed's successor state plus
/// whatever items the source yielded.
///
/// `items` is empty for not-modified, error, and backoff-skip outcomes,
/// and preserves parser order otherwise. The caller persists `state` and
/// deduplicates `items` against its durable seen-set before forwarding.
#[derive(Debug, Clone)]
pub struct FetchResult {
    pub feed_id: i64,
    pub state: FeedState,
    pub items: Vec<RawItem>,
    /// Opaque instrumentation values (timings, counts). Never consulted
    /// by control flow.
    pub metrics: HashMap<String, f64>,
}

impl FetchResult {
    /// A 200 outcome carrying freshly extracted items.
    pub fn success(
        feed_id: i64,
        state: FeedState,
        items: Vec<RawItem>,
        metrics: HashMap<String, f64>,
    ) -> Self {
        Self {
            feed_id,
            state,
            items,
            metrics,
        }
    }

    /// A 304 outcome: the source confirmed nothing changed.
    pub fn not_modified(feed_id: i64, state: FeedState, metrics: HashMap<String, f64>) -> Self {
        Self {
            feed_id,
            state,
            items: Vec::new(),
            metrics,
        }
    }

    /// A failed attempt (network failure, unexpected status, or parse
    /// failure), already folded into `state` via the failure transition.
    pub fn error(feed_id: i64, state: FeedState, metrics: HashMap<String, f64>) -> Self {
        Self {
            feed_id,
            state,
            items: Vec::new(),
            metrics,
        }
    }

    /// A backoff skip: the previous state is returned unchanged and the
    /// transport was never called.
    pub fn skipped(feed_id: i64, previous: FeedState, backoff_remaining_secs: u64) -> Self {
        let mut metrics = HashMap::new();
        metrics.insert("skipped".to_string(), 1.0);
        metrics.insert(
            "backoff_remaining_secs".to_string(),
            backoff_remaining_secs as f64,
        );
        Self {
            feed_id,
            state: previous,
            items: Vec::new(),
            metrics,
        }
    }

    /// True for 2xx statuses. Note that 304 falls outside `[200, 300)`
    /// and is reported by [`is_not_modified`](Self::is_not_modified) only.
    pub fn is_successful(&self) -> bool {
        (200..300).contains(&self.state.last_status)
    }

    pub fn is_not_modified(&self) -> bool {
        self.state.last_status == 304
    }

    /// True for network failure (status 0) and 4xx/5xx statuses.
    pub fn is_error(&self) -> bool {
        self.state.last_status == 0 || self.state.last_status >= 400
    }

    /// The deliverable subset of `items`, in original order.
    pub fn valid_items(&self) -> impl Iterator<Item = &RawItem> {
        self.items.iter().filter(|item| item.is_valid())
    }

    /// Metric lookup with fallback.
    pub fn metric(&self, key: &str, default: f64) -> f64 {
        self.metrics.get(key).copied().unwrap_or(default)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::item::SourceEntry;

    fn result_with_status(status: u16) -> FetchResult {
        let state = if status == 0 || status >= 400 {
            FeedState::initial().with_failed_fetch(status, None)
        } else {
            FeedState::initial().with_successful_fetch(None, None, status)
        };
        FetchResult {
            feed_id: 1,
            state,
            items: Vec::new(),
            metrics: HashMap::new(),
        }
    }

    #[test]
    fn test_outcome_exclusivity() {
        for status in [0u16, 200, 201, 204, 299, 304, 400, 404, 429, 500, 503] {
            let result = result_with_status(status);
            let flags = [
                result.is_successful(),
                result.is_not_modified(),
                result.is_error(),
            ];
            assert_eq!(
                flags.iter().filter(|f| **f).count(),
                1,
                "status {status} should satisfy exactly one predicate"
            );
        }
    }

    #[test]
    fn test_304_is_not_counted_as_successful() {
        let result = result_with_status(304);
        assert!(result.is_not_modified());
        assert!(!result.is_successful());
        assert!(!result.is_error());
    }

    #[test]
    fn test_200_is_successful_only() {
        let result = result_with_status(200);
        assert!(result.is_successful());
        assert!(!result.is_not_modified());
        assert!(!result.is_error());
    }

    #[test]
    fn test_network_failure_is_error() {
        let result = result_with_status(0);
        assert!(result.is_error());
        assert!(!result.is_successful());
    }

    #[test]
    fn test_skipped_carries_previous_state_unchanged() {
        let previous = FeedState::initial().with_failed_fetch(500, Some(600));
        let result = FetchResult::skipped(9, previous.clone(), 600);
        assert_eq!(result.state, previous);
        assert!(result.items.is_empty());
        assert_eq!(result.metric("skipped", 0.0), 1.0);
        assert_eq!(result.metric("backoff_remaining_secs", 0.0), 600.0);
    }

    #[test]
    fn test_valid_items_preserves_order() {
        let valid_a = crate::item::RawItem::from_entry(SourceEntry {
            link: Some("https://example.org/a".into()),
            title: Some("A".into()),
            ..Default::default()
        });
        let invalid = crate::item::RawItem::from_entry(SourceEntry {
            title: Some("no identity".into()),
            ..Default::default()
        });
        let valid_b = crate::item::RawItem::from_entry(SourceEntry {
            link: Some("https://example.org/b".into()),
            title: Some("B".into()),
            ..Default::default()
        });

        let result = FetchResult::success(
            1,
            FeedState::initial().with_successful_fetch(None, None, 200),
            vec![valid_a.clone(), invalid, valid_b.clone()],
            HashMap::new(),
        );
        let valid: Vec<_> = result.valid_items().collect();
        assert_eq!(valid, vec![&valid_a, &valid_b]);
    }

    #[test]
    fn test_metric_fallback() {
        let result = result_with_status(200);
        assert_eq!(result.metric("absent", 42.0), 42.0);
    }
}
