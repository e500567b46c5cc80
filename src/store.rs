//! Consumer-owned store contracts: the durable seen-set that suppresses
//! duplicate delivery and the per-feed state store the scheduler persists
//! snapshots through.
//!
//! The poller core never touches these; only the batch poll pass in
//! [`crate::poll`] does. Durable implementations (database, key-value
//! file) belong to the embedding application — a false negative from a
//! lossy seen-set means duplicate delivery, so eventual consistency is
//! not acceptable there. The in-memory implementations here are for tests
//! and single-process embeddings that accept losing history on restart.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::state::FeedState;

/// Durable set of already-delivered content fingerprints.
#[async_trait]
pub trait SeenSet: Send + Sync {
    async fn contains(&self, content_hash: &str) -> bool;
    async fn add(&self, content_hash: &str);
}

/// Persists the latest [`FeedState`] per feed id between poll passes.
///
/// Must give read-your-last-write consistency: the next poll of a feed
/// has to observe the state saved by the previous one, or the backoff
/// discipline breaks down.
#[async_trait]
pub trait StateStore: Send + Sync {
    async fn load(&self, feed_id: i64) -> Option<FeedState>;
    async fn save(&self, feed_id: i64, state: FeedState);
}

/// In-memory seen-set. Not durable.
#[derive(Debug, Default)]
pub struct MemorySeenSet {
    hashes: Mutex<HashSet<String>>,
}

impl MemorySeenSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.hashes.lock().expect("seen-set lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl SeenSet for MemorySeenSet {
    async fn contains(&self, content_hash: &str) -> bool {
        self.hashes
            .lock()
            .expect("seen-set lock poisoned")
            .contains(content_hash)
    }

    async fn add(&self, content_hash: &str) {
        self.hashes
            .lock()
            .expect("seen-set lock poisoned")
            .insert(content_hash.to_string());
    }
}

/// In-memory state store. Not durable.
#[derive(Debug, Default)]
pub struct MemoryStateStore {
    states: Mutex<HashMap<i64, FeedState>>,
}

impl MemoryStateStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl StateStore for MemoryStateStore {
    async fn load(&self, feed_id: i64) -> Option<FeedState> {
        self.states
            .lock()
            .expect("state store lock poisoned")
            .get(&feed_id)
            .cloned()
    }

    async fn save(&self, feed_id: i64, state: FeedState) {
        self.states
            .lock()
            .expect("state store lock poisoned")
            .insert(feed_id, state);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_seen_set_membership() {
        let seen = MemorySeenSet::new();
        assert!(!seen.contains("abc").await);
        seen.add("abc").await;
        assert!(seen.contains("abc").await);
        seen.add("abc").await;
        assert_eq!(seen.len(), 1);
    }

    #[tokio::test]
    async fn test_state_store_read_your_write() {
        let store = MemoryStateStore::new();
        assert!(store.load(1).await.is_none());

        let state = FeedState::initial().with_successful_fetch(Some("v1".into()), None, 200);
        store.save(1, state.clone()).await;
        assert_eq!(store.load(1).await, Some(state.clone()));

        let next = state.with_failed_fetch(500, None);
        store.save(1, next.clone()).await;
        assert_eq!(store.load(1).await, Some(next));
    }
}
