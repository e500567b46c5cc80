use chrono::{DateTime, Duration, Utc};

/// First backoff window after a failure, in seconds. Doubles per
/// consecutive failure.
pub const BACKOFF_BASE_SECS: u64 = 60;

/// Ceiling on the backoff window (15 minutes). A source that stays down
/// is re-checked at this bounded worst-case interval rather than drifting
/// toward never.
pub const BACKOFF_CAP_SECS: u64 = 900;

/// Immutable snapshot of one feed's polling history.
///
/// A `FeedState` is never mutated in place: every poll attempt derives a
/// successor via [`with_successful_fetch`](FeedState::with_successful_fetch)
/// or [`with_failed_fetch`](FeedState::with_failed_fetch), so concurrent
/// readers can hold a snapshot without observing torn transitions.
/// Successive snapshots of one feed form a total order; the caller must
/// keep at most one poll attempt in flight per feed so an older snapshot
/// is never applied over a newer one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedState {
    /// Opaque `ETag` validator from the last 200 response, echoed back as
    /// `If-None-Match` on the next poll.
    pub etag: Option<String>,
    /// Opaque `Last-Modified` validator, echoed back as `If-Modified-Since`.
    pub last_modified: Option<String>,
    /// HTTP status of the last attempt; 0 means no attempt yet or a
    /// network-level failure.
    pub last_status: u16,
    /// Consecutive failed attempts. Reset to 0 by any successful fetch.
    pub error_count: u32,
    /// When set, polling is suspended until this instant.
    pub backoff_until: Option<DateTime<Utc>>,
    /// Instant of the last attempt, `None` for a fresh state.
    pub fetched_at: Option<DateTime<Utc>>,
}

impl FeedState {
    /// The zero state: no validators, no errors, never fetched.
    pub fn initial() -> Self {
        Self {
            etag: None,
            last_modified: None,
            last_status: 0,
            error_count: 0,
            backoff_until: None,
            fetched_at: None,
        }
    }

    /// Successor state after a fetch the caller deems successful
    /// (including 304 Not Modified).
    ///
    /// Resets the error streak, clears any backoff, and replaces the
    /// cache validators with the given values. For a 304 the server sends
    /// no new validators, so the caller passes the previous ones through.
    pub fn with_successful_fetch(
        &self,
        etag: Option<String>,
        last_modified: Option<String>,
        status: u16,
    ) -> Self {
        self.with_successful_fetch_at(etag, last_modified, status, Utc::now())
    }

    /// Successor state after a failed attempt (transport failure, parse
    /// failure, or an unexpected HTTP status).
    ///
    /// Increments the error streak and schedules a backoff window of
    /// `min(60 · 2^previous_errors, 900)` seconds, unless
    /// `backoff_seconds` overrides the computed duration. Cache
    /// validators are carried over unchanged: a failure says nothing
    /// about whether the resource itself changed.
    pub fn with_failed_fetch(&self, status: u16, backoff_seconds: Option<u64>) -> Self {
        self.with_failed_fetch_at(status, backoff_seconds, Utc::now())
    }

    /// True while `backoff_until` is set and still in the future.
    pub fn is_in_backoff(&self) -> bool {
        self.backoff_until.is_some_and(|until| until > Utc::now())
    }

    /// Whole seconds until the backoff window closes, 0 when not backing off.
    pub fn backoff_remaining(&self) -> u64 {
        match self.backoff_until {
            Some(until) => (until - Utc::now()).num_seconds().max(0) as u64,
            None => 0,
        }
    }

    fn with_successful_fetch_at(
        &self,
        etag: Option<String>,
        last_modified: Option<String>,
        status: u16,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            etag,
            last_modified,
            last_status: status,
            error_count: 0,
            backoff_until: None,
            fetched_at: Some(now),
        }
    }

    fn with_failed_fetch_at(
        &self,
        status: u16,
        backoff_seconds: Option<u64>,
        now: DateTime<Utc>,
    ) -> Self {
        let duration = backoff_seconds.unwrap_or_else(|| backoff_duration(self.error_count));
        Self {
            etag: self.etag.clone(),
            last_modified: self.last_modified.clone(),
            last_status: status,
            error_count: self.error_count.saturating_add(1),
            backoff_until: Some(now + Duration::seconds(duration as i64)),
            fetched_at: Some(now),
        }
    }
}

/// `min(base · 2^errors, cap)`. The exponent is clamped so the shift can
/// never overflow; the cap is reached long before the clamp matters.
fn backoff_duration(error_count: u32) -> u64 {
    let doubled = BACKOFF_BASE_SECS.saturating_mul(2u64.saturating_pow(error_count.min(32)));
    doubled.min(BACKOFF_CAP_SECS)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_initial_state_is_fresh() {
        let state = FeedState::initial();
        assert_eq!(state.error_count, 0);
        assert_eq!(state.last_status, 0);
        assert!(state.etag.is_none());
        assert!(state.last_modified.is_none());
        assert!(state.backoff_until.is_none());
        assert!(state.fetched_at.is_none());
        assert!(!state.is_in_backoff());
        assert_eq!(state.backoff_remaining(), 0);
    }

    #[test]
    fn test_backoff_monotonicity() {
        // n consecutive failures yield error_count == n and a window of
        // min(60 * 2^(n-1), 900) seconds measured from fetched_at.
        let now = Utc::now();
        let mut state = FeedState::initial();
        for n in 1..=8u32 {
            state = state.with_failed_fetch_at(500, None, now);
            assert_eq!(state.error_count, n);
            let expected = 60u64.saturating_mul(2u64.pow(n - 1)).min(900);
            let window = (state.backoff_until.unwrap() - state.fetched_at.unwrap()).num_seconds();
            assert_eq!(window, expected as i64, "failure #{n}");
        }
    }

    #[test]
    fn test_backoff_caps_at_fifteen_minutes() {
        let now = Utc::now();
        let mut state = FeedState::initial();
        for _ in 0..20 {
            state = state.with_failed_fetch_at(503, None, now);
        }
        let window = (state.backoff_until.unwrap() - state.fetched_at.unwrap()).num_seconds();
        assert_eq!(window, 900);
    }

    #[test]
    fn test_explicit_backoff_override() {
        let now = Utc::now();
        let state = FeedState::initial().with_failed_fetch_at(429, Some(120), now);
        let window = (state.backoff_until.unwrap() - state.fetched_at.unwrap()).num_seconds();
        assert_eq!(window, 120);
    }

    #[test]
    fn test_success_resets_error_streak() {
        let state = FeedState::initial()
            .with_failed_fetch(500, None)
            .with_failed_fetch(500, None)
            .with_failed_fetch(0, None)
            .with_successful_fetch(Some("v2".into()), None, 200);
        assert_eq!(state.error_count, 0);
        assert!(state.backoff_until.is_none());
        assert!(!state.is_in_backoff());
        assert_eq!(state.etag.as_deref(), Some("v2"));
        assert_eq!(state.last_status, 200);
    }

    #[test]
    fn test_failure_carries_validators_over() {
        let state = FeedState::initial().with_successful_fetch(
            Some("abc".into()),
            Some("Wed, 01 Jan 2025 00:00:00 GMT".into()),
            200,
        );
        let failed = state.with_failed_fetch(500, None);
        assert_eq!(failed.etag, state.etag);
        assert_eq!(failed.last_modified, state.last_modified);
        assert_eq!(failed.last_status, 500);
        assert_eq!(failed.error_count, 1);
    }

    #[test]
    fn test_not_modified_preserves_validators() {
        let state = FeedState::initial().with_successful_fetch(Some("abc".into()), None, 200);
        let unchanged =
            state.with_successful_fetch(state.etag.clone(), state.last_modified.clone(), 304);
        assert_eq!(unchanged.etag.as_deref(), Some("abc"));
        assert_eq!(unchanged.last_status, 304);
        assert_eq!(unchanged.error_count, 0);
    }

    #[test]
    fn test_failed_state_is_in_backoff() {
        let state = FeedState::initial().with_failed_fetch(0, None);
        assert!(state.is_in_backoff());
        let remaining = state.backoff_remaining();
        assert!(remaining > 0 && remaining <= 60, "remaining={remaining}");
    }

    #[test]
    fn test_transitions_do_not_mutate_previous() {
        let original = FeedState::initial().with_successful_fetch(Some("v1".into()), None, 200);
        let snapshot = original.clone();
        let _failed = original.with_failed_fetch(500, None);
        let _ok = original.with_successful_fetch(Some("v2".into()), None, 200);
        assert_eq!(original, snapshot);
    }
}
