//! In-memory `QuotaCounter`. The map entry lock makes each operation a
//! single atomic check-and-mutate, matching the Lua-script semantics of
//! the Redis adapter.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use uuid::Uuid;

use domains::{DomainResult, QuotaCounter};

use crate::clock::{Clock, SystemClock};
use crate::{QUOTA_LIMIT, QUOTA_WINDOW_MS};

struct Window {
    count: u32,
    expires_at: DateTime<Utc>,
}

pub struct MemoryQuotaCounter {
    windows: DashMap<Uuid, Window>,
    clock: Arc<dyn Clock>,
    limit: u32,
    window: Duration,
}

impl Default for MemoryQuotaCounter {
    fn default() -> Self {
        Self::new(Arc::new(SystemClock))
    }
}

impl MemoryQuotaCounter {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            windows: DashMap::new(),
            clock,
            limit: QUOTA_LIMIT,
            window: Duration::milliseconds(QUOTA_WINDOW_MS as i64),
        }
    }

    fn remaining_ms(&self, expires_at: DateTime<Utc>, now: DateTime<Utc>) -> u64 {
        (expires_at - now).num_milliseconds().max(0) as u64
    }
}

#[async_trait]
impl QuotaCounter for MemoryQuotaCounter {
    async fn check(&self, user_id: Uuid) -> DomainResult<u64> {
        let now = self.clock.now();
        let Some(window) = self.windows.get(&user_id) else {
            return Ok(0);
        };
        if window.expires_at <= now || window.count < self.limit {
            return Ok(0);
        }
        Ok(self.remaining_ms(window.expires_at, now))
    }

    async fn consume(&self, user_id: Uuid) -> DomainResult<u64> {
        let now = self.clock.now();
        let mut entry = self.windows.entry(user_id).or_insert_with(|| Window {
            count: 0,
            expires_at: now + self.window,
        });

        // An elapsed window behaves as if no prior calls occurred: the
        // next consume anchors a fresh 24-hour window.
        if entry.expires_at <= now {
            entry.count = 0;
            entry.expires_at = now + self.window;
        }

        entry.count += 1;
        if entry.count <= self.limit {
            Ok(0)
        } else {
            Ok(self.remaining_ms(entry.expires_at, now))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;

    #[tokio::test]
    async fn first_three_consumes_pass_fourth_is_limited() {
        let clock = Arc::new(ManualClock::default());
        let quota = MemoryQuotaCounter::new(clock.clone());
        let user = Uuid::new_v4();

        for _ in 0..3 {
            assert_eq!(quota.consume(user).await.unwrap(), 0);
        }
        let reset = quota.consume(user).await.unwrap();
        assert!(reset > 0);
        assert!(reset <= QUOTA_WINDOW_MS);
        assert!(quota.check(user).await.unwrap() > 0);
    }

    #[tokio::test]
    async fn check_never_mutates() {
        let quota = MemoryQuotaCounter::default();
        let user = Uuid::new_v4();
        for _ in 0..10 {
            assert_eq!(quota.check(user).await.unwrap(), 0);
        }
        // Ten checks later the full quota is still available.
        for _ in 0..3 {
            assert_eq!(quota.consume(user).await.unwrap(), 0);
        }
    }

    #[tokio::test]
    async fn window_elapse_resets_the_counter() {
        let clock = Arc::new(ManualClock::default());
        let quota = MemoryQuotaCounter::new(clock.clone());
        let user = Uuid::new_v4();

        for _ in 0..4 {
            let _ = quota.consume(user).await.unwrap();
        }
        assert!(quota.check(user).await.unwrap() > 0);

        clock.advance(Duration::milliseconds(QUOTA_WINDOW_MS as i64 + 1));
        assert_eq!(quota.check(user).await.unwrap(), 0);
        // First consume after the elapse anchors a fresh window.
        assert_eq!(quota.consume(user).await.unwrap(), 0);
        assert_eq!(quota.consume(user).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn quotas_are_tracked_per_user() {
        let quota = MemoryQuotaCounter::default();
        let (alice, bob) = (Uuid::new_v4(), Uuid::new_v4());
        for _ in 0..4 {
            let _ = quota.consume(alice).await.unwrap();
        }
        assert!(quota.check(alice).await.unwrap() > 0);
        assert_eq!(quota.check(bob).await.unwrap(), 0);
    }
}
