//! # Redis Adapters
//!
//! `QuotaCounter` and `SessionStore` over a shared deadpool-redis pool.
//! The quota counter runs both of its operations as single Lua scripts so
//! that check-and-increment cannot interleave between two workers serving
//! the same user.

use deadpool_redis::redis::Script;
use deadpool_redis::Pool;

use async_trait::async_trait;
use uuid::Uuid;

use domains::{DomainError, DomainResult, QuotaCounter, Session, SessionStore};

use crate::{QUOTA_LIMIT, QUOTA_WINDOW_MS};

fn redis_err(err: impl std::fmt::Display) -> DomainError {
    DomainError::Integration(format!("redis: {err}"))
}

/// Read-only check: remaining window in ms when the key is at the limit,
/// 0 otherwise. Never touches the counter.
const CHECK_SCRIPT: &str = r#"
local count = tonumber(redis.call('GET', KEYS[1]) or '0')
if count < tonumber(ARGV[1]) then
    return 0
end
local ttl = redis.call('PTTL', KEYS[1])
if ttl < 0 then
    return 0
end
return ttl
"#;

/// Increment-and-decide. The window anchors at the first submission: the
/// expiry is set only when the INCR created the key.
const CONSUME_SCRIPT: &str = r#"
local count = redis.call('INCR', KEYS[1])
if count == 1 then
    redis.call('PEXPIRE', KEYS[1], ARGV[2])
end
if count <= tonumber(ARGV[1]) then
    return 0
end
local ttl = redis.call('PTTL', KEYS[1])
if ttl < 0 then
    return 0
end
return ttl
"#;

pub struct RedisQuotaCounter {
    pool: Pool,
    limit: u32,
    window_ms: u64,
    check: Script,
    consume: Script,
}

impl RedisQuotaCounter {
    pub fn new(pool: Pool) -> Self {
        Self {
            pool,
            limit: QUOTA_LIMIT,
            window_ms: QUOTA_WINDOW_MS,
            check: Script::new(CHECK_SCRIPT),
            consume: Script::new(CONSUME_SCRIPT),
        }
    }

    fn key(user_id: Uuid) -> String {
        format!("photo_rate_limit:{user_id}")
    }
}

#[async_trait]
impl QuotaCounter for RedisQuotaCounter {
    async fn check(&self, user_id: Uuid) -> DomainResult<u64> {
        let mut conn = self.pool.get().await.map_err(redis_err)?;
        let remaining: i64 = self
            .check
            .key(Self::key(user_id))
            .arg(self.limit)
            .invoke_async(&mut conn)
            .await
            .map_err(redis_err)?;
        Ok(remaining.max(0) as u64)
    }

    async fn consume(&self, user_id: Uuid) -> DomainResult<u64> {
        let mut conn = self.pool.get().await.map_err(redis_err)?;
        let remaining: i64 = self
            .consume
            .key(Self::key(user_id))
            .arg(self.limit)
            .arg(self.window_ms)
            .invoke_async(&mut conn)
            .await
            .map_err(redis_err)?;
        Ok(remaining.max(0) as u64)
    }
}

/// Session blobs survive process restarts; a wizard picks up at its
/// cursor after a redeploy.
pub struct RedisSessionStore {
    pool: Pool,
}

impl RedisSessionStore {
    pub fn new(pool: Pool) -> Self {
        Self { pool }
    }

    fn key(conversation_key: i64) -> String {
        format!("session:{conversation_key}")
    }
}

#[async_trait]
impl SessionStore for RedisSessionStore {
    async fn load(&self, conversation_key: i64) -> DomainResult<Option<Session>> {
        let mut conn = self.pool.get().await.map_err(redis_err)?;
        let blob: Option<String> = deadpool_redis::redis::cmd("GET")
            .arg(Self::key(conversation_key))
            .query_async(&mut conn)
            .await
            .map_err(redis_err)?;
        match blob {
            Some(raw) => decode_session(conversation_key, &raw).map(Some),
            None => Ok(None),
        }
    }

    async fn save(&self, conversation_key: i64, session: &Session) -> DomainResult<()> {
        let blob = serde_json::to_string(session)
            .map_err(|err| DomainError::Integration(format!("session encode: {err}")))?;
        let mut conn = self.pool.get().await.map_err(redis_err)?;
        deadpool_redis::redis::cmd("SET")
            .arg(Self::key(conversation_key))
            .arg(blob)
            .query_async::<()>(&mut conn)
            .await
            .map_err(redis_err)?;
        Ok(())
    }
}

/// A stored blob that no longer parses is treated as corrupt, not as an
/// absent session.
fn decode_session(conversation_key: i64, raw: &str) -> DomainResult<Session> {
    serde_json::from_str(raw).map_err(|err| {
        DomainError::MalformedRecord(format!("session {conversation_key}: {err}"))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn garbage_session_blob_fails_closed() {
        let err = decode_session(42, "not json at all").unwrap_err();
        assert!(matches!(err, DomainError::MalformedRecord(_)), "{err:?}");

        // Valid json of the wrong shape is just as corrupt.
        let err = decode_session(42, r#"{"scene": 7}"#).unwrap_err();
        assert!(matches!(err, DomainError::MalformedRecord(_)), "{err:?}");
    }

    #[test]
    fn stored_session_round_trips() {
        let session = Session::default();
        let blob = serde_json::to_string(&session).unwrap();
        assert_eq!(decode_session(1, &blob).unwrap(), session);
    }
}
