//! # storage-adapters
//!
//! Implementations of the domains ports. The in-memory adapters are
//! always compiled (tests and the default binary run on them); Postgres
//! and Redis back the same ports behind compile-time features.

pub mod clock;
pub mod memory;

#[cfg(feature = "db-postgres")]
pub mod postgres;

#[cfg(feature = "redis")]
pub mod redis;

pub use clock::{Clock, ManualClock, SystemClock};
pub use memory::{MemoryQuotaCounter, MemoryRecordStore, MemorySessionStore};

#[cfg(feature = "db-postgres")]
pub use postgres::PgRecordStore;

#[cfg(feature = "redis")]
pub use redis::{RedisQuotaCounter, RedisSessionStore};

/// Submissions allowed per rolling window.
pub const QUOTA_LIMIT: u32 = 3;

/// The rolling window, anchored at a user's first submission in it.
pub const QUOTA_WINDOW_MS: u64 = 24 * 60 * 60 * 1000;
