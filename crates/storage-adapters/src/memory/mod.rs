//! In-memory adapters. One write-lock section per state-changing
//! operation gives the same all-or-nothing semantics the relational
//! adapter gets from a transaction.

mod quota;
mod records;
mod sessions;

pub use quota::MemoryQuotaCounter;
pub use records::MemoryRecordStore;
pub use sessions::MemorySessionStore;
