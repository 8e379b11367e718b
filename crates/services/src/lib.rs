//! # services
//!
//! The conversation engine: a per-user scene/wizard state machine that
//! routes each inbound event to the step matching the persisted cursor,
//! plus the graceful-drain dispatcher the process runs it under.

pub mod dispatch;
pub mod engine;
pub mod scenes;

pub use dispatch::Dispatcher;
pub use engine::Engine;
