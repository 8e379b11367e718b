//! # DomainError
//!
//! Centralized error handling for the Shutterclub ecosystem.
//! The variants follow the recovery strategy each class of failure gets:
//! validation re-prompts the current step, precondition failures abort the
//! enclosing transaction and surface to the user, invariant violations
//! abandon the conversation, integration failures roll back and surface a
//! generic message.

use thiserror::Error;

/// The primary error type for all domain operations.
#[derive(Error, Debug)]
pub enum DomainError {
    /// User input failed a format/length/uniqueness check.
    /// Recovered locally: the same wizard step re-prompts.
    #[error("validation error: {0}")]
    Validation(String),

    /// An entity is not in the state the operation requires
    /// (e.g. topic closed, photo not approved, already rated).
    #[error("precondition failed: {0}")]
    Precondition(String),

    /// Resource not found (e.g. User, Topic, Photo).
    #[error("{0} not found with ID {1}")]
    NotFound(&'static str, String),

    /// A "cannot happen" state was observed (incomplete scratch bag at
    /// commit, a lookup that must succeed returned nothing). Fatal for the
    /// conversation, never for the process.
    #[error("invariant violation: {0}")]
    Invariant(String),

    /// A stored row failed to decode into its typed shape. Fails closed.
    #[error("malformed stored record: {0}")]
    MalformedRecord(String),

    /// Infrastructure failure (store unreachable, external post failed).
    #[error("internal service error: {0}")]
    Integration(String),
}

impl DomainError {
    pub fn validation(msg: impl Into<String>) -> Self {
        DomainError::Validation(msg.into())
    }

    pub fn precondition(msg: impl Into<String>) -> Self {
        DomainError::Precondition(msg.into())
    }

    pub fn invariant(msg: impl Into<String>) -> Self {
        DomainError::Invariant(msg.into())
    }

    pub fn integration(msg: impl Into<String>) -> Self {
        DomainError::Integration(msg.into())
    }

    /// Whether the current wizard step can recover by re-prompting.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, DomainError::Validation(_))
    }
}

/// A specialized Result type for Shutterclub domain logic.
pub type DomainResult<T> = std::result::Result<T, DomainError>;
