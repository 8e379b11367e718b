//! # Core Traits (Ports)
//!
//! Any adapter must implement these traits to be wired into the engine.
//! Handles are constructed once at process start and passed in explicitly;
//! there is no ambient global lookup.

use async_trait::async_trait;
#[cfg(any(test, feature = "testing"))]
use mockall::automock;
use uuid::Uuid;

use crate::error::DomainResult;
use crate::event::ChatContext;
use crate::models::{
    ActivationData, AuditEntry, AuditFamily, Comment, Photo, PhotoStatus, PostSurface,
    PostedMessage, Rate, RateValue, Topic, User,
};
use crate::session::{Membership, Session};
use crate::views::View;

/// Audit-logged relational persistence. Every state-changing operation is
/// a single transaction: lock the rows the decision depends on, enforce
/// the precondition, mutate, append one audit row per mutated entity, and
/// return the post-mutation row. Read-only accessors take no locks and
/// never touch the audit log.
#[cfg_attr(any(test, feature = "testing"), automock)]
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Looks up the user by external identity; creates a `register`-status
    /// row (logging `user_register`) when absent. Safe under two
    /// simultaneous first contacts: the schema enforces uniqueness of
    /// `external_id` and the insert is insert-or-fetch.
    async fn authorize_or_create(&self, external_id: i64) -> DomainResult<User>;

    /// `register -> active`, exactly once. Fails when the row is not in
    /// `register` status or the nick is already taken.
    async fn activate_user(&self, user_id: Uuid, activation: ActivationData)
        -> DomainResult<User>;

    async fn set_avatar(&self, user_id: Uuid, avatar_ref: &str) -> DomainResult<User>;

    async fn set_about(&self, user_id: Uuid, about: &str) -> DomainResult<User>;

    /// Inserts a `pending` photo. Requires actor `active` and topic
    /// `available` (topic row locked for share).
    async fn create_photo(
        &self,
        user_id: Uuid,
        topic_id: Uuid,
        media_ref: &str,
        description: &str,
    ) -> DomainResult<Photo>;

    /// Records where the photo was actually posted on one of the two
    /// outbound surfaces, after the external post succeeded.
    async fn set_photo_posted(
        &self,
        photo_id: Uuid,
        surface: PostSurface,
        posted: PostedMessage,
    ) -> DomainResult<Photo>;

    /// Moderation decision on a `pending` photo. Actor must hold a
    /// moderator or admin role.
    async fn set_photo_status(
        &self,
        actor_id: Uuid,
        photo_id: Uuid,
        status: PhotoStatus,
    ) -> DomainResult<Photo>;

    /// Soft removal by the owner. External message removal is the
    /// caller's best-effort job, outside this transaction.
    async fn delete_photo(&self, user_id: Uuid, photo_id: Uuid) -> DomainResult<Photo>;

    /// At most one rate per `(user, photo)`; the photo must be approved.
    async fn create_rate(
        &self,
        user_id: Uuid,
        photo_id: Uuid,
        value: RateValue,
    ) -> DomainResult<Rate>;

    /// Requires actor active, topic available, photo approved. Also bumps
    /// the actor's `last_activity_time` inside the same transaction.
    async fn create_comment(
        &self,
        user_id: Uuid,
        photo_id: Uuid,
        message_ref: i64,
        text: &str,
    ) -> DomainResult<Comment>;

    // ── Read-only accessors ──────────────────────────────────────────────

    async fn get_user_by_external(&self, external_id: i64) -> DomainResult<Option<User>>;

    async fn get_user_profile(&self, user_id: Uuid) -> DomainResult<Option<User>>;

    async fn is_nick_taken(&self, nick: &str) -> DomainResult<bool>;

    /// Available topics only.
    async fn get_topics(&self) -> DomainResult<Vec<Topic>>;

    async fn get_topic(&self, topic_id: Uuid) -> DomainResult<Option<Topic>>;

    async fn get_photos_for_user(&self, user_id: Uuid) -> DomainResult<Vec<Photo>>;

    /// One page of approved photos in a topic, newest first, plus the
    /// total page count for `per_page`.
    async fn get_approved_photos(
        &self,
        topic_id: Uuid,
        page: u32,
        per_page: u32,
    ) -> DomainResult<(Vec<Photo>, u32)>;

    /// Case-insensitive substring match over activated nicks.
    async fn search_by_nick(&self, fragment: &str) -> DomainResult<Vec<User>>;

    /// `(number of rates, average value)` for a photo; `(0, 0.0)` when
    /// unrated.
    async fn rating_summary(&self, photo_id: Uuid) -> DomainResult<(u64, f64)>;

    async fn audit_trail(
        &self,
        family: AuditFamily,
        entity_id: Uuid,
    ) -> DomainResult<Vec<AuditEntry>>;
}

/// Atomic, TTL-backed submission counter, keyed per user. Both operations
/// execute as a single atomic unit against the counter store; the 24-hour
/// window is anchored at the first submission in the window.
#[cfg_attr(any(test, feature = "testing"), automock)]
#[async_trait]
pub trait QuotaCounter: Send + Sync {
    /// Milliseconds until the window resets when the user is over the
    /// limit; 0 when not limited. Never mutates.
    async fn check(&self, user_id: Uuid) -> DomainResult<u64>;

    /// Atomically increments. Returns 0 when the reservation is granted;
    /// a nonzero milliseconds-until-reset means "not granted" and the
    /// caller must not proceed with the gated side effect.
    async fn consume(&self, user_id: Uuid) -> DomainResult<u64>;
}

/// Externally persisted per-conversation session blobs. Must survive
/// process restarts. Per-user serialization of load/save is the upstream
/// transport's contract.
#[cfg_attr(any(test, feature = "testing"), automock)]
#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn load(&self, conversation_key: i64) -> DomainResult<Option<Session>>;

    async fn save(&self, conversation_key: i64, session: &Session) -> DomainResult<()>;
}

/// The outbound collaborator: message rendering and transport-side
/// lookups. Markup, keyboards and delivery are entirely its problem.
#[cfg_attr(any(test, feature = "testing"), automock)]
#[async_trait]
pub trait BotGateway: Send + Sync {
    /// Renders a view into the chat; returns the posted message identity
    /// when the transport reports one (used by browsing scenes to edit in
    /// place later).
    async fn render(&self, chat: &ChatContext, view: View) -> DomainResult<Option<i64>>;

    /// Replaces an earlier message in place.
    async fn edit(&self, chat: &ChatContext, message_ref: i64, view: View) -> DomainResult<()>;

    /// Best-effort removal of a previously posted message.
    async fn remove(&self, chat_ref: i64, message_ref: i64) -> DomainResult<()>;

    /// Re-derives group/channel membership for a user, private chats only.
    async fn membership(&self, external_user_id: i64) -> DomainResult<Membership>;
}
