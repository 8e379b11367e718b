//! # Domain Models
//!
//! These structs represent the core entities of Shutterclub.
//! Every logged entity family carries an append-only audit trail
//! (see [`AuditEntry`]); rows themselves are never hard-deleted.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Lifecycle of a member. `Register -> Active` happens exactly once;
/// `Penalty` is reversible (by external moderation), `Banned` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UserStatus {
    Register,
    Active,
    Penalty,
    Banned,
}

impl UserStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            UserStatus::Register => "register",
            UserStatus::Active => "active",
            UserStatus::Penalty => "penalty",
            UserStatus::Banned => "banned",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "register" => Some(UserStatus::Register),
            "active" => Some(UserStatus::Active),
            "penalty" => Some(UserStatus::Penalty),
            "banned" => Some(UserStatus::Banned),
            _ => None,
        }
    }

    /// Whether the member may take part in content flows (submit edits,
    /// browse, rate). Banned users may not; registering users are not
    /// members yet.
    pub fn can_participate(&self) -> bool {
        matches!(self, UserStatus::Active | UserStatus::Penalty)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UserRole {
    User,
    Moderator,
    Admin,
}

impl UserRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            UserRole::User => "user",
            UserRole::Moderator => "moderator",
            UserRole::Admin => "admin",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "user" => Some(UserRole::User),
            "moderator" => Some(UserRole::Moderator),
            "admin" => Some(UserRole::Admin),
            _ => None,
        }
    }

    pub fn can_moderate(&self) -> bool {
        matches!(self, UserRole::Moderator | UserRole::Admin)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Gender {
    Male,
    Female,
    Couple,
}

impl Gender {
    pub fn as_str(&self) -> &'static str {
        match self {
            Gender::Male => "male",
            Gender::Female => "female",
            Gender::Couple => "couple",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "male" => Some(Gender::Male),
            "female" => Some(Gender::Female),
            "couple" => Some(Gender::Couple),
            _ => None,
        }
    }
}

/// A community member. Created lazily on first contact with
/// status [`UserStatus::Register`]; `nick` stays empty until activation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    /// Stable identity handed to us by the upstream channel; unique.
    pub external_id: i64,
    /// Unique once set; pattern `[a-z0-9_]{4,20}`, stored lowercased.
    pub nick: Option<String>,
    pub gender: Option<Gender>,
    pub status: UserStatus,
    pub role: UserRole,
    /// Media reference of the avatar on the upstream channel.
    pub avatar_ref: Option<String>,
    /// Free-form bio, 3 to 300 characters.
    pub about: Option<String>,
    pub register_time: DateTime<Utc>,
    pub last_activity_time: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TopicStatus {
    Available,
    Closed,
}

impl TopicStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TopicStatus::Available => "available",
            TopicStatus::Closed => "closed",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "available" => Some(TopicStatus::Available),
            "closed" => Some(TopicStatus::Closed),
            _ => None,
        }
    }
}

/// A gallery topic. Photos may only be created while `status` is
/// [`TopicStatus::Available`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Topic {
    pub id: Uuid,
    /// Routing key of the moderation group on the upstream channel.
    pub group_chat_ref: i64,
    /// Optional thread inside the group (forum-style groups).
    pub group_thread_ref: Option<i64>,
    pub name: String,
    pub status: TopicStatus,
    pub description: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PhotoStatus {
    Pending,
    Approved,
    Rejected,
}

impl PhotoStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PhotoStatus::Pending => "pending",
            PhotoStatus::Approved => "approved",
            PhotoStatus::Rejected => "rejected",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "pending" => Some(PhotoStatus::Pending),
            "approved" => Some(PhotoStatus::Approved),
            "rejected" => Some(PhotoStatus::Rejected),
            _ => None,
        }
    }
}

/// Identity of a message posted to one of the two outbound destinations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostedMessage {
    pub chat_ref: i64,
    pub message_ref: i64,
}

/// The two destinations a photo is eventually posted to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PostSurface {
    /// The moderation group where pending photos are reviewed.
    Moderation,
    /// The public channel where approved photos land.
    Channel,
}

/// A submitted photo. Only [`PhotoStatus::Approved`] photos are eligible
/// for rating and commenting. The two `*_post` fields start unset and are
/// filled in after the content is actually posted to each destination.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Photo {
    pub id: Uuid,
    pub user_id: Uuid,
    pub topic_id: Uuid,
    pub moderation_post: Option<PostedMessage>,
    pub channel_post: Option<PostedMessage>,
    pub media_ref: String,
    pub description: String,
    pub status: PhotoStatus,
    pub create_time: DateTime<Utc>,
}

/// Bounded rating value, 1 to 5.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RateValue {
    One,
    Two,
    Three,
    Four,
    Five,
}

impl RateValue {
    pub fn as_i16(&self) -> i16 {
        match self {
            RateValue::One => 1,
            RateValue::Two => 2,
            RateValue::Three => 3,
            RateValue::Four => 4,
            RateValue::Five => 5,
        }
    }

    pub fn from_i16(raw: i16) -> Option<Self> {
        match raw {
            1 => Some(RateValue::One),
            2 => Some(RateValue::Two),
            3 => Some(RateValue::Three),
            4 => Some(RateValue::Four),
            5 => Some(RateValue::Five),
            _ => None,
        }
    }
}

/// One member's rating of one photo. Unique on `(user_id, photo_id)`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Rate {
    pub id: Uuid,
    pub user_id: Uuid,
    pub topic_id: Uuid,
    pub photo_id: Uuid,
    pub value: RateValue,
    pub create_time: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommentStatus {
    Visible,
    Hidden,
}

impl CommentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CommentStatus::Visible => "visible",
            CommentStatus::Hidden => "hidden",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "visible" => Some(CommentStatus::Visible),
            "hidden" => Some(CommentStatus::Hidden),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Comment {
    pub id: Uuid,
    pub user_id: Uuid,
    pub topic_id: Uuid,
    pub photo_id: Uuid,
    /// Identity of the comment message on the upstream channel.
    pub message_ref: i64,
    pub status: CommentStatus,
    pub text: String,
    pub create_time: DateTime<Utc>,
}

/// Everything the registration wizard collects before the single
/// activating commit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActivationData {
    pub nick: String,
    pub gender: Gender,
    pub avatar_ref: String,
    pub about: String,
}

/// Entity families that carry an append-only audit trail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditFamily {
    User,
    Topic,
    Photo,
    Rate,
    Comment,
}

impl AuditFamily {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditFamily::User => "user",
            AuditFamily::Topic => "topic",
            AuditFamily::Photo => "photo",
            AuditFamily::Rate => "rate",
            AuditFamily::Comment => "comment",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditAction {
    UserRegister,
    UserActivate,
    UserSetAvatar,
    UserSetAbout,
    PhotoCreate,
    PhotoPost,
    PhotoApprove,
    PhotoReject,
    PhotoDelete,
    RateCreate,
    CommentCreate,
}

impl AuditAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditAction::UserRegister => "user_register",
            AuditAction::UserActivate => "user_activate",
            AuditAction::UserSetAvatar => "user_set_avatar",
            AuditAction::UserSetAbout => "user_set_about",
            AuditAction::PhotoCreate => "photo_create",
            AuditAction::PhotoPost => "photo_post",
            AuditAction::PhotoApprove => "photo_approve",
            AuditAction::PhotoReject => "photo_reject",
            AuditAction::PhotoDelete => "photo_delete",
            AuditAction::RateCreate => "rate_create",
            AuditAction::CommentCreate => "comment_create",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "user_register" => Some(AuditAction::UserRegister),
            "user_activate" => Some(AuditAction::UserActivate),
            "user_set_avatar" => Some(AuditAction::UserSetAvatar),
            "user_set_about" => Some(AuditAction::UserSetAbout),
            "photo_create" => Some(AuditAction::PhotoCreate),
            "photo_post" => Some(AuditAction::PhotoPost),
            "photo_approve" => Some(AuditAction::PhotoApprove),
            "photo_reject" => Some(AuditAction::PhotoReject),
            "photo_delete" => Some(AuditAction::PhotoDelete),
            "rate_create" => Some(AuditAction::RateCreate),
            "comment_create" => Some(AuditAction::CommentCreate),
            _ => None,
        }
    }
}

/// One row of an entity family's append-only action log: who changed what,
/// to what resulting state, with free-form context.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEntry {
    pub entity_id: Uuid,
    pub actor_user_id: Uuid,
    pub action: AuditAction,
    pub resulting_status: String,
    /// Only meaningful for the `user` family.
    pub resulting_role: Option<String>,
    pub data: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn enum_parsing_round_trips_every_variant() {
        for status in [
            UserStatus::Register,
            UserStatus::Active,
            UserStatus::Penalty,
            UserStatus::Banned,
        ] {
            assert_eq!(UserStatus::parse(status.as_str()), Some(status));
        }
        for role in [UserRole::User, UserRole::Moderator, UserRole::Admin] {
            assert_eq!(UserRole::parse(role.as_str()), Some(role));
        }
        for status in [
            PhotoStatus::Pending,
            PhotoStatus::Approved,
            PhotoStatus::Rejected,
        ] {
            assert_eq!(PhotoStatus::parse(status.as_str()), Some(status));
        }
    }

    #[test]
    fn unknown_stored_strings_never_parse() {
        assert_eq!(UserStatus::parse("banhammer"), None);
        assert_eq!(UserStatus::parse("Active"), None);
        assert_eq!(UserRole::parse("overlord"), None);
        assert_eq!(Gender::parse(""), None);
        assert_eq!(TopicStatus::parse("open"), None);
        assert_eq!(PhotoStatus::parse("limbo"), None);
    }
}
