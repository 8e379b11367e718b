//! # Outbound views
//!
//! The conversation engine never formats markup; it asks the gateway to
//! "render view X" and, for browsing scenes, to edit the message it
//! rendered before. These variants are the whole outbound vocabulary.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::{Gender, Photo, RateValue, Topic, User};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum View {
    MainMenu { nick: Option<String> },
    Banned,
    NotAllowed,
    Failure,

    // Registration wizard
    AskNick,
    NickRejected { reason: String },
    NickTaken { nick: String },
    AskGender,
    AskAvatar,
    AskAbout,
    AboutRejected { reason: String },
    ConfirmRegistration { nick: String, gender: Gender, about: String },
    RegistrationDone { nick: String },

    // Photo submission wizard
    QuotaExceeded { reset_ms: u64 },
    TopicList { topics: Vec<Topic> },
    TopicUnavailable,
    AskPhoto,
    AskDescription,
    ConfirmPhoto { topic_name: String, description: String },
    PhotoQueued,

    // Profile editing
    AvatarUpdated,
    AboutUpdated,
    Profile { user: User, photo_count: u64 },

    // Gallery browsing
    GalleryEmpty,
    GalleryPhoto {
        photo: Photo,
        author_nick: String,
        rating_count: u64,
        rating_avg: f64,
        page: u32,
        total_pages: u32,
    },
    AlreadyRated,
    RateSaved { value: RateValue },
    AskComment,
    CommentSaved,

    // Own photos / deletion
    MyPhotos {
        photos: Vec<Photo>,
        page: u32,
        total_pages: u32,
    },
    NoPhotos,
    ConfirmDelete { photo_id: Uuid },
    PhotoDeleted,

    // Search
    AskSearchNick,
    SearchResults {
        users: Vec<User>,
        page: u32,
        total_pages: u32,
    },
    SearchEmpty,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{TopicStatus, UserRole, UserStatus};
    use chrono::Utc;

    // The record-bearing variants compare by value; the recording
    // gateway in the scenario tests relies on this.
    #[test]
    fn views_carrying_records_compare_by_value() {
        let topic = Topic {
            id: Uuid::new_v4(),
            group_chat_ref: -1,
            group_thread_ref: None,
            name: "landscapes".to_string(),
            status: TopicStatus::Available,
            description: "wide open spaces".to_string(),
        };
        let a = View::TopicList {
            topics: vec![topic.clone()],
        };
        let b = View::TopicList {
            topics: vec![topic],
        };
        assert_eq!(a, b);

        let user = User {
            id: Uuid::new_v4(),
            external_id: 7,
            nick: Some("abcd_1".to_string()),
            gender: None,
            status: UserStatus::Active,
            role: UserRole::User,
            avatar_ref: None,
            about: None,
            register_time: Utc::now(),
            last_activity_time: Utc::now(),
        };
        let a = View::Profile {
            user: user.clone(),
            photo_count: 1,
        };
        assert_eq!(
            a,
            View::Profile {
                user,
                photo_count: 1
            }
        );
    }
}
