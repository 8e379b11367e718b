//! # domains
//!
//! The central domain logic and interface definitions for Shutterclub:
//! entity models, the error taxonomy, inbound-event shapes, per-conversation
//! session state, and the port traits every adapter implements.

pub mod error;
pub mod event;
pub mod models;
pub mod navigation;
pub mod ports;
pub mod session;
pub mod validate;
pub mod views;

// Re-exporting for easier access in other crates
pub use error::*;
pub use event::*;
pub use models::*;
pub use navigation::*;
pub use ports::*;
pub use session::*;
pub use views::*;

#[cfg(test)]
mod tests {
    use super::models::*;
    use chrono::Utc;
    use uuid::Uuid;

    #[test]
    fn photo_starts_unposted_and_pending() {
        let photo = Photo {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            topic_id: Uuid::new_v4(),
            moderation_post: None,
            channel_post: None,
            media_ref: "file_abc".to_string(),
            description: "sunset over the bay".to_string(),
            status: PhotoStatus::Pending,
            create_time: Utc::now(),
        };
        assert_eq!(photo.status, PhotoStatus::Pending);
        assert!(photo.moderation_post.is_none());
        assert!(photo.channel_post.is_none());
    }
}
