//! # Session state
//!
//! One blob per conversation, loaded before and saved after every update.
//! Holds the authorization snapshot, membership flags, navigation state,
//! the active scene with its wizard cursor, and that scene's scratch bag.
//! Exactly one scene is active at a time; entering a new scene discards
//! the previous scene's scratch entirely.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::{Gender, User, UserRole, UserStatus};
use crate::navigation::Navigation;

/// Denormalized copy of the User row at last sync, kept in the session so
/// step handlers don't re-read the store for every branch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserSnapshot {
    pub user_id: Uuid,
    pub status: UserStatus,
    pub role: UserRole,
    pub nick: Option<String>,
}

impl From<&User> for UserSnapshot {
    fn from(user: &User) -> Self {
        Self {
            user_id: user.id,
            status: user.status,
            role: user.role,
            nick: user.nick.clone(),
        }
    }
}

/// Group/channel membership, re-derived per update for private chats.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Membership {
    pub in_group: bool,
    pub in_channel: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SceneName {
    Register,
    NewPhoto,
    ChangeAvatar,
    ChangeAbout,
    DeletePhoto,
    Photo,
    Profile,
    Search,
}

/// Partial registration data collected across the register wizard's steps.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegisterScratch {
    pub nick: Option<String>,
    pub gender: Option<Gender>,
    pub avatar_ref: Option<String>,
    pub about: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewPhotoScratch {
    pub topic_id: Option<Uuid>,
    pub media_ref: Option<String>,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeletePhotoScratch {
    /// The photo picked from the listing, awaiting confirmation.
    pub pending: Option<Uuid>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GalleryScratch {
    pub topic_id: Option<Uuid>,
    /// Photo currently on screen.
    pub current_photo: Option<Uuid>,
    /// Set when the scene is waiting for the text of a comment.
    pub awaiting_comment_for: Option<Uuid>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchScratch {
    /// The nick fragment being paged through.
    pub query: Option<String>,
}

/// Scene-scoped working data. Tagged per scene so one wizard can never
/// read another's leftovers; scenes without partial state share `None`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "scene", content = "data")]
pub enum SceneScratch {
    #[default]
    None,
    Register(RegisterScratch),
    NewPhoto(NewPhotoScratch),
    DeletePhoto(DeletePhotoScratch),
    Gallery(GalleryScratch),
    Search(SearchScratch),
}

impl SceneScratch {
    /// The empty scratch variant a scene starts from.
    pub fn empty_for(scene: SceneName) -> Self {
        match scene {
            SceneName::Register => SceneScratch::Register(RegisterScratch::default()),
            SceneName::NewPhoto => SceneScratch::NewPhoto(NewPhotoScratch::default()),
            SceneName::DeletePhoto => SceneScratch::DeletePhoto(DeletePhotoScratch::default()),
            SceneName::Photo => SceneScratch::Gallery(GalleryScratch::default()),
            SceneName::Search => SceneScratch::Search(SearchScratch::default()),
            SceneName::ChangeAvatar | SceneName::ChangeAbout | SceneName::Profile => {
                SceneScratch::None
            }
        }
    }
}

/// The per-conversation state blob.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub authorize: Option<UserSnapshot>,
    pub membership: Membership,
    pub navigation: Navigation,
    pub scene: Option<SceneName>,
    pub cursor: usize,
    pub scratch: SceneScratch,
}

impl Session {
    /// Activates `scene`, implicitly abandoning whatever was active:
    /// the old scratch bag is discarded, the cursor and navigation reset.
    pub fn enter_scene(&mut self, scene: SceneName) {
        self.scene = Some(scene);
        self.cursor = 0;
        self.scratch = SceneScratch::empty_for(scene);
        self.navigation.reset();
    }

    /// Leaves the active scene, discarding its scratch bag.
    pub fn leave_scene(&mut self) {
        self.scene = None;
        self.cursor = 0;
        self.scratch = SceneScratch::None;
        self.navigation.reset();
    }

    pub fn user_id(&self) -> Option<Uuid> {
        self.authorize.as_ref().map(|snapshot| snapshot.user_id)
    }
}
