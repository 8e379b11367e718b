//! In-memory `RecordStore`. Every state-changing operation takes the
//! write lock once, enforces its precondition, mutates, and appends the
//! audit row inside that one critical section. This mirrors the
//! lock, check, mutate, log shape of the relational adapter.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::json;
use tokio::sync::RwLock;
use uuid::Uuid;

use domains::{
    ActivationData, AuditAction, AuditEntry, AuditFamily, Comment, CommentStatus, DomainError,
    DomainResult, Photo, PhotoStatus, PostSurface, PostedMessage, Rate, RateValue, RecordStore,
    Topic, TopicStatus, User, UserRole, UserStatus,
};

use crate::clock::{Clock, SystemClock};

#[derive(Default)]
struct Inner {
    users: HashMap<Uuid, User>,
    users_by_external: HashMap<i64, Uuid>,
    topics: HashMap<Uuid, Topic>,
    photos: HashMap<Uuid, Photo>,
    rates: HashMap<Uuid, Rate>,
    rate_keys: HashSet<(Uuid, Uuid)>,
    comments: HashMap<Uuid, Comment>,
    audit: HashMap<AuditFamily, Vec<AuditEntry>>,
}

impl Inner {
    fn append_log(
        &mut self,
        family: AuditFamily,
        entity_id: Uuid,
        actor_user_id: Uuid,
        action: AuditAction,
        resulting_status: &str,
        resulting_role: Option<&str>,
        data: serde_json::Value,
        at: chrono::DateTime<chrono::Utc>,
    ) {
        self.audit.entry(family).or_default().push(AuditEntry {
            entity_id,
            actor_user_id,
            action,
            resulting_status: resulting_status.to_string(),
            resulting_role: resulting_role.map(str::to_string),
            data,
            created_at: at,
        });
    }

    fn user_mut(&mut self, user_id: Uuid) -> DomainResult<&mut User> {
        self.users
            .get_mut(&user_id)
            .ok_or(DomainError::NotFound("User", user_id.to_string()))
    }

    fn nick_in_use(&self, nick: &str) -> bool {
        self.users
            .values()
            .any(|user| user.nick.as_deref() == Some(nick))
    }
}

pub struct MemoryRecordStore {
    inner: Arc<RwLock<Inner>>,
    clock: Arc<dyn Clock>,
}

impl Default for MemoryRecordStore {
    fn default() -> Self {
        Self::new(Arc::new(SystemClock))
    }
}

impl MemoryRecordStore {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            inner: Arc::default(),
            clock,
        }
    }

    /// Bootstrap hook: topics are seeded administratively, no
    /// conversation flow creates them.
    pub async fn seed_topic(&self, topic: Topic) {
        self.inner.write().await.topics.insert(topic.id, topic);
    }

    /// Bootstrap/test hook for pre-existing members (e.g. a moderator).
    pub async fn seed_user(&self, user: User) {
        let mut inner = self.inner.write().await;
        inner.users_by_external.insert(user.external_id, user.id);
        inner.users.insert(user.id, user);
    }
}

#[async_trait]
impl RecordStore for MemoryRecordStore {
    async fn authorize_or_create(&self, external_id: i64) -> DomainResult<User> {
        let mut inner = self.inner.write().await;
        if let Some(user_id) = inner.users_by_external.get(&external_id).copied() {
            return inner.users.get(&user_id).cloned().ok_or_else(|| {
                DomainError::invariant("external-id index points at a missing user row")
            });
        }

        let now = self.clock.now();
        let user = User {
            id: Uuid::new_v4(),
            external_id,
            nick: None,
            gender: None,
            status: UserStatus::Register,
            role: UserRole::User,
            avatar_ref: None,
            about: None,
            register_time: now,
            last_activity_time: now,
        };
        inner.users_by_external.insert(external_id, user.id);
        inner.users.insert(user.id, user.clone());
        inner.append_log(
            AuditFamily::User,
            user.id,
            user.id,
            AuditAction::UserRegister,
            user.status.as_str(),
            Some(user.role.as_str()),
            json!({ "external_id": external_id }),
            now,
        );
        Ok(user)
    }

    async fn activate_user(
        &self,
        user_id: Uuid,
        activation: ActivationData,
    ) -> DomainResult<User> {
        let mut inner = self.inner.write().await;
        if inner.nick_in_use(&activation.nick) {
            return Err(DomainError::precondition(format!(
                "nick {} is already taken",
                activation.nick
            )));
        }
        let now = self.clock.now();
        let user = inner.user_mut(user_id)?;
        if user.status != UserStatus::Register {
            return Err(DomainError::precondition(format!(
                "user {user_id} is not in register status"
            )));
        }
        user.nick = Some(activation.nick.clone());
        user.gender = Some(activation.gender);
        user.avatar_ref = Some(activation.avatar_ref);
        user.about = Some(activation.about);
        user.status = UserStatus::Active;
        user.last_activity_time = now;
        let user = user.clone();
        inner.append_log(
            AuditFamily::User,
            user_id,
            user_id,
            AuditAction::UserActivate,
            user.status.as_str(),
            Some(user.role.as_str()),
            json!({ "nick": activation.nick }),
            now,
        );
        Ok(user)
    }

    async fn set_avatar(&self, user_id: Uuid, avatar_ref: &str) -> DomainResult<User> {
        let mut inner = self.inner.write().await;
        let now = self.clock.now();
        let user = inner.user_mut(user_id)?;
        if !user.status.can_participate() {
            return Err(DomainError::precondition(format!(
                "user {user_id} may not edit their profile in {} status",
                user.status.as_str()
            )));
        }
        user.avatar_ref = Some(avatar_ref.to_string());
        user.last_activity_time = now;
        let user = user.clone();
        inner.append_log(
            AuditFamily::User,
            user_id,
            user_id,
            AuditAction::UserSetAvatar,
            user.status.as_str(),
            Some(user.role.as_str()),
            json!({}),
            now,
        );
        Ok(user)
    }

    async fn set_about(&self, user_id: Uuid, about: &str) -> DomainResult<User> {
        let mut inner = self.inner.write().await;
        let now = self.clock.now();
        let user = inner.user_mut(user_id)?;
        if !user.status.can_participate() {
            return Err(DomainError::precondition(format!(
                "user {user_id} may not edit their profile in {} status",
                user.status.as_str()
            )));
        }
        user.about = Some(about.to_string());
        user.last_activity_time = now;
        let user = user.clone();
        inner.append_log(
            AuditFamily::User,
            user_id,
            user_id,
            AuditAction::UserSetAbout,
            user.status.as_str(),
            Some(user.role.as_str()),
            json!({}),
            now,
        );
        Ok(user)
    }

    async fn create_photo(
        &self,
        user_id: Uuid,
        topic_id: Uuid,
        media_ref: &str,
        description: &str,
    ) -> DomainResult<Photo> {
        let mut inner = self.inner.write().await;
        let actor = inner
            .users
            .get(&user_id)
            .ok_or(DomainError::NotFound("User", user_id.to_string()))?;
        if actor.status != UserStatus::Active {
            return Err(DomainError::precondition(format!(
                "user {user_id} is not active"
            )));
        }
        let topic = inner
            .topics
            .get(&topic_id)
            .ok_or(DomainError::NotFound("Topic", topic_id.to_string()))?;
        if topic.status != TopicStatus::Available {
            return Err(DomainError::precondition(format!(
                "topic {topic_id} is not available"
            )));
        }

        let now = self.clock.now();
        let photo = Photo {
            id: Uuid::new_v4(),
            user_id,
            topic_id,
            moderation_post: None,
            channel_post: None,
            media_ref: media_ref.to_string(),
            description: description.to_string(),
            status: PhotoStatus::Pending,
            create_time: now,
        };
        inner.photos.insert(photo.id, photo.clone());
        inner.append_log(
            AuditFamily::Photo,
            photo.id,
            user_id,
            AuditAction::PhotoCreate,
            photo.status.as_str(),
            None,
            json!({ "topic_id": topic_id }),
            now,
        );
        Ok(photo)
    }

    async fn set_photo_posted(
        &self,
        photo_id: Uuid,
        surface: PostSurface,
        posted: PostedMessage,
    ) -> DomainResult<Photo> {
        let mut inner = self.inner.write().await;
        let now = self.clock.now();
        let photo = inner
            .photos
            .get_mut(&photo_id)
            .ok_or(DomainError::NotFound("Photo", photo_id.to_string()))?;
        match surface {
            PostSurface::Moderation => photo.moderation_post = Some(posted),
            PostSurface::Channel => photo.channel_post = Some(posted),
        }
        let photo = photo.clone();
        inner.append_log(
            AuditFamily::Photo,
            photo_id,
            photo.user_id,
            AuditAction::PhotoPost,
            photo.status.as_str(),
            None,
            json!({ "surface": surface, "chat_ref": posted.chat_ref }),
            now,
        );
        Ok(photo)
    }

    async fn set_photo_status(
        &self,
        actor_id: Uuid,
        photo_id: Uuid,
        status: PhotoStatus,
    ) -> DomainResult<Photo> {
        let mut inner = self.inner.write().await;
        let actor = inner
            .users
            .get(&actor_id)
            .ok_or(DomainError::NotFound("User", actor_id.to_string()))?;
        if !actor.role.can_moderate() {
            return Err(DomainError::precondition(format!(
                "user {actor_id} may not moderate photos"
            )));
        }
        let now = self.clock.now();
        let photo = inner
            .photos
            .get_mut(&photo_id)
            .ok_or(DomainError::NotFound("Photo", photo_id.to_string()))?;
        if photo.status != PhotoStatus::Pending {
            return Err(DomainError::precondition(format!(
                "photo {photo_id} is not pending"
            )));
        }
        let action = match status {
            PhotoStatus::Approved => AuditAction::PhotoApprove,
            PhotoStatus::Rejected => AuditAction::PhotoReject,
            PhotoStatus::Pending => {
                return Err(DomainError::precondition(
                    "a moderation decision cannot return a photo to pending",
                ))
            }
        };
        photo.status = status;
        let photo = photo.clone();
        inner.append_log(
            AuditFamily::Photo,
            photo_id,
            actor_id,
            action,
            photo.status.as_str(),
            None,
            json!({}),
            now,
        );
        Ok(photo)
    }

    async fn delete_photo(&self, user_id: Uuid, photo_id: Uuid) -> DomainResult<Photo> {
        let mut inner = self.inner.write().await;
        let now = self.clock.now();
        let photo = inner
            .photos
            .get_mut(&photo_id)
            .ok_or(DomainError::NotFound("Photo", photo_id.to_string()))?;
        if photo.user_id != user_id {
            return Err(DomainError::precondition(format!(
                "photo {photo_id} does not belong to user {user_id}"
            )));
        }
        photo.status = PhotoStatus::Rejected;
        let photo = photo.clone();
        inner.append_log(
            AuditFamily::Photo,
            photo_id,
            user_id,
            AuditAction::PhotoDelete,
            photo.status.as_str(),
            None,
            json!({}),
            now,
        );
        Ok(photo)
    }

    async fn create_rate(
        &self,
        user_id: Uuid,
        photo_id: Uuid,
        value: RateValue,
    ) -> DomainResult<Rate> {
        let mut inner = self.inner.write().await;
        let photo = inner
            .photos
            .get(&photo_id)
            .ok_or(DomainError::NotFound("Photo", photo_id.to_string()))?;
        if photo.status != PhotoStatus::Approved {
            return Err(DomainError::precondition(format!(
                "photo {photo_id} is not approved"
            )));
        }
        if inner.rate_keys.contains(&(user_id, photo_id)) {
            return Err(DomainError::precondition(format!(
                "user {user_id} already rated photo {photo_id}"
            )));
        }

        let topic_id = photo.topic_id;
        let now = self.clock.now();
        let rate = Rate {
            id: Uuid::new_v4(),
            user_id,
            topic_id,
            photo_id,
            value,
            create_time: now,
        };
        inner.rate_keys.insert((user_id, photo_id));
        inner.rates.insert(rate.id, rate.clone());
        inner.append_log(
            AuditFamily::Rate,
            rate.id,
            user_id,
            AuditAction::RateCreate,
            "created",
            None,
            json!({ "photo_id": photo_id, "value": value.as_i16() }),
            now,
        );
        Ok(rate)
    }

    async fn create_comment(
        &self,
        user_id: Uuid,
        photo_id: Uuid,
        message_ref: i64,
        text: &str,
    ) -> DomainResult<Comment> {
        let mut inner = self.inner.write().await;
        let actor = inner
            .users
            .get(&user_id)
            .ok_or(DomainError::NotFound("User", user_id.to_string()))?;
        if actor.status != UserStatus::Active {
            return Err(DomainError::precondition(format!(
                "user {user_id} is not active"
            )));
        }
        let photo = inner
            .photos
            .get(&photo_id)
            .ok_or(DomainError::NotFound("Photo", photo_id.to_string()))?;
        if photo.status != PhotoStatus::Approved {
            return Err(DomainError::precondition(format!(
                "photo {photo_id} is not approved"
            )));
        }
        let topic_id = photo.topic_id;
        let topic = inner
            .topics
            .get(&topic_id)
            .ok_or(DomainError::NotFound("Topic", topic_id.to_string()))?;
        if topic.status != TopicStatus::Available {
            return Err(DomainError::precondition(format!(
                "topic {topic_id} is not available"
            )));
        }

        let now = self.clock.now();
        let comment = Comment {
            id: Uuid::new_v4(),
            user_id,
            topic_id,
            photo_id,
            message_ref,
            status: CommentStatus::Visible,
            text: text.to_string(),
            create_time: now,
        };
        inner.comments.insert(comment.id, comment.clone());
        inner.user_mut(user_id)?.last_activity_time = now;
        inner.append_log(
            AuditFamily::Comment,
            comment.id,
            user_id,
            AuditAction::CommentCreate,
            comment.status.as_str(),
            None,
            json!({ "photo_id": photo_id }),
            now,
        );
        Ok(comment)
    }

    // ── Read-only accessors ──────────────────────────────────────────────

    async fn get_user_by_external(&self, external_id: i64) -> DomainResult<Option<User>> {
        let inner = self.inner.read().await;
        Ok(inner
            .users_by_external
            .get(&external_id)
            .and_then(|user_id| inner.users.get(user_id))
            .cloned())
    }

    async fn get_user_profile(&self, user_id: Uuid) -> DomainResult<Option<User>> {
        Ok(self.inner.read().await.users.get(&user_id).cloned())
    }

    async fn is_nick_taken(&self, nick: &str) -> DomainResult<bool> {
        Ok(self.inner.read().await.nick_in_use(nick))
    }

    async fn get_topics(&self) -> DomainResult<Vec<Topic>> {
        let mut topics: Vec<Topic> = self
            .inner
            .read()
            .await
            .topics
            .values()
            .filter(|topic| topic.status == TopicStatus::Available)
            .cloned()
            .collect();
        topics.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(topics)
    }

    async fn get_topic(&self, topic_id: Uuid) -> DomainResult<Option<Topic>> {
        Ok(self.inner.read().await.topics.get(&topic_id).cloned())
    }

    async fn get_photos_for_user(&self, user_id: Uuid) -> DomainResult<Vec<Photo>> {
        let mut photos: Vec<Photo> = self
            .inner
            .read()
            .await
            .photos
            .values()
            .filter(|photo| photo.user_id == user_id && photo.status != PhotoStatus::Rejected)
            .cloned()
            .collect();
        photos.sort_by(|a, b| b.create_time.cmp(&a.create_time));
        Ok(photos)
    }

    async fn get_approved_photos(
        &self,
        topic_id: Uuid,
        page: u32,
        per_page: u32,
    ) -> DomainResult<(Vec<Photo>, u32)> {
        let inner = self.inner.read().await;
        let mut approved: Vec<Photo> = inner
            .photos
            .values()
            .filter(|photo| photo.topic_id == topic_id && photo.status == PhotoStatus::Approved)
            .cloned()
            .collect();
        approved.sort_by(|a, b| b.create_time.cmp(&a.create_time));

        if per_page == 0 {
            return Ok((Vec::new(), 0));
        }
        let total_pages = ((approved.len() as u32) + per_page - 1) / per_page;
        if page == 0 {
            return Ok((Vec::new(), total_pages));
        }
        let start = ((page - 1) * per_page) as usize;
        let slice = approved
            .into_iter()
            .skip(start)
            .take(per_page as usize)
            .collect();
        Ok((slice, total_pages))
    }

    async fn search_by_nick(&self, fragment: &str) -> DomainResult<Vec<User>> {
        let needle = fragment.to_lowercase();
        let mut found: Vec<User> = self
            .inner
            .read()
            .await
            .users
            .values()
            .filter(|user| {
                user.status.can_participate()
                    && user
                        .nick
                        .as_deref()
                        .is_some_and(|nick| nick.contains(&needle))
            })
            .cloned()
            .collect();
        found.sort_by(|a, b| a.nick.cmp(&b.nick));
        Ok(found)
    }

    async fn rating_summary(&self, photo_id: Uuid) -> DomainResult<(u64, f64)> {
        let inner = self.inner.read().await;
        let values: Vec<i16> = inner
            .rates
            .values()
            .filter(|rate| rate.photo_id == photo_id)
            .map(|rate| rate.value.as_i16())
            .collect();
        if values.is_empty() {
            return Ok((0, 0.0));
        }
        let sum: i64 = values.iter().map(|v| *v as i64).sum();
        Ok((values.len() as u64, sum as f64 / values.len() as f64))
    }

    async fn audit_trail(
        &self,
        family: AuditFamily,
        entity_id: Uuid,
    ) -> DomainResult<Vec<AuditEntry>> {
        Ok(self
            .inner
            .read()
            .await
            .audit
            .get(&family)
            .map(|entries| {
                entries
                    .iter()
                    .filter(|entry| entry.entity_id == entity_id)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn topic() -> Topic {
        Topic {
            id: Uuid::new_v4(),
            group_chat_ref: -100,
            group_thread_ref: None,
            name: "landscapes".to_string(),
            status: TopicStatus::Available,
            description: "wide outdoors".to_string(),
        }
    }

    fn activation() -> ActivationData {
        ActivationData {
            nick: "abcd_1".to_string(),
            gender: domains::Gender::Couple,
            avatar_ref: "ava".to_string(),
            about: "hello there".to_string(),
        }
    }

    #[tokio::test]
    async fn authorize_is_idempotent_per_external_identity() {
        let store = MemoryRecordStore::default();
        let first = store.authorize_or_create(42).await.unwrap();
        let second = store.authorize_or_create(42).await.unwrap();
        assert_eq!(first.id, second.id);
        assert_eq!(first.status, UserStatus::Register);

        let trail = store
            .audit_trail(AuditFamily::User, first.id)
            .await
            .unwrap();
        assert_eq!(trail.len(), 1);
        assert_eq!(trail[0].action, AuditAction::UserRegister);
    }

    #[tokio::test]
    async fn activation_happens_exactly_once() {
        let store = MemoryRecordStore::default();
        let user = store.authorize_or_create(1).await.unwrap();
        let activated = store.activate_user(user.id, activation()).await.unwrap();
        assert_eq!(activated.status, UserStatus::Active);
        assert_eq!(activated.nick.as_deref(), Some("abcd_1"));

        let replay = store.activate_user(user.id, activation()).await;
        assert!(matches!(replay, Err(DomainError::Precondition(_))));

        let trail = store.audit_trail(AuditFamily::User, user.id).await.unwrap();
        let activations = trail
            .iter()
            .filter(|entry| entry.action == AuditAction::UserActivate)
            .count();
        assert_eq!(activations, 1);
    }

    #[tokio::test]
    async fn nick_collision_blocks_activation() {
        let store = MemoryRecordStore::default();
        let first = store.authorize_or_create(1).await.unwrap();
        store.activate_user(first.id, activation()).await.unwrap();

        let second = store.authorize_or_create(2).await.unwrap();
        let collision = store.activate_user(second.id, activation()).await;
        assert!(matches!(collision, Err(DomainError::Precondition(_))));
        assert!(store.is_nick_taken("abcd_1").await.unwrap());
    }

    #[tokio::test]
    async fn photo_requires_active_actor_and_available_topic() {
        let store = MemoryRecordStore::default();
        let topic = topic();
        store.seed_topic(topic.clone()).await;

        let user = store.authorize_or_create(1).await.unwrap();
        let premature = store
            .create_photo(user.id, topic.id, "media", "desc")
            .await;
        assert!(matches!(premature, Err(DomainError::Precondition(_))));

        store.activate_user(user.id, activation()).await.unwrap();
        let photo = store
            .create_photo(user.id, topic.id, "media", "desc")
            .await
            .unwrap();
        assert_eq!(photo.status, PhotoStatus::Pending);

        let mut closed = topic.clone();
        closed.id = Uuid::new_v4();
        closed.status = TopicStatus::Closed;
        store.seed_topic(closed.clone()).await;
        let blocked = store
            .create_photo(user.id, closed.id, "media", "desc")
            .await;
        assert!(matches!(blocked, Err(DomainError::Precondition(_))));
    }

    #[tokio::test]
    async fn second_rate_for_same_pair_is_rejected() {
        let store = MemoryRecordStore::default();
        let topic = topic();
        store.seed_topic(topic.clone()).await;

        let author = store.authorize_or_create(1).await.unwrap();
        store.activate_user(author.id, activation()).await.unwrap();
        let photo = store
            .create_photo(author.id, topic.id, "media", "desc")
            .await
            .unwrap();

        let moderator = User {
            role: UserRole::Moderator,
            status: UserStatus::Active,
            ..store.authorize_or_create(99).await.unwrap()
        };
        store.seed_user(moderator.clone()).await;
        store
            .set_photo_status(moderator.id, photo.id, PhotoStatus::Approved)
            .await
            .unwrap();

        let rater = store.authorize_or_create(2).await.unwrap();
        let mut second_activation = activation();
        second_activation.nick = "efgh_2".to_string();
        store
            .activate_user(rater.id, second_activation)
            .await
            .unwrap();

        store
            .create_rate(rater.id, photo.id, RateValue::Four)
            .await
            .unwrap();
        let replay = store.create_rate(rater.id, photo.id, RateValue::Five).await;
        assert!(matches!(replay, Err(DomainError::Precondition(_))));

        let (count, avg) = store.rating_summary(photo.id).await.unwrap();
        assert_eq!(count, 1);
        assert!((avg - 4.0).abs() < f64::EPSILON);
    }

    #[tokio::test]
    async fn deleting_a_foreign_photo_is_rejected() {
        let store = MemoryRecordStore::default();
        let topic = topic();
        store.seed_topic(topic.clone()).await;

        let owner = store.authorize_or_create(1).await.unwrap();
        store.activate_user(owner.id, activation()).await.unwrap();
        let photo = store
            .create_photo(owner.id, topic.id, "media", "desc")
            .await
            .unwrap();

        let stranger = store.authorize_or_create(2).await.unwrap();
        let foreign = store.delete_photo(stranger.id, photo.id).await;
        assert!(matches!(foreign, Err(DomainError::Precondition(_))));

        let deleted = store.delete_photo(owner.id, photo.id).await.unwrap();
        assert_eq!(deleted.status, PhotoStatus::Rejected);
    }
}
