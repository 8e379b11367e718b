//! # integration-tests
//!
//! End-to-end scenarios over the real engine wired to the in-memory
//! adapters. The only double is the gateway, which records every
//! outbound view instead of delivering it. This crate's library is the
//! shared harness; the scenarios live under `tests/`.

use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::Utc;
use uuid::Uuid;

use domains::{
    ActivationData, BotGateway, ChatContext, ChatKind, DomainResult, EventPayload, Gender,
    InboundEvent, Membership, PhotoStatus, RecordStore, Topic, TopicStatus, User, UserRole,
    UserStatus, View,
};

/// External identity the harness reserves for its seeded moderator.
pub const MODERATOR_EXTERNAL_ID: i64 = 999_999;
use services::Engine;
use storage_adapters::{
    ManualClock, MemoryQuotaCounter, MemoryRecordStore, MemorySessionStore,
};

/// Gateway double: records every outbound view and hands out
/// monotonically increasing message identities, so the edit-in-place
/// paths behave as they would against a real transport.
#[derive(Default)]
pub struct RecordingGateway {
    views: Mutex<Vec<View>>,
    removed: Mutex<Vec<(i64, i64)>>,
    next_message_ref: AtomicI64,
}

impl RecordingGateway {
    pub fn views(&self) -> Vec<View> {
        self.views.lock().unwrap().clone()
    }

    /// Drains the recorded views, so assertions read only what the step
    /// under test produced.
    pub fn take_views(&self) -> Vec<View> {
        std::mem::take(&mut *self.views.lock().unwrap())
    }

    pub fn last_view(&self) -> Option<View> {
        self.views.lock().unwrap().last().cloned()
    }

    /// `(chat_ref, message_ref)` pairs passed to `remove`.
    pub fn removed(&self) -> Vec<(i64, i64)> {
        self.removed.lock().unwrap().clone()
    }
}

#[async_trait]
impl BotGateway for RecordingGateway {
    async fn render(&self, _chat: &ChatContext, view: View) -> DomainResult<Option<i64>> {
        self.views.lock().unwrap().push(view);
        Ok(Some(self.next_message_ref.fetch_add(1, Ordering::Relaxed)))
    }

    async fn edit(&self, _chat: &ChatContext, _message_ref: i64, view: View) -> DomainResult<()> {
        self.views.lock().unwrap().push(view);
        Ok(())
    }

    async fn remove(&self, chat_ref: i64, message_ref: i64) -> DomainResult<()> {
        self.removed.lock().unwrap().push((chat_ref, message_ref));
        Ok(())
    }

    async fn membership(&self, _external_user_id: i64) -> DomainResult<Membership> {
        Ok(Membership {
            in_group: true,
            in_channel: true,
        })
    }
}

/// The full assembly: real engine, in-memory adapters, manual clock.
pub struct World {
    pub records: Arc<MemoryRecordStore>,
    pub quota: Arc<MemoryQuotaCounter>,
    pub sessions: Arc<MemorySessionStore>,
    pub gateway: Arc<RecordingGateway>,
    pub clock: Arc<ManualClock>,
    pub engine: Arc<Engine>,
    next_message_ref: AtomicI64,
}

impl Default for World {
    fn default() -> Self {
        Self::new()
    }
}

impl World {
    pub fn new() -> Self {
        let clock = Arc::new(ManualClock::default());
        let records = Arc::new(MemoryRecordStore::new(clock.clone()));
        let quota = Arc::new(MemoryQuotaCounter::new(clock.clone()));
        let sessions = Arc::new(MemorySessionStore::default());
        let gateway = Arc::new(RecordingGateway::default());
        let engine = Arc::new(Engine::new(
            records.clone(),
            quota.clone(),
            sessions.clone(),
            gateway.clone(),
        ));
        Self {
            records,
            quota,
            sessions,
            gateway,
            clock,
            engine,
            next_message_ref: AtomicI64::new(1),
        }
    }

    /// Feeds one private-chat event through the engine, as the transport
    /// would.
    pub async fn send(&self, external_id: i64, payload: EventPayload) {
        self.engine
            .handle_update(self.event(external_id, payload))
            .await;
    }

    pub fn event(&self, external_id: i64, payload: EventPayload) -> InboundEvent {
        InboundEvent {
            actor_external_id: external_id,
            chat: ChatContext {
                chat_ref: external_id,
                kind: ChatKind::Private,
            },
            message_ref: Some(self.next_message_ref.fetch_add(1, Ordering::Relaxed)),
            payload,
        }
    }

    pub async fn seed_topic(&self, name: &str) -> Topic {
        let topic = Topic {
            id: Uuid::new_v4(),
            group_chat_ref: -1,
            group_thread_ref: None,
            name: name.to_string(),
            status: TopicStatus::Available,
            description: String::new(),
        };
        self.records.seed_topic(topic.clone()).await;
        topic
    }

    /// Creates and activates a member directly against the store, for
    /// scenarios that are not about the registration flow itself.
    pub async fn register_member(&self, external_id: i64, nick: &str) -> User {
        let user = self
            .records
            .authorize_or_create(external_id)
            .await
            .expect("authorize");
        self.records
            .activate_user(
                user.id,
                ActivationData {
                    nick: nick.to_string(),
                    gender: Gender::Couple,
                    avatar_ref: "file_avatar".to_string(),
                    about: "hello there".to_string(),
                },
            )
            .await
            .expect("activate")
    }

    pub async fn seed_moderator(&self, external_id: i64) -> User {
        let now = Utc::now();
        let moderator = User {
            id: Uuid::new_v4(),
            external_id,
            nick: Some("the_moderator".to_string()),
            gender: None,
            status: UserStatus::Active,
            role: UserRole::Moderator,
            avatar_ref: None,
            about: None,
            register_time: now,
            last_activity_time: now,
        };
        self.records.seed_user(moderator.clone()).await;
        moderator
    }

    /// Submits and approves one photo, returning its id. Goes straight
    /// at the store; the submission wizard has its own tests.
    pub async fn approved_photo(&self, author: &User, topic_id: Uuid, media_ref: &str) -> Uuid {
        let photo = self
            .records
            .create_photo(author.id, topic_id, media_ref, "a photo")
            .await
            .expect("create photo");
        let moderator = match self
            .records
            .get_user_by_external(MODERATOR_EXTERNAL_ID)
            .await
            .expect("moderator lookup")
        {
            Some(existing) => existing,
            None => self.seed_moderator(MODERATOR_EXTERNAL_ID).await,
        };
        self.records
            .set_photo_status(moderator.id, photo.id, PhotoStatus::Approved)
            .await
            .expect("approve photo");
        photo.id
    }
}

pub fn cmd(raw: &str) -> EventPayload {
    EventPayload::Command(raw.to_string())
}

pub fn text(raw: &str) -> EventPayload {
    EventPayload::Text(raw.to_string())
}

pub fn cb(token: &str) -> EventPayload {
    EventPayload::Callback {
        token: token.to_string(),
    }
}

pub fn img(media_ref: &str) -> EventPayload {
    EventPayload::Image {
        media_ref: media_ref.to_string(),
    }
}
