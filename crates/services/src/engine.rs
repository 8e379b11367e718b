//! # Conversation Engine
//!
//! Deterministically routes each inbound event for a user to the correct
//! step of the active wizard, or to menu/command routing when no scene is
//! active. All collaborators arrive by injection; the engine owns no
//! global state beyond what the session blob carries.

use std::sync::Arc;

use tracing::{error, warn};

use domains::{
    BotGateway, DomainResult, EventPayload, InboundEvent, QuotaCounter, RecordStore, SceneName,
    Session, SessionStore, UserSnapshot, UserStatus, View,
};

use crate::scenes::{self, Flow, StepCtx};

pub struct Engine {
    records: Arc<dyn RecordStore>,
    quota: Arc<dyn QuotaCounter>,
    sessions: Arc<dyn SessionStore>,
    gateway: Arc<dyn BotGateway>,
}

impl Engine {
    pub fn new(
        records: Arc<dyn RecordStore>,
        quota: Arc<dyn QuotaCounter>,
        sessions: Arc<dyn SessionStore>,
        gateway: Arc<dyn BotGateway>,
    ) -> Self {
        Self {
            records,
            quota,
            sessions,
            gateway,
        }
    }

    /// Processes one update end to end: load session, run the matching
    /// step, save session. Every error is absorbed here; one faulting
    /// conversation must never take down other users' conversations or
    /// the process.
    pub async fn handle_update(&self, event: InboundEvent) {
        let key = event.actor_external_id;

        let mut session = match self.sessions.load(key).await {
            Ok(stored) => stored.unwrap_or_default(),
            Err(err) => {
                error!(user = key, error = %err, "session load failed; starting fresh");
                Session::default()
            }
        };

        if let Err(err) = self.process(&mut session, &event).await {
            error!(
                user = key,
                scene = ?session.scene,
                cursor = session.cursor,
                error = %err,
                "conversation step failed; abandoning scene"
            );
            session.leave_scene();
            let _ = self.gateway.render(&event.chat, View::Failure).await;
            let _ = self.render_menu(&session, &event).await;
        }

        if let Err(err) = self.sessions.save(key, &session).await {
            error!(user = key, error = %err, "session save failed");
        }
    }

    async fn process(&self, session: &mut Session, event: &InboundEvent) -> DomainResult<()> {
        // 1. Authorize: sync the user snapshot on every update. First
        //    contact creates the register-status row.
        let user = self
            .records
            .authorize_or_create(event.actor_external_id)
            .await?;
        session.authorize = Some(UserSnapshot::from(&user));

        if user.status == UserStatus::Banned {
            session.leave_scene();
            self.gateway.render(&event.chat, View::Banned).await?;
            return Ok(());
        }

        // 2. Membership flags are re-derived per update for private chats
        //    only; a transport hiccup here must not block the step.
        if event.is_private() {
            match self.gateway.membership(event.actor_external_id).await {
                Ok(membership) => session.membership = membership,
                Err(err) => {
                    warn!(user = event.actor_external_id, error = %err, "membership lookup failed")
                }
            }
        }

        // 3. Global commands preempt whatever scene is active.
        let mut flow = if let EventPayload::Command(cmd) = &event.payload {
            self.route_command(session, cmd)
        } else if let Some(scene) = session.scene {
            self.dispatch_scene(scene, session, event).await?
        } else {
            self.route_idle(session, event).await?
        };

        // 4. Apply the resulting flow; entering a scene runs its guard and
        //    first prompt, which may immediately redirect away again.
        loop {
            match flow {
                Flow::Continue => break,
                Flow::Leave => {
                    session.leave_scene();
                    self.render_menu(session, event).await?;
                    break;
                }
                Flow::Switch(next) => {
                    session.enter_scene(next);
                    flow = self.enter_scene(next, session, event).await?;
                }
            }
        }
        Ok(())
    }

    /// `/start` enters registration for not-yet-activated users; anything
    /// else falls back to the main menu.
    fn route_command(&self, session: &mut Session, cmd: &str) -> Flow {
        let status = session.authorize.as_ref().map(|snapshot| snapshot.status);
        match cmd {
            "/start" if status == Some(UserStatus::Register) => Flow::Switch(SceneName::Register),
            _ => Flow::Leave,
        }
    }

    /// No scene active: menu buttons open scenes, everything else just
    /// re-renders the menu.
    async fn route_idle(&self, session: &mut Session, event: &InboundEvent) -> DomainResult<Flow> {
        match event.payload.callback_parts() {
            Some(("menu", Some("new_photo"))) => Ok(Flow::Switch(SceneName::NewPhoto)),
            Some(("menu", Some("gallery"))) => Ok(Flow::Switch(SceneName::Photo)),
            Some(("menu", Some("profile"))) => Ok(Flow::Switch(SceneName::Profile)),
            Some(("menu", Some("search"))) => Ok(Flow::Switch(SceneName::Search)),
            Some(("menu", Some("my_photos"))) => Ok(Flow::Switch(SceneName::DeletePhoto)),
            _ => {
                self.render_menu(session, event).await?;
                Ok(Flow::Continue)
            }
        }
    }

    async fn dispatch_scene(
        &self,
        scene: SceneName,
        session: &mut Session,
        event: &InboundEvent,
    ) -> DomainResult<Flow> {
        let mut ctx = self.ctx(session, event);
        match scene {
            SceneName::Register => scenes::register::handle(&mut ctx, event).await,
            SceneName::NewPhoto => scenes::new_photo::handle(&mut ctx, event).await,
            SceneName::ChangeAvatar => scenes::change_avatar::handle(&mut ctx, event).await,
            SceneName::ChangeAbout => scenes::change_about::handle(&mut ctx, event).await,
            SceneName::DeletePhoto => scenes::delete_photo::handle(&mut ctx, event).await,
            SceneName::Photo => scenes::gallery::handle(&mut ctx, event).await,
            SceneName::Profile => scenes::profile::handle(&mut ctx, event).await,
            SceneName::Search => scenes::search::handle(&mut ctx, event).await,
        }
    }

    async fn enter_scene(
        &self,
        scene: SceneName,
        session: &mut Session,
        event: &InboundEvent,
    ) -> DomainResult<Flow> {
        let mut ctx = self.ctx(session, event);
        match scene {
            SceneName::Register => scenes::register::enter(&mut ctx).await,
            SceneName::NewPhoto => scenes::new_photo::enter(&mut ctx).await,
            SceneName::ChangeAvatar => scenes::change_avatar::enter(&mut ctx).await,
            SceneName::ChangeAbout => scenes::change_about::enter(&mut ctx).await,
            SceneName::DeletePhoto => scenes::delete_photo::enter(&mut ctx).await,
            SceneName::Photo => scenes::gallery::enter(&mut ctx).await,
            SceneName::Profile => scenes::profile::enter(&mut ctx).await,
            SceneName::Search => scenes::search::enter(&mut ctx).await,
        }
    }

    fn ctx<'a>(&'a self, session: &'a mut Session, event: &'a InboundEvent) -> StepCtx<'a> {
        StepCtx {
            records: self.records.as_ref(),
            quota: self.quota.as_ref(),
            gateway: self.gateway.as_ref(),
            session,
            chat: &event.chat,
        }
    }

    async fn render_menu(&self, session: &Session, event: &InboundEvent) -> DomainResult<()> {
        let nick = session
            .authorize
            .as_ref()
            .and_then(|snapshot| snapshot.nick.clone());
        self.gateway
            .render(&event.chat, View::MainMenu { nick })
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    use chrono::Utc;
    use uuid::Uuid;

    use domains::{
        ChatContext, ChatKind, Membership, MockBotGateway, MockQuotaCounter, MockRecordStore,
        MockSessionStore, User, UserRole,
    };

    fn user_with_status(status: UserStatus) -> User {
        User {
            id: Uuid::new_v4(),
            external_id: 7,
            nick: (status != UserStatus::Register).then(|| "abcd_1".to_string()),
            gender: None,
            status,
            role: UserRole::User,
            avatar_ref: None,
            about: None,
            register_time: Utc::now(),
            last_activity_time: Utc::now(),
        }
    }

    fn private_event(payload: EventPayload) -> InboundEvent {
        InboundEvent {
            actor_external_id: 7,
            chat: ChatContext {
                chat_ref: 7,
                kind: ChatKind::Private,
            },
            message_ref: Some(100),
            payload,
        }
    }

    struct Harness {
        records: MockRecordStore,
        quota: MockQuotaCounter,
        gateway: MockBotGateway,
        views: Arc<Mutex<Vec<View>>>,
        saved: Arc<Mutex<Option<Session>>>,
    }

    impl Harness {
        fn new(status: UserStatus) -> Self {
            let mut records = MockRecordStore::new();
            records
                .expect_authorize_or_create()
                .returning(move |_| Ok(user_with_status(status)));

            let views: Arc<Mutex<Vec<View>>> = Arc::default();
            let sink = views.clone();
            let mut gateway = MockBotGateway::new();
            gateway
                .expect_membership()
                .returning(|_| Ok(Membership::default()));
            gateway.expect_render().returning(move |_, view| {
                sink.lock().unwrap().push(view);
                Ok(None)
            });

            Self {
                records,
                quota: MockQuotaCounter::new(),
                gateway,
                views,
                saved: Arc::default(),
            }
        }

        fn engine(self) -> (Engine, Arc<Mutex<Vec<View>>>, Arc<Mutex<Option<Session>>>) {
            let mut sessions = MockSessionStore::new();
            sessions.expect_load().returning(|_| Ok(None));
            let saved = self.saved.clone();
            let sink = saved.clone();
            sessions.expect_save().returning(move |_, session| {
                *sink.lock().unwrap() = Some(session.clone());
                Ok(())
            });

            let engine = Engine::new(
                Arc::new(self.records),
                Arc::new(self.quota),
                Arc::new(sessions),
                Arc::new(self.gateway),
            );
            (engine, self.views, saved)
        }
    }

    #[tokio::test]
    async fn start_command_enters_register_for_fresh_user() {
        let harness = Harness::new(UserStatus::Register);
        let (engine, views, saved) = harness.engine();

        engine
            .handle_update(private_event(EventPayload::Command("/start".to_string())))
            .await;

        assert!(views.lock().unwrap().contains(&View::AskNick));
        let session = saved.lock().unwrap().clone().unwrap();
        assert_eq!(session.scene, Some(SceneName::Register));
        assert_eq!(session.cursor, 0);
    }

    #[tokio::test]
    async fn start_command_for_active_user_renders_menu() {
        let harness = Harness::new(UserStatus::Active);
        let (engine, views, saved) = harness.engine();

        engine
            .handle_update(private_event(EventPayload::Command("/start".to_string())))
            .await;

        let views = views.lock().unwrap();
        assert!(matches!(views.last(), Some(View::MainMenu { .. })));
        assert_eq!(saved.lock().unwrap().clone().unwrap().scene, None);
    }

    #[tokio::test]
    async fn banned_user_is_shut_out() {
        let harness = Harness::new(UserStatus::Banned);
        let (engine, views, saved) = harness.engine();

        engine
            .handle_update(private_event(EventPayload::Text("hello".to_string())))
            .await;

        assert_eq!(views.lock().unwrap().as_slice(), &[View::Banned]);
        assert_eq!(saved.lock().unwrap().clone().unwrap().scene, None);
    }

    #[tokio::test]
    async fn quota_limited_user_never_reaches_topic_step() {
        let mut harness = Harness::new(UserStatus::Active);
        harness.quota.expect_check().returning(|_| Ok(9_000_000));
        // No expectation on get_topics: reaching it would fail the test.
        let (engine, views, saved) = harness.engine();

        engine
            .handle_update(private_event(EventPayload::Callback {
                token: "menu:new_photo".to_string(),
            }))
            .await;

        assert!(views
            .lock()
            .unwrap()
            .contains(&View::QuotaExceeded { reset_ms: 9_000_000 }));
        assert_eq!(saved.lock().unwrap().clone().unwrap().scene, None);
    }

    #[tokio::test]
    async fn store_failure_abandons_scene_and_renders_failure() {
        let mut harness = Harness::new(UserStatus::Active);
        harness.quota.expect_check().returning(|_| Ok(0));
        harness
            .records
            .expect_get_topics()
            .returning(|| Err(domains::DomainError::integration("store down")));
        let (engine, views, saved) = harness.engine();

        engine
            .handle_update(private_event(EventPayload::Callback {
                token: "menu:new_photo".to_string(),
            }))
            .await;

        assert!(views.lock().unwrap().contains(&View::Failure));
        assert_eq!(saved.lock().unwrap().clone().unwrap().scene, None);
    }
}
