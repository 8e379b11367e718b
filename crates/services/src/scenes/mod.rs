//! # Scenes
//!
//! One module per conversational mode. Wizards match on the persisted
//! cursor; a handler advances it only after validating and committing its
//! input into the scratch bag. Invalid input re-prompts without advancing.

pub mod change_about;
pub mod change_avatar;
pub mod delete_photo;
pub mod gallery;
pub mod new_photo;
pub mod profile;
pub mod register;
pub mod search;

use domains::{
    BotGateway, ChatContext, DomainError, DomainResult, QuotaCounter, RecordStore, SceneName,
    Session, UserSnapshot, View,
};

/// What the engine should do after a step ran.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    /// Stay in the scene (the handler already adjusted the cursor).
    Continue,
    /// Leave the scene and fall back to the main menu.
    Leave,
    /// Leave and enter another scene, running its guard and entry prompt.
    Switch(SceneName),
}

/// Everything a step handler may touch. Borrowed per update; no handler
/// holds state across suspension points outside the session itself.
pub struct StepCtx<'a> {
    pub records: &'a dyn RecordStore,
    pub quota: &'a dyn QuotaCounter,
    pub gateway: &'a dyn BotGateway,
    pub session: &'a mut Session,
    pub chat: &'a ChatContext,
}

impl StepCtx<'_> {
    /// The authorization snapshot. Missing one this deep in a scene is an
    /// invariant violation, not a user error.
    pub fn snapshot(&self) -> DomainResult<&UserSnapshot> {
        self.session
            .authorize
            .as_ref()
            .ok_or_else(|| DomainError::invariant("scene entered without authorization snapshot"))
    }

    /// Fire-and-remember-nothing render.
    pub async fn say(&self, view: View) -> DomainResult<()> {
        self.gateway.render(self.chat, view).await?;
        Ok(())
    }

    /// Renders and remembers the message identity so a browsing scene can
    /// edit it in place on the next page turn.
    pub async fn show(&mut self, view: View) -> DomainResult<()> {
        if let Some(message_ref) = self.gateway.render(self.chat, view).await? {
            self.session.navigation.remember_message(message_ref);
        }
        Ok(())
    }

    /// Edits the remembered message when possible, falls back to a fresh
    /// render otherwise.
    pub async fn refresh(&mut self, view: View) -> DomainResult<()> {
        match (
            self.session.navigation.updatable,
            self.session.navigation.message_ref,
        ) {
            (true, Some(message_ref)) => self.gateway.edit(self.chat, message_ref, view).await,
            _ => self.show(view).await,
        }
    }
}

/// One page out of an already-fetched list; pages are 1-based.
pub(crate) fn page_slice<T: Clone>(items: &[T], page: u32, per_page: u32) -> Vec<T> {
    if page == 0 || per_page == 0 {
        return Vec::new();
    }
    let start = ((page - 1) * per_page) as usize;
    items.iter().skip(start).take(per_page as usize).cloned().collect()
}

/// Page count for a list of `len` items.
pub(crate) fn page_count(len: usize, per_page: u32) -> u32 {
    if per_page == 0 {
        return 0;
    }
    ((len as u32) + per_page - 1) / per_page
}
