//! In-memory `SessionStore`, keyed by conversation. Used by tests and the
//! default binary; the Redis adapter persists the same blobs across
//! process restarts.

use async_trait::async_trait;
use dashmap::DashMap;

use domains::{DomainResult, Session, SessionStore};

#[derive(Default)]
pub struct MemorySessionStore {
    sessions: DashMap<i64, Session>,
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn load(&self, conversation_key: i64) -> DomainResult<Option<Session>> {
        Ok(self
            .sessions
            .get(&conversation_key)
            .map(|stored| stored.clone()))
    }

    async fn save(&self, conversation_key: i64, session: &Session) -> DomainResult<()> {
        self.sessions.insert(conversation_key, session.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use domains::SceneName;

    #[tokio::test]
    async fn save_then_load_round_trips() {
        let store = MemorySessionStore::default();
        assert!(store.load(5).await.unwrap().is_none());

        let mut session = Session::default();
        session.enter_scene(SceneName::Search);
        store.save(5, &session).await.unwrap();

        let loaded = store.load(5).await.unwrap().unwrap();
        assert_eq!(loaded.scene, Some(SceneName::Search));
    }
}
