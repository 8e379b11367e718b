//! Console stand-in for the outbound chat transport. The real gateway
//! renders views into transport markup and keyboards; this one logs them.

use std::sync::atomic::{AtomicI64, Ordering};

use async_trait::async_trait;
use tracing::info;

use domains::{BotGateway, ChatContext, DomainResult, Membership, View};

/// Hands back monotonically increasing message identities so the
/// edit-in-place paths in the browsing scenes stay exercised.
pub struct ConsoleGateway {
    next_message_ref: AtomicI64,
}

impl Default for ConsoleGateway {
    fn default() -> Self {
        Self {
            next_message_ref: AtomicI64::new(1),
        }
    }
}

#[async_trait]
impl BotGateway for ConsoleGateway {
    async fn render(&self, chat: &ChatContext, view: View) -> DomainResult<Option<i64>> {
        let message_ref = self.next_message_ref.fetch_add(1, Ordering::Relaxed);
        info!(chat = chat.chat_ref, message_ref, ?view, "render");
        Ok(Some(message_ref))
    }

    async fn edit(&self, chat: &ChatContext, message_ref: i64, view: View) -> DomainResult<()> {
        info!(chat = chat.chat_ref, message_ref, ?view, "edit");
        Ok(())
    }

    async fn remove(&self, chat_ref: i64, message_ref: i64) -> DomainResult<()> {
        info!(chat = chat_ref, message_ref, "remove");
        Ok(())
    }

    async fn membership(&self, _external_user_id: i64) -> DomainResult<Membership> {
        Ok(Membership {
            in_group: true,
            in_channel: true,
        })
    }
}
