use std::sync::Arc;

use poise::serenity_prelude::{EditMessage, Http};
use tracing::debug;

use super::{components::components_for, scheduler::SessionExpirer};
use crate::{
    models::{Error, Session, SessionKind},
    utils::discord::is_not_found,
};

/// Disables a session's message components through the Discord API
pub struct DiscordExpirer {
    http: Arc<Http>,
}

impl DiscordExpirer {
    pub fn new(http: Arc<Http>) -> Self {
        Self { http }
    }
}

impl SessionExpirer for DiscordExpirer {
    async fn disable(&self, session: Session) -> Result<(), Error> {
        let http = &*self.http;

        let mut message = match session.channel_id.message(http, session.message_id).await {
            Ok(message) => message,
            Err(e) if is_not_found(&e) => {
                debug!(
                    "Message {} for session {} no longer exists",
                    session.message_id, session.key
                );
                return Ok(());
            }
            Err(e) => return Err(e.into()),
        };

        let mut edit = EditMessage::new().components(components_for(session.kind, true));
        if session.kind == SessionKind::Verify {
            edit = edit.content("⌛ This verification prompt has expired. Run `/verify` again to retry.");
        }

        message.edit(http, edit).await?;
        Ok(())
    }
}
