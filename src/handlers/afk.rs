use chrono::Utc;
use poise::serenity_prelude::{self as serenity, Message};
use tracing::{error, info};

use crate::{
    models::Data,
    services::afk::{afk_entries, clear_afk, format_duration, format_mention_notice},
};

/// Clear the author's AFK marker and report mentioned AFK members
pub async fn handle_message(ctx: &serenity::Context, message: &Message, data: &Data) {
    if message.author.bot {
        return;
    }
    let Some(guild_id) = message.guild_id else {
        return;
    };

    match clear_afk(&data.store, guild_id.get(), message.author.id.get()).await {
        Ok(Some(entry)) => {
            info!("User {} is back from AFK in guild {}", message.author.id, guild_id);
            let text = format!(
                "👋 Welcome back <@{}>! I removed your AFK (away {}).",
                message.author.id,
                format_duration(entry.since, Utc::now())
            );
            if let Err(e) = message.reply(ctx, text).await {
                error!("Failed to send AFK welcome back: {}", e);
            }
        }
        Ok(None) => {}
        Err(e) => error!("Failed to clear AFK for {}: {}", message.author.id, e),
    }

    let mentioned: Vec<u64> = message
        .mentions
        .iter()
        .filter(|u| !u.bot && u.id != message.author.id)
        .map(|u| u.id.get())
        .collect();
    if mentioned.is_empty() {
        return;
    }

    let entries = afk_entries(&data.store, guild_id.get(), &mentioned).await;
    if entries.is_empty() {
        return;
    }

    let now = Utc::now();
    let text = entries
        .iter()
        .map(|(user_id, entry)| format_mention_notice(*user_id, entry, now))
        .collect::<Vec<_>>()
        .join("\n");

    if let Err(e) = message.reply(ctx, text).await {
        error!("Failed to send AFK notice: {}", e);
    }
}
