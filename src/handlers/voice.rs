use poise::serenity_prelude::{self as serenity, VoiceState};
use tracing::error;

use crate::models::Data;

use super::channel::DiscordVoice;

/// Handle voice state updates (user joins/leaves voice channels)
pub async fn handle_voice_state_update(
    ctx: &serenity::Context,
    old_state: Option<VoiceState>,
    new_state: VoiceState,
    data: &Data,
) {
    let Some(guild_id) = new_state.guild_id else {
        return;
    };

    let old_channel = old_state.as_ref().and_then(|s| s.channel_id);
    let new_channel = new_state.channel_id;

    // Mute/deafen toggles keep the member in the same channel
    if old_channel == new_channel {
        return;
    }

    let platform = DiscordVoice::from_context(ctx);

    if let Some(channel_id) = old_channel
        && let Err(e) = data.temp_voice.on_leave(&platform, guild_id, channel_id).await
    {
        error!("Failed to handle voice leave in {}: {}", channel_id, e);
    }

    let Some(channel_id) = new_channel else {
        return;
    };

    let display_name = match &new_state.member {
        Some(member) => member.display_name().to_string(),
        None => match guild_id.member(ctx, new_state.user_id).await {
            Ok(member) => member.display_name().to_string(),
            Err(e) => {
                error!("Failed to get member: {}", e);
                return;
            }
        },
    };

    if let Err(e) = data
        .temp_voice
        .on_join(&platform, guild_id, new_state.user_id, &display_name, channel_id)
        .await
    {
        error!("Failed to handle voice join in {}: {}", channel_id, e);
    }
}
