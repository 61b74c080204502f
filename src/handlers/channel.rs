use std::sync::Arc;

use poise::serenity_prelude::{
    self as serenity, Cache, ChannelId, ChannelType, CreateChannel, CreateMessage, EditChannel,
    GuildId, Http, PermissionOverwrite, PermissionOverwriteType, Permissions, UserId,
};
use tracing::{debug, warn};

use crate::{
    models::Error,
    services::temp_voice::{ChannelRequest, VoicePlatform},
    utils::{discord::is_not_found, messages::build_context_error},
};

/// Permissions granted to the owner of a temporary channel
pub fn owner_overwrite(user_id: UserId) -> PermissionOverwrite {
    PermissionOverwrite {
        allow: Permissions::MANAGE_CHANNELS
            | Permissions::MOVE_MEMBERS
            | Permissions::MUTE_MEMBERS
            | Permissions::DEAFEN_MEMBERS,
        deny: Permissions::empty(),
        kind: PermissionOverwriteType::Member(user_id),
    }
}

/// Voice channel a member is currently connected to, from the cache
pub fn voice_channel_of(cache: &Cache, guild_id: GuildId, user_id: UserId) -> Option<ChannelId> {
    cache
        .guild(guild_id)?
        .voice_states
        .get(&user_id)?
        .channel_id
}

pub fn is_in_channel(cache: &Cache, guild_id: GuildId, channel_id: ChannelId, user_id: UserId) -> bool {
    voice_channel_of(cache, guild_id, user_id) == Some(channel_id)
}

/// Temporary voice platform backed by the gateway cache and REST API
#[derive(Clone)]
pub struct DiscordVoice {
    http: Arc<Http>,
    cache: Arc<Cache>,
}

impl DiscordVoice {
    pub fn new(http: Arc<Http>, cache: Arc<Cache>) -> Self {
        Self { http, cache }
    }

    pub fn from_context(ctx: &serenity::Context) -> Self {
        Self::new(Arc::clone(&ctx.http), Arc::clone(&ctx.cache))
    }
}

impl VoicePlatform for DiscordVoice {
    async fn member_count(
        &self,
        guild_id: GuildId,
        channel_id: ChannelId,
    ) -> Result<Option<usize>, Error> {
        let cached = self.cache.guild(guild_id).map(|guild| {
            guild.channels.contains_key(&channel_id).then(|| {
                guild
                    .voice_states
                    .values()
                    .filter(|state| state.channel_id == Some(channel_id))
                    .count()
            })
        });

        match cached {
            Some(count) => Ok(count),
            None => Err(format!("Guild {} is not cached", guild_id).into()),
        }
    }

    async fn create_channel(&self, request: ChannelRequest) -> Result<ChannelId, Error> {
        let cache_http = (&self.cache, &*self.http);

        // Copy the lobby's category and permissions
        let lobby = request
            .lobby_channel_id
            .to_channel(cache_http)
            .await?
            .guild()
            .ok_or_else(|| build_context_error("as a guild channel"))?;

        let mut permissions: Vec<PermissionOverwrite> = lobby.permission_overwrites.to_vec();
        permissions.push(owner_overwrite(request.owner_id));

        let mut create_channel = CreateChannel::new(&request.name)
            .kind(ChannelType::Voice)
            .permissions(permissions);

        if let Some(category_id) = request.category_id.or(lobby.parent_id) {
            create_channel = create_channel.category(category_id);
        }
        if let Some(limit) = request.user_limit {
            create_channel = create_channel.user_limit(limit);
        }

        let channel = request
            .guild_id
            .create_channel(cache_http, create_channel)
            .await?;

        // Past this point the channel exists and must reach the ownership table
        if let Some(region) = request.region {
            if let Err(e) = channel
                .id
                .edit(cache_http, EditChannel::new().voice_region(Some(region)))
                .await
            {
                warn!("Failed to set region of temp channel {}: {}", channel.id, e);
            }
        }

        Ok(channel.id)
    }

    async fn move_member(
        &self,
        guild_id: GuildId,
        user_id: UserId,
        channel_id: ChannelId,
    ) -> Result<(), Error> {
        guild_id
            .move_member((&self.cache, &*self.http), user_id, channel_id)
            .await?;
        Ok(())
    }

    async fn announce(&self, channel_id: ChannelId, owner_id: UserId) -> Result<(), Error> {
        let welcome = CreateMessage::new().content(format!(
            "🎙️ **Welcome to your temporary voice channel, <@{}>!**\n\n\
            This channel is deleted a few seconds after everyone leaves.\n\
            Use `/voice rename`, `/voice limit`, `/voice region` or `/voice transfer` to manage it.",
            owner_id
        ));
        channel_id
            .send_message((&self.cache, &*self.http), welcome)
            .await?;
        Ok(())
    }

    async fn delete_channel(&self, channel_id: ChannelId) -> Result<(), Error> {
        match channel_id.delete((&self.cache, &*self.http)).await {
            Ok(_) => Ok(()),
            Err(e) if is_not_found(&e) => {
                debug!("Temp channel {} was already deleted", channel_id);
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }
}
