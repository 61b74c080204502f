use poise::serenity_prelude::{ChannelType, GuildChannel, GuildId, Role};
use tracing::info;

use crate::{
    models::{Context, Data, Error, GuildConfig},
    store::StoreError,
    utils::{
        messages::{format_error, format_info, format_success},
        validation::{require_guild, validate_channel_type},
    },
};

async fn update_config<F>(data: &Data, guild_id: GuildId, mutate: F) -> Result<(), StoreError>
where
    F: FnOnce(&mut GuildConfig),
{
    data.store
        .guilds
        .update(|guilds| mutate(guilds.entry(guild_id.get()).or_default()))
        .await
}

fn mention_channel(id: Option<impl std::fmt::Display>) -> String {
    id.map_or_else(|| "not set".to_string(), |id| format!("<#{}>", id))
}

fn mention_role(id: Option<impl std::fmt::Display>) -> String {
    id.map_or_else(|| "not set".to_string(), |id| format!("<@&{}>", id))
}

/// Summary of a guild's configuration
pub fn format_config(config: &GuildConfig) -> String {
    let active = config.owner_to_channel.iter().filter(|r| r.is_active).count();

    format!(
        "**Lobby:** {}\n\
        **Temp channel category:** {}\n\
        **Welcome channel:** {}\n\
        **Leave channel:** {}\n\
        **Verified role:** {}\n\
        **Unverified role:** {}\n\
        **Member role:** {}\n\
        **Temporary channels:** {} ({} active)",
        mention_channel(config.lobby_channel_id),
        mention_channel(config.temp_category_id),
        mention_channel(config.welcome_channel_id),
        mention_channel(config.leave_channel_id),
        mention_role(config.verified_role_id),
        mention_role(config.unverified_role_id),
        mention_role(config.member_role_id),
        config.owner_to_channel.len(),
        active
    )
}

/// Configure the bot for this server
#[poise::command(
    slash_command,
    guild_only,
    required_permissions = "MANAGE_GUILD",
    subcommands("lobby", "roles", "welcome", "leave", "category", "show")
)]
pub async fn setup(_ctx: Context<'_>) -> Result<(), Error> {
    Ok(())
}

/// Set the voice channel that spawns temporary channels
#[poise::command(slash_command, guild_only, required_permissions = "MANAGE_GUILD")]
pub async fn lobby(
    ctx: Context<'_>,
    #[description = "The lobby voice channel"]
    #[channel_types("Voice")]
    channel: GuildChannel,
) -> Result<(), Error> {
    let guild_id = require_guild(ctx.guild_id())?;

    if validate_channel_type(&channel, ChannelType::Voice).is_err() {
        ctx.say(format_error("The selected channel must be a voice channel!"))
            .await?;
        return Ok(());
    }

    let temporary = ctx
        .data()
        .temp_voice
        .record(guild_id, channel.id)
        .await
        .is_some();
    if temporary {
        ctx.say(format_error(
            "This channel is a temporary channel and cannot be used as a lobby!",
        ))
        .await?;
        return Ok(());
    }

    update_config(ctx.data(), guild_id, |c| c.lobby_channel_id = Some(channel.id)).await?;

    ctx.say(format!(
        "{}\nUsers joining <#{}> will get their own temporary voice channel!",
        format_success("Lobby channel set!"),
        channel.id
    ))
    .await?;

    info!("Set lobby channel {} in guild {}", channel.id, guild_id);
    Ok(())
}

/// Set the verification and join roles
#[poise::command(slash_command, guild_only, required_permissions = "MANAGE_GUILD")]
pub async fn roles(
    ctx: Context<'_>,
    #[description = "Role given to verified members"] verified: Option<Role>,
    #[description = "Role given to members until they verify"] unverified: Option<Role>,
    #[description = "Role given to every member on join"] member: Option<Role>,
) -> Result<(), Error> {
    let guild_id = require_guild(ctx.guild_id())?;

    if verified.is_none() && unverified.is_none() && member.is_none() {
        ctx.say(format_error("Pick at least one role to configure!"))
            .await?;
        return Ok(());
    }

    update_config(ctx.data(), guild_id, |c| {
        if let Some(role) = &verified {
            c.verified_role_id = Some(role.id);
        }
        if let Some(role) = &unverified {
            c.unverified_role_id = Some(role.id);
        }
        if let Some(role) = &member {
            c.member_role_id = Some(role.id);
        }
    })
    .await?;

    ctx.say(format_success("Roles updated!")).await?;
    info!("Updated roles in guild {}", guild_id);
    Ok(())
}

/// Set (or clear) the channel for welcome messages
#[poise::command(slash_command, guild_only, required_permissions = "MANAGE_GUILD")]
pub async fn welcome(
    ctx: Context<'_>,
    #[description = "Welcome channel (leave empty to disable)"]
    #[channel_types("Text")]
    channel: Option<GuildChannel>,
) -> Result<(), Error> {
    let guild_id = require_guild(ctx.guild_id())?;
    let channel_id = channel.map(|c| c.id);

    update_config(ctx.data(), guild_id, |c| c.welcome_channel_id = channel_id).await?;

    let message = match channel_id {
        Some(id) => format_success(&format!("Welcome messages will be posted in <#{}>.", id)),
        None => format_info("Welcome messages disabled."),
    };
    ctx.say(message).await?;
    Ok(())
}

/// Set (or clear) the channel for leave messages
#[poise::command(slash_command, guild_only, required_permissions = "MANAGE_GUILD")]
pub async fn leave(
    ctx: Context<'_>,
    #[description = "Leave channel (leave empty to disable)"]
    #[channel_types("Text")]
    channel: Option<GuildChannel>,
) -> Result<(), Error> {
    let guild_id = require_guild(ctx.guild_id())?;
    let channel_id = channel.map(|c| c.id);

    update_config(ctx.data(), guild_id, |c| c.leave_channel_id = channel_id).await?;

    let message = match channel_id {
        Some(id) => format_success(&format!("Leave messages will be posted in <#{}>.", id)),
        None => format_info("Leave messages disabled."),
    };
    ctx.say(message).await?;
    Ok(())
}

/// Set (or clear) the category temporary channels are created in
#[poise::command(slash_command, guild_only, required_permissions = "MANAGE_GUILD")]
pub async fn category(
    ctx: Context<'_>,
    #[description = "Category for temporary channels (defaults to the lobby's)"]
    #[channel_types("Category")]
    category: Option<GuildChannel>,
) -> Result<(), Error> {
    let guild_id = require_guild(ctx.guild_id())?;
    let category_id = category.map(|c| c.id);

    update_config(ctx.data(), guild_id, |c| c.temp_category_id = category_id).await?;

    let message = match category_id {
        Some(id) => format_success(&format!("Temporary channels will be created in <#{}>.", id)),
        None => format_info("Temporary channels will be created next to the lobby."),
    };
    ctx.say(message).await?;
    Ok(())
}

/// Show the current configuration
#[poise::command(slash_command, guild_only, required_permissions = "MANAGE_GUILD", ephemeral)]
pub async fn show(ctx: Context<'_>) -> Result<(), Error> {
    let guild_id = require_guild(ctx.guild_id())?;
    let config = ctx.data().guild_config(guild_id).await;

    ctx.say(format_config(&config)).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::VoiceOwnership;
    use poise::serenity_prelude::{ChannelId, RoleId, UserId};

    #[test]
    fn test_format_empty_config() {
        let text = format_config(&GuildConfig::default());

        assert!(text.contains("**Lobby:** not set"));
        assert!(text.contains("**Verified role:** not set"));
        assert!(text.contains("**Temporary channels:** 0 (0 active)"));
    }

    #[test]
    fn test_format_config_mentions() {
        let config = GuildConfig {
            lobby_channel_id: Some(ChannelId::new(10)),
            verified_role_id: Some(RoleId::new(20)),
            owner_to_channel: vec![
                VoiceOwnership {
                    owner_id: UserId::new(1),
                    channel_id: ChannelId::new(30),
                    channel_name: "a".to_string(),
                    is_active: true,
                    region: None,
                },
                VoiceOwnership {
                    owner_id: UserId::new(2),
                    channel_id: ChannelId::new(31),
                    channel_name: "b".to_string(),
                    is_active: false,
                    region: None,
                },
            ],
            ..Default::default()
        };
        let text = format_config(&config);

        assert!(text.contains("**Lobby:** <#10>"));
        assert!(text.contains("**Verified role:** <@&20>"));
        assert!(text.contains("**Temporary channels:** 2 (1 active)"));
    }
}
