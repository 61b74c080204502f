use poise::serenity_prelude::{
    ChannelId, EditChannel, GuildId, Member, PermissionOverwrite, PermissionOverwriteType,
    Permissions, UserId,
};
use tracing::{info, warn};

use crate::{
    constants::MAX_USER_LIMIT,
    handlers::channel::{is_in_channel, owner_overwrite, voice_channel_of},
    models::{Context, Data, Error, VoiceOwnership, VoicePreference},
    store::StoreError,
    utils::{
        channel_utils::{is_valid_channel_name, normalize_user_limit, parse_region},
        messages::{format_error, format_success},
        ownership::{ClaimOutcome, TransferOutcome, find_record_mut},
        validation::require_guild,
    },
};

/// Manage your temporary voice channel
#[poise::command(
    slash_command,
    guild_only,
    subcommands("claim", "transfer", "rename", "limit", "region")
)]
pub async fn voice(_ctx: Context<'_>) -> Result<(), Error> {
    Ok(())
}

/// The temporary channel the author is connected to, replying when there is none
async fn current_temp_channel(
    ctx: Context<'_>,
) -> Result<Option<(GuildId, ChannelId, VoiceOwnership)>, Error> {
    let guild_id = require_guild(ctx.guild_id())?;

    let Some(channel_id) = voice_channel_of(ctx.cache(), guild_id, ctx.author().id) else {
        ctx.say(format_error("You must be in a voice channel to use this command!"))
            .await?;
        return Ok(None);
    };

    let Some(record) = ctx.data().temp_voice.record(guild_id, channel_id).await else {
        ctx.say(format_error("This is not a temporary channel!"))
            .await?;
        return Ok(None);
    };

    Ok(Some((guild_id, channel_id, record)))
}

/// Like `current_temp_channel`, but only for the channel's owner
async fn owned_temp_channel(
    ctx: Context<'_>,
) -> Result<Option<(GuildId, ChannelId, VoiceOwnership)>, Error> {
    let Some((guild_id, channel_id, record)) = current_temp_channel(ctx).await? else {
        return Ok(None);
    };

    if record.owner_id != ctx.author().id {
        ctx.say(format_error("Only the channel owner can do this!"))
            .await?;
        return Ok(None);
    }

    Ok(Some((guild_id, channel_id, record)))
}

async fn update_preference<F>(data: &Data, user_id: UserId, mutate: F) -> Result<(), StoreError>
where
    F: FnOnce(&mut VoicePreference),
{
    data.store
        .voice_prefs
        .update(|prefs| mutate(prefs.entry(user_id.get()).or_default()))
        .await
}

async fn update_record<F>(
    data: &Data,
    guild_id: GuildId,
    channel_id: ChannelId,
    mutate: F,
) -> Result<(), StoreError>
where
    F: FnOnce(&mut VoiceOwnership),
{
    data.temp_voice
        .update_records(guild_id, |records| {
            if let Some(record) = find_record_mut(records, channel_id) {
                mutate(record);
            }
        })
        .await
}

/// Hand the owner overwrite from one member to another
async fn move_owner_overwrite(
    ctx: Context<'_>,
    channel_id: ChannelId,
    from: UserId,
    to: UserId,
) -> Result<(), Error> {
    if let Err(e) = channel_id
        .delete_permission(ctx, PermissionOverwriteType::Member(from))
        .await
    {
        warn!("Failed to remove owner overwrite of {} on {}: {}", from, channel_id, e);
    }
    channel_id.create_permission(ctx, owner_overwrite(to)).await?;
    Ok(())
}

/// Whether the bot must grant itself MANAGE_CHANNELS; unknown permissions count as missing
fn needs_manage_grant(permissions: Option<Permissions>) -> bool {
    !permissions.is_some_and(|p| p.manage_channels())
}

/// Make sure the bot itself can manage the channel before changing owners
async fn ensure_bot_can_manage(
    ctx: Context<'_>,
    guild_id: GuildId,
    channel_id: ChannelId,
) -> Result<(), Error> {
    let bot_id = ctx.cache().current_user().id;
    let channel = channel_id
        .to_channel(ctx)
        .await?
        .guild()
        .ok_or("Temporary channel is not a guild channel")?;
    let bot_member = guild_id.member(ctx, bot_id).await?;

    let permissions = ctx
        .cache()
        .guild(guild_id)
        .map(|guild| guild.user_permissions_in(&channel, &bot_member));

    if needs_manage_grant(permissions) {
        info!("Granting myself MANAGE_CHANNELS on {}", channel_id);
        let overwrite = PermissionOverwrite {
            allow: Permissions::MANAGE_CHANNELS | Permissions::VIEW_CHANNEL | Permissions::CONNECT,
            deny: Permissions::empty(),
            kind: PermissionOverwriteType::Member(bot_id),
        };
        channel_id.create_permission(ctx, overwrite).await?;
    }

    Ok(())
}

/// Take over a temporary channel whose owner has left
#[poise::command(slash_command, guild_only, ephemeral)]
pub async fn claim(ctx: Context<'_>) -> Result<(), Error> {
    let Some((guild_id, channel_id, record)) = current_temp_channel(ctx).await? else {
        return Ok(());
    };

    let owner_present = is_in_channel(ctx.cache(), guild_id, channel_id, record.owner_id);
    if !owner_present && record.owner_id != ctx.author().id {
        ensure_bot_can_manage(ctx, guild_id, channel_id).await?;
    }

    let outcome = ctx
        .data()
        .temp_voice
        .claim(guild_id, channel_id, ctx.author().id, owner_present)
        .await?;

    let message = match outcome {
        ClaimOutcome::Claimed { previous_owner } => {
            move_owner_overwrite(ctx, channel_id, previous_owner, ctx.author().id).await?;
            info!(
                "User {} claimed temp channel {} from {}",
                ctx.author().id,
                channel_id,
                previous_owner
            );
            format_success("You are now the owner of this channel!")
        }
        ClaimOutcome::AlreadyOwner => format_error("You already own this channel!"),
        ClaimOutcome::OwnerPresent => {
            format_error("The owner is still in the channel, you can't claim it.")
        }
        ClaimOutcome::NotTemporary => format_error("This is not a temporary channel!"),
    };

    ctx.say(message).await?;
    Ok(())
}

/// Give your temporary channel to another member in it
#[poise::command(slash_command, guild_only, ephemeral)]
pub async fn transfer(
    ctx: Context<'_>,
    #[description = "The new owner (must be in the channel)"] member: Member,
) -> Result<(), Error> {
    let Some((guild_id, channel_id, _)) = current_temp_channel(ctx).await? else {
        return Ok(());
    };

    let target = member.user.id;
    let target_present = is_in_channel(ctx.cache(), guild_id, channel_id, target);

    let outcome = ctx
        .data()
        .temp_voice
        .transfer(guild_id, channel_id, ctx.author().id, target, target_present)
        .await?;

    let message = match outcome {
        TransferOutcome::Transferred => {
            move_owner_overwrite(ctx, channel_id, ctx.author().id, target).await?;
            info!(
                "User {} transferred temp channel {} to {}",
                ctx.author().id,
                channel_id,
                target
            );
            format_success(&format!("<@{}> now owns this channel!", target))
        }
        TransferOutcome::NotOwner => format_error("Only the channel owner can do this!"),
        TransferOutcome::SameUser => format_error("You already own this channel!"),
        TransferOutcome::TargetAbsent => {
            format_error("The new owner must be in the channel!")
        }
        TransferOutcome::NotTemporary => format_error("This is not a temporary channel!"),
    };

    ctx.say(message).await?;
    Ok(())
}

/// Rename your temporary channel
#[poise::command(slash_command, guild_only, ephemeral)]
pub async fn rename(
    ctx: Context<'_>,
    #[description = "New channel name"] name: String,
) -> Result<(), Error> {
    let Some((guild_id, channel_id, _)) = owned_temp_channel(ctx).await? else {
        return Ok(());
    };

    let name = name.trim().to_string();
    if let Err(reason) = is_valid_channel_name(&name) {
        ctx.say(format_error(reason)).await?;
        return Ok(());
    }

    channel_id
        .edit(ctx, EditChannel::new().name(&name))
        .await?;

    let data = ctx.data();
    update_record(data, guild_id, channel_id, |r| r.channel_name = name.clone()).await?;
    update_preference(data, ctx.author().id, |p| p.channel_name = Some(name.clone())).await?;

    ctx.say(format_success(&format!("Channel renamed to **{}**!", name)))
        .await?;
    Ok(())
}

/// Set how many members can join your temporary channel
#[poise::command(slash_command, guild_only, ephemeral)]
pub async fn limit(
    ctx: Context<'_>,
    #[description = "Maximum members (0 for unlimited)"]
    #[min = 0]
    #[max = 99]
    limit: u32,
) -> Result<(), Error> {
    let limit = match normalize_user_limit(limit) {
        Ok(limit) => limit,
        Err(reason) => {
            ctx.say(format_error(reason)).await?;
            return Ok(());
        }
    };

    let Some((_, channel_id, _)) = owned_temp_channel(ctx).await? else {
        return Ok(());
    };

    channel_id
        .edit(ctx, EditChannel::new().user_limit(limit.unwrap_or(0)))
        .await?;

    update_preference(ctx.data(), ctx.author().id, |p| p.user_limit = limit).await?;

    let message = match limit {
        Some(n) => format_success(&format!("User limit set to **{}** (max {}).", n, MAX_USER_LIMIT)),
        None => format_success("User limit removed."),
    };
    ctx.say(message).await?;
    Ok(())
}

/// Set the voice region of your temporary channel
#[poise::command(slash_command, guild_only, ephemeral)]
pub async fn region(
    ctx: Context<'_>,
    #[description = "Region id (e.g. rotterdam, us-east) or auto"] region: String,
) -> Result<(), Error> {
    let Some((guild_id, channel_id, _)) = owned_temp_channel(ctx).await? else {
        return Ok(());
    };

    let region = parse_region(&region);

    channel_id
        .edit(ctx, EditChannel::new().voice_region(region.clone()))
        .await?;

    let data = ctx.data();
    update_record(data, guild_id, channel_id, |r| r.region = region.clone()).await?;
    update_preference(data, ctx.author().id, |p| p.region = region.clone()).await?;

    let message = match region {
        Some(region) => format_success(&format!("Voice region set to **{}**.", region)),
        None => format_success("Voice region set to automatic."),
    };
    ctx.say(message).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_needs_manage_grant() {
        assert!(needs_manage_grant(None));
        assert!(needs_manage_grant(Some(Permissions::CONNECT | Permissions::SPEAK)));
        assert!(!needs_manage_grant(Some(Permissions::MANAGE_CHANNELS)));
        assert!(!needs_manage_grant(Some(
            Permissions::MANAGE_CHANNELS | Permissions::MOVE_MEMBERS
        )));
    }
}
