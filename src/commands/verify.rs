use poise::{
    CreateReply,
    serenity_prelude::{self as serenity, Colour, CreateEmbed, GuildId, UserId},
};
use tracing::{info, warn};

use crate::{
    constants::SESSION_TTL,
    models::{Context, Data, Error, Session, SessionKind},
    services::{
        roblox::RobloxError,
        verification::{VerificationResult, check_username, record_link, sync_member_roles},
    },
    session::components::verify_buttons,
    utils::{
        messages::{format_error, format_success},
        validation::require_guild,
    },
};

/// Embed describing a verification result
pub fn build_verify_embed(result: &VerificationResult, affix: &str) -> CreateEmbed {
    let mut embed = CreateEmbed::new()
        .field("Roblox username", &result.user.name, true)
        .field("Display name", &result.user.display_name, true);

    embed = if result.verified {
        embed
            .title("✅ Verified")
            .description("Your Roblox account is linked and verified.")
            .colour(Colour::DARK_GREEN)
    } else {
        embed
            .title("⏳ Not verified yet")
            .description(format!(
                "Add `{affix}` to your Roblox display name (for example `{affix}_{name}` or `{name} {affix}`), \
                then press **Check again**.",
                affix = affix,
                name = result.user.name
            ))
            .colour(Colour::ORANGE)
    };

    if let Some(url) = &result.avatar_url {
        embed = embed.thumbnail(url);
    }

    embed
}

/// User-facing text for a failed Roblox lookup
pub fn describe_roblox_error(error: &RobloxError) -> String {
    match error {
        RobloxError::UserNotFound(name) => {
            format_error(&format!("No Roblox account named `{}` was found.", name))
        }
        RobloxError::RateLimited(_) | RobloxError::Timeout => {
            format_error("Roblox is not responding right now. Please try again in a minute.")
        }
        RobloxError::Http(_) => format_error("Could not reach Roblox. Please try again later."),
    }
}

/// Persist a result and bring the member's roles in line with it
pub async fn apply_result(
    ctx: &serenity::Context,
    data: &Data,
    guild_id: GuildId,
    user_id: UserId,
    result: &VerificationResult,
) -> Result<(), Error> {
    record_link(&data.store, user_id, result).await?;

    let config = data.guild_config(guild_id).await;
    let member = guild_id.member(ctx, user_id).await?;
    sync_member_roles(&ctx.http, &member, &config, result.verified).await
}

/// Link your Roblox account and get verified
#[poise::command(slash_command, guild_only)]
pub async fn verify(
    ctx: Context<'_>,
    #[description = "Your Roblox username"] username: String,
) -> Result<(), Error> {
    let guild_id = require_guild(ctx.guild_id())?;
    let data = ctx.data();
    let affix = data.config.verify_affix.as_str();

    ctx.defer().await?;

    let result = match check_username(&data.roblox, username.trim(), affix).await {
        Ok(result) => result,
        Err(e) => {
            warn!("Verification lookup for '{}' failed: {}", username, e);
            ctx.say(describe_roblox_error(&e)).await?;
            return Ok(());
        }
    };

    apply_result(ctx.serenity_context(), data, guild_id, ctx.author().id, &result).await?;

    let mut reply = CreateReply::default().embed(build_verify_embed(&result, affix));
    if !result.verified {
        reply = reply.components(vec![verify_buttons(false)]);
    }

    let handle = ctx.send(reply).await?;

    if !result.verified {
        let message = handle.message().await?;
        data.sessions.schedule(
            Session::new(SessionKind::Verify, message.channel_id, message.id, SESSION_TTL)
                .with_meta("user", ctx.author().id.get())
                .with_meta("roblox", result.user.id)
                .with_meta("guild", guild_id.get()),
        );
    }

    info!(
        "User {} ran /verify for Roblox account {} (verified: {})",
        ctx.author().id,
        result.user.name,
        result.verified
    );

    Ok(())
}

/// Remove the link to your Roblox account
#[poise::command(slash_command, guild_only, ephemeral)]
pub async fn unlink(ctx: Context<'_>) -> Result<(), Error> {
    let guild_id = require_guild(ctx.guild_id())?;
    let data = ctx.data();
    let user_id = ctx.author().id;

    let removed = data
        .store
        .usernames
        .update(|accounts| accounts.remove(&user_id.get()))
        .await?;

    let Some(account) = removed else {
        ctx.say(format_error("You don't have a linked Roblox account."))
            .await?;
        return Ok(());
    };

    let config = data.guild_config(guild_id).await;
    let member = guild_id.member(ctx, user_id).await?;
    sync_member_roles(ctx.http(), &member, &config, false).await?;

    ctx.say(format_success(&format!(
        "Unlinked Roblox account `{}`.",
        account.roblox_username
    )))
    .await?;

    info!("User {} unlinked Roblox account {}", user_id, account.roblox_id);

    Ok(())
}
