use poise::{CreateReply, serenity_prelude::Member};
use tracing::info;

use crate::{
    constants::SESSION_TTL,
    models::{Context, Error, Session, SessionKind},
    services::leaderboard::{add_points, build_page_embed, guild_ranking, points_of},
    session::components::leaderboard_buttons,
    utils::{
        messages::{format_error, format_success},
        validation::require_guild,
    },
};

/// Show the points leaderboard
#[poise::command(slash_command, guild_only)]
pub async fn leaderboard(ctx: Context<'_>) -> Result<(), Error> {
    let guild_id = require_guild(ctx.guild_id())?;
    let data = ctx.data();

    let entries = guild_ranking(&data.store, guild_id.get()).await;
    let guild_name = guild_id
        .name(ctx.cache())
        .unwrap_or_else(|| "Server".to_string());

    let reply = CreateReply::default()
        .embed(build_page_embed(&guild_name, &entries, 0))
        .components(vec![leaderboard_buttons(false)]);

    let handle = ctx.send(reply).await?;
    let message = handle.message().await?;

    data.sessions.schedule(
        Session::new(SessionKind::Leaderboard, message.channel_id, message.id, SESSION_TTL)
            .with_meta("page", 0)
            .with_meta("guild", guild_id.get()),
    );

    Ok(())
}

/// Manage member points
#[poise::command(slash_command, guild_only, subcommands("give", "show"))]
pub async fn points(_ctx: Context<'_>) -> Result<(), Error> {
    Ok(())
}

/// Give (or take, with a negative amount) points to a member
#[poise::command(slash_command, guild_only, required_permissions = "MANAGE_GUILD")]
pub async fn give(
    ctx: Context<'_>,
    #[description = "Member to reward"] member: Member,
    #[description = "Points to add (negative to remove)"] amount: i64,
) -> Result<(), Error> {
    let guild_id = require_guild(ctx.guild_id())?;

    if amount == 0 {
        ctx.say(format_error("Amount must not be zero!")).await?;
        return Ok(());
    }

    let total = add_points(&ctx.data().store, guild_id.get(), member.user.id.get(), amount).await?;

    ctx.say(format_success(&format!(
        "<@{}> now has **{}** points ({:+}).",
        member.user.id, total, amount
    )))
    .await?;

    info!(
        "User {} gave {} points to {} in guild {}",
        ctx.author().id,
        amount,
        member.user.id,
        guild_id
    );

    Ok(())
}

/// Show a member's points
#[poise::command(slash_command, guild_only)]
pub async fn show(
    ctx: Context<'_>,
    #[description = "Member to look up (defaults to you)"] member: Option<Member>,
) -> Result<(), Error> {
    let guild_id = require_guild(ctx.guild_id())?;
    let user_id = member.map_or(ctx.author().id, |m| m.user.id);

    let total = points_of(&ctx.data().store, guild_id.get(), user_id.get()).await;

    ctx.say(format!("🏆 <@{}> has **{}** points.", user_id, total))
        .await?;

    Ok(())
}
