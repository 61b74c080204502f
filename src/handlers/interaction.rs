use poise::serenity_prelude::{
    self as serenity, ComponentInteraction, CreateInteractionResponse,
    CreateInteractionResponseFollowup, CreateInteractionResponseMessage, EditInteractionResponse,
};
use tracing::{error, info, warn};

use crate::{
    commands::verify::{apply_result, build_verify_embed, describe_roblox_error},
    constants::{LEADERBOARD_NEXT_ID, LEADERBOARD_PREV_ID, SESSION_TTL, VERIFY_RECHECK_ID},
    models::{Data, Error},
    services::{
        leaderboard::{build_page_embed, guild_ranking, page_count, step_page},
        verification::check_account,
    },
    session::components::{leaderboard_buttons, verify_buttons},
    utils::messages::format_error,
};

/// Handle component interactions (button clicks)
pub async fn handle_interaction(
    ctx: &serenity::Context,
    interaction: ComponentInteraction,
    data: &Data,
) {
    match interaction.data.custom_id.as_str() {
        LEADERBOARD_PREV_ID => {
            if let Err(e) = handle_leaderboard_page(ctx, &interaction, data, -1).await {
                error!("Failed to handle leaderboard button: {}", e);
            }
        }
        LEADERBOARD_NEXT_ID => {
            if let Err(e) = handle_leaderboard_page(ctx, &interaction, data, 1).await {
                error!("Failed to handle leaderboard button: {}", e);
            }
        }
        VERIFY_RECHECK_ID => {
            if let Err(e) = handle_verify_recheck(ctx, &interaction, data).await {
                error!("Failed to handle verification recheck: {}", e);
            }
        }
        _ => {}
    }
}

async fn reply_ephemeral(
    ctx: &serenity::Context,
    interaction: &ComponentInteraction,
    content: String,
) -> Result<(), Error> {
    let response = CreateInteractionResponse::Message(
        CreateInteractionResponseMessage::new()
            .content(content)
            .ephemeral(true),
    );
    interaction.create_response(ctx, response).await?;
    Ok(())
}

/// Prev/Next on a leaderboard message
async fn handle_leaderboard_page(
    ctx: &serenity::Context,
    interaction: &ComponentInteraction,
    data: &Data,
    delta: i64,
) -> Result<(), Error> {
    let key = interaction.message.id.to_string();

    let Some(mut session) = data.sessions.get(&key) else {
        return reply_ephemeral(
            ctx,
            interaction,
            format_error("This leaderboard has expired. Run `/leaderboard` again."),
        )
        .await;
    };

    let Some(guild_id) = interaction.guild_id else {
        return Ok(());
    };

    let entries = guild_ranking(&data.store, guild_id.get()).await;
    let current = session.meta_u64("page").unwrap_or(0) as usize;
    let page = step_page(current, delta, page_count(entries.len()));

    let guild_name = guild_id
        .name(&ctx.cache)
        .unwrap_or_else(|| "Server".to_string());

    let response = CreateInteractionResponse::UpdateMessage(
        CreateInteractionResponseMessage::new()
            .embed(build_page_embed(&guild_name, &entries, page))
            .components(vec![leaderboard_buttons(false)]),
    );
    interaction.create_response(ctx, response).await?;

    session.meta.insert("page".to_string(), page.into());
    session.renew(SESSION_TTL);
    data.sessions.schedule(session);

    Ok(())
}

/// "Check again" under a pending verification
async fn handle_verify_recheck(
    ctx: &serenity::Context,
    interaction: &ComponentInteraction,
    data: &Data,
) -> Result<(), Error> {
    let key = interaction.message.id.to_string();

    let Some(session) = data.sessions.get(&key) else {
        return reply_ephemeral(
            ctx,
            interaction,
            format_error("This verification prompt has expired. Run `/verify` again."),
        )
        .await;
    };

    let (Some(requester), Some(roblox_id), Some(guild_id)) = (
        session.meta_u64("user"),
        session.meta_u64("roblox"),
        interaction.guild_id,
    ) else {
        warn!("Verification session {} is missing its metadata", key);
        return Ok(());
    };

    if interaction.user.id.get() != requester {
        return reply_ephemeral(
            ctx,
            interaction,
            format_error("Only the member who ran `/verify` can use this button."),
        )
        .await;
    }

    // Roblox lookups can outlast the interaction deadline
    interaction.defer(ctx).await?;

    let affix = data.config.verify_affix.as_str();
    let result = match check_account(&data.roblox, roblox_id, affix).await {
        Ok(result) => result,
        Err(e) => {
            warn!("Verification recheck for Roblox user {} failed: {}", roblox_id, e);
            interaction
                .create_followup(
                    ctx,
                    CreateInteractionResponseFollowup::new()
                        .content(describe_roblox_error(&e))
                        .ephemeral(true),
                )
                .await?;
            data.sessions.touch(&key, SESSION_TTL);
            return Ok(());
        }
    };

    apply_result(ctx, data, guild_id, interaction.user.id, &result).await?;

    let edit = EditInteractionResponse::new()
        .embed(build_verify_embed(&result, affix))
        .components(vec![verify_buttons(result.verified)]);
    interaction.edit_response(ctx, edit).await?;

    if result.verified {
        data.sessions.clear(&key);
        info!(
            "User {} verified as Roblox account {}",
            interaction.user.id, result.user.name
        );
    } else {
        data.sessions.touch(&key, SESSION_TTL);
    }

    Ok(())
}
