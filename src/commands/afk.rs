use tracing::info;

use crate::{
    models::{Context, Error},
    services::afk::set_afk,
    utils::{messages::format_success, validation::require_guild},
};

/// Mark yourself as away; mentions of you get a notice
#[poise::command(slash_command, guild_only)]
pub async fn afk(
    ctx: Context<'_>,
    #[description = "Why you're away"]
    #[max_length = 200]
    reason: Option<String>,
) -> Result<(), Error> {
    let guild_id = require_guild(ctx.guild_id())?;

    let entry = set_afk(&ctx.data().store, guild_id.get(), ctx.author().id.get(), reason).await?;

    ctx.say(format_success(&format!("You are now AFK: {}", entry.reason)))
        .await?;

    info!("User {} went AFK in guild {}", ctx.author().id, guild_id);
    Ok(())
}
