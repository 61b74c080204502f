use std::collections::HashMap;

use poise::serenity_prelude::{
    self as serenity, Colour, CreateEmbed, CreateMessage, GuildId, InviteCreateEvent,
    InviteDeleteEvent, Member, RoleId, User,
};
use tracing::{debug, error, info, warn};

use crate::{
    models::{Data, Error, GuildConfig},
    services::afk::clear_afk,
    utils::invites::{InviteUse, find_used_invite},
};

/// Who brought a new member in
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Inviter {
    Member { code: String, user_id: u64 },
    Code(String),
    Unknown,
}

impl Inviter {
    fn describe(&self) -> String {
        match self {
            Inviter::Member { code, user_id } => format!("<@{}> (`{}`)", user_id, code),
            Inviter::Code(code) => format!("`{}`", code),
            Inviter::Unknown => "Unknown".to_string(),
        }
    }
}

pub fn build_welcome_embed(
    user: &User,
    guild_name: &str,
    member_count: Option<u64>,
    inviter: &Inviter,
) -> CreateEmbed {
    let mut embed = CreateEmbed::new()
        .title("👋 Welcome!")
        .description(format!("Welcome <@{}> to **{}**!", user.id, guild_name))
        .thumbnail(user.face())
        .field("Invited by", inviter.describe(), true)
        .colour(Colour::BLURPLE);

    if let Some(count) = member_count {
        embed = embed.field("Member", format!("#{}", count), true);
    }

    embed
}

pub fn build_leave_embed(user: &User, member_count: Option<u64>) -> CreateEmbed {
    let mut embed = CreateEmbed::new()
        .title("👋 Goodbye")
        .description(format!("**{}** left the server.", user.name))
        .thumbnail(user.face())
        .colour(Colour::DARK_GREY);

    if let Some(count) = member_count {
        embed = embed.field("Members left", count.to_string(), true);
    }

    embed
}

async fn fetch_invites(
    ctx: &serenity::Context,
    guild_id: GuildId,
) -> Result<HashMap<String, InviteUse>, Error> {
    let invites = guild_id.invites(ctx).await?;
    Ok(invites
        .into_iter()
        .map(|invite| {
            (
                invite.code,
                InviteUse {
                    uses: invite.uses,
                    inviter: invite.inviter.map(|u| u.id.get()),
                },
            )
        })
        .collect())
}

/// Fill the invite cache for every guild the bot is in
pub async fn prime_invites(ctx: &serenity::Context, guilds: &[GuildId], data: &Data) {
    for guild_id in guilds {
        match fetch_invites(ctx, *guild_id).await {
            Ok(invites) => {
                debug!("Cached {} invites for guild {}", invites.len(), guild_id);
                data.invites.insert(*guild_id, invites);
            }
            Err(e) => warn!("Failed to fetch invites for guild {}: {}", guild_id, e),
        }
    }
}

pub fn handle_invite_create(event: &InviteCreateEvent, data: &Data) {
    let Some(guild_id) = event.guild_id else {
        return;
    };

    data.invites.entry(guild_id).or_default().insert(
        event.code.clone(),
        InviteUse {
            uses: event.uses,
            inviter: event.inviter.as_ref().map(|u| u.id.get()),
        },
    );
}

pub fn handle_invite_delete(event: &InviteDeleteEvent, data: &Data) {
    if let Some(guild_id) = event.guild_id
        && let Some(mut invites) = data.invites.get_mut(&guild_id)
    {
        invites.remove(&event.code);
    }
}

/// Diff the invite cache against the live invites to find the one used
async fn resolve_inviter(ctx: &serenity::Context, guild_id: GuildId, data: &Data) -> Inviter {
    let after = match fetch_invites(ctx, guild_id).await {
        Ok(invites) => invites,
        Err(e) => {
            warn!("Failed to refresh invites for guild {}: {}", guild_id, e);
            return Inviter::Unknown;
        }
    };

    let before = data
        .invites
        .get(&guild_id)
        .map(|invites| invites.clone())
        .unwrap_or_default();

    let inviter = match find_used_invite(&before, &after) {
        Some((code, InviteUse { inviter: Some(user_id), .. })) => Inviter::Member {
            code: code.to_string(),
            user_id,
        },
        Some((code, _)) => Inviter::Code(code.to_string()),
        None => Inviter::Unknown,
    };

    data.invites.insert(guild_id, after);
    inviter
}

/// Roles a new member gets automatically
fn join_roles(verified: Option<bool>, config: &GuildConfig) -> Vec<RoleId> {
    let status_role = match verified {
        Some(true) => config.verified_role_id,
        _ => config.unverified_role_id,
    };

    config
        .member_role_id
        .into_iter()
        .chain(status_role)
        .collect()
}

pub async fn handle_member_join(ctx: &serenity::Context, member: &Member, data: &Data) {
    let guild_id = member.guild_id;
    let config = data.guild_config(guild_id).await;

    let verified = data
        .store
        .usernames
        .read()
        .await
        .get(&member.user.id.get())
        .map(|account| account.verified);

    let roles = join_roles(verified, &config);
    if !roles.is_empty()
        && let Err(e) = member.add_roles(ctx, &roles).await
    {
        error!("Failed to assign join roles to {}: {}", member.user.id, e);
    }

    let inviter = resolve_inviter(ctx, guild_id, data).await;

    info!(
        "Member {} joined guild {} (inviter: {:?})",
        member.user.id, guild_id, inviter
    );

    let Some(channel_id) = config.welcome_channel_id else {
        return;
    };

    let (guild_name, member_count) = ctx
        .cache
        .guild(guild_id)
        .map(|g| (g.name.clone(), Some(g.member_count)))
        .unwrap_or_else(|| ("the server".to_string(), None));

    let embed = build_welcome_embed(&member.user, &guild_name, member_count, &inviter);
    if let Err(e) = channel_id
        .send_message(ctx, CreateMessage::new().embed(embed))
        .await
    {
        error!("Failed to send welcome message in {}: {}", channel_id, e);
    }
}

pub async fn handle_member_leave(
    ctx: &serenity::Context,
    guild_id: GuildId,
    user: &User,
    data: &Data,
) {
    if let Err(e) = clear_afk(&data.store, guild_id.get(), user.id.get()).await {
        error!("Failed to clear AFK for departed member {}: {}", user.id, e);
    }

    info!("Member {} left guild {}", user.id, guild_id);

    let Some(channel_id) = data.guild_config(guild_id).await.leave_channel_id else {
        return;
    };

    let member_count = ctx.cache.guild(guild_id).map(|g| g.member_count);

    let embed = build_leave_embed(user, member_count);
    if let Err(e) = channel_id
        .send_message(ctx, CreateMessage::new().embed(embed))
        .await
    {
        error!("Failed to send leave message in {}: {}", channel_id, e);
    }
}
