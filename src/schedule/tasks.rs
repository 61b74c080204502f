use std::sync::Arc;

use poise::serenity_prelude::{self as serenity, GuildId, UserId};
use tokio::time::timeout;
use tracing::{debug, error, info, warn};

use crate::{
    constants::{ROLE_FETCH_TIMEOUT, VERIFICATION_PASS_TIMEOUT},
    handlers::channel::DiscordVoice,
    models::{Data, Error, LinkedAccountTable},
    services::verification::{check_account, sync_member_roles},
    utils::discord::is_not_found,
};

/// Fresh verification state for one linked account
#[derive(Debug, Clone, PartialEq)]
pub struct StatusUpdate {
    pub user_id: u64,
    pub roblox_id: u64,
    pub display_name: String,
    pub verified: bool,
}

/// Write checked statuses back; returns how many `verified` flags flipped.
///
/// Accounts relinked to another Roblox id meanwhile are left alone.
pub fn apply_status_updates(accounts: &mut LinkedAccountTable, updates: &[StatusUpdate]) -> usize {
    let mut flipped = 0;

    for update in updates {
        let Some(account) = accounts.get_mut(&update.user_id) else {
            continue;
        };
        if account.roblox_id != update.roblox_id {
            continue;
        }

        if account.verified != update.verified {
            flipped += 1;
        }
        account.verified = update.verified;
        account.display_name = update.display_name.clone();
    }

    flipped
}

/// Re-check every linked account against the affix
pub async fn run_verification_pass(data: &Data) -> Result<(), Error> {
    let accounts = data.store.usernames.read().await;
    let affix = data.config.verify_affix.as_str();
    let total = accounts.len();

    info!("Starting verification pass over {} linked accounts", total);

    let mut updates = Vec::with_capacity(total);
    let checked = timeout(VERIFICATION_PASS_TIMEOUT, async {
        for (user_id, account) in &accounts {
            match check_account(&data.roblox, account.roblox_id, affix).await {
                Ok(result) => updates.push(StatusUpdate {
                    user_id: *user_id,
                    roblox_id: account.roblox_id,
                    display_name: result.user.display_name,
                    verified: result.verified,
                }),
                Err(e) => warn!(
                    "Failed to re-check Roblox account {} of user {}: {}",
                    account.roblox_id, user_id, e
                ),
            }
        }
    })
    .await;

    if checked.is_err() {
        warn!(
            "Verification pass hit its {:?} limit after {}/{} accounts",
            VERIFICATION_PASS_TIMEOUT,
            updates.len(),
            total
        );
    }

    let flipped = data
        .store
        .usernames
        .update(|accounts| apply_status_updates(accounts, &updates))
        .await?;

    info!(
        "Verification pass finished: {} checked, {} changed",
        updates.len(),
        flipped
    );
    Ok(())
}

/// Bring verified roles in line with the linked accounts in every guild
pub async fn run_role_sync(
    http: &Arc<serenity::Http>,
    cache: &Arc<serenity::Cache>,
    data: &Data,
) -> Result<(), Error> {
    let guilds = data.store.guilds.read().await;
    let accounts = data.store.usernames.read().await;

    for (guild_id, config) in guilds {
        if config.verified_role_id.is_none() {
            continue;
        }
        let guild_id = GuildId::new(guild_id);
        let mut synced = 0;

        for (user_id, account) in &accounts {
            let user_id = UserId::new(*user_id);

            let fetch = guild_id.member((cache, &**http), user_id);
            let member = match timeout(ROLE_FETCH_TIMEOUT, fetch).await {
                Ok(Ok(member)) => member,
                Ok(Err(e)) if is_not_found(&e) => continue,
                Ok(Err(e)) => {
                    warn!("Failed to fetch member {} in guild {}: {}", user_id, guild_id, e);
                    continue;
                }
                Err(_) => {
                    debug!("Fetching member {} in guild {} timed out", user_id, guild_id);
                    continue;
                }
            };

            match sync_member_roles(http, &member, &config, account.verified).await {
                Ok(()) => synced += 1,
                Err(e) => error!(
                    "Failed to sync roles of {} in guild {}: {}",
                    user_id, guild_id, e
                ),
            }
        }

        info!("Role sync for guild {}: {} members checked", guild_id, synced);
    }

    Ok(())
}

/// Drop stale temporary channel records and clean up empty channels
pub async fn run_voice_reconcile(
    http: &Arc<serenity::Http>,
    cache: &Arc<serenity::Cache>,
    data: &Data,
) -> Result<(), Error> {
    let platform = DiscordVoice::new(Arc::clone(http), Arc::clone(cache));
    data.temp_voice.reconcile(&platform).await
}
