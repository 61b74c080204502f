/// Verification service - matches Roblox display names against the guild affix
use chrono::Utc;
use poise::serenity_prelude::{Http, Member, UserId};
use tracing::{info, warn};

use crate::{
    models::{Error, GuildConfig, LinkedAccount},
    services::roblox::{RobloxClient, RobloxError, RobloxUser},
    store::{Store, StoreError},
    utils::role_logic::{RoleAction, determine_role_action},
};

const SEPARATORS: [char; 2] = ['_', ' '];

/// Check a display name against the affix, case-insensitively.
///
/// Accepted shapes, with `x` a non-empty name:
/// `DV_x`, `DV x`, `DVx`, `x_DV`, `x DV`, `xDV`.
pub fn matches_affix(display_name: &str, affix: &str) -> bool {
    if affix.is_empty() {
        return false;
    }

    let name = display_name.trim().to_lowercase();
    let affix = affix.to_lowercase();

    let valid_rest = |rest: &str| !rest.is_empty() && !rest.chars().all(|c| SEPARATORS.contains(&c));

    if let Some(rest) = name.strip_prefix(&affix) {
        let rest = rest.strip_prefix(SEPARATORS).unwrap_or(rest);
        if valid_rest(rest) {
            return true;
        }
    }

    if let Some(rest) = name.strip_suffix(&affix) {
        let rest = rest.strip_suffix(SEPARATORS).unwrap_or(rest);
        if valid_rest(rest) {
            return true;
        }
    }

    false
}

/// Outcome of checking one Roblox account
#[derive(Debug, Clone)]
pub struct VerificationResult {
    pub user: RobloxUser,
    pub verified: bool,
    pub avatar_url: Option<String>,
}

/// Look up an account by username and evaluate it
pub async fn check_username(
    roblox: &RobloxClient,
    username: &str,
    affix: &str,
) -> Result<VerificationResult, RobloxError> {
    let found = roblox.user_by_username(username).await?;
    check_account(roblox, found.id, affix).await
}

/// Fetch an account's current profile and evaluate it
pub async fn check_account(
    roblox: &RobloxClient,
    roblox_id: u64,
    affix: &str,
) -> Result<VerificationResult, RobloxError> {
    let user = roblox.profile(roblox_id).await?;

    let avatar_url = match roblox.avatar_headshot(roblox_id).await {
        Ok(url) => url,
        Err(e) => {
            warn!("Failed to fetch avatar for Roblox user {}: {}", roblox_id, e);
            None
        }
    };

    Ok(VerificationResult {
        verified: matches_affix(&user.display_name, affix),
        user,
        avatar_url,
    })
}

/// Store (or refresh) the link between a Discord user and a Roblox account
pub async fn record_link(
    store: &Store,
    user_id: UserId,
    result: &VerificationResult,
) -> Result<(), StoreError> {
    store
        .usernames
        .update(|accounts| {
            let linked_at = accounts
                .get(&user_id.get())
                .filter(|a| a.roblox_id == result.user.id)
                .map(|a| a.linked_at)
                .unwrap_or_else(Utc::now);

            accounts.insert(
                user_id.get(),
                LinkedAccount {
                    roblox_id: result.user.id,
                    roblox_username: result.user.name.clone(),
                    display_name: result.user.display_name.clone(),
                    verified: result.verified,
                    linked_at,
                },
            );
        })
        .await?;

    info!(
        "Linked user {} to Roblox account {} ({}), verified: {}",
        user_id, result.user.name, result.user.id, result.verified
    );
    Ok(())
}

/// Bring a member's verified/unverified roles in line with their status
pub async fn sync_member_roles(
    http: &Http,
    member: &Member,
    config: &GuildConfig,
    verified: bool,
) -> Result<(), Error> {
    if let Some(role_id) = config.verified_role_id {
        match determine_role_action(verified, member.roles.contains(&role_id)) {
            RoleAction::Add => member.add_role(http, role_id).await?,
            RoleAction::Remove => member.remove_role(http, role_id).await?,
            RoleAction::NoAction => {}
        }
    }

    if let Some(role_id) = config.unverified_role_id {
        match determine_role_action(!verified, member.roles.contains(&role_id)) {
            RoleAction::Add => member.add_role(http, role_id).await?,
            RoleAction::Remove => member.remove_role(http, role_id).await?,
            RoleAction::NoAction => {}
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prefix_shapes() {
        assert!(matches_affix("DV_Builder", "DV"));
        assert!(matches_affix("DV Builder", "DV"));
        assert!(matches_affix("DVBuilder", "DV"));
    }

    #[test]
    fn test_suffix_shapes() {
        assert!(matches_affix("Builder_DV", "DV"));
        assert!(matches_affix("Builder DV", "DV"));
        assert!(matches_affix("BuilderDV", "DV"));
    }

    #[test]
    fn test_case_insensitive() {
        assert!(matches_affix("dv_builder", "DV"));
        assert!(matches_affix("BUILDER_dv", "DV"));
        assert!(matches_affix("Dv Builder", "dv"));
    }

    #[test]
    fn test_rejects_other_names() {
        assert!(!matches_affix("Builder", "DV"));
        assert!(!matches_affix("BuDVilder", "DV"));
        assert!(!matches_affix("DV", "DV"));
        assert!(!matches_affix("DV_", "DV"));
        assert!(!matches_affix("_DV", "DV"));
        assert!(!matches_affix("DV__", "DV"));
        assert!(!matches_affix("D_V Builder", "DV"));
        assert!(!matches_affix("", "DV"));
        assert!(!matches_affix("Builder", ""));
    }

    #[test]
    fn test_custom_affix() {
        assert!(matches_affix("RX_Builder", "RX"));
        assert!(!matches_affix("DV_Builder", "RX"));
    }

    #[tokio::test]
    async fn test_record_link_keeps_original_link_time() {
        let dir = tempfile::tempdir().unwrap();
        let store = Store::open(dir.path()).await.unwrap();
        let user = UserId::new(42);

        let mut result = VerificationResult {
            user: RobloxUser {
                id: 156,
                name: "builderman".to_string(),
                display_name: "Builder".to_string(),
            },
            verified: false,
            avatar_url: None,
        };
        record_link(&store, user, &result).await.unwrap();
        let first = store.usernames.read().await[&42].clone();
        assert!(!first.verified);

        result.user.display_name = "DV_Builder".to_string();
        result.verified = true;
        record_link(&store, user, &result).await.unwrap();

        let second = store.usernames.read().await[&42].clone();
        assert!(second.verified);
        assert_eq!(second.display_name, "DV_Builder");
        assert_eq!(second.linked_at, first.linked_at);
    }
}
