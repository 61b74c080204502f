use std::{collections::BTreeMap, collections::HashMap, sync::Arc, time::Duration};

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use poise::serenity_prelude::{ChannelId, GuildId, MessageId, RoleId, UserId};
use serde::{Deserialize, Serialize};

use crate::{
    config::Config, services::roblox::RobloxClient, services::temp_voice::TempVoiceManager,
    session::SessionScheduler, store::Store, utils::invites::InviteUse,
};

/// Which kind of interactive message a session governs
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionKind {
    Leaderboard,
    Verify,
}

/// Scheduling record for auto-disabling an interactive message
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub key: String,
    pub channel_id: ChannelId,
    pub message_id: MessageId,
    #[serde(rename = "type")]
    pub kind: SessionKind,
    #[serde(default)]
    pub meta: serde_json::Map<String, serde_json::Value>,
    /// Epoch milliseconds
    pub expires_at: i64,
}

impl Session {
    /// Create a session for a message, expiring `ttl` from now
    pub fn new(kind: SessionKind, channel_id: ChannelId, message_id: MessageId, ttl: Duration) -> Self {
        Self {
            key: message_id.to_string(),
            channel_id,
            message_id,
            kind,
            meta: serde_json::Map::new(),
            expires_at: now_millis() + ttl.as_millis() as i64,
        }
    }

    pub fn with_meta(mut self, key: &str, value: impl Into<serde_json::Value>) -> Self {
        self.meta.insert(key.to_string(), value.into());
        self
    }

    pub fn meta_u64(&self, key: &str) -> Option<u64> {
        self.meta.get(key).and_then(|v| v.as_u64())
    }

    /// Push the expiry back to `ttl` from now
    pub fn renew(&mut self, ttl: Duration) {
        self.expires_at = now_millis() + ttl.as_millis() as i64;
    }

    pub fn is_expired(&self, now_ms: i64) -> bool {
        self.expires_at <= now_ms
    }
}

/// Current wall-clock time in epoch milliseconds
pub fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}

/// A bot-created temporary voice channel and its owner
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VoiceOwnership {
    pub owner_id: UserId,
    pub channel_id: ChannelId,
    pub channel_name: String,
    pub is_active: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
}

/// Per-guild configuration
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct GuildConfig {
    pub verified_role_id: Option<RoleId>,
    pub unverified_role_id: Option<RoleId>,
    pub member_role_id: Option<RoleId>,
    pub lobby_channel_id: Option<ChannelId>,
    pub temp_category_id: Option<ChannelId>,
    pub welcome_channel_id: Option<ChannelId>,
    pub leave_channel_id: Option<ChannelId>,
    pub owner_to_channel: Vec<VoiceOwnership>,
}

/// A Discord account linked to a Roblox account
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LinkedAccount {
    pub roblox_id: u64,
    pub roblox_username: String,
    pub display_name: String,
    pub verified: bool,
    pub linked_at: DateTime<Utc>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AfkEntry {
    pub reason: String,
    pub since: DateTime<Utc>,
}

/// Preferences applied when a user's temporary channel is created
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct VoicePreference {
    pub channel_name: Option<String>,
    pub user_limit: Option<u32>,
    pub region: Option<String>,
}

/// guild id -> config (`guild.json`)
pub type GuildTable = BTreeMap<u64, GuildConfig>;
/// discord user id -> linked account (`username.json`)
pub type LinkedAccountTable = BTreeMap<u64, LinkedAccount>;
/// guild id -> user id -> entry (`afk.json`)
pub type AfkTable = BTreeMap<u64, BTreeMap<u64, AfkEntry>>;
/// guild id -> user id -> points (`venity.json`)
pub type PointsTable = BTreeMap<u64, BTreeMap<u64, i64>>;
/// user id -> preferences (`tempvoice.json`)
pub type VoicePrefTable = BTreeMap<u64, VoicePreference>;

/// Bot state shared across all handlers
#[derive(Clone)]
pub struct Data {
    pub config: Arc<Config>,
    /// JSON tables
    pub store: Arc<Store>,
    /// Auto-disable timers for interactive messages
    pub sessions: SessionScheduler,
    pub roblox: RobloxClient,
    pub temp_voice: TempVoiceManager,
    /// Maps guild IDs to their known invites, for join attribution
    pub invites: Arc<DashMap<GuildId, HashMap<String, InviteUse>>>,
}

impl Data {
    pub fn new(
        config: Arc<Config>,
        store: Arc<Store>,
        sessions: SessionScheduler,
        roblox: RobloxClient,
    ) -> Self {
        Self {
            temp_voice: TempVoiceManager::new(Arc::clone(&store)),
            config,
            store,
            sessions,
            roblox,
            invites: Arc::new(DashMap::new()),
        }
    }

    /// Configuration for a guild (default when never configured)
    pub async fn guild_config(&self, guild_id: GuildId) -> GuildConfig {
        self.store
            .guilds
            .read()
            .await
            .remove(&guild_id.get())
            .unwrap_or_default()
    }
}

pub type Error = Box<dyn std::error::Error + Send + Sync>;
pub type Context<'a> = poise::Context<'a, Data, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_json_shape() {
        let session = Session {
            key: "10".to_string(),
            channel_id: ChannelId::new(5),
            message_id: MessageId::new(10),
            kind: SessionKind::Leaderboard,
            meta: serde_json::Map::new(),
            expires_at: 1_700_000_000_000,
        }
        .with_meta("page", 2);

        let json = serde_json::to_value(&session).unwrap();
        assert_eq!(json["type"], "leaderboard");
        assert_eq!(json["expiresAt"], 1_700_000_000_000i64);
        assert_eq!(json["meta"]["page"], 2);

        let back: Session = serde_json::from_value(json).unwrap();
        assert_eq!(back, session);
        assert_eq!(back.meta_u64("page"), Some(2));
    }

    #[test]
    fn test_session_expiry() {
        let mut session = Session::new(
            SessionKind::Verify,
            ChannelId::new(1),
            MessageId::new(2),
            Duration::from_secs(300),
        );
        assert_eq!(session.key, "2");
        assert!(!session.is_expired(now_millis()));
        assert!(session.is_expired(session.expires_at));

        session.expires_at = 0;
        session.renew(Duration::from_secs(60));
        assert!(session.expires_at > now_millis());
    }

    #[test]
    fn test_guild_config_tolerates_missing_fields() {
        let config: GuildConfig = serde_json::from_str(r#"{"lobbyChannelId": "42"}"#).unwrap();
        assert_eq!(config.lobby_channel_id, Some(ChannelId::new(42)));
        assert!(config.owner_to_channel.is_empty());
        assert!(config.verified_role_id.is_none());
    }
}
