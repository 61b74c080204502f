use std::{path::PathBuf, str::FromStr, time::Duration};

use chrono_tz::Tz;
use tracing::info;

use crate::constants::{
    DEFAULT_DATA_DIR, DEFAULT_ROBLOX_TIMEOUT_SECS, DEFAULT_ROLE_SYNC_CRON,
    DEFAULT_VERIFICATION_CRON, DEFAULT_VERIFY_AFFIX, DEFAULT_VOICE_RECONCILE_CRON,
};

/// Configuration errors, reported once at startup
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{0} environment variable not set")]
    Missing(&'static str),

    #[error("Invalid value for {key}: {reason}")]
    Invalid { key: &'static str, reason: String },
}

/// Typed configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    pub discord_token: String,
    pub data_dir: PathBuf,
    pub dev_guild_id: Option<u64>,
    pub verify_affix: String,
    pub schedule_timezone: Tz,
    pub verification_cron: cron::Schedule,
    pub role_sync_cron: cron::Schedule,
    pub voice_reconcile_cron: cron::Schedule,
    pub roblox_timeout: Duration,
}

impl Config {
    /// Load configuration from the process environment
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build configuration from any key lookup, validating every field
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let discord_token = lookup("DISCORD_TOKEN")
            .filter(|token| !token.trim().is_empty())
            .ok_or(ConfigError::Missing("DISCORD_TOKEN"))?;

        let data_dir = lookup("DATA_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_DATA_DIR));

        let dev_guild_id = match lookup("DEV_GUILD_ID") {
            Some(raw) => Some(raw.parse::<u64>().map_err(|e| ConfigError::Invalid {
                key: "DEV_GUILD_ID",
                reason: e.to_string(),
            })?),
            None => None,
        };

        if dev_guild_id.is_some() {
            info!("Development mode: Commands will be registered to guild only");
        }

        let verify_affix = lookup("VERIFY_AFFIX").unwrap_or_else(|| DEFAULT_VERIFY_AFFIX.to_string());
        if verify_affix.is_empty() || !verify_affix.chars().all(char::is_alphanumeric) {
            return Err(ConfigError::Invalid {
                key: "VERIFY_AFFIX",
                reason: "must be a non-empty alphanumeric string".to_string(),
            });
        }

        let schedule_timezone = match lookup("SCHEDULE_TIMEZONE") {
            Some(raw) => raw.parse::<Tz>().map_err(|e| ConfigError::Invalid {
                key: "SCHEDULE_TIMEZONE",
                reason: e.to_string(),
            })?,
            None => Tz::UTC,
        };

        let roblox_timeout = match lookup("ROBLOX_TIMEOUT_SECS") {
            Some(raw) => match raw.parse::<u64>() {
                Ok(secs) if secs > 0 => Duration::from_secs(secs),
                _ => {
                    return Err(ConfigError::Invalid {
                        key: "ROBLOX_TIMEOUT_SECS",
                        reason: format!("'{}' is not a positive number of seconds", raw),
                    });
                }
            },
            None => Duration::from_secs(DEFAULT_ROBLOX_TIMEOUT_SECS),
        };

        Ok(Self {
            discord_token,
            data_dir,
            dev_guild_id,
            verify_affix,
            schedule_timezone,
            verification_cron: parse_cron(&lookup, "VERIFICATION_CRON", DEFAULT_VERIFICATION_CRON)?,
            role_sync_cron: parse_cron(&lookup, "ROLE_SYNC_CRON", DEFAULT_ROLE_SYNC_CRON)?,
            voice_reconcile_cron: parse_cron(
                &lookup,
                "VOICE_RECONCILE_CRON",
                DEFAULT_VOICE_RECONCILE_CRON,
            )?,
            roblox_timeout,
        })
    }
}

/// Parse a cron expression (sec min hour day month weekday)
fn parse_cron<F>(lookup: &F, key: &'static str, default: &str) -> Result<cron::Schedule, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let raw = lookup(key).unwrap_or_else(|| default.to_string());
    cron::Schedule::from_str(&raw).map_err(|e| ConfigError::Invalid {
        key,
        reason: format!("'{}': {}", raw, e),
    })
}
