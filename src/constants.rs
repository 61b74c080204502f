use std::time::Duration;

/// Inactivity window after which interactive components are disabled
pub const SESSION_TTL: Duration = Duration::from_secs(5 * 60);

/// How long an emptied temporary channel survives before deletion
pub const VOICE_GRACE: Duration = Duration::from_secs(5);

/// Ceiling for a whole scheduled verification pass
pub const VERIFICATION_PASS_TIMEOUT: Duration = Duration::from_secs(4 * 60);

/// Per-member fetch timeout inside the role sync loop
pub const ROLE_FETCH_TIMEOUT: Duration = Duration::from_secs(5);

/// Attempts made against the Roblox API when rate limited
pub const ROBLOX_MAX_ATTEMPTS: u32 = 3;

/// Linear backoff step between rate-limited Roblox attempts
pub const ROBLOX_BACKOFF_STEP: Duration = Duration::from_secs(1);

/// Entries shown per leaderboard page
pub const LEADERBOARD_PAGE_SIZE: usize = 10;

/// Maximum length for channel names
pub const MAX_CHANNEL_NAME_LENGTH: u16 = 100;

/// Maximum user limit Discord accepts on a voice channel
pub const MAX_USER_LIMIT: u32 = 99;

/// Component custom ids
pub const LEADERBOARD_PREV_ID: &str = "leaderboard_prev";
pub const LEADERBOARD_NEXT_ID: &str = "leaderboard_next";
pub const VERIFY_RECHECK_ID: &str = "verify_recheck";

/// Defaults for optional configuration
pub const DEFAULT_DATA_DIR: &str = "data";
pub const DEFAULT_VERIFY_AFFIX: &str = "DV";
pub const DEFAULT_VERIFICATION_CRON: &str = "0 0 */6 * * *";
pub const DEFAULT_ROLE_SYNC_CRON: &str = "0 30 * * * *";
pub const DEFAULT_VOICE_RECONCILE_CRON: &str = "0 */15 * * * *";
pub const DEFAULT_ROBLOX_TIMEOUT_SECS: u64 = 10;

/// Log directive for the application
pub const LOG_DIRECTIVE: &str = "dvbot=info";
