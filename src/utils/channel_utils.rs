/// Pure functions for temporary channel names and settings (Discord-agnostic)
use crate::constants::{MAX_CHANNEL_NAME_LENGTH, MAX_USER_LIMIT};

/// Format a temporary channel name for a user
pub fn format_temp_channel_name(user_name: &str) -> String {
    let name = format!("{}'s Channel", user_name);
    truncate_channel_name(&name)
}

/// Cut a name down to what Discord accepts
pub fn truncate_channel_name(name: &str) -> String {
    name.chars().take(MAX_CHANNEL_NAME_LENGTH as usize).collect()
}

/// Validate channel name length
pub fn is_valid_channel_name(name: &str) -> Result<(), &'static str> {
    if name.trim().is_empty() {
        return Err("Channel name cannot be empty");
    }

    if name.chars().count() > MAX_CHANNEL_NAME_LENGTH as usize {
        return Err("Channel name cannot exceed 100 characters");
    }

    Ok(())
}

/// A user limit of zero means unlimited
pub fn normalize_user_limit(limit: u32) -> Result<Option<u32>, &'static str> {
    match limit {
        0 => Ok(None),
        n if n <= MAX_USER_LIMIT => Ok(Some(n)),
        _ => Err("User limit must be between 0 and 99"),
    }
}

/// Parse a voice region; `auto` (or blank) lets Discord choose
pub fn parse_region(region: &str) -> Option<String> {
    let region = region.trim().to_lowercase();
    if region.is_empty() || region == "auto" {
        None
    } else {
        Some(region)
    }
}
