/// AFK service - away markers and the replies they produce
use chrono::{DateTime, Utc};

use crate::{
    models::AfkEntry,
    store::{Store, StoreError},
};

pub const DEFAULT_AFK_REASON: &str = "AFK";

/// Human duration like `2h 5m`, `3m`, `just now`
pub fn format_duration(since: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let secs = (now - since).num_seconds().max(0);
    let (days, hours, minutes) = (secs / 86_400, (secs % 86_400) / 3_600, (secs % 3_600) / 60);

    match (days, hours, minutes) {
        (0, 0, 0) => "just now".to_string(),
        (0, 0, m) => format!("{}m", m),
        (0, h, m) => format!("{}h {}m", h, m),
        (d, h, _) => format!("{}d {}h", d, h),
    }
}

/// Reply line for a mentioned AFK member
pub fn format_mention_notice(user_id: u64, entry: &AfkEntry, now: DateTime<Utc>) -> String {
    format!(
        "💤 <@{}> is AFK: {} ({} ago)",
        user_id,
        entry.reason,
        format_duration(entry.since, now)
    )
}

pub async fn set_afk(
    store: &Store,
    guild_id: u64,
    user_id: u64,
    reason: Option<String>,
) -> Result<AfkEntry, StoreError> {
    let reason = reason
        .map(|r| r.trim().to_string())
        .filter(|r| !r.is_empty())
        .unwrap_or_else(|| DEFAULT_AFK_REASON.to_string());

    let entry = AfkEntry {
        reason,
        since: Utc::now(),
    };

    store
        .afk
        .update(|table| {
            table
                .entry(guild_id)
                .or_default()
                .insert(user_id, entry.clone());
        })
        .await?;

    Ok(entry)
}

/// Remove an entry; returns it when the member was AFK
pub async fn clear_afk(
    store: &Store,
    guild_id: u64,
    user_id: u64,
) -> Result<Option<AfkEntry>, StoreError> {
    store
        .afk
        .update(|table| {
            let users = table.get_mut(&guild_id)?;
            let removed = users.remove(&user_id);
            if users.is_empty() {
                table.remove(&guild_id);
            }
            removed
        })
        .await
}

/// AFK entries of the given users, in the order given
pub async fn afk_entries(store: &Store, guild_id: u64, user_ids: &[u64]) -> Vec<(u64, AfkEntry)> {
    let table = store.afk.read().await;
    let Some(users) = table.get(&guild_id) else {
        return Vec::new();
    };

    user_ids
        .iter()
        .filter_map(|id| users.get(id).map(|e| (*id, e.clone())))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_format_duration() {
        let now = Utc::now();

        assert_eq!(format_duration(now, now), "just now");
        assert_eq!(format_duration(now - Duration::seconds(30), now), "just now");
        assert_eq!(format_duration(now - Duration::minutes(3), now), "3m");
        assert_eq!(
            format_duration(now - Duration::minutes(125), now),
            "2h 5m"
        );
        assert_eq!(format_duration(now - Duration::hours(50), now), "2d 2h");
        assert_eq!(format_duration(now + Duration::minutes(5), now), "just now");
    }

    #[test]
    fn test_format_mention_notice() {
        let now = Utc::now();
        let entry = AfkEntry {
            reason: "lunch".to_string(),
            since: now - Duration::minutes(10),
        };

        assert_eq!(
            format_mention_notice(42, &entry, now),
            "💤 <@42> is AFK: lunch (10m ago)"
        );
    }

    #[tokio::test]
    async fn test_set_and_clear_afk() {
        let dir = tempfile::tempdir().unwrap();
        let store = Store::open(dir.path()).await.unwrap();

        let entry = set_afk(&store, 1, 7, Some("  ".to_string())).await.unwrap();
        assert_eq!(entry.reason, DEFAULT_AFK_REASON);
        set_afk(&store, 1, 8, Some("sleeping".to_string())).await.unwrap();

        let found = afk_entries(&store, 1, &[8, 9, 7]).await;
        let ids: Vec<u64> = found.iter().map(|(id, _)| *id).collect();
        assert_eq!(ids, vec![8, 7]);

        assert!(clear_afk(&store, 1, 7).await.unwrap().is_some());
        assert!(clear_afk(&store, 1, 7).await.unwrap().is_none());
        assert!(clear_afk(&store, 2, 7).await.unwrap().is_none());
        assert_eq!(afk_entries(&store, 1, &[7, 8]).await.len(), 1);
    }
}
