/// Leaderboard service - ranking and pagination over the points table
use std::collections::BTreeMap;

use poise::serenity_prelude::{Colour, CreateEmbed, CreateEmbedFooter};

use crate::{
    constants::LEADERBOARD_PAGE_SIZE,
    models::PointsTable,
    store::{Store, StoreError},
};

/// One leaderboard row
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RankedEntry {
    pub rank: usize,
    pub user_id: u64,
    pub points: i64,
}

/// Rank users by points, highest first, ties broken by user id
pub fn rank(points: &BTreeMap<u64, i64>) -> Vec<RankedEntry> {
    let mut sorted: Vec<(u64, i64)> = points.iter().map(|(u, p)| (*u, *p)).collect();
    sorted.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));

    sorted
        .into_iter()
        .enumerate()
        .map(|(i, (user_id, points))| RankedEntry {
            rank: i + 1,
            user_id,
            points,
        })
        .collect()
}

/// Number of pages; an empty board still has one page
pub fn page_count(entries: usize) -> usize {
    entries.div_ceil(LEADERBOARD_PAGE_SIZE).max(1)
}

pub fn page_slice(entries: &[RankedEntry], page: usize) -> &[RankedEntry] {
    let start = (page * LEADERBOARD_PAGE_SIZE).min(entries.len());
    let end = (start + LEADERBOARD_PAGE_SIZE).min(entries.len());
    &entries[start..end]
}

/// Step `delta` pages from `page`, wrapping at both ends
pub fn step_page(page: usize, delta: i64, pages: usize) -> usize {
    let pages = pages.max(1) as i64;
    (page as i64 + delta).rem_euclid(pages) as usize
}

pub fn build_page_embed(guild_name: &str, entries: &[RankedEntry], page: usize) -> CreateEmbed {
    let pages = page_count(entries.len());
    let page = page.min(pages - 1);
    let rows = page_slice(entries, page);

    let description = if rows.is_empty() {
        "Nobody has any points yet.".to_string()
    } else {
        rows.iter()
            .map(|e| format!("**#{}** <@{}> - {} pts", e.rank, e.user_id, e.points))
            .collect::<Vec<_>>()
            .join("\n")
    };

    CreateEmbed::new()
        .title(format!("🏆 {} Leaderboard", guild_name))
        .description(description)
        .colour(Colour::GOLD)
        .footer(CreateEmbedFooter::new(format!("Page {}/{}", page + 1, pages)))
}

/// Ranked entries for one guild
pub async fn guild_ranking(store: &Store, guild_id: u64) -> Vec<RankedEntry> {
    let table: PointsTable = store.points.read().await;
    table.get(&guild_id).map(rank).unwrap_or_default()
}

/// Add `amount` (may be negative) to a member's points; returns the new total
pub async fn add_points(
    store: &Store,
    guild_id: u64,
    user_id: u64,
    amount: i64,
) -> Result<i64, StoreError> {
    store
        .points
        .update(|table| {
            let total = table.entry(guild_id).or_default().entry(user_id).or_insert(0);
            *total = total.saturating_add(amount);
            *total
        })
        .await
}

pub async fn points_of(store: &Store, guild_id: u64, user_id: u64) -> i64 {
    store
        .points
        .read()
        .await
        .get(&guild_id)
        .and_then(|users| users.get(&user_id).copied())
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn board(n: u64) -> BTreeMap<u64, i64> {
        (1..=n).map(|u| (u, (u * 10) as i64)).collect()
    }

    #[test]
    fn test_rank_orders_by_points_then_id() {
        let points: BTreeMap<u64, i64> = [(3, 50), (1, 50), (2, 80)].into_iter().collect();
        let ranked = rank(&points);

        let order: Vec<u64> = ranked.iter().map(|e| e.user_id).collect();
        assert_eq!(order, vec![2, 1, 3]);
        assert_eq!(ranked[0].rank, 1);
        assert_eq!(ranked[2].rank, 3);
    }

    #[test]
    fn test_page_count() {
        assert_eq!(page_count(0), 1);
        assert_eq!(page_count(1), 1);
        assert_eq!(page_count(10), 1);
        assert_eq!(page_count(11), 2);
        assert_eq!(page_count(25), 3);
    }

    #[test]
    fn test_page_slice() {
        let ranked = rank(&board(25));

        assert_eq!(page_slice(&ranked, 0).len(), 10);
        assert_eq!(page_slice(&ranked, 2).len(), 5);
        assert_eq!(page_slice(&ranked, 2)[0].rank, 21);
        assert!(page_slice(&ranked, 9).is_empty());
    }

    #[test]
    fn test_step_page_wraps() {
        assert_eq!(step_page(0, 1, 3), 1);
        assert_eq!(step_page(2, 1, 3), 0);
        assert_eq!(step_page(0, -1, 3), 2);
        assert_eq!(step_page(0, -1, 1), 0);
        assert_eq!(step_page(0, 1, 0), 0);
    }

    #[tokio::test]
    async fn test_add_points_accumulates() {
        let dir = tempfile::tempdir().unwrap();
        let store = Store::open(dir.path()).await.unwrap();

        assert_eq!(add_points(&store, 1, 7, 5).await.unwrap(), 5);
        assert_eq!(add_points(&store, 1, 7, -2).await.unwrap(), 3);
        assert_eq!(add_points(&store, 2, 7, 4).await.unwrap(), 4);

        assert_eq!(points_of(&store, 1, 7).await, 3);
        assert_eq!(points_of(&store, 1, 8).await, 0);
        assert_eq!(guild_ranking(&store, 1).await.len(), 1);
    }
}
