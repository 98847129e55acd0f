//! Leaderboard projection over stored user stats.

use serde::Serialize;
use tracing::{debug, instrument};

use crate::store::{StatsKey, UserRecord};

/// One leaderboard row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RankingEntry {
    /// Player nickname.
    pub nickname: String,
    /// Games won under the key.
    pub wins: u32,
    /// Games finished under the key.
    pub games_played: u32,
}

/// Top `limit` players for a (group, columns) board: most wins first,
/// then fewest games, then nickname.
#[instrument(skip(users), fields(users = users.len()))]
pub fn ranking(users: &[UserRecord], group: u32, columns: usize, limit: usize) -> Vec<RankingEntry> {
    let key = StatsKey::new(group, columns);
    let mut entries: Vec<RankingEntry> = users
        .iter()
        .filter_map(|user| {
            user.stats_for(key).map(|stats| RankingEntry {
                nickname: user.nick().clone(),
                wins: *stats.wins(),
                games_played: *stats.games_played(),
            })
        })
        .collect();

    entries.sort_by(|a, b| {
        b.wins
            .cmp(&a.wins)
            .then(a.games_played.cmp(&b.games_played))
            .then_with(|| a.nickname.cmp(&b.nickname))
    });
    entries.truncate(limit);
    debug!(rows = entries.len(), "Ranking computed");
    entries
}
