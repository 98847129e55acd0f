//! Persisted user records.

use derive_getters::Getters;
use derive_new::new;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Stats bucket key: one leaderboard per (group, columns).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, new, derive_more::Display)]
#[display("{}-{}", group, columns)]
pub struct StatsKey {
    group: u32,
    columns: usize,
}

/// Win/game counters for one bucket.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, Getters)]
#[serde(rename_all = "camelCase")]
pub struct Stats {
    wins: u32,
    games_played: u32,
}

impl Stats {
    /// Counts a finished game.
    pub fn record(&mut self, won: bool) {
        self.games_played += 1;
        if won {
            self.wins += 1;
        }
    }
}

/// A registered player.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Getters)]
#[serde(rename_all = "camelCase")]
pub struct UserRecord {
    nick: String,
    password_digest: String,
    /// Buckets appear on the first finished game of each (group, columns).
    #[serde(default)]
    stats: BTreeMap<String, Stats>,
}

impl UserRecord {
    /// Creates a user without any stats.
    pub fn new(nick: String, password_digest: String) -> Self {
        Self {
            nick,
            password_digest,
            stats: BTreeMap::new(),
        }
    }

    /// Stats for `key`, if any game was recorded there.
    pub fn stats_for(&self, key: StatsKey) -> Option<&Stats> {
        self.stats.get(&key.to_string())
    }

    /// Counts a finished game under `key`, creating the bucket lazily.
    pub fn record_game(&mut self, key: StatsKey, won: bool) {
        self.stats.entry(key.to_string()).or_default().record(won);
    }
}
