//! Key-value repository for users and games.
//!
//! The server keeps live sessions in memory; the repository is a
//! write-through durability snapshot. Saves are synchronous.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use serde::Serialize;
use serde::de::DeserializeOwned;
use tab_game::{Session, SessionId};
use tracing::{debug, info, instrument, warn};

use crate::store::{StoreError, UserRecord};

/// Get/save access to users and games.
pub trait Repository: Send + Sync {
    /// Looks up a user by nickname.
    fn user(&self, nick: &str) -> Result<Option<UserRecord>, StoreError>;

    /// All users.
    fn users(&self) -> Result<Vec<UserRecord>, StoreError>;

    /// Inserts or replaces a user.
    fn save_user(&self, user: &UserRecord) -> Result<(), StoreError>;

    /// Looks up a game by id.
    fn game(&self, id: &str) -> Result<Option<Session>, StoreError>;

    /// All games.
    fn games(&self) -> Result<Vec<Session>, StoreError>;

    /// Inserts or replaces a game.
    fn save_game(&self, session: &Session) -> Result<(), StoreError>;
}

#[derive(Debug, Default)]
struct Tables {
    users: BTreeMap<String, UserRecord>,
    games: BTreeMap<SessionId, Session>,
}

/// Repository held entirely in memory. Used by tests and `--ephemeral`.
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
}

impl MemoryStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

fn lock(tables: &Mutex<Tables>) -> Result<MutexGuard<'_, Tables>, StoreError> {
    tables
        .lock()
        .map_err(|_| StoreError::new("Storage lock poisoned"))
}

impl Repository for MemoryStore {
    fn user(&self, nick: &str) -> Result<Option<UserRecord>, StoreError> {
        Ok(lock(&self.tables)?.users.get(nick).cloned())
    }

    fn users(&self) -> Result<Vec<UserRecord>, StoreError> {
        Ok(lock(&self.tables)?.users.values().cloned().collect())
    }

    fn save_user(&self, user: &UserRecord) -> Result<(), StoreError> {
        lock(&self.tables)?
            .users
            .insert(user.nick().clone(), user.clone());
        Ok(())
    }

    fn game(&self, id: &str) -> Result<Option<Session>, StoreError> {
        Ok(lock(&self.tables)?.games.get(id).cloned())
    }

    fn games(&self) -> Result<Vec<Session>, StoreError> {
        Ok(lock(&self.tables)?.games.values().cloned().collect())
    }

    fn save_game(&self, session: &Session) -> Result<(), StoreError> {
        lock(&self.tables)?
            .games
            .insert(session.id().clone(), session.clone());
        Ok(())
    }
}

/// Repository backed by two JSON documents, `users.json` and `games.json`,
/// each rewritten in full on every save.
#[derive(Debug)]
pub struct JsonFileStore {
    users_path: PathBuf,
    games_path: PathBuf,
    tables: Mutex<Tables>,
}

impl JsonFileStore {
    /// File holding the users table.
    pub const USERS_FILE: &'static str = "users.json";
    /// File holding the games table.
    pub const GAMES_FILE: &'static str = "games.json";

    /// Opens (creating if needed) the data directory and loads both tables.
    ///
    /// Missing or unreadable documents start empty.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the directory cannot be created.
    #[instrument(skip(data_dir), fields(data_dir = %data_dir.as_ref().display()))]
    pub fn open(data_dir: impl AsRef<Path>) -> Result<Self, StoreError> {
        let data_dir = data_dir.as_ref();
        std::fs::create_dir_all(data_dir)?;

        let users_path = data_dir.join(Self::USERS_FILE);
        let games_path = data_dir.join(Self::GAMES_FILE);
        let tables = Tables {
            users: load_table(&users_path),
            games: load_table(&games_path),
        };
        info!(
            users = tables.users.len(),
            games = tables.games.len(),
            "Storage loaded"
        );

        Ok(Self {
            users_path,
            games_path,
            tables: Mutex::new(tables),
        })
    }
}

#[instrument(fields(path = %path.display()))]
fn load_table<T: DeserializeOwned>(path: &Path) -> BTreeMap<String, T> {
    if !path.exists() {
        debug!("No document yet, starting empty");
        return BTreeMap::new();
    }
    match std::fs::read_to_string(path)
        .map_err(StoreError::from)
        .and_then(|text| serde_json::from_str(&text).map_err(StoreError::from))
    {
        Ok(table) => table,
        Err(e) => {
            warn!(error = %e, "Unreadable document, starting empty");
            BTreeMap::new()
        }
    }
}

#[instrument(skip(table), fields(path = %path.display(), rows = table.len()))]
fn write_table<T: Serialize>(path: &Path, table: &BTreeMap<String, T>) -> Result<(), StoreError> {
    let json = serde_json::to_string_pretty(table)?;
    std::fs::write(path, json)?;
    debug!("Document flushed");
    Ok(())
}

impl Repository for JsonFileStore {
    fn user(&self, nick: &str) -> Result<Option<UserRecord>, StoreError> {
        Ok(lock(&self.tables)?.users.get(nick).cloned())
    }

    fn users(&self) -> Result<Vec<UserRecord>, StoreError> {
        Ok(lock(&self.tables)?.users.values().cloned().collect())
    }

    fn save_user(&self, user: &UserRecord) -> Result<(), StoreError> {
        let mut tables = lock(&self.tables)?;
        let mut next = tables.users.clone();
        next.insert(user.nick().clone(), user.clone());
        write_table(&self.users_path, &next)?;
        tables.users = next;
        Ok(())
    }

    fn game(&self, id: &str) -> Result<Option<Session>, StoreError> {
        Ok(lock(&self.tables)?.games.get(id).cloned())
    }

    fn games(&self) -> Result<Vec<Session>, StoreError> {
        Ok(lock(&self.tables)?.games.values().cloned().collect())
    }

    fn save_game(&self, session: &Session) -> Result<(), StoreError> {
        let mut tables = lock(&self.tables)?;
        let previous = tables.games.insert(session.id().clone(), session.clone());
        if let Err(e) = write_table(&self.games_path, &tables.games) {
            match previous {
                Some(old) => tables.games.insert(session.id().clone(), old),
                None => tables.games.remove(session.id()),
            };
            return Err(e);
        }
        Ok(())
    }
}
