//! Shared fixtures for server integration tests.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use tab_game::{Dice, DiceRoll, Session};
use tab_server::{Broadcaster, GameService, MemoryStore, Repository, StoreError, UserRecord};

/// Dice that replay a fixed script, then keep throwing 2.
#[derive(Debug, Default)]
pub struct ScriptedDice {
    script: Mutex<VecDeque<u8>>,
}

impl ScriptedDice {
    pub fn new(values: &[u8]) -> Self {
        Self {
            script: Mutex::new(values.iter().copied().collect()),
        }
    }
}

impl Dice for ScriptedDice {
    fn roll(&self) -> DiceRoll {
        let value = self
            .script
            .lock()
            .expect("dice lock")
            .pop_front()
            .unwrap_or(2);
        DiceRoll::from_value(value).expect("scripted value is a valid score")
    }
}

/// In-memory store whose next game save fails once armed.
#[derive(Debug, Default)]
pub struct FlakyStore {
    inner: MemoryStore,
    fail_next_game_save: AtomicBool,
}

impl FlakyStore {
    pub fn arm(&self) {
        self.fail_next_game_save.store(true, Ordering::SeqCst);
    }
}

impl Repository for FlakyStore {
    fn user(&self, nick: &str) -> Result<Option<UserRecord>, StoreError> {
        self.inner.user(nick)
    }

    fn users(&self) -> Result<Vec<UserRecord>, StoreError> {
        self.inner.users()
    }

    fn save_user(&self, user: &UserRecord) -> Result<(), StoreError> {
        self.inner.save_user(user)
    }

    fn game(&self, id: &str) -> Result<Option<Session>, StoreError> {
        self.inner.game(id)
    }

    fn games(&self) -> Result<Vec<Session>, StoreError> {
        self.inner.games()
    }

    fn save_game(&self, session: &Session) -> Result<(), StoreError> {
        if self.fail_next_game_save.swap(false, Ordering::SeqCst) {
            return Err(StoreError::new("disk full"));
        }
        self.inner.save_game(session)
    }
}

/// Service over `store` with scripted rolls.
pub fn service_with(store: Arc<dyn Repository>, rolls: &[u8]) -> GameService {
    GameService::new(
        store,
        Arc::new(ScriptedDice::new(rolls)),
        Broadcaster::new(16),
        10,
    )
}

/// In-memory service with `ana` and `bia` registered.
pub async fn two_players(rolls: &[u8]) -> GameService {
    let service = service_with(Arc::new(MemoryStore::new()), rolls);
    service.register("ana", "pw-a").await.expect("register ana");
    service.register("bia", "pw-b").await.expect("register bia");
    service
}

/// `ana` (Blue) and `bia` (Red) seated in one 3-column game of group 1.
pub async fn seated(rolls: &[u8]) -> (GameService, String) {
    let service = two_players(rolls).await;
    let first = service.join("ana", "pw-a", 1, 3).await.expect("ana joins");
    let second = service.join("bia", "pw-b", 1, 3).await.expect("bia joins");
    assert_eq!(first.session_id(), second.session_id());
    let game = first.session_id().clone();
    (service, game)
}
