//! Game service: credentials, session lookup, persistence and push in one
//! place.
//!
//! Every mutation follows the same sequence under the session lock: apply
//! the transition to a copy, encode it, persist it, commit it, publish it.
//! A failure at any step before the commit leaves the live session
//! untouched and nothing is published. Stats written for a game that ends
//! are put back when the game itself cannot be saved.

use std::sync::Arc;

use chrono::Utc;
use derive_getters::Getters;
use serde::Serialize;
use tab_game::{Color, Dice, GameError, RollOutcome, Selection, Session, SessionId, Status};
use tracing::{debug, info, instrument, warn};

use crate::auth;
use crate::broadcast::{Broadcaster, Frame, Subscription};
use crate::error::ServiceError;
use crate::ranking::{RankingEntry, ranking};
use crate::registry::{SessionRegistry, SharedSession, mint_session_id};
use crate::store::{Repository, StatsKey, UserRecord};

/// Outcome of a join.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Getters)]
#[serde(rename_all = "camelCase")]
pub struct JoinTicket {
    /// Session the player is seated in.
    session_id: SessionId,
    /// Seat colour.
    color: Color,
    /// Session status after the join.
    status: Status,
}

/// Facade over every game operation the HTTP layer exposes.
pub struct GameService {
    store: Arc<dyn Repository>,
    registry: SessionRegistry,
    broadcaster: Broadcaster,
    dice: Arc<dyn Dice>,
    ranking_limit: usize,
}

impl std::fmt::Debug for GameService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GameService")
            .field("registry", &self.registry)
            .field("ranking_limit", &self.ranking_limit)
            .finish_non_exhaustive()
    }
}

fn require(field: &str, value: &str) -> Result<(), ServiceError> {
    if value.trim().is_empty() {
        return Err(ServiceError::validation(format!("Missing {}", field)));
    }
    Ok(())
}

fn encode(session: &Session) -> Result<Arc<str>, ServiceError> {
    Ok(Arc::from(serde_json::to_string(session)?))
}

impl GameService {
    /// Builds a service over an empty registry.
    pub fn new(
        store: Arc<dyn Repository>,
        dice: Arc<dyn Dice>,
        broadcaster: Broadcaster,
        ranking_limit: usize,
    ) -> Self {
        Self {
            store,
            registry: SessionRegistry::new(),
            broadcaster,
            dice,
            ranking_limit,
        }
    }

    /// The broadcaster push connections subscribe through.
    pub fn broadcaster(&self) -> &Broadcaster {
        &self.broadcaster
    }

    /// Loads persisted sessions into the registry. Returns how many.
    #[instrument(skip(self))]
    pub async fn restore(&self) -> Result<usize, ServiceError> {
        let games = self.store.games()?;
        Ok(self.registry.restore(games).await)
    }

    /// Creates an account, or confirms the password of an existing one.
    #[instrument(skip(self, password))]
    pub async fn register(&self, nick: &str, password: &str) -> Result<(), ServiceError> {
        require("nick", nick)?;
        require("password", password)?;
        auth::register(self.store.as_ref(), nick, password)
    }

    /// Seats `nick` in the first open session for (group, columns), or
    /// opens a new one.
    #[instrument(skip(self, password))]
    pub async fn join(
        &self,
        nick: &str,
        password: &str,
        group: u32,
        columns: usize,
    ) -> Result<JoinTicket, ServiceError> {
        require("nick", nick)?;
        require("password", password)?;
        if columns == 0 {
            return Err(ServiceError::validation("Invalid size: must be a positive integer"));
        }
        auth::authenticate(self.store.as_ref(), nick, password)?;

        let gate = self.registry.matchmaker().await;
        if let Some(mut live) = self.registry.find_open(&gate, group, columns, nick).await {
            drop(gate);
            let mut next = Session::clone(&live);
            let color = next.join(nick)?;
            let frame = encode(&next)?;
            self.store.save_game(&next)?;
            *live = next;
            self.broadcaster.publish(live.id(), Frame::State(frame));
            return Ok(JoinTicket {
                session_id: live.id().clone(),
                color,
                status: *live.status(),
            });
        }

        let session = Session::new(
            mint_session_id(nick),
            group,
            columns,
            nick.to_string(),
            Utc::now(),
        );
        let color = session
            .color_of(nick)
            .ok_or_else(|| GameError::NotAPlayer(nick.to_string()))?;
        self.store.save_game(&session)?;
        let ticket = JoinTicket {
            session_id: session.id().clone(),
            color,
            status: *session.status(),
        };
        self.registry.insert(&gate, session).await;
        info!(session_id = %ticket.session_id, "Session opened");
        Ok(ticket)
    }

    /// Throws the dice for the turn holder.
    #[instrument(skip(self, password))]
    pub async fn roll(
        &self,
        nick: &str,
        password: &str,
        game: &str,
    ) -> Result<RollOutcome, ServiceError> {
        let dice = self.dice.as_ref();
        self.mutate(nick, password, game, |session| session.roll(nick, dice))
            .await
    }

    /// Picks a cell; the meaning depends on the turn phase.
    #[instrument(skip(self, password))]
    pub async fn notify(
        &self,
        nick: &str,
        password: &str,
        game: &str,
        cell: usize,
    ) -> Result<Selection, ServiceError> {
        self.mutate(nick, password, game, |session| session.notify(nick, cell))
            .await
    }

    /// Hands the turn to the opponent.
    #[instrument(skip(self, password))]
    pub async fn pass(&self, nick: &str, password: &str, game: &str) -> Result<(), ServiceError> {
        self.mutate(nick, password, game, |session| session.pass(nick))
            .await
    }

    /// Forfeits the game.
    #[instrument(skip(self, password))]
    pub async fn leave(&self, nick: &str, password: &str, game: &str) -> Result<(), ServiceError> {
        self.mutate(nick, password, game, |session| session.leave(nick).map(|_| ()))
            .await
    }

    /// Leaderboard for (group, columns).
    #[instrument(skip(self))]
    pub async fn ranking(
        &self,
        group: u32,
        columns: usize,
    ) -> Result<Vec<RankingEntry>, ServiceError> {
        if columns == 0 {
            return Err(ServiceError::validation("Invalid size: must be a positive integer"));
        }
        let users = self.store.users()?;
        Ok(ranking(&users, group, columns, self.ranking_limit))
    }

    /// Copy of the current state of a session.
    pub async fn snapshot(&self, game: &str) -> Result<Session, ServiceError> {
        let shared = self.lookup(game).await?;
        let session = shared.lock().await;
        Ok(Session::clone(&session))
    }

    /// Follows a session. The first frame is its current state.
    #[instrument(skip(self))]
    pub async fn subscribe(&self, game: &str) -> Result<Subscription, ServiceError> {
        require("game", game)?;
        let shared = self.lookup(game).await?;
        // Holding the lock keeps a concurrent publish from slipping in
        // between the snapshot and the registration.
        let session = shared.lock().await;
        let snapshot = encode(&session)?;
        Ok(self.broadcaster.subscribe(session.id(), snapshot))
    }

    async fn lookup(&self, game: &str) -> Result<SharedSession, ServiceError> {
        self.registry
            .get(game)
            .await
            .ok_or_else(|| ServiceError::SessionNotFound(game.to_string()))
    }

    #[instrument(skip(self, password, transition))]
    async fn mutate<T>(
        &self,
        nick: &str,
        password: &str,
        game: &str,
        transition: impl FnOnce(&mut Session) -> Result<T, GameError>,
    ) -> Result<T, ServiceError> {
        require("nick", nick)?;
        require("password", password)?;
        require("game", game)?;
        auth::authenticate(self.store.as_ref(), nick, password)?;

        let shared = self.lookup(game).await?;
        let mut live = shared.lock().await;

        let mut next = Session::clone(&live);
        let outcome = transition(&mut next).inspect_err(|e| {
            debug!(error = %e, "Transition rejected");
        })?;
        let frame = encode(&next)?;

        let settled = if *live.status() != Status::Ended && *next.status() == Status::Ended {
            self.settle(&next)?
        } else {
            Vec::new()
        };
        if let Err(e) = self.store.save_game(&next) {
            warn!(error = %e, "Game save failed");
            self.restore_users(&settled);
            return Err(e.into());
        }
        *live = next;

        self.broadcaster.publish(live.id(), Frame::State(frame));
        Ok(outcome)
    }

    /// Counts a finished game for every seated player and returns their
    /// records as they were before, so the caller can undo the update.
    /// A failed write undoes the users already written.
    #[instrument(skip(self, session), fields(session_id = %session.id()))]
    fn settle(&self, session: &Session) -> Result<Vec<UserRecord>, ServiceError> {
        let Some(winner) = session.winner() else {
            return Ok(Vec::new());
        };
        let key = StatsKey::new(*session.group(), *session.columns());

        let mut previous = Vec::with_capacity(session.players().len());
        for nick in session.players().keys() {
            match self.store.user(nick)? {
                Some(user) => previous.push(user),
                None => warn!(%nick, "Finished game for unknown user"),
            }
        }

        for (written, user) in previous.iter().enumerate() {
            let mut updated = user.clone();
            updated.record_game(key, user.nick() == winner);
            if let Err(e) = self.store.save_user(&updated) {
                self.restore_users(&previous[..written]);
                return Err(e.into());
            }
        }
        info!(%winner, "Stats updated");
        Ok(previous)
    }

    /// Writes back records saved by [`Self::settle`].
    #[instrument(skip_all, fields(count = users.len()))]
    fn restore_users(&self, users: &[UserRecord]) {
        for user in users {
            if let Err(e) = self.store.save_user(user) {
                warn!(nick = %user.nick(), error = %e, "Stats rollback failed");
            }
        }
    }
}
