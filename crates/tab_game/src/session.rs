//! Turn state machine for one game.
//!
//! A session moves `waiting` → `ongoing` → `ended`. Inside `ongoing` each
//! turn cycles through awaiting-roll (no dice), awaiting-origin and
//! awaiting-destination. Transitions either succeed completely or return a
//! [`GameError`] with the session untouched.

use crate::{Board, Color, Dice, DiceRoll, GameError, rules};
use chrono::{DateTime, Utc};
use derive_getters::Getters;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, info, instrument, warn};

/// Opaque identifier of a session.
pub type SessionId = String;

/// Lifecycle of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    /// One player seated.
    Waiting,
    /// Both players seated.
    Ongoing,
    /// Terminal; a winner is recorded.
    Ended,
}

/// Which cell the turn holder is expected to pick next.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "step", rename_all = "camelCase")]
pub enum Phase {
    /// Pick one of your pieces.
    AwaitingOrigin,
    /// Pick where the selected piece goes.
    #[serde(rename_all = "camelCase")]
    AwaitingDestination {
        /// Cell of the selected piece.
        origin: usize,
        /// Legal landing cells for the current roll.
        destinations: BTreeSet<usize>,
    },
}

/// Result of a successful roll.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RollOutcome {
    /// The throw.
    pub dice: DiceRoll,
    /// No piece can move; the actor has to pass.
    pub must_pass: bool,
}

/// Result of a successful `notify`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selection {
    /// A piece was picked; its legal destinations are recorded.
    OriginSelected {
        /// Selected cell.
        origin: usize,
        /// Where it may go.
        destinations: BTreeSet<usize>,
    },
    /// A cell outside the recorded destinations dropped the selection.
    Cancelled,
    /// A piece moved.
    Moved {
        /// Origin cell.
        from: usize,
        /// Landing cell.
        to: usize,
        /// Whether an opposing piece was taken.
        captured: bool,
        /// Set when the move ended the game.
        game_over: Option<GameOver>,
    },
}

/// How a finished game is settled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GameOver {
    /// Player credited with the win.
    pub winner: String,
    /// Other participant, absent when a lone player left.
    pub loser: Option<String>,
}

/// Full state of one game. Serializes as the pushed state frame and as the
/// persisted game document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Getters)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    id: SessionId,
    group: u32,
    columns: usize,
    players: BTreeMap<String, Color>,
    turn_holder: String,
    initial_player: String,
    board: Board,
    phase: Phase,
    dice: Option<DiceRoll>,
    pending_skip: Option<String>,
    winner: Option<String>,
    status: Status,
    created_at: DateTime<Utc>,
}

impl Session {
    /// Opens a session with `creator` seated as Blue and holding the turn.
    #[instrument(skip(id, created_at), fields(session_id = %id))]
    pub fn new(
        id: SessionId,
        group: u32,
        columns: usize,
        creator: String,
        created_at: DateTime<Utc>,
    ) -> Self {
        info!("Creating new game session");
        Self {
            id,
            group,
            columns,
            players: BTreeMap::from([(creator.clone(), Color::Blue)]),
            turn_holder: creator.clone(),
            initial_player: creator,
            board: Board::new(columns),
            phase: Phase::AwaitingOrigin,
            dice: None,
            pending_skip: None,
            winner: None,
            status: Status::Waiting,
            created_at,
        }
    }

    /// Whether `nick` can join this session for a (group, columns) request.
    pub fn is_open_for(&self, group: u32, columns: usize, nick: &str) -> bool {
        self.group == group
            && self.columns == columns
            && self.status != Status::Ended
            && (self.players.contains_key(nick) || self.players.len() < 2)
    }

    /// Colour of `nick`, if seated.
    pub fn color_of(&self, nick: &str) -> Option<Color> {
        self.players.get(nick).copied()
    }

    /// The other seated player.
    pub fn opponent_of(&self, nick: &str) -> Option<&str> {
        self.players
            .keys()
            .map(String::as_str)
            .find(|&other| other != nick)
    }

    /// Whether the turn holder has yet to throw.
    pub fn awaiting_roll(&self) -> bool {
        self.dice.is_none()
    }

    /// Legal destinations from `cell` with `roll` on the current board.
    pub fn legal_destinations(&self, cell: usize, roll: u8) -> BTreeSet<usize> {
        rules::legal_destinations(&self.board, cell, roll)
    }

    /// Nickname of the winner, resolved through the seat map.
    pub fn evaluate_winner(&self) -> Option<String> {
        let color = rules::evaluate_winner(&self.board)?;
        self.players
            .iter()
            .find(|(_, c)| **c == color)
            .map(|(nick, _)| nick.clone())
    }

    /// Seats `nick`. Rejoining an own seat is a no-op.
    #[instrument(skip(self), fields(session_id = %self.id))]
    pub fn join(&mut self, nick: &str) -> Result<Color, GameError> {
        if let Some(color) = self.color_of(nick) {
            debug!(%color, "Player rejoined");
            return Ok(color);
        }
        if self.status == Status::Ended {
            return Err(GameError::GameOver);
        }
        if self.players.len() >= 2 {
            warn!("Session already has 2 players");
            return Err(GameError::SessionFull);
        }
        let color = match self.players.values().next() {
            Some(taken) => taken.opponent(),
            None => Color::Blue,
        };
        self.players.insert(nick.to_string(), color);
        if self.players.len() == 2 {
            self.status = Status::Ongoing;
        }
        info!(%color, status = ?self.status, "Player seated");
        Ok(color)
    }

    /// Throws `dice` for `actor`. Nothing is thrown unless the roll is
    /// allowed.
    #[instrument(skip(self, dice), fields(session_id = %self.id))]
    pub fn roll(&mut self, actor: &str, dice: &dyn Dice) -> Result<RollOutcome, GameError> {
        let color = self.require_turn(actor)?;
        if self.dice.is_some() {
            return Err(GameError::AlreadyRolled);
        }

        let dice = dice.roll();
        let can_move = rules::has_any_legal_move(&self.board, color, dice.value());
        self.dice = Some(dice);
        self.phase = Phase::AwaitingOrigin;
        self.pending_skip = (!can_move).then(|| actor.to_string());

        info!(
            value = dice.value(),
            extra_turn = dice.extra_turn(),
            must_pass = !can_move,
            "Dice rolled"
        );
        Ok(RollOutcome {
            dice,
            must_pass: !can_move,
        })
    }

    /// Handles a cell pick, interpreted by the current phase.
    #[instrument(skip(self), fields(session_id = %self.id))]
    pub fn notify(&mut self, actor: &str, cell: usize) -> Result<Selection, GameError> {
        let color = self.require_turn(actor)?;
        let dice = self.dice.ok_or(GameError::NotRolled)?;

        match std::mem::replace(&mut self.phase, Phase::AwaitingOrigin) {
            Phase::AwaitingOrigin if cell >= self.board.len() => {
                Err(GameError::CellOutOfRange(cell))
            }
            Phase::AwaitingOrigin => self.select_origin(color, cell, dice),
            Phase::AwaitingDestination {
                origin,
                destinations,
            } => {
                if !destinations.contains(&cell) {
                    debug!(cell, origin, "Selection cancelled");
                    return Ok(Selection::Cancelled);
                }
                Ok(self.move_piece(actor, origin, cell, dice))
            }
        }
    }

    /// Gives the turn to the opponent, discarding any roll.
    #[instrument(skip(self), fields(session_id = %self.id))]
    pub fn pass(&mut self, actor: &str) -> Result<(), GameError> {
        self.require_turn(actor)?;
        self.dice = None;
        self.pending_skip = None;
        self.phase = Phase::AwaitingOrigin;
        self.hand_turn_to_opponent(actor);
        info!(turn_holder = %self.turn_holder, "Turn passed");
        Ok(())
    }

    /// Ends the session by forfeit. The remaining player wins; a lone
    /// player leaving is credited with the win.
    #[instrument(skip(self), fields(session_id = %self.id))]
    pub fn leave(&mut self, actor: &str) -> Result<GameOver, GameError> {
        if !self.players.contains_key(actor) {
            return Err(GameError::NotAPlayer(actor.to_string()));
        }
        if self.status == Status::Ended {
            return Err(GameError::GameOver);
        }
        let loser = self.opponent_of(actor).map(|_| actor.to_string());
        let winner = self
            .opponent_of(actor)
            .map(str::to_string)
            .unwrap_or_else(|| actor.to_string());
        let over = GameOver { winner, loser };
        self.finish(&over);
        info!(winner = %over.winner, "Player left");
        Ok(over)
    }

    fn require_turn(&self, actor: &str) -> Result<Color, GameError> {
        let color = self
            .color_of(actor)
            .ok_or_else(|| GameError::NotAPlayer(actor.to_string()))?;
        match self.status {
            Status::Waiting => return Err(GameError::WaitingForOpponent),
            Status::Ended => return Err(GameError::GameOver),
            Status::Ongoing => {}
        }
        if self.turn_holder != actor {
            return Err(GameError::NotYourTurn);
        }
        Ok(color)
    }

    fn select_origin(
        &mut self,
        color: Color,
        cell: usize,
        dice: DiceRoll,
    ) -> Result<Selection, GameError> {
        if self.pending_skip.is_some() {
            return Err(GameError::MustPass);
        }
        match self.board.get(cell) {
            Some(piece) if piece.color == color => {}
            _ => return Err(GameError::InvalidPiece),
        }
        let destinations = rules::legal_destinations(&self.board, cell, dice.value());
        if destinations.is_empty() {
            return Err(GameError::PieceCannotMove);
        }
        debug!(origin = cell, ?destinations, "Origin selected");
        self.phase = Phase::AwaitingDestination {
            origin: cell,
            destinations: destinations.clone(),
        };
        Ok(Selection::OriginSelected {
            origin: cell,
            destinations,
        })
    }

    fn move_piece(&mut self, actor: &str, from: usize, to: usize, dice: DiceRoll) -> Selection {
        let lane = self.board.lane_of(to);
        let moved = self.board.set(from, None).map(|p| p.advanced_to(lane));
        let captured = self.board.set(to, moved).is_some();
        info!(from, to, captured, "Piece moved");

        let game_over = self.evaluate_winner().map(|winner| GameOver {
            loser: self.opponent_of(&winner).map(str::to_string),
            winner,
        });

        match &game_over {
            Some(over) => self.finish(over),
            None => {
                if !dice.extra_turn() {
                    self.hand_turn_to_opponent(actor);
                }
                self.dice = None;
            }
        }

        Selection::Moved {
            from,
            to,
            captured,
            game_over,
        }
    }

    fn hand_turn_to_opponent(&mut self, actor: &str) {
        if let Some(opponent) = self.opponent_of(actor) {
            self.turn_holder = opponent.to_string();
        }
    }

    fn finish(&mut self, over: &GameOver) {
        self.winner = Some(over.winner.clone());
        self.status = Status::Ended;
        self.dice = None;
        self.pending_skip = None;
        self.phase = Phase::AwaitingOrigin;
    }
}
