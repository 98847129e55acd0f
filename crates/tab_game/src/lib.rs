//! Tâb game logic.
//!
//! Pure, I/O-free rules for the two-player stick-dice race game:
//!
//! - **Path**: the serpentine route over four lanes, with its loop and
//!   branch point
//! - **Rules**: legal destinations for a piece and win detection
//! - **Dice**: four-stick throws scoring {1, 2, 3, 4, 6}
//! - **Session**: the per-game turn state machine
//!
//! # Example
//!
//! ```
//! use tab_game::{DiceRoll, Selection, Session};
//!
//! let mut game = Session::new("g1".into(), 1, 3, "ana".into(), chrono::Utc::now());
//! game.join("bia").unwrap();
//!
//! let roll = DiceRoll::from_value(1).unwrap();
//! game.roll("ana", &roll).unwrap();
//! game.notify("ana", 0).unwrap();
//! let moved = game.notify("ana", 3).unwrap();
//! assert!(matches!(moved, Selection::Moved { to: 3, .. }));
//! ```

#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod dice;
mod error;
pub mod path;
pub mod rules;
mod session;
mod types;

pub use dice::{Dice, DiceRoll};
#[cfg(feature = "roll")]
pub use dice::StickDice;
pub use error::GameError;
pub use path::{Path, build_path};
pub use session::{GameOver, Phase, RollOutcome, Selection, Session, SessionId, Status};
pub use types::{Board, Color, Piece, Stage};
