//! Stick dice.
//!
//! Four two-sided sticks are thrown; the score is the number landing face
//! up, except that none up scores 6. The value domain is therefore
//! {1, 2, 3, 4, 6}. Scores of 1, 4 and 6 grant an extra turn.

use serde::{Deserialize, Serialize};

/// Outcome of one throw.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiceRoll {
    value: u8,
    extra_turn: bool,
}

impl DiceRoll {
    /// Scores four sticks (`true` = face up).
    pub fn from_sticks(sticks: [bool; 4]) -> Self {
        let up = sticks.iter().filter(|&&s| s).count() as u8;
        let value = if up == 0 { 6 } else { up };
        Self::scored(value)
    }

    /// Builds a roll from a score, rejecting values sticks cannot produce.
    pub fn from_value(value: u8) -> Option<Self> {
        matches!(value, 1 | 2 | 3 | 4 | 6).then(|| Self::scored(value))
    }

    fn scored(value: u8) -> Self {
        Self {
            value,
            extra_turn: matches!(value, 1 | 4 | 6),
        }
    }

    /// Number of steps.
    pub fn value(&self) -> u8 {
        self.value
    }

    /// Whether the thrower plays again after moving.
    pub fn extra_turn(&self) -> bool {
        self.extra_turn
    }
}

/// Source of rolls. The server holds one behind an `Arc`.
pub trait Dice: Send + Sync {
    /// Throws once.
    fn roll(&self) -> DiceRoll;
}

/// A fixed roll: every throw yields itself.
impl Dice for DiceRoll {
    fn roll(&self) -> DiceRoll {
        *self
    }
}

/// Four fair sticks thrown with the thread-local RNG.
#[cfg(feature = "roll")]
#[derive(Debug, Clone, Copy, Default)]
pub struct StickDice;

#[cfg(feature = "roll")]
impl Dice for StickDice {
    #[tracing::instrument(skip(self))]
    fn roll(&self) -> DiceRoll {
        use rand::Rng;
        let mut rng = rand::thread_rng();
        let sticks: [bool; 4] = std::array::from_fn(|_| rng.gen_bool(0.5));
        let roll = DiceRoll::from_sticks(sticks);
        tracing::debug!(?sticks, value = roll.value, "Sticks thrown");
        roll
    }
}
