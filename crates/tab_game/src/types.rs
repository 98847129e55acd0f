//! Core domain types: colours, pieces and the board.

use serde::{Deserialize, Serialize};
use tracing::instrument;

/// One of the two sides.
///
/// Blue starts on lane 0 and races towards lane 3; Red runs the mirrored
/// route from lane 3 towards lane 0.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumIter,
)]
pub enum Color {
    /// First player to join.
    Blue,
    /// Second player to join.
    Red,
}

impl Color {
    /// Returns the other colour.
    pub fn opponent(self) -> Self {
        match self {
            Color::Blue => Color::Red,
            Color::Red => Color::Blue,
        }
    }

    /// Lane holding this colour's pieces at the start of the game.
    pub fn start_lane(self) -> usize {
        match self {
            Color::Blue => 0,
            Color::Red => 3,
        }
    }

    /// Lane this colour may only enter once its start lane is cleared.
    pub fn final_lane(self) -> usize {
        match self {
            Color::Blue => 3,
            Color::Red => 0,
        }
    }
}

/// Lifecycle marker of a piece. Ordered: a piece only ever advances.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    /// Never moved.
    Initial,
    /// Moved at least once.
    Moved,
    /// Has entered its final lane.
    Final,
}

/// A piece on the board.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Piece {
    /// Owning colour.
    pub color: Color,
    /// Lifecycle stage.
    pub stage: Stage,
    /// Set the first time the piece lands in its final lane; never cleared.
    pub reached_final_lane: bool,
}

impl Piece {
    /// A fresh piece waiting in its start lane.
    pub fn new(color: Color) -> Self {
        Self {
            color,
            stage: Stage::Initial,
            reached_final_lane: false,
        }
    }

    /// Returns the piece as it stands after landing on `lane`.
    #[instrument(level = "trace")]
    pub fn advanced_to(self, lane: usize) -> Self {
        let entering_final = lane == self.color.final_lane();
        let stage = if entering_final {
            Stage::Final
        } else {
            Stage::Moved
        };
        Self {
            color: self.color,
            stage: self.stage.max(stage),
            reached_final_lane: self.reached_final_lane || entering_final,
        }
    }
}

/// Four lanes of `columns` cells, stored lane-major.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Board {
    cells: Vec<Option<Piece>>,
}

impl Board {
    /// Number of lanes on every board.
    pub const LANES: usize = 4;

    /// Creates the opening position: Blue fills lane 0, Red fills lane 3.
    #[instrument]
    pub fn new(columns: usize) -> Self {
        let mut cells = vec![None; Self::LANES * columns];
        for color in [Color::Blue, Color::Red] {
            let lane = color.start_lane();
            for cell in &mut cells[lane * columns..(lane + 1) * columns] {
                *cell = Some(Piece::new(color));
            }
        }
        Self { cells }
    }

    /// Builds a board from raw cells. The length must be a multiple of four.
    #[instrument(level = "trace", skip(cells), fields(len = cells.len()))]
    pub fn from_cells(cells: Vec<Option<Piece>>) -> Self {
        debug_assert_eq!(cells.len() % Self::LANES, 0);
        Self { cells }
    }

    /// Number of columns per lane.
    pub fn columns(&self) -> usize {
        self.cells.len() / Self::LANES
    }

    /// Total number of cells.
    pub fn len(&self) -> usize {
        self.cells.len()
    }

    /// True for a zero-column board.
    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// Piece at `cell`, if any. Out-of-range cells read as empty.
    #[instrument(level = "trace", skip(self))]
    pub fn get(&self, cell: usize) -> Option<Piece> {
        self.cells.get(cell).copied().flatten()
    }

    /// Overwrites `cell`, returning what was there.
    #[instrument(level = "trace", skip(self))]
    pub fn set(&mut self, cell: usize, piece: Option<Piece>) -> Option<Piece> {
        std::mem::replace(&mut self.cells[cell], piece)
    }

    /// Lane index of `cell`.
    #[instrument(level = "trace", skip(self))]
    pub fn lane_of(&self, cell: usize) -> usize {
        cell / self.columns()
    }

    /// All cells in index order.
    pub fn cells(&self) -> &[Option<Piece>] {
        &self.cells
    }

    /// Indices of every cell holding a piece of `color`.
    #[instrument(level = "trace", skip(self))]
    pub fn cells_of(&self, color: Color) -> impl Iterator<Item = usize> + '_ {
        self.cells
            .iter()
            .enumerate()
            .filter(move |(_, piece)| matches!(piece, Some(p) if p.color == color))
            .map(|(cell, _)| cell)
    }

    /// Whether `color` still has a piece that never left the start.
    #[instrument(level = "trace", skip(self))]
    pub fn has_initial_pieces(&self, color: Color) -> bool {
        self.cells
            .iter()
            .flatten()
            .any(|p| p.color == color && p.stage == Stage::Initial)
    }

    /// Number of pieces `color` has left.
    #[instrument(level = "trace", skip(self))]
    pub fn count(&self, color: Color) -> usize {
        self.cells_of(color).count()
    }
}
