//! Move legality and win detection.
//!
//! Pure functions of the board; the session state machine calls them to
//! validate selections and to decide whether a roll forces a pass.

use crate::path::Path;
use crate::{Board, Color, Stage};
use std::collections::BTreeSet;
use tracing::{instrument, trace};

/// Cells the piece at `origin` may move to with `roll`.
///
/// Empty when the cell is empty or the piece cannot move. Rules, in order:
///
/// 1. A piece that never moved needs a roll of 1 to start.
/// 2. A piece in its final lane is frozen while its colour still has a
///    piece that never moved.
/// 3. Candidates are the cells `roll` steps along the colour's route.
/// 4. No landing on a piece of the same colour.
/// 5. No entering the final lane while the colour still has a piece that
///    never moved.
/// 6. No entering the start lane from another lane once departed.
/// 7. A piece that already visited its final lane may not enter it again
///    from another lane.
#[instrument(skip(board), fields(columns = board.columns()))]
pub fn legal_destinations(board: &Board, origin: usize, roll: u8) -> BTreeSet<usize> {
    let Some(piece) = board.get(origin) else {
        return BTreeSet::new();
    };

    if piece.stage == Stage::Initial && roll != 1 {
        return BTreeSet::new();
    }

    let color = piece.color;
    let start_lane = color.start_lane();
    let final_lane = color.final_lane();
    let lane_from = board.lane_of(origin);
    let start_occupied = board.has_initial_pieces(color);

    if lane_from == final_lane && start_occupied {
        trace!(origin, "Final-lane piece frozen until start lane clears");
        return BTreeSet::new();
    }

    let path = Path::new(board.columns());
    path.reachable(origin, roll, color)
        .into_iter()
        .filter(|&target| {
            let lane_to = board.lane_of(target);
            if matches!(board.get(target), Some(p) if p.color == color) {
                return false;
            }
            if piece.reached_final_lane && lane_from != final_lane && lane_to == final_lane {
                return false;
            }
            if piece.stage != Stage::Initial && lane_from != start_lane && lane_to == start_lane {
                return false;
            }
            !(lane_to == final_lane && start_occupied)
        })
        .collect()
}

/// Whether any piece of `color` has a legal move for `roll`.
#[instrument(skip(board))]
pub fn has_any_legal_move(board: &Board, color: Color, roll: u8) -> bool {
    board
        .cells_of(color)
        .any(|cell| !legal_destinations(board, cell, roll).is_empty())
}

/// The winning colour, once the other has no pieces left.
#[instrument(skip(board))]
pub fn evaluate_winner(board: &Board) -> Option<Color> {
    let blue = board.count(Color::Blue);
    let red = board.count(Color::Red);
    match (blue, red) {
        (0, r) if r > 0 => Some(Color::Red),
        (b, 0) if b > 0 => Some(Color::Blue),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Piece;

    fn empty(columns: usize) -> Board {
        Board::from_cells(vec![None; 4 * columns])
    }

    fn moved(color: Color) -> Piece {
        Piece {
            color,
            stage: Stage::Moved,
            reached_final_lane: false,
        }
    }

    #[test]
    fn start_needs_a_one() {
        let board = Board::new(3);
        for roll in [2, 3, 4, 6] {
            assert!(legal_destinations(&board, 0, roll).is_empty());
        }
        assert_eq!(legal_destinations(&board, 0, 1), BTreeSet::from([3]));
    }

    #[test]
    fn no_landing_on_own_piece() {
        let board = Board::new(3);
        // 2 -> 1 is blocked by Blue's own piece
        assert!(legal_destinations(&board, 2, 1).is_empty());
    }

    #[test]
    fn capture_is_allowed() {
        let mut board = empty(3);
        board.set(4, Some(moved(Color::Blue)));
        board.set(5, Some(moved(Color::Red)));
        assert_eq!(legal_destinations(&board, 4, 1), BTreeSet::from([5]));
    }

    #[test]
    fn final_lane_closed_while_start_lane_occupied() {
        let mut board = empty(3);
        board.set(0, Some(Piece::new(Color::Blue)));
        board.set(7, Some(moved(Color::Blue)));
        // 7 -> 6 -> {9, 3}; lane 3 is Blue's final lane
        assert_eq!(legal_destinations(&board, 7, 2), BTreeSet::from([3]));

        board.set(0, None);
        assert_eq!(legal_destinations(&board, 7, 2), BTreeSet::from([3, 9]));
    }

    #[test]
    fn final_lane_piece_frozen_while_start_lane_occupied() {
        let mut board = empty(3);
        board.set(2, Some(Piece::new(Color::Blue)));
        board.set(9, Some(moved(Color::Blue)));
        assert!(legal_destinations(&board, 9, 1).is_empty());
    }

    #[test]
    fn departed_piece_may_run_along_its_start_lane() {
        let mut board = empty(3);
        board.set(2, Some(moved(Color::Blue)));
        assert_eq!(legal_destinations(&board, 2, 1), BTreeSet::from([1]));
        assert_eq!(legal_destinations(&board, 2, 3), BTreeSet::from([3]));
    }

    #[test]
    fn no_reentering_final_lane_after_leaving_it() {
        let mut board = empty(3);
        let veteran = Piece {
            color: Color::Blue,
            stage: Stage::Final,
            reached_final_lane: true,
        };
        board.set(7, Some(veteran));
        // 7 -> 6 -> {9, 3}; 9 is in lane 3 and already visited
        assert_eq!(legal_destinations(&board, 7, 2), BTreeSet::from([3]));
    }

    #[test]
    fn piece_inside_final_lane_keeps_moving() {
        let mut board = empty(3);
        let veteran = Piece {
            color: Color::Blue,
            stage: Stage::Final,
            reached_final_lane: true,
        };
        board.set(9, Some(veteran));
        assert_eq!(legal_destinations(&board, 9, 2), BTreeSet::from([11]));
    }

    #[test]
    fn any_legal_move_scans_every_piece() {
        let board = Board::new(3);
        assert!(has_any_legal_move(&board, Color::Blue, 1));
        assert!(!has_any_legal_move(&board, Color::Blue, 2));
        assert!(has_any_legal_move(&board, Color::Red, 1));
    }

    #[test]
    fn winner_when_one_colour_is_wiped_out() {
        let mut board = empty(2);
        assert_eq!(evaluate_winner(&board), None);
        board.set(0, Some(moved(Color::Red)));
        assert_eq!(evaluate_winner(&board), Some(Color::Red));
        board.set(5, Some(moved(Color::Blue)));
        assert_eq!(evaluate_winner(&board), None);
    }
}
