//! The serpentine route across the four lanes.
//!
//! Cells are indexed lane-major: cell `lane * columns + column`. Blue's
//! route is the boustrophedon built by [`build_path`]: lane 0 right to
//! left, lane 1 left to right, lane 2 right to left, lane 3 left to right.
//! Two extra edges make it a race track rather than a line:
//!
//! - the end of lane 3 loops back to the first cell of lane 2;
//! - the end of lane 2 may branch into the first cell of lane 1 instead of
//!   continuing into lane 3.
//!
//! Red runs the same route through the mirrored index space.

use crate::Color;
use std::collections::BTreeSet;
use tracing::instrument;

/// Ordered cell indices of the route, lane 0 through lane 3.
#[instrument]
pub fn build_path(columns: usize) -> Vec<usize> {
    let mut path = Vec::with_capacity(4 * columns);
    for lane in 0..4 {
        let base = lane * columns;
        if lane % 2 == 0 {
            path.extend((0..columns).rev().map(|c| base + c));
        } else {
            path.extend((0..columns).map(|c| base + c));
        }
    }
    path
}

/// Maps a cell to its mirror image: lane `l` column `c` becomes lane
/// `3 - l` column `columns - 1 - c`.
#[instrument(level = "trace")]
pub fn mirror(cell: usize, columns: usize) -> usize {
    4 * columns - 1 - cell
}

/// Lane index of `cell`.
#[instrument(level = "trace")]
pub fn lane_of(cell: usize, columns: usize) -> usize {
    cell / columns
}

/// Precomputed route for one board width.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Path {
    columns: usize,
    order: Vec<usize>,
    position: Vec<usize>,
}

impl Path {
    /// Builds the route for `columns` columns per lane.
    #[instrument]
    pub fn new(columns: usize) -> Self {
        let order = build_path(columns);
        let mut position = vec![0; order.len()];
        for (pos, &cell) in order.iter().enumerate() {
            position[cell] = pos;
        }
        Self {
            columns,
            order,
            position,
        }
    }

    /// Columns per lane.
    pub fn columns(&self) -> usize {
        self.columns
    }

    /// Route order for Blue.
    pub fn order(&self) -> &[usize] {
        &self.order
    }

    /// Cells one step ahead of `cell` for a piece of `color`.
    #[instrument(level = "trace", skip(self), fields(columns = self.columns))]
    pub fn successors(&self, cell: usize, color: Color) -> Vec<usize> {
        match color {
            Color::Blue => self.forward(cell),
            Color::Red => self
                .forward(mirror(cell, self.columns))
                .into_iter()
                .map(|c| mirror(c, self.columns))
                .collect(),
        }
    }

    /// Every cell reachable in exactly `steps` hops, with branch points
    /// explored as alternatives.
    #[instrument(skip(self), fields(columns = self.columns))]
    pub fn reachable(&self, cell: usize, steps: u8, color: Color) -> BTreeSet<usize> {
        let mut frontier = BTreeSet::from([cell]);
        for _ in 0..steps {
            frontier = frontier
                .iter()
                .flat_map(|&c| self.successors(c, color))
                .collect();
        }
        frontier
    }

    #[instrument(level = "trace", skip(self))]
    fn forward(&self, cell: usize) -> Vec<usize> {
        let cols = self.columns;
        let pos = self.position[cell];
        let last = self.order.len() - 1;
        let lane_two_start = 2 * cols;
        let lane_two_end = 3 * cols - 1;

        let mut next = Vec::with_capacity(2);
        if pos == last {
            next.push(self.order[lane_two_start]);
        } else {
            next.push(self.order[pos + 1]);
        }
        if pos == lane_two_end {
            // lane 1 starts at path position `cols`
            next.push(self.order[cols]);
        }
        next
    }
}
