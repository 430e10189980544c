//! Solvability scan: is there still a pair a token can actually clear?

use crate::grid::{Content, Grid, Pos};
use crate::solver::Solver;

/// Cells in scan order around `origin`: rows from the origin up to the top,
/// then the rows below; in each row, columns from the origin leftward, then
/// the columns to its right.
pub fn quadrant_order(grid: &Grid, origin: Pos) -> impl Iterator<Item = Pos> {
    let (rows, cols) = (grid.rows(), grid.cols());
    let row_order = (0..=origin.row).rev().chain(origin.row + 1..rows);
    row_order.flat_map(move |r| {
        (0..=origin.col)
            .rev()
            .chain(origin.col + 1..cols)
            .map(move |c| Pos::new(r, c))
    })
}

/// First matchable pair reachable from `origin`, where the token stands.
///
/// Both tiles must be reachable from the origin cell and from each other.
pub fn find_witness(solver: &mut Solver, grid: &Grid, origin: Pos) -> Option<(Pos, Pos)> {
    let order: Vec<Pos> = quadrant_order(grid, origin).collect();
    let mut reach = ReachCache::new(grid.len());

    for &from in &order {
        if from == origin {
            continue;
        }
        let Content::Tile(group) = grid.content(from) else {
            continue;
        };
        if !reach.get(solver, grid, origin, from) {
            continue;
        }
        for &to in &order {
            if to == from || to == origin || grid.content(to) != Content::Tile(group) {
                continue;
            }
            if solver.connected(grid, from, to) && reach.get(solver, grid, origin, to) {
                return Some((from, to));
            }
        }
    }
    None
}

/// Try each origin in turn; the first one with a witness wins.
pub fn find_witness_from(
    solver: &mut Solver,
    grid: &Grid,
    origins: impl IntoIterator<Item = Pos>,
) -> Option<(Pos, Pos)> {
    origins
        .into_iter()
        .find_map(|origin| find_witness(solver, grid, origin))
}

/// Memoised origin-to-cell connectivity for one scan.
struct ReachCache {
    known: Vec<Option<bool>>,
}

impl ReachCache {
    fn new(len: usize) -> Self {
        Self {
            known: vec![None; len],
        }
    }

    fn get(&mut self, solver: &mut Solver, grid: &Grid, origin: Pos, cell: Pos) -> bool {
        let i = grid.index(cell);
        *self.known[i].get_or_insert_with(|| solver.connected(grid, origin, cell))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quadrant_order_starts_at_origin() {
        let grid = Grid::new(3, 3);
        let order: Vec<Pos> = quadrant_order(&grid, Pos::new(1, 1)).collect();
        let expected = [
            (1, 1),
            (1, 0),
            (1, 2),
            (0, 1),
            (0, 0),
            (0, 2),
            (2, 1),
            (2, 0),
            (2, 2),
        ]
        .map(|(r, c)| Pos::new(r, c));
        assert_eq!(order, expected);
    }

    #[test]
    fn test_finds_reachable_pair() {
        let grid = Grid::from_rows(&[
            ".....", //
            ".1.2.", //
            ".....", //
            ".2.1.",
        ]);
        let mut solver = Solver::new(2);
        let (a, b) = find_witness(&mut solver, &grid, Pos::new(2, 2)).expect("pair");
        assert_eq!(grid.content(a), grid.content(b));
        assert_ne!(a, b);
        assert!(solver.connected(&grid, a, b));
    }

    #[test]
    fn test_no_pair_when_contents_differ() {
        let grid = Grid::from_rows(&[
            ".....", //
            ".1.2.", //
            ".....",
        ]);
        let mut solver = Solver::new(2);
        assert_eq!(find_witness(&mut solver, &grid, Pos::new(2, 2)), None);
    }

    #[test]
    fn test_pair_out_of_token_reach() {
        // The 1s are connected but walled off from the token's corner.
        let grid = Grid::from_rows(&[
            "..3...", //
            "245...", //
            "...1.1", //
            "......",
        ]);
        let mut solver = Solver::new(2);
        assert_eq!(find_witness(&mut solver, &grid, Pos::new(0, 0)), None);
        assert!(find_witness(&mut solver, &grid, Pos::new(3, 0)).is_some());
    }

    #[test]
    fn test_second_origin_can_rescue() {
        let grid = Grid::from_rows(&[
            "..3...", //
            "245...", //
            "...1.1",
        ]);
        let mut solver = Solver::new(2);
        let origins = [Pos::new(0, 0), Pos::new(2, 4)];
        assert_eq!(
            find_witness_from(&mut solver, &grid, origins),
            Some((Pos::new(2, 3), Pos::new(2, 5)))
        );
    }
}
