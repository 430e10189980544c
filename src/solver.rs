//! Bounded-turn connectivity between two cells.
//!
//! A path walks orthogonally through empty cells (items do not block) and may
//! change direction at most `max_turns` times. The first step is free.

use crate::grid::{Content, Direction, Grid, Pos};

/// Depth-first path finder. Keeps its visited bitmap between queries.
#[derive(Debug, Clone)]
pub struct Solver {
    max_turns: u32,
    visited: Vec<bool>,
    path: Vec<Direction>,
}

impl Solver {
    pub fn new(max_turns: u32) -> Self {
        Self {
            max_turns,
            visited: Vec::new(),
            path: Vec::new(),
        }
    }

    /// Directions of some path from `from` to `to` within the turn budget.
    pub fn find_path(&mut self, grid: &Grid, from: Pos, to: Pos) -> Option<Vec<Direction>> {
        self.search(grid, from, to).then(|| self.path.clone())
    }

    pub fn connected(&mut self, grid: &Grid, from: Pos, to: Pos) -> bool {
        self.search(grid, from, to)
    }

    /// Whether `a` and `b` can be eliminated together, with the path if so.
    ///
    /// Both cells must be distinct tiles of the same group, chosen by the same
    /// token (or both unchosen), and connected.
    pub fn check_match(&mut self, grid: &Grid, a: Pos, b: Pos) -> Option<Vec<Direction>> {
        if a == b || !grid.contains(a) || !grid.contains(b) {
            return None;
        }
        let (ca, cb) = (grid.cell(a), grid.cell(b));
        match (ca.content, cb.content) {
            (Content::Tile(x), Content::Tile(y)) if x == y && ca.owner == cb.owner => {
                self.find_path(grid, a, b)
            }
            _ => None,
        }
    }

    fn search(&mut self, grid: &Grid, from: Pos, to: Pos) -> bool {
        if from == to || !grid.contains(from) || !grid.contains(to) {
            return false;
        }
        self.visited.clear();
        self.visited.resize(grid.len(), false);
        self.path.clear();
        self.visited[grid.index(from)] = true;
        self.dfs(grid, from, to, 0)
    }

    fn dfs(&mut self, grid: &Grid, current: Pos, to: Pos, turns: u32) -> bool {
        for dir in search_order(current, to) {
            let Some(next) = grid.step(current, dir) else {
                continue;
            };
            let next_turns = match self.path.last() {
                None => 0,
                Some(&prev) if prev == dir => turns,
                Some(_) => turns + 1,
            };
            let i = grid.index(next);
            if next_turns > self.max_turns || self.visited[i] {
                continue;
            }
            if next == to {
                self.path.push(dir);
                return true;
            }
            if grid.is_tile(next) {
                continue;
            }

            self.visited[i] = true;
            self.path.push(dir);
            if self.dfs(grid, next, to, next_turns) {
                return true;
            }
            self.path.pop();
            self.visited[i] = false;
        }
        false
    }
}

/// Try the directions that head toward the target first.
fn search_order(from: Pos, to: Pos) -> [Direction; 4] {
    use Direction::{Down, Left, Right, Up};
    if to.row < from.row {
        if to.col <= from.col {
            [Up, Left, Right, Down]
        } else {
            [Right, Up, Left, Down]
        }
    } else if to.row == from.row {
        if to.col < from.col {
            [Left, Up, Down, Right]
        } else {
            [Right, Up, Down, Left]
        }
    } else if to.col <= from.col {
        [Down, Left, Right, Up]
    } else {
        [Down, Right, Left, Up]
    }
}

/// Number of direction changes along a path.
pub fn count_turns(path: &[Direction]) -> usize {
    path.windows(2).filter(|w| w[0] != w[1]).count()
}

/// Cells visited by a path starting at `from`, endpoints included.
pub fn path_cells(grid: &Grid, from: Pos, path: &[Direction]) -> Vec<Pos> {
    let mut cells = Vec::with_capacity(path.len() + 1);
    cells.push(from);
    let mut at = from;
    for &dir in path {
        match grid.step(at, dir) {
            Some(next) => at = next,
            None => break,
        }
        cells.push(at);
    }
    cells
}
