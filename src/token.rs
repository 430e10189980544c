//! Tokens and their movement over the pixel map.
//!
//! A token is a square box `[x - half, x + half)` around its center. Cells are
//! `cell_width x cell_height` pixels, so pixel `(x, y)` lies in cell
//! `(y / cell_height, x / cell_width)`.

use crate::config::GameConfig;
use crate::grid::{Content, Direction, Grid, Pos, TokenId};

/// Pixel layout shared by every token in a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Geometry {
    pub rows: usize,
    pub cols: usize,
    pub cell_width: i32,
    pub cell_height: i32,
    pub half_token: i32,
    pub half_item: i32,
    pub step: i32,
}

impl Geometry {
    pub fn from_config(config: &GameConfig) -> Self {
        Self {
            rows: config.rows,
            cols: config.cols,
            cell_width: config.cell_width,
            cell_height: config.cell_height,
            half_token: config.token_size / 2,
            half_item: config.item_size / 2,
            step: config.move_step,
        }
    }

    #[inline]
    pub fn map_width(&self) -> i32 {
        self.cols as i32 * self.cell_width
    }

    #[inline]
    pub fn map_height(&self) -> i32 {
        self.rows as i32 * self.cell_height
    }

    /// Cell under a pixel. Pixels off the map are pulled onto the border cells.
    pub fn cell_at(&self, x: i32, y: i32) -> Pos {
        let row = (y.max(0) / self.cell_height).min(self.rows as i32 - 1);
        let col = (x.max(0) / self.cell_width).min(self.cols as i32 - 1);
        Pos::new(row as usize, col as usize)
    }

    #[inline]
    pub fn top(&self, row: usize) -> i32 {
        row as i32 * self.cell_height
    }

    /// One past the last pixel row of the cell.
    #[inline]
    pub fn bottom(&self, row: usize) -> i32 {
        (row as i32 + 1) * self.cell_height
    }

    #[inline]
    pub fn left(&self, col: usize) -> i32 {
        col as i32 * self.cell_width
    }

    /// One past the last pixel column of the cell.
    #[inline]
    pub fn right(&self, col: usize) -> i32 {
        (col as i32 + 1) * self.cell_width
    }

    pub fn cell_center(&self, pos: Pos) -> (i32, i32) {
        (
            self.left(pos.col) + self.cell_width / 2,
            self.top(pos.row) + self.cell_height / 2,
        )
    }

    /// Whether a pixel falls inside the item box centered in `pos`.
    pub fn in_item_box(&self, pos: Pos, x: i32, y: i32) -> bool {
        let (cx, cy) = self.cell_center(pos);
        (cx - self.half_item..cx + self.half_item).contains(&x)
            && (cy - self.half_item..cy + self.half_item).contains(&y)
    }

    /// Cells under the four corners of a token box centered at `(x, y)`.
    pub fn footprint(&self, x: i32, y: i32) -> [Pos; 4] {
        let (l, r) = (x - self.half_token, x + self.half_token - 1);
        let (t, b) = (y - self.half_token, y + self.half_token - 1);
        [
            self.cell_at(l, t),
            self.cell_at(r, t),
            self.cell_at(l, b),
            self.cell_at(r, b),
        ]
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub id: TokenId,
    pub x: i32,
    pub y: i32,
    pub score: u32,
    /// The provisionally chosen tile, waiting for a partner.
    pub pending: Option<Pos>,
}

impl Token {
    pub fn new(id: TokenId, x: i32, y: i32) -> Self {
        Self {
            id,
            x,
            y,
            score: 0,
            pending: None,
        }
    }

    /// Token centered on a cell.
    pub fn at_cell(id: TokenId, geometry: &Geometry, pos: Pos) -> Self {
        let (x, y) = geometry.cell_center(pos);
        Self::new(id, x, y)
    }

    /// The cell under the token's center.
    pub fn cell(&self, geometry: &Geometry) -> Pos {
        geometry.cell_at(self.x, self.y)
    }

    pub fn footprint(&self, geometry: &Geometry) -> [Pos; 4] {
        geometry.footprint(self.x, self.y)
    }
}

/// What one movement step ran into.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MoveOutcome {
    /// Tile the token bumped into and should choose.
    pub hit: Option<Pos>,
    /// Item cells touched by the leading edge.
    pub items: Vec<Pos>,
}

/// Move `token` one step in `dir`, stopping against tiles.
///
/// Both leading corners are probed. If they hit two different tiles, the one
/// whose center is closer on the perpendicular axis wins; a tie picks neither.
pub fn resolve_move(grid: &Grid, geometry: &Geometry, token: &mut Token, dir: Direction) -> MoveOutcome {
    let half = geometry.half_token;
    let step = geometry.step;

    // Leading edge coordinate on the moving axis, and the two corner
    // coordinates on the perpendicular one.
    let (new_pos, edge) = match dir {
        Direction::Up => {
            let y = (token.y - step).max(half);
            (y, y - half)
        }
        Direction::Down => {
            let y = (token.y + step).min(geometry.map_height() - half);
            (y, y + half - 1)
        }
        Direction::Left => {
            let x = (token.x - step).max(half);
            (x, x - half)
        }
        Direction::Right => {
            let x = (token.x + step).min(geometry.map_width() - half);
            (x, x + half - 1)
        }
    };
    let corners = if dir.is_vertical() {
        [(token.x - half, edge), (token.x + half - 1, edge)]
    } else {
        [(edge, token.y - half), (edge, token.y + half - 1)]
    };

    let mut tiles = [None; 2];
    let mut outcome = MoveOutcome::default();
    for (slot, &(px, py)) in tiles.iter_mut().zip(&corners) {
        let cell = geometry.cell_at(px, py);
        match grid.content(cell) {
            Content::Tile(_) => *slot = Some(cell),
            Content::Item(_) if geometry.in_item_box(cell, px, py) => {
                if !outcome.items.contains(&cell) {
                    outcome.items.push(cell);
                }
            }
            _ => {}
        }
    }

    let blocked = tiles.iter().flatten().next().copied();
    match (dir, blocked) {
        (Direction::Up, Some(cell)) => token.y = geometry.bottom(cell.row) + half,
        (Direction::Down, Some(cell)) => token.y = geometry.top(cell.row) - half,
        (Direction::Left, Some(cell)) => token.x = geometry.right(cell.col) + half,
        (Direction::Right, Some(cell)) => token.x = geometry.left(cell.col) - half,
        (Direction::Up | Direction::Down, None) => token.y = new_pos,
        (Direction::Left | Direction::Right, None) => token.x = new_pos,
    }

    outcome.hit = match tiles {
        [Some(a), Some(b)] if a != b => nearer(geometry, token, dir, a, b),
        [Some(a), _] | [None, Some(a)] => Some(a),
        [None, None] => None,
    };
    outcome
}

fn nearer(geometry: &Geometry, token: &Token, dir: Direction, a: Pos, b: Pos) -> Option<Pos> {
    let (ax, ay) = geometry.cell_center(a);
    let (bx, by) = geometry.cell_center(b);
    let (da, db) = if dir.is_vertical() {
        ((token.x - ax).abs(), (token.x - bx).abs())
    } else {
        ((token.y - ay).abs(), (token.y - by).abs())
    };
    match da.cmp(&db) {
        std::cmp::Ordering::Less => Some(a),
        std::cmp::Ordering::Greater => Some(b),
        std::cmp::Ordering::Equal => None,
    }
}
