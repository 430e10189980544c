//! Grid model: the R x C board of empty cells, tiles and items.
//!
//! Callers validate preconditions; the grid itself never fails. Out-of-bounds
//! positions are programming errors and panic on indexing.

use std::fmt;

/// Row/column address of a cell. Row 0 is the top.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Pos {
    pub row: usize,
    pub col: usize,
}

impl Pos {
    pub const fn new(row: usize, col: usize) -> Self {
        Self { row, col }
    }
}

impl fmt::Display for Pos {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.row, self.col)
    }
}

/// Cardinal directions, for token movement and connection paths.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    Up,
    Down,
    Left,
    Right,
}

impl Direction {
    /// Poll order when several movement keys are held.
    pub const ALL: [Self; 4] = [Self::Up, Self::Down, Self::Left, Self::Right];

    /// (d_row, d_col) for one step.
    pub const fn offset(self) -> (isize, isize) {
        match self {
            Self::Up => (-1, 0),
            Self::Down => (1, 0),
            Self::Left => (0, -1),
            Self::Right => (0, 1),
        }
    }

    pub const fn opposite(self) -> Self {
        match self {
            Self::Up => Self::Down,
            Self::Down => Self::Up,
            Self::Left => Self::Right,
            Self::Right => Self::Left,
        }
    }

    pub const fn is_vertical(self) -> bool {
        matches!(self, Self::Up | Self::Down)
    }
}

/// One of the (at most two) tokens on the board.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TokenId {
    A,
    B,
}

impl TokenId {
    pub const ALL: [Self; 2] = [Self::A, Self::B];

    pub const fn other(self) -> Self {
        match self {
            Self::A => Self::B,
            Self::B => Self::A,
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            Self::A => "Player 1",
            Self::B => "Player 2",
        }
    }
}

/// Pickups that appear on empty cells during play.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ItemKind {
    /// Adds time to the countdown.
    ExtendTime,
    /// Rearranges the whole board.
    Shuffle,
    /// Highlights a reachable pair for a while.
    Hint,
}

impl ItemKind {
    pub const ALL: [Self; 3] = [Self::ExtendTime, Self::Shuffle, Self::Hint];

    pub const fn symbol(self) -> char {
        match self {
            Self::ExtendTime => 'E',
            Self::Shuffle => 'S',
            Self::Hint => 'H',
        }
    }
}

/// What a cell holds. Tile groups start at 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Content {
    #[default]
    Empty,
    Tile(u8),
    Item(ItemKind),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Cell {
    pub content: Content,
    /// Token that has provisionally chosen this tile.
    pub owner: Option<TokenId>,
    /// Part of the highlighted hint pair.
    pub hinted: bool,
}

impl Cell {
    pub const EMPTY: Self = Self {
        content: Content::Empty,
        owner: None,
        hinted: false,
    };

    pub const fn tile(group: u8) -> Self {
        Self {
            content: Content::Tile(group),
            owner: None,
            hinted: false,
        }
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.content == Content::Empty
    }

    #[inline]
    pub fn is_tile(&self) -> bool {
        matches!(self.content, Content::Tile(_))
    }
}

/// Row-major board of cells.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Grid {
    rows: usize,
    cols: usize,
    cells: Vec<Cell>,
}

impl Grid {
    pub fn new(rows: usize, cols: usize) -> Self {
        Self {
            rows,
            cols,
            cells: vec![Cell::EMPTY; rows * cols],
        }
    }

    /// Build from already ordered cells; `cells.len()` must equal `rows * cols`.
    pub fn from_cells(rows: usize, cols: usize, cells: Vec<Cell>) -> Self {
        assert_eq!(cells.len(), rows * cols, "cell count does not match board size");
        Self { rows, cols, cells }
    }

    /// Test helper: `.` empty, `1`-`9` tiles, `E`/`S`/`H` items.
    #[cfg(test)]
    pub fn from_rows(rows: &[&str]) -> Self {
        let cols = rows.first().map_or(0, |r| r.len());
        let mut grid = Self::new(rows.len(), cols);
        for (r, line) in rows.iter().enumerate() {
            assert_eq!(line.len(), cols, "ragged test grid");
            for (c, ch) in line.chars().enumerate() {
                let content = match ch {
                    '.' => Content::Empty,
                    'E' => Content::Item(ItemKind::ExtendTime),
                    'S' => Content::Item(ItemKind::Shuffle),
                    'H' => Content::Item(ItemKind::Hint),
                    d => Content::Tile(d.to_digit(10).expect("tile digit") as u8),
                };
                grid.cells[r * cols + c].content = content;
            }
        }
        grid
    }

    #[inline]
    pub fn rows(&self) -> usize {
        self.rows
    }

    #[inline]
    pub fn cols(&self) -> usize {
        self.cols
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.cells.len()
    }

    #[inline]
    pub fn contains(&self, pos: Pos) -> bool {
        pos.row < self.rows && pos.col < self.cols
    }

    #[inline]
    pub fn index(&self, pos: Pos) -> usize {
        debug_assert!(self.contains(pos), "{pos} outside {}x{}", self.rows, self.cols);
        pos.row * self.cols + pos.col
    }

    #[inline]
    pub fn pos_of(&self, index: usize) -> Pos {
        Pos::new(index / self.cols, index % self.cols)
    }

    /// Neighbour one step away, if it is on the board.
    pub fn step(&self, pos: Pos, dir: Direction) -> Option<Pos> {
        let (dr, dc) = dir.offset();
        let row = pos.row.checked_add_signed(dr)?;
        let col = pos.col.checked_add_signed(dc)?;
        let next = Pos::new(row, col);
        self.contains(next).then_some(next)
    }

    #[inline]
    pub fn cell(&self, pos: Pos) -> &Cell {
        &self.cells[self.index(pos)]
    }

    #[inline]
    fn cell_mut(&mut self, pos: Pos) -> &mut Cell {
        let i = self.index(pos);
        &mut self.cells[i]
    }

    pub fn cells(&self) -> &[Cell] {
        &self.cells
    }

    /// All positions in row-major order.
    pub fn positions(&self) -> impl Iterator<Item = Pos> + '_ {
        (0..self.cells.len()).map(|i| self.pos_of(i))
    }

    #[inline]
    pub fn is_empty(&self, pos: Pos) -> bool {
        self.cell(pos).is_empty()
    }

    #[inline]
    pub fn is_tile(&self, pos: Pos) -> bool {
        self.cell(pos).is_tile()
    }

    #[inline]
    pub fn content(&self, pos: Pos) -> Content {
        self.cell(pos).content
    }

    #[inline]
    pub fn owner(&self, pos: Pos) -> Option<TokenId> {
        self.cell(pos).owner
    }

    pub fn set_owner(&mut self, pos: Pos, owner: Option<TokenId>) {
        self.cell_mut(pos).owner = owner;
    }

    pub fn place_tile(&mut self, pos: Pos, group: u8) {
        *self.cell_mut(pos) = Cell::tile(group);
    }

    /// Reset to empty, dropping owner and hint mark.
    pub fn eliminate(&mut self, pos: Pos) {
        *self.cell_mut(pos) = Cell::EMPTY;
    }

    /// Put an item on an empty cell. Occupied cells are left alone.
    pub fn spawn_item(&mut self, pos: Pos, kind: ItemKind) {
        let cell = self.cell_mut(pos);
        if cell.is_empty() {
            *cell = Cell {
                content: Content::Item(kind),
                owner: None,
                hinted: false,
            };
        }
    }

    pub fn consume_item(&mut self, pos: Pos) {
        self.eliminate(pos);
    }

    pub fn mark_hint(&mut self, pos: Pos) {
        self.cell_mut(pos).hinted = true;
    }

    /// Clearing a mark on a cell that no longer carries one is fine.
    pub fn unmark_hint(&mut self, pos: Pos) {
        if self.contains(pos) {
            self.cell_mut(pos).hinted = false;
        }
    }

    pub fn tile_count(&self) -> usize {
        self.cells.iter().filter(|c| c.is_tile()).count()
    }

    /// Rearrange cells so that new cell `i` is old cell `order[i]`.
    pub fn permute(&mut self, order: &[usize]) {
        assert_eq!(order.len(), self.cells.len());
        let old = std::mem::take(&mut self.cells);
        self.cells = order.iter().map(|&i| old[i]).collect();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_eliminate_resets_cell() {
        let mut grid = Grid::from_rows(&["12", ".."]);
        let p = Pos::new(0, 0);
        grid.set_owner(p, Some(TokenId::A));
        grid.mark_hint(p);
        grid.eliminate(p);
        assert_eq!(*grid.cell(p), Cell::EMPTY);
        assert!(grid.is_tile(Pos::new(0, 1)));
    }

    #[test]
    fn test_spawn_item_only_on_empty() {
        let mut grid = Grid::from_rows(&["1."]);
        grid.spawn_item(Pos::new(0, 0), ItemKind::Hint);
        grid.spawn_item(Pos::new(0, 1), ItemKind::Shuffle);
        assert_eq!(grid.content(Pos::new(0, 0)), Content::Tile(1));
        assert_eq!(grid.content(Pos::new(0, 1)), Content::Item(ItemKind::Shuffle));
        grid.consume_item(Pos::new(0, 1));
        assert!(grid.is_empty(Pos::new(0, 1)));
    }

    #[test]
    fn test_step_stays_on_board() {
        let grid = Grid::new(2, 3);
        assert_eq!(grid.step(Pos::new(0, 0), Direction::Up), None);
        assert_eq!(grid.step(Pos::new(0, 0), Direction::Left), None);
        assert_eq!(grid.step(Pos::new(1, 2), Direction::Right), None);
        assert_eq!(
            grid.step(Pos::new(0, 1), Direction::Down),
            Some(Pos::new(1, 1))
        );
    }

    #[test]
    fn test_permute_moves_cells() {
        let mut grid = Grid::from_rows(&["12", "3."]);
        grid.permute(&[3, 2, 1, 0]);
        assert!(grid.is_empty(Pos::new(0, 0)));
        assert_eq!(grid.content(Pos::new(1, 1)), Content::Tile(1));
        assert_eq!(grid.tile_count(), 3);
    }
}
