//! Saved-game format: whitespace separated integers.
//!
//! Layout, in order: mode; `row col hint kind content owner` for every cell in
//! row-major order; `id x y score` per active token; `row col` of each token's
//! pending tile; remaining tiles; remaining seconds; hint flag; hint
//! beneficiary; remaining hint milliseconds; the two hint cells. Missing cells
//! are written as `-1 -1`. Token ids are 1 and 2, with 0 meaning none.

use std::fmt;
use std::str::SplitWhitespace;
use std::time::Duration;

use thiserror::Error;

use crate::grid::{Cell, Content, Grid, ItemKind, Pos, TokenId};
use crate::session::Mode;
use crate::token::Token;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot {
    pub mode: Mode,
    pub grid: Grid,
    /// Token A first, then B in double mode.
    pub tokens: Vec<Token>,
    pub remaining_tiles: usize,
    pub remaining_secs: u32,
    pub hint_active: bool,
    pub hint_for: Option<TokenId>,
    pub hint_remaining: Duration,
    pub hint_pair: Option<(Pos, Pos)>,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SnapshotError {
    #[error("save data ends early (expected {0})")]
    Truncated(&'static str),
    #[error("expected an integer for {field}, found {found:?}")]
    NotInteger { field: &'static str, found: String },
    #[error("{field} out of range: {value}")]
    OutOfRange { field: &'static str, value: i64 },
    #[error("cell {expected} saved as ({row}, {col})")]
    CellMismatch { expected: Pos, row: i64, col: i64 },
    #[error("trailing data after save")]
    Trailing,
    #[error("save is for a {rows}x{cols} board")]
    BoardSize { rows: usize, cols: usize },
}

impl fmt::Display for Snapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}", self.mode.ordinal())?;
        for r in 0..self.grid.rows() {
            for c in 0..self.grid.cols() {
                let pos = Pos::new(r, c);
                let cell = self.grid.cell(pos);
                let (kind, content) = encode_content(cell.content);
                write!(
                    f,
                    "{} {} {} {} {} {} ",
                    r,
                    c,
                    u8::from(cell.hinted),
                    kind,
                    content,
                    encode_token(cell.owner)
                )?;
            }
            writeln!(f)?;
        }
        for token in &self.tokens {
            writeln!(
                f,
                "{} {} {} {}",
                encode_token(Some(token.id)),
                token.x,
                token.y,
                token.score
            )?;
        }
        for token in &self.tokens {
            write_pos(f, token.pending)?;
        }
        writeln!(f, "{}", self.remaining_tiles)?;
        writeln!(f, "{}", self.remaining_secs)?;
        writeln!(f, "{}", u8::from(self.hint_active))?;
        writeln!(f, "{}", encode_token(self.hint_for))?;
        writeln!(f, "{}", self.hint_remaining.as_millis())?;
        write_pos(f, self.hint_pair.map(|(a, _)| a))?;
        write_pos(f, self.hint_pair.map(|(_, b)| b))
    }
}

fn write_pos(f: &mut fmt::Formatter<'_>, pos: Option<Pos>) -> fmt::Result {
    match pos {
        Some(p) => writeln!(f, "{} {}", p.row, p.col),
        None => writeln!(f, "-1 -1"),
    }
}

fn encode_content(content: Content) -> (u8, u8) {
    match content {
        Content::Empty => (0, 0),
        Content::Tile(group) => (1, group),
        Content::Item(kind) => (
            2,
            match kind {
                ItemKind::ExtendTime => 0,
                ItemKind::Shuffle => 1,
                ItemKind::Hint => 2,
            },
        ),
    }
}

fn encode_token(id: Option<TokenId>) -> u8 {
    match id {
        None => 0,
        Some(TokenId::A) => 1,
        Some(TokenId::B) => 2,
    }
}

/// Pulls typed integers off the whitespace stream.
struct Fields<'a> {
    words: SplitWhitespace<'a>,
}

impl<'a> Fields<'a> {
    fn new(text: &'a str) -> Self {
        Self {
            words: text.split_whitespace(),
        }
    }

    fn int(&mut self, field: &'static str) -> Result<i64, SnapshotError> {
        let word = self.words.next().ok_or(SnapshotError::Truncated(field))?;
        word.parse().map_err(|_| SnapshotError::NotInteger {
            field,
            found: word.to_owned(),
        })
    }

    fn ranged(&mut self, field: &'static str, lo: i64, hi: i64) -> Result<i64, SnapshotError> {
        let value = self.int(field)?;
        if (lo..=hi).contains(&value) {
            Ok(value)
        } else {
            Err(SnapshotError::OutOfRange { field, value })
        }
    }

    fn token(&mut self, field: &'static str) -> Result<Option<TokenId>, SnapshotError> {
        Ok(match self.ranged(field, 0, 2)? {
            1 => Some(TokenId::A),
            2 => Some(TokenId::B),
            _ => None,
        })
    }

    fn pos(&mut self, field: &'static str, rows: usize, cols: usize) -> Result<Option<Pos>, SnapshotError> {
        let row = self.ranged(field, -1, rows as i64 - 1)?;
        let col = self.ranged(field, -1, cols as i64 - 1)?;
        match (row, col) {
            (-1, -1) => Ok(None),
            (-1, v) | (v, -1) => Err(SnapshotError::OutOfRange { field, value: v }),
            (r, c) => Ok(Some(Pos::new(r as usize, c as usize))),
        }
    }

    fn finish(mut self) -> Result<(), SnapshotError> {
        match self.words.next() {
            None => Ok(()),
            Some(_) => Err(SnapshotError::Trailing),
        }
    }
}

impl Snapshot {
    /// Parse a save for a `rows x cols` board.
    pub fn parse(text: &str, rows: usize, cols: usize) -> Result<Self, SnapshotError> {
        let mut fields = Fields::new(text);
        let mode = match fields.ranged("mode", 0, 1)? {
            0 => Mode::Single,
            _ => Mode::Double,
        };

        let mut cells = Vec::with_capacity(rows * cols);
        for r in 0..rows {
            for c in 0..cols {
                cells.push(parse_cell(&mut fields, Pos::new(r, c))?);
            }
        }
        let mut grid = Grid::from_cells(rows, cols, cells);

        let mut tokens = Vec::with_capacity(mode.token_count());
        for expected in TokenId::ALL.iter().take(mode.token_count()) {
            let id = fields.token("token id")?;
            if id != Some(*expected) {
                return Err(SnapshotError::OutOfRange {
                    field: "token id",
                    value: i64::from(encode_token(id)),
                });
            }
            let x = fields.ranged("token x", 0, i64::from(i32::MAX))? as i32;
            let y = fields.ranged("token y", 0, i64::from(i32::MAX))? as i32;
            let score = fields.ranged("score", 0, i64::from(u32::MAX))? as u32;
            tokens.push(Token {
                id: *expected,
                x,
                y,
                score,
                pending: None,
            });
        }
        for token in &mut tokens {
            let saved = fields.pos("pending cell", rows, cols)?;
            // Fall back to the tile this token owns.
            token.pending = saved.or_else(|| {
                grid.positions()
                    .find(|&p| grid.is_tile(p) && grid.owner(p) == Some(token.id))
            });
        }

        let remaining_tiles = fields.ranged("remaining tiles", 0, (rows * cols) as i64)? as usize;
        let remaining_secs = fields.ranged("remaining time", 0, i64::from(u32::MAX))? as u32;
        let hint_active = fields.ranged("hint flag", 0, 1)? == 1;
        let hint_for = fields.token("hint beneficiary")?;
        let hint_ms = fields.ranged("hint time", 0, i64::MAX)?;
        let first = fields.pos("hint cell", rows, cols)?;
        let second = fields.pos("hint cell", rows, cols)?;
        fields.finish()?;

        let hint_pair = first.zip(second);
        // Marks belong to the live pair only.
        if let Some((a, b)) = hint_pair {
            grid.mark_hint(a);
            grid.mark_hint(b);
        }

        Ok(Self {
            mode,
            grid,
            tokens,
            remaining_tiles,
            remaining_secs,
            hint_active,
            hint_for,
            hint_remaining: Duration::from_millis(hint_ms as u64),
            hint_pair,
        })
    }
}

fn parse_cell(fields: &mut Fields<'_>, expected: Pos) -> Result<Cell, SnapshotError> {
    let row = fields.int("cell row")?;
    let col = fields.int("cell col")?;
    if row != expected.row as i64 || col != expected.col as i64 {
        return Err(SnapshotError::CellMismatch { expected, row, col });
    }
    let hinted = fields.ranged("cell hint", 0, 1)? == 1;
    let kind = fields.ranged("cell kind", 0, 2)?;
    let raw = fields.int("cell content")?;
    let owner = fields.token("cell owner")?;
    let content = match (kind, raw) {
        (0, _) => Content::Empty,
        (1, g @ 1..=255) => Content::Tile(g as u8),
        (2, 0) => Content::Item(ItemKind::ExtendTime),
        (2, 1) => Content::Item(ItemKind::Shuffle),
        (2, 2) => Content::Item(ItemKind::Hint),
        (_, value) => {
            return Err(SnapshotError::OutOfRange {
                field: "cell content",
                value,
            });
        }
    };
    // Only tiles can be chosen.
    let owner = if matches!(content, Content::Tile(_)) {
        owner
    } else {
        None
    };
    Ok(Cell {
        content,
        owner,
        hinted: hinted && content != Content::Empty,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Snapshot {
        let mut grid = Grid::from_rows(&["1.2", "S.1", "2.H"]);
        grid.set_owner(Pos::new(0, 0), Some(TokenId::A));
        grid.mark_hint(Pos::new(0, 2));
        grid.mark_hint(Pos::new(2, 0));
        let mut a = Token::new(TokenId::A, 60, 60);
        a.score = 15;
        a.pending = Some(Pos::new(0, 0));
        let b = Token::new(TokenId::B, 60, 100);
        Snapshot {
            mode: Mode::Double,
            grid,
            tokens: vec![a, b],
            remaining_tiles: 4,
            remaining_secs: 42,
            hint_active: true,
            hint_for: Some(TokenId::B),
            hint_remaining: Duration::from_millis(7_340),
            hint_pair: Some((Pos::new(0, 2), Pos::new(2, 0))),
        }
    }

    #[test]
    fn test_save_then_load_is_identical() {
        let snap = sample();
        let text = snap.to_string();
        assert_eq!(Snapshot::parse(&text, 3, 3), Ok(snap));
    }

    #[test]
    fn test_layout_starts_with_mode_and_cells() {
        let text = sample().to_string();
        let mut lines = text.lines();
        assert_eq!(lines.next(), Some("1"));
        assert!(lines.next().is_some_and(|l| l.starts_with("0 0 0 1 1 1 0 1 0 0 0 0 0 2 1 1 2 0")));
        assert!(text.trim_end().ends_with("0 2\n2 0"));
    }

    #[test]
    fn test_pending_rederived_from_owner() {
        let snap = sample();
        // Blank out A's pending cell; A still owns (0, 0).
        let text = snap.to_string().replacen(
            "1 60 60 15\n2 60 100 0\n0 0\n",
            "1 60 60 15\n2 60 100 0\n-1 -1\n",
            1,
        );
        assert!(text.contains("-1 -1\n-1 -1\n4\n"));
        assert_eq!(Snapshot::parse(&text, 3, 3), Ok(snap));
    }

    #[test]
    fn test_truncated_and_garbage() {
        let text = sample().to_string();
        let cut = &text[..text.len() / 2];
        assert!(matches!(
            Snapshot::parse(cut, 3, 3),
            Err(SnapshotError::Truncated(_))
        ));
        assert!(matches!(
            Snapshot::parse("x", 3, 3),
            Err(SnapshotError::NotInteger { field: "mode", .. })
        ));
        assert_eq!(
            Snapshot::parse(&format!("{text} 9"), 3, 3),
            Err(SnapshotError::Trailing)
        );
    }

    #[test]
    fn test_wrong_board_size_rejected() {
        let text = sample().to_string();
        assert!(Snapshot::parse(&text, 2, 4).is_err());
    }

    #[test]
    fn test_single_mode_has_one_token() {
        let mut snap = sample();
        snap.mode = Mode::Single;
        snap.tokens.truncate(1);
        snap.hint_for = Some(TokenId::A);
        snap.hint_active = false;
        snap.hint_pair = None;
        snap.grid.unmark_hint(Pos::new(0, 2));
        snap.grid.unmark_hint(Pos::new(2, 0));
        let text = snap.to_string();
        assert!(text.trim_end().ends_with("-1 -1\n-1 -1"));
        assert_eq!(Snapshot::parse(&text, 3, 3), Ok(snap));
    }
}
