//! Layout and drawing: menu, board, status bar, overlays, elimination fade.

use crate::app::{MenuItem, Screen};
use crate::grid::{Content, Direction as Side, Pos};
use crate::session::{EndReason, Outcome, Session, SessionState, Standing};
use crate::solver::path_cells;
use crate::theme::Theme;
use crate::token::{Geometry, Token};
use ratatui::Frame;
use ratatui::buffer::Buffer;
use ratatui::layout::{Alignment, Constraint, Direction, Layout, Position, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Paragraph, Widget};
use std::collections::HashSet;
use std::time::Instant;
use tachyonfx::{
    CellFilter, Duration as TfxDuration, Effect, EffectRenderer, Interpolation, fx, ref_count,
};

/// Terminal cells per board cell, largest first. The first one that fits wins.
const CELL_SIZES: [(u16, u16); 3] = [(4, 2), (2, 1), (1, 1)];
const STATUS_HEIGHT: u16 = 3;
/// Duration of the fade on eliminated tiles, in ms.
const CLEAR_FADE_MS: u32 = 400;
const TOKEN_GLYPH: char = '●';

/// Tiles a match just removed. They are drawn as ghosts until the fade is done.
#[derive(Default)]
pub struct ClearFade {
    ghosts: Vec<(Pos, u8)>,
    effect: Option<Effect>,
    last_process: Option<Instant>,
}

impl ClearFade {
    /// Add tiles to fade. The effect restarts so it covers all ghosts.
    pub fn push(&mut self, cells: impl IntoIterator<Item = (Pos, u8)>) {
        self.ghosts.extend(cells);
        self.effect = None;
        self.last_process = None;
    }

    pub fn clear(&mut self) {
        self.ghosts.clear();
        self.effect = None;
        self.last_process = None;
    }

    /// Drop the ghosts once the effect has run out.
    pub fn settle(&mut self) {
        if self.effect.as_ref().is_some_and(Effect::done) {
            self.clear();
        }
    }

    pub fn is_active(&self) -> bool {
        !self.ghosts.is_empty()
    }
}

/// Board placement on screen: inner rect plus terminal cells per board cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Board {
    rect: Rect,
    cell_w: u16,
    cell_h: u16,
}

impl Board {
    fn cell_rect(&self, pos: Pos) -> Rect {
        Rect::new(
            self.rect.x + pos.col as u16 * self.cell_w,
            self.rect.y + pos.row as u16 * self.cell_h,
            self.cell_w,
            self.cell_h,
        )
    }

    fn center(&self, pos: Pos) -> (u16, u16) {
        let r = self.cell_rect(pos);
        (r.x + r.width / 2, r.y + r.height / 2)
    }

    fn pixel(&self, geometry: &Geometry, x: i32, y: i32) -> (u16, u16) {
        let (dx, dy) = pixel_to_char(geometry, (self.cell_w, self.cell_h), x, y);
        (
            self.rect.x + dx.min(self.rect.width.saturating_sub(1)),
            self.rect.y + dy.min(self.rect.height.saturating_sub(1)),
        )
    }
}

/// Draw the current screen plus any flash message.
pub fn draw(
    frame: &mut Frame,
    theme: &Theme,
    screen: Screen,
    menu_selected: MenuItem,
    session: Option<&Session>,
    message: Option<&str>,
    fade: &mut ClearFade,
    now: Instant,
) {
    let area = frame.area();
    fill(frame.buffer_mut(), area, Style::default().bg(theme.bg));
    match (screen, session) {
        (Screen::Game, Some(session)) => {
            draw_game(frame, theme, session, area, fade, now);
            draw_session_overlay(frame, theme, session, area);
        }
        _ => draw_menu(frame, theme, menu_selected, area),
    }
    if let Some(message) = message {
        draw_message(frame, theme, message, area);
    }
}

fn draw_menu(frame: &mut Frame, theme: &Theme, selected: MenuItem, area: Rect) {
    let popup = centered(area, 36, 12);
    let title = Line::from(vec![
        Span::styled(
            " QLink ",
            Style::default()
                .fg(theme.group_color(3))
                .add_modifier(Modifier::BOLD),
        ),
        Span::styled(
            " tui ",
            Style::default()
                .fg(theme.main_fg)
                .add_modifier(Modifier::BOLD),
        ),
    ]);
    let highlight = Style::default()
        .fg(Color::Black)
        .bg(theme.title)
        .add_modifier(Modifier::BOLD);
    let normal = Style::default().fg(theme.main_fg);

    let mut lines = vec![Line::from(""), title, Line::from("")];
    for item in MenuItem::ALL {
        let style = if item == selected { highlight } else { normal };
        lines.push(Line::from(Span::styled(format!(" {} ", item.label()), style)));
    }
    lines.push(Line::from(""));
    lines.push(Line::from(Span::styled(
        "Up/Down select   Enter confirm",
        Style::default().fg(theme.inactive_fg),
    )));
    Paragraph::new(lines)
        .alignment(Alignment::Center)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Style::default().fg(theme.div_line).bg(theme.bg)),
        )
        .render(popup, frame.buffer_mut());
}

/// Status bar on top, board centered below it.
fn draw_game(
    frame: &mut Frame,
    theme: &Theme,
    session: &Session,
    area: Rect,
    fade: &mut ClearFade,
    now: Instant,
) {
    let grid = session.grid();
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(STATUS_HEIGHT), Constraint::Fill(1)])
        .split(area);
    draw_status(frame.buffer_mut(), theme, session, chunks[0]);

    let Some((cell_w, cell_h)) = cell_chars(chunks[1].width, chunks[1].height, grid.rows(), grid.cols())
    else {
        Paragraph::new("Terminal too small for the board")
            .alignment(Alignment::Center)
            .style(Style::default().fg(theme.main_fg))
            .render(chunks[1], frame.buffer_mut());
        return;
    };
    let outer = centered(
        chunks[1],
        grid.cols() as u16 * cell_w + 2,
        grid.rows() as u16 * cell_h + 2,
    );
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(theme.div_line).bg(theme.bg));
    let board = Board {
        rect: block.inner(outer),
        cell_w,
        cell_h,
    };
    block.render(outer, frame.buffer_mut());

    let buf = frame.buffer_mut();
    draw_cells(buf, theme, session, &board, &fade.ghosts);
    draw_connections(buf, theme, session, &board);
    draw_tokens(buf, theme, session, &board);

    if fade.is_active() {
        apply_clear_effect(frame, theme, &board, fade, now);
    }
}

fn draw_cells(buf: &mut Buffer, theme: &Theme, session: &Session, board: &Board, ghosts: &[(Pos, u8)]) {
    let grid = session.grid();
    for pos in grid.positions() {
        let cell = grid.cell(pos);
        let rect = board.cell_rect(pos);
        let (cx, cy) = board.center(pos);
        match cell.content {
            Content::Tile(group) => {
                let style = match cell.owner {
                    Some(owner) => Style::default()
                        .fg(theme.group_color(group))
                        .bg(theme.token_color(owner))
                        .add_modifier(Modifier::BOLD),
                    None => Style::default().fg(Color::Black).bg(theme.group_color(group)),
                };
                fill(buf, rect, style);
                if cell.hinted {
                    put(buf, cx, cy, '◆', style.fg(theme.hint).add_modifier(Modifier::BOLD));
                } else {
                    put(buf, cx, cy, group_label(group), style);
                }
            }
            Content::Item(kind) => {
                fill(buf, rect, Style::default().bg(theme.bg));
                put(
                    buf,
                    cx,
                    cy,
                    kind.symbol(),
                    Style::default()
                        .fg(theme.item)
                        .bg(theme.bg)
                        .add_modifier(Modifier::BOLD),
                );
            }
            Content::Empty => {
                let ghost = ghosts.iter().find(|(p, _)| *p == pos).map(|&(_, g)| g);
                let bg = ghost.map_or(theme.bg, |g| theme.group_color(g));
                fill(buf, rect, Style::default().bg(bg));
            }
        }
    }
}

/// Line drawing through the empty cells between the two matched tiles.
fn draw_connections(buf: &mut Buffer, theme: &Theme, session: &Session, board: &Board) {
    for (_, connection) in session.connections() {
        let cells = path_cells(session.grid(), connection.from, &connection.path);
        let inner = cells.len().saturating_sub(1);
        for (i, &pos) in cells.iter().enumerate().take(inner).skip(1) {
            let sides = (connection.path[i - 1].opposite(), connection.path[i]);
            draw_link(buf, board, pos, sides, theme.connection);
        }
    }
}

fn draw_link(buf: &mut Buffer, board: &Board, pos: Pos, sides: (Side, Side), fg: Color) {
    let rect = board.cell_rect(pos);
    let (cx, cy) = board.center(pos);
    for side in [sides.0, sides.1] {
        match side {
            Side::Left => (rect.x..cx).for_each(|x| mark(buf, x, cy, '─', fg)),
            Side::Right => (cx + 1..rect.right()).for_each(|x| mark(buf, x, cy, '─', fg)),
            Side::Up => (rect.y..cy).for_each(|y| mark(buf, cx, y, '│', fg)),
            Side::Down => (cy + 1..rect.bottom()).for_each(|y| mark(buf, cx, y, '│', fg)),
        }
    }
    mark(buf, cx, cy, link_glyph(sides.0, sides.1), fg);
}

fn draw_tokens(buf: &mut Buffer, theme: &Theme, session: &Session, board: &Board) {
    for token in session.tokens() {
        let (x, y) = board.pixel(session.geometry(), token.x, token.y);
        mark(buf, x, y, TOKEN_GLYPH, theme.token_color(token.id));
    }
}

fn draw_status(buf: &mut Buffer, theme: &Theme, session: &Session, area: Rect) {
    let title_style = Style::default().fg(theme.title);
    let fg_style = Style::default().fg(theme.main_fg);
    let mut spans = Vec::new();
    for token in session.tokens() {
        spans.push(Span::styled(
            format!("{}: ", token.id.label()),
            Style::default()
                .fg(theme.token_color(token.id))
                .add_modifier(Modifier::BOLD),
        ));
        spans.push(Span::styled(format!("{}   ", token.score), fg_style));
    }
    spans.push(Span::styled("Time: ", title_style));
    spans.push(Span::styled(
        format!("{}   ", format_clock(session.remaining_secs())),
        fg_style,
    ));
    spans.push(Span::styled("Tiles: ", title_style));
    spans.push(Span::styled(session.remaining_tiles().to_string(), fg_style));
    if let (true, Some(id)) = (session.hint_active(), session.hint_for()) {
        spans.push(Span::styled("   Hint: ", title_style));
        spans.push(Span::styled(
            format!("{} {}s", id.label(), session.hint_remaining().as_secs()),
            Style::default().fg(theme.hint),
        ));
    }
    Paragraph::new(Line::from(spans))
        .alignment(Alignment::Center)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Style::default().fg(theme.div_line).bg(theme.bg))
                .title(Span::styled(" QLink ", title_style)),
        )
        .render(area, buf);
}

fn draw_session_overlay(frame: &mut Frame, theme: &Theme, session: &Session, area: Rect) {
    let (title, lines) = match session.state() {
        SessionState::PreparedNew => (
            " Ready ",
            vec![
                "WASD moves Player 1, arrows move Player 2".to_string(),
                "Press any key to start".to_string(),
            ],
        ),
        SessionState::PreparedLoad => (" Saved game ", vec!["Press any key to resume".to_string()]),
        SessionState::Paused => (" Paused ", vec!["P Resume    S Save    Q Menu".to_string()]),
        SessionState::Stopped => {
            let (title, mut lines) = outcome_text(session.outcome(), session.tokens());
            lines.push(String::new());
            lines.push("Press any key".to_string());
            (title, lines)
        }
        SessionState::Playing | SessionState::Unprepared => return,
    };
    draw_popup(frame, theme, title, &lines, area);
}

fn draw_popup(frame: &mut Frame, theme: &Theme, title: &str, lines: &[String], area: Rect) {
    let widest = lines
        .iter()
        .map(|l| l.chars().count())
        .chain(std::iter::once(title.chars().count()))
        .max()
        .unwrap_or(0) as u16;
    let popup = centered(area, (widest + 6).max(28), lines.len() as u16 + 5);
    fill(frame.buffer_mut(), popup, Style::default().bg(theme.bg));

    let mut text = vec![
        Line::from(""),
        Line::from(Span::styled(
            title.to_string(),
            Style::default().fg(Color::Black).bg(theme.title),
        )),
        Line::from(""),
    ];
    text.extend(
        lines
            .iter()
            .map(|l| Line::from(Span::styled(l.clone(), Style::default().fg(theme.main_fg)))),
    );
    Paragraph::new(text)
        .alignment(Alignment::Center)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Style::default().fg(theme.div_line).bg(theme.bg)),
        )
        .render(popup, frame.buffer_mut());
}

fn draw_message(frame: &mut Frame, theme: &Theme, message: &str, area: Rect) {
    if area.height == 0 {
        return;
    }
    let line = Rect::new(area.x, area.bottom() - 1, area.width, 1);
    Paragraph::new(Span::styled(message.to_string(), Style::default().fg(theme.title)))
        .alignment(Alignment::Center)
        .render(line, frame.buffer_mut());
}

/// Fade the ghost tiles to the board background.
fn apply_clear_effect(
    frame: &mut Frame,
    theme: &Theme,
    board: &Board,
    fade: &mut ClearFade,
    now: Instant,
) {
    let delta = fade
        .last_process
        .map(|t| now.saturating_duration_since(t))
        .unwrap_or(std::time::Duration::ZERO);
    let delta_ms = delta.as_millis().min(u32::MAX as u128) as u32;
    fade.last_process = Some(now);

    if fade.effect.is_none() {
        let fading: HashSet<(u16, u16)> = fade
            .ghosts
            .iter()
            .flat_map(|&(pos, _)| board.cell_rect(pos).positions())
            .map(|p| (p.x, p.y))
            .collect();
        let filter = CellFilter::PositionFn(ref_count(move |pos: Position| {
            fading.contains(&(pos.x, pos.y))
        }));
        let bg = theme.bg;
        let effect = fx::fade_to(bg, bg, (CLEAR_FADE_MS, Interpolation::Linear))
            .with_filter(filter)
            .with_area(board.rect);
        fade.effect = Some(effect);
    }

    if let Some(effect) = fade.effect.as_mut() {
        frame.render_effect(effect, board.rect, TfxDuration::from_millis(delta_ms));
    }
}

fn fill(buf: &mut Buffer, rect: Rect, style: Style) {
    let rect = rect.intersection(buf.area);
    for y in rect.top()..rect.bottom() {
        for x in rect.left()..rect.right() {
            buf[(x, y)].set_char(' ').set_style(style);
        }
    }
}

fn put(buf: &mut Buffer, x: u16, y: u16, ch: char, style: Style) {
    if buf.area.contains(Position::new(x, y)) {
        buf[(x, y)].set_char(ch).set_style(style);
    }
}

/// Overwrite glyph and foreground, keeping the background underneath.
fn mark(buf: &mut Buffer, x: u16, y: u16, ch: char, fg: Color) {
    if buf.area.contains(Position::new(x, y)) {
        buf[(x, y)]
            .set_char(ch)
            .set_fg(fg)
            .set_style(Style::default().add_modifier(Modifier::BOLD));
    }
}

fn centered(area: Rect, width: u16, height: u16) -> Rect {
    Rect {
        x: area.x + area.width.saturating_sub(width) / 2,
        y: area.y + area.height.saturating_sub(height) / 2,
        width: width.min(area.width),
        height: height.min(area.height),
    }
}

/// Largest cell size whose board (plus border) fits in `width x height`.
fn cell_chars(width: u16, height: u16, rows: usize, cols: usize) -> Option<(u16, u16)> {
    CELL_SIZES.into_iter().find(|&(cw, ch)| {
        cols * cw as usize + 2 <= width as usize && rows * ch as usize + 2 <= height as usize
    })
}

/// Offset, in terminal cells, of a map pixel inside the board.
fn pixel_to_char(geometry: &Geometry, cell: (u16, u16), x: i32, y: i32) -> (u16, u16) {
    let scale = |v: i32, chars: u16, pixels: i32| (v.max(0) * i32::from(chars) / pixels.max(1)) as u16;
    (
        scale(x, cell.0, geometry.cell_width),
        scale(y, cell.1, geometry.cell_height),
    )
}

/// Box-drawing glyph joining two sides of a cell.
fn link_glyph(a: Side, b: Side) -> char {
    use Side::{Down, Left, Right, Up};
    match (a, b) {
        (Left, Right) | (Right, Left) => '─',
        (Up, Down) | (Down, Up) => '│',
        (Down, Right) | (Right, Down) => '┌',
        (Down, Left) | (Left, Down) => '┐',
        (Up, Right) | (Right, Up) => '└',
        (Up, Left) | (Left, Up) => '┘',
        _ => '•',
    }
}

/// Single character naming a tile group: 1-9, then a-z.
fn group_label(group: u8) -> char {
    char::from_digit(u32::from(group), 36).unwrap_or('#')
}

fn format_clock(secs: u32) -> String {
    format!("{:02}:{:02}", secs / 60, secs % 60)
}

/// Title and body lines for a finished game.
fn outcome_text(outcome: Option<Outcome>, tokens: &[Token]) -> (&'static str, Vec<String>) {
    let Some(outcome) = outcome else {
        return (" Game stopped ", Vec::new());
    };
    let title = match outcome.reason {
        EndReason::Success => " Board cleared! ",
        EndReason::Stuck => " No moves left ",
        EndReason::TimeUp => " Time's up! ",
    };
    let mut lines: Vec<String> = tokens
        .iter()
        .map(|t| format!("{}: {}", t.id.label(), t.score))
        .collect();
    match outcome.standing {
        Some(Standing::Winner(id)) => lines.push(format!("{} wins", id.label())),
        Some(Standing::Tie) => lines.push("It's a tie".to_string()),
        None => {}
    }
    (title, lines)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GameConfig;
    use crate::grid::TokenId;

    #[test]
    fn test_cell_size_falls_back() {
        assert_eq!(cell_chars(200, 60, 15, 30), Some((4, 2)));
        assert_eq!(cell_chars(100, 30, 15, 30), Some((2, 1)));
        assert_eq!(cell_chars(40, 20, 15, 30), Some((1, 1)));
        assert_eq!(cell_chars(20, 20, 15, 30), None);
    }

    #[test]
    fn test_pixel_to_char_scales_cells() {
        let geometry = Geometry::from_config(&GameConfig::default());
        assert_eq!(pixel_to_char(&geometry, (4, 2), 60, 60), (6, 3));
        assert_eq!(pixel_to_char(&geometry, (1, 1), 39, 40), (0, 1));
        assert_eq!(pixel_to_char(&geometry, (2, 1), -5, 0), (0, 0));
    }

    #[test]
    fn test_link_glyphs() {
        // Moving right, then down: entered from the left, left through the bottom.
        assert_eq!(link_glyph(Side::Right.opposite(), Side::Down), '┐');
        assert_eq!(link_glyph(Side::Left, Side::Right), '─');
        assert_eq!(link_glyph(Side::Up, Side::Right), '└');
    }

    #[test]
    fn test_labels_and_clock() {
        assert_eq!(group_label(1), '1');
        assert_eq!(group_label(10), 'a');
        assert_eq!(group_label(40), '#');
        assert_eq!(format_clock(95), "01:35");
    }

    #[test]
    fn test_outcome_text_names_winner() {
        let mut a = Token::new(TokenId::A, 0, 0);
        a.score = 15;
        let b = Token::new(TokenId::B, 0, 0);
        let outcome = Outcome {
            reason: EndReason::TimeUp,
            standing: Some(Standing::Winner(TokenId::A)),
        };
        let (title, lines) = outcome_text(Some(outcome), &[a, b]);
        assert_eq!(title, " Time's up! ");
        assert_eq!(lines, vec!["Player 1: 15", "Player 2: 0", "Player 1 wins"]);
    }

    #[test]
    fn test_centered_clamps_to_area() {
        let area = Rect::new(0, 0, 20, 10);
        assert_eq!(centered(area, 10, 4), Rect::new(5, 3, 10, 4));
        assert_eq!(centered(area, 30, 40), area);
    }
}
