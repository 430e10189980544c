//! Session state machine: map generation, ticks, matching, items, hints, saves.
//!
//! The host owns the clock. It feeds [`Tick`]s in and drains [`Event`]s out;
//! everything here runs to completion on the caller's thread.

use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::time::Duration;

use thiserror::Error;
use tracing::{debug, info, instrument, warn};

use crate::config::GameConfig;
use crate::grid::{Content, Direction, Grid, ItemKind, Pos, TokenId};
use crate::rng::SessionRng;
use crate::scanner;
use crate::snapshot::{Snapshot, SnapshotError};
use crate::solver::Solver;
use crate::token::{Geometry, Token, resolve_move};

/// Fresh maps to try before giving up on placing the tokens.
const MAX_MAP_ATTEMPTS: u32 = 1_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Unprepared,
    PreparedNew,
    PreparedLoad,
    Playing,
    Paused,
    Stopped,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Mode {
    Single,
    Double,
}

impl Mode {
    pub const fn ordinal(self) -> u8 {
        match self {
            Self::Single => 0,
            Self::Double => 1,
        }
    }

    pub const fn token_count(self) -> usize {
        match self {
            Self::Single => 1,
            Self::Double => 2,
        }
    }

    /// Tokens taking part, in poll order.
    pub fn token_ids(self) -> &'static [TokenId] {
        &TokenId::ALL[..self.token_count()]
    }
}

/// A held movement key, resolved to its token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Command {
    pub token: TokenId,
    pub dir: Direction,
}

impl Command {
    pub const fn new(token: TokenId, dir: Direction) -> Self {
        Self { token, dir }
    }
}

/// Handle for a drawn connection line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(u64);

/// A validated path, kept until the host clears it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Connection {
    pub from: Pos,
    pub to: Pos,
    /// Group of the two eliminated tiles.
    pub group: u8,
    pub path: Vec<Direction>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tick {
    /// Movement/input poll, every `poll_interval`.
    Poll,
    /// One second of game time.
    Countdown,
    /// The connection's display time is over.
    ClearConnection(ConnectionId),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndReason {
    /// Every tile eliminated.
    Success,
    /// No matchable pair is reachable any more.
    Stuck,
    TimeUp,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Standing {
    Winner(TokenId),
    Tie,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Outcome {
    pub reason: EndReason,
    /// Set for two-player games that end on success or time.
    pub standing: Option<Standing>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    MatchValidated {
        by: TokenId,
        from: Pos,
        to: Pos,
        connection: ConnectionId,
    },
    MatchRejected {
        by: TokenId,
        from: Pos,
        to: Pos,
    },
    ScoreChanged {
        token: TokenId,
        score: u32,
    },
    ItemConsumed {
        by: TokenId,
        kind: ItemKind,
        at: Pos,
    },
    Ended(Outcome),
    BackToMenu,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum GenerationError {
    #[error("no room to place the tokens after {0} generated maps")]
    Exhausted(u32),
}

#[derive(Debug)]
pub struct Session {
    config: GameConfig,
    geometry: Geometry,
    rng: SessionRng,
    solver: Solver,
    state: SessionState,
    mode: Mode,
    grid: Grid,
    tokens: Vec<Token>,
    remaining_tiles: usize,
    remaining_secs: u32,
    hint_active: bool,
    hint_for: Option<TokenId>,
    hint_remaining: Duration,
    hint_pair: Option<(Pos, Pos)>,
    held: HashSet<Command>,
    connections: BTreeMap<ConnectionId, Connection>,
    next_connection: u64,
    outcome: Option<Outcome>,
    events: Vec<Event>,
}

impl Session {
    /// Panics if `config` does not validate.
    pub fn new(config: GameConfig, rng: SessionRng) -> Self {
        if let Err(err) = config.validate() {
            panic!("invalid game config: {err}");
        }
        Self {
            geometry: Geometry::from_config(&config),
            solver: Solver::new(config.max_turns),
            grid: Grid::new(config.rows, config.cols),
            remaining_secs: config.initial_time_secs,
            config,
            rng,
            state: SessionState::Unprepared,
            mode: Mode::Single,
            tokens: Vec::new(),
            remaining_tiles: 0,
            hint_active: false,
            hint_for: None,
            hint_remaining: Duration::ZERO,
            hint_pair: None,
            held: HashSet::new(),
            connections: BTreeMap::new(),
            next_connection: 0,
            outcome: None,
            events: Vec::new(),
        }
    }

    // ----- queries -----

    pub fn geometry(&self) -> &Geometry {
        &self.geometry
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn grid(&self) -> &Grid {
        &self.grid
    }

    pub fn tokens(&self) -> &[Token] {
        &self.tokens
    }

    pub fn token(&self, id: TokenId) -> Option<&Token> {
        self.tokens.iter().find(|t| t.id == id)
    }

    pub fn remaining_tiles(&self) -> usize {
        self.remaining_tiles
    }

    pub fn remaining_secs(&self) -> u32 {
        self.remaining_secs
    }

    pub fn hint_active(&self) -> bool {
        self.hint_active
    }

    pub fn hint_for(&self) -> Option<TokenId> {
        self.hint_for
    }

    pub fn hint_remaining(&self) -> Duration {
        self.hint_remaining
    }

    pub fn outcome(&self) -> Option<Outcome> {
        self.outcome
    }

    pub fn connections(&self) -> impl Iterator<Item = (ConnectionId, &Connection)> {
        self.connections.iter().map(|(&id, c)| (id, c))
    }

    pub fn connection(&self, id: ConnectionId) -> Option<&Connection> {
        self.connections.get(&id)
    }

    #[cfg(test)]
    pub fn is_held(&self, command: Command) -> bool {
        self.held.contains(&command)
    }

    /// Take everything that happened since the last call.
    pub fn drain_events(&mut self) -> Vec<Event> {
        std::mem::take(&mut self.events)
    }

    // ----- lifecycle -----

    /// Generate a fresh map and place the tokens on it.
    #[instrument(skip(self))]
    pub fn prepare_new_game(&mut self, mode: Mode) -> Result<(), GenerationError> {
        self.mode = mode;
        let mut placed = None;
        for _ in 0..MAX_MAP_ATTEMPTS {
            self.grid = self.generate_map();
            if let Some(tokens) = self.place_tokens() {
                placed = Some(tokens);
                break;
            }
        }
        let Some(tokens) = placed else {
            warn!(attempts = MAX_MAP_ATTEMPTS, "token placement kept failing");
            return Err(GenerationError::Exhausted(MAX_MAP_ATTEMPTS));
        };

        self.reset_play_state();
        self.tokens = tokens;
        self.remaining_tiles = self.config.tiles;
        self.remaining_secs = self.config.initial_time_secs;
        self.state = SessionState::PreparedNew;
        info!(?mode, seed = self.rng.seed(), "new game prepared");
        Ok(())
    }

    /// Restore a saved game. The session waits in `PreparedLoad` afterwards.
    pub fn prepare_saved_game(&mut self, snapshot: Snapshot) -> Result<(), SnapshotError> {
        let (rows, cols) = (snapshot.grid.rows(), snapshot.grid.cols());
        if rows != self.config.rows || cols != self.config.cols {
            return Err(SnapshotError::BoardSize { rows, cols });
        }
        self.reset_play_state();
        self.mode = snapshot.mode;
        self.grid = snapshot.grid;
        self.tokens = snapshot.tokens;
        self.remaining_tiles = snapshot.remaining_tiles;
        self.remaining_secs = snapshot.remaining_secs;
        self.hint_active = snapshot.hint_active;
        self.hint_for = snapshot.hint_for;
        self.hint_remaining = snapshot.hint_remaining;
        self.hint_pair = snapshot.hint_pair;
        let on_board = self.grid.tile_count();
        if on_board != self.remaining_tiles {
            warn!(saved = self.remaining_tiles, on_board, "tile count in save disagrees with board");
        }
        self.state = SessionState::PreparedLoad;
        info!(mode = ?self.mode, tiles = self.remaining_tiles, "saved game loaded");
        Ok(())
    }

    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            mode: self.mode,
            grid: self.grid.clone(),
            tokens: self.tokens.clone(),
            remaining_tiles: self.remaining_tiles,
            remaining_secs: self.remaining_secs,
            hint_active: self.hint_active,
            hint_for: self.hint_for,
            hint_remaining: self.hint_remaining,
            hint_pair: self.hint_pair,
        }
    }

    pub fn start_game(&mut self) {
        match self.state {
            SessionState::PreparedNew | SessionState::PreparedLoad => self.enter(SessionState::Playing),
            state => warn!(?state, "start ignored"),
        }
    }

    pub fn pause_game(&mut self) {
        match self.state {
            SessionState::Playing => {
                self.held.clear();
                self.enter(SessionState::Paused);
            }
            state => warn!(?state, "pause ignored"),
        }
    }

    /// Continue a paused or freshly loaded game. Hint time carries over as is.
    pub fn resume_game(&mut self) {
        match self.state {
            SessionState::Paused | SessionState::PreparedLoad => self.enter(SessionState::Playing),
            state => warn!(?state, "resume ignored"),
        }
    }

    /// Stop without an outcome, e.g. when the player quits.
    pub fn stop_game(&mut self) {
        if self.state != SessionState::Stopped {
            self.held.clear();
            self.enter(SessionState::Stopped);
        }
    }

    /// Any input on a finished game leads back to the menu.
    pub fn request_back_to_menu(&mut self) {
        if self.state == SessionState::Stopped {
            self.events.push(Event::BackToMenu);
        } else {
            warn!(state = ?self.state, "back to menu ignored");
        }
    }

    fn enter(&mut self, next: SessionState) {
        info!(from = ?self.state, to = ?next, "session state");
        self.state = next;
    }

    fn reset_play_state(&mut self) {
        self.tokens.clear();
        self.hint_active = false;
        self.hint_for = None;
        self.hint_remaining = Duration::ZERO;
        self.hint_pair = None;
        self.held.clear();
        self.connections.clear();
        self.outcome = None;
        self.events.clear();
    }

    // ----- generation -----

    fn generate_map(&mut self) -> Grid {
        let mut grid = Grid::new(self.config.rows, self.config.cols);
        let mut order: Vec<usize> = (0..grid.len()).collect();
        self.rng.shuffle(&mut order);
        let per_group = self.config.tiles_per_group();
        for (i, &idx) in order.iter().take(self.config.tiles).enumerate() {
            grid.place_tile(grid.pos_of(idx), (i / per_group) as u8 + 1);
        }
        grid
    }

    fn place_tokens(&mut self) -> Option<Vec<Token>> {
        let mut tokens: Vec<Token> = Vec::with_capacity(self.mode.token_count());
        for &id in self.mode.token_ids() {
            let taken: Vec<Pos> = tokens.iter().map(|t| t.cell(&self.geometry)).collect();
            let pos = self.pick_start_cell(&taken)?;
            tokens.push(Token::at_cell(id, &self.geometry, pos));
        }
        Some(tokens)
    }

    /// Random inner empty cell with at least one open side.
    fn pick_start_cell(&mut self, taken: &[Pos]) -> Option<Pos> {
        let (rows, cols) = (self.grid.rows(), self.grid.cols());
        for _ in 0..self.config.placement_trials {
            let pos = Pos::new(self.rng.below(rows), self.rng.below(cols));
            if pos.row == 0 || pos.col == 0 || pos.row == rows - 1 || pos.col == cols - 1 {
                continue;
            }
            if !self.grid.is_empty(pos) || taken.contains(&pos) {
                continue;
            }
            let open = Direction::ALL
                .iter()
                .filter_map(|&d| self.grid.step(pos, d))
                .any(|n| self.grid.is_empty(n));
            if open {
                return Some(pos);
            }
        }
        None
    }

    // ----- input -----

    /// Press a movement key. Only counts while playing.
    pub fn hold(&mut self, command: Command) {
        if self.state == SessionState::Playing && self.mode.token_ids().contains(&command.token) {
            self.held.insert(command);
        }
    }

    pub fn release(&mut self, command: Command) {
        self.held.remove(&command);
    }

    /// Replace the whole held set.
    pub fn set_held(&mut self, commands: impl IntoIterator<Item = Command>) {
        self.held.clear();
        for command in commands {
            self.hold(command);
        }
    }

    /// Move one token a single step and act on what it touched.
    pub fn move_player(&mut self, which: TokenId, dir: Direction) {
        if self.state != SessionState::Playing {
            warn!(state = ?self.state, ?which, "move ignored");
            return;
        }
        let Some(idx) = self.tokens.iter().position(|t| t.id == which) else {
            warn!(?which, "move for absent token");
            return;
        };
        let outcome = resolve_move(&self.grid, &self.geometry, &mut self.tokens[idx], dir);
        if let Some(hit) = outcome.hit {
            self.choose_tile(which, hit);
        }
        for at in outcome.items {
            if self.state != SessionState::Playing {
                break;
            }
            self.consume_item(which, at);
        }
    }

    // ----- ticks -----

    pub fn tick(&mut self, tick: Tick) {
        match tick {
            Tick::ClearConnection(id) => {
                self.connections.remove(&id);
            }
            _ if self.state != SessionState::Playing => {}
            Tick::Poll => self.poll(),
            Tick::Countdown => self.countdown(),
        }
    }

    fn poll(&mut self) {
        for &id in self.mode.token_ids() {
            let held = |dir| self.held.contains(&Command::new(id, dir));
            if (held(Direction::Up) && held(Direction::Down))
                || (held(Direction::Left) && held(Direction::Right))
            {
                continue;
            }
            let dirs: Vec<Direction> = Direction::ALL.into_iter().filter(|&d| held(d)).collect();
            for dir in dirs {
                self.move_player(id, dir);
                if self.state != SessionState::Playing {
                    return;
                }
            }
        }

        if self.hint_active {
            self.hint_remaining = self.hint_remaining.saturating_sub(self.config.poll_interval);
            if self.hint_remaining.is_zero() {
                self.expire_hint();
            }
        }
    }

    fn countdown(&mut self) {
        self.change_time(-1);
        if self.state == SessionState::Playing && self.rng.percent(self.config.item_spawn_percent) {
            self.spawn_item();
        }
    }

    fn change_time(&mut self, delta: i64) {
        let secs = (i64::from(self.remaining_secs) + delta).clamp(0, i64::from(u32::MAX));
        self.remaining_secs = secs as u32;
        if self.remaining_secs == 0 {
            self.finish(EndReason::TimeUp);
        }
    }

    // ----- matching -----

    fn choose_tile(&mut self, which: TokenId, pos: Pos) {
        if self.grid.owner(pos).is_some_and(|owner| owner != which) {
            return;
        }
        self.grid.set_owner(pos, Some(which));
        let Some(token) = self.tokens.iter_mut().find(|t| t.id == which) else {
            return;
        };
        match token.pending {
            None => token.pending = Some(pos),
            Some(prev) if prev != pos => {
                token.pending = None;
                self.validate_match(which, prev, pos);
            }
            Some(_) => {}
        }
    }

    fn validate_match(&mut self, which: TokenId, from: Pos, to: Pos) {
        let Some(path) = self.solver.check_match(&self.grid, from, to) else {
            debug!(?which, %from, %to, "match rejected");
            self.grid.set_owner(from, None);
            self.grid.set_owner(to, None);
            self.events.push(Event::MatchRejected { by: which, from, to });
            return;
        };

        debug!(?which, %from, %to, turns = crate::solver::count_turns(&path), "match");
        let Content::Tile(group) = self.grid.content(from) else {
            return;
        };
        let connection = ConnectionId(self.next_connection);
        self.next_connection += 1;
        self.connections.insert(
            connection,
            Connection {
                from,
                to,
                group,
                path,
            },
        );
        self.events.push(Event::MatchValidated {
            by: which,
            from,
            to,
            connection,
        });

        if let Some(token) = self.tokens.iter_mut().find(|t| t.id == which) {
            token.score += self.config.score_per_match;
            let score = token.score;
            self.events.push(Event::ScoreChanged { token: which, score });
        }

        self.grid.eliminate(from);
        self.grid.eliminate(to);
        self.remaining_tiles = self.remaining_tiles.saturating_sub(2);

        if self.remaining_tiles == 0 {
            self.finish(EndReason::Success);
        } else if !self.has_next_step() {
            self.finish(EndReason::Stuck);
        }

        let hint_hit = self
            .hint_pair
            .is_some_and(|(a, b)| [a, b].iter().any(|p| *p == from || *p == to));
        if hint_hit {
            self.remove_current_hint();
            if self.hint_active && self.state == SessionState::Playing {
                self.generate_hint();
            }
        }
    }

    /// Whether some active token can still reach a matchable pair.
    pub fn has_next_step(&mut self) -> bool {
        self.find_witness().is_some()
    }

    /// Scan from the token without the hint first, then the other one.
    fn find_witness(&mut self) -> Option<(Pos, Pos)> {
        let first = self.hint_for.map_or(TokenId::A, TokenId::other);
        let order = match self.mode {
            Mode::Single => vec![TokenId::A],
            Mode::Double => vec![first, first.other()],
        };
        let origins: Vec<Pos> = order
            .iter()
            .filter_map(|&id| self.token(id))
            .map(|t| t.cell(&self.geometry))
            .collect();
        scanner::find_witness_from(&mut self.solver, &self.grid, origins)
    }

    fn finish(&mut self, reason: EndReason) {
        let standing = match (self.mode, reason) {
            (Mode::Double, EndReason::Success | EndReason::TimeUp) => Some(self.standing()),
            _ => None,
        };
        let outcome = Outcome { reason, standing };
        info!(?reason, ?standing, "game over");
        self.held.clear();
        self.enter(SessionState::Stopped);
        self.outcome = Some(outcome);
        self.events.push(Event::Ended(outcome));
    }

    fn standing(&self) -> Standing {
        let score = |id| self.token(id).map_or(0, |t| t.score);
        let (a, b) = (score(TokenId::A), score(TokenId::B));
        match a.cmp(&b) {
            std::cmp::Ordering::Greater => Standing::Winner(TokenId::A),
            std::cmp::Ordering::Less => Standing::Winner(TokenId::B),
            std::cmp::Ordering::Equal => Standing::Tie,
        }
    }

    // ----- items -----

    fn spawn_item(&mut self) {
        let kind = ItemKind::ALL[self.rng.below(ItemKind::ALL.len())];
        let covered: BTreeSet<Pos> = self.covered_cells();
        let free: Vec<Pos> = self
            .grid
            .positions()
            .filter(|&p| self.grid.is_empty(p) && !covered.contains(&p))
            .collect();
        if let Some(&at) = self.rng.choose(&free) {
            debug!(?kind, %at, "item spawned");
            self.grid.spawn_item(at, kind);
        }
    }

    fn consume_item(&mut self, which: TokenId, at: Pos) {
        let Content::Item(kind) = self.grid.content(at) else {
            return;
        };
        debug!(?which, ?kind, %at, "item picked up");
        self.grid.consume_item(at);
        self.events.push(Event::ItemConsumed { by: which, kind, at });
        match kind {
            ItemKind::ExtendTime => self.change_time(i64::from(self.config.extend_secs)),
            ItemKind::Shuffle => self.shuffle(),
            ItemKind::Hint => self.enable_hint(which),
        }
    }

    /// Cells under any corner of any token.
    fn covered_cells(&self) -> BTreeSet<Pos> {
        self.tokens
            .iter()
            .flat_map(|t| t.footprint(&self.geometry))
            .collect()
    }

    /// Permute the board, keeping the cells under tokens clear.
    pub fn shuffle(&mut self) {
        self.remove_current_hint();

        let n = self.grid.len();
        let mut order: Vec<usize> = (0..n).collect();
        self.rng.shuffle(&mut order);
        self.rng.shuffle(&mut order);

        let protected: BTreeSet<usize> = self
            .covered_cells()
            .into_iter()
            .map(|p| self.grid.index(p))
            .collect();
        let cells = self.grid.cells();
        for &slot in &protected {
            if cells[order[slot]].is_empty() {
                continue;
            }
            let free = (0..n).find(|&j| !protected.contains(&j) && cells[order[j]].is_empty());
            match free {
                Some(j) => order.swap(slot, j),
                None => warn!(slot, "no empty cell to clear under token"),
            }
        }
        self.grid.permute(&order);

        let mut moved_to = vec![0; n];
        for (new, &old) in order.iter().enumerate() {
            moved_to[old] = new;
        }
        for token in &mut self.tokens {
            token.pending = token
                .pending
                .map(|p| self.grid.pos_of(moved_to[self.grid.index(p)]));
        }
        debug!("board shuffled");

        if self.hint_active {
            self.generate_hint();
        }
    }

    // ----- hints -----

    /// Give `which` a fresh hint for the configured duration.
    pub fn enable_hint(&mut self, which: TokenId) {
        self.hint_remaining = self.config.hint_duration;
        self.hint_active = true;
        self.hint_for = Some(which);
        self.generate_hint();
    }

    fn generate_hint(&mut self) {
        self.remove_current_hint();
        match self.find_witness() {
            Some((a, b)) => {
                self.grid.mark_hint(a);
                self.grid.mark_hint(b);
                self.hint_pair = Some((a, b));
            }
            None => self.finish(EndReason::Stuck),
        }
    }

    fn remove_current_hint(&mut self) {
        if let Some((a, b)) = self.hint_pair.take() {
            self.grid.unmark_hint(a);
            self.grid.unmark_hint(b);
        }
    }

    fn expire_hint(&mut self) {
        self.hint_active = false;
        self.hint_for = None;
        self.hint_remaining = Duration::ZERO;
        if self.state != SessionState::Stopped {
            self.remove_current_hint();
        }
    }
}
