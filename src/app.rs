//! App: terminal init, main loop, tick scheduling and key handling.

use crate::config::GameConfig;
use crate::grid::Direction;
use crate::input::{Action, is_save_key, key_to_action};
use crate::rng::SessionRng;
use crate::session::{Command, ConnectionId, Event as SessionEvent, Mode, Session, SessionState, Tick};
use crate::storage;
use crate::theme::Theme;
use crate::ui::{self, ClearFade};
use anyhow::Result;
use crossterm::event::{self, Event, KeyEvent, KeyEventKind};
use ratatui::DefaultTerminal;
use std::collections::HashMap;
use std::path::PathBuf;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Without release events a fresh press stays held this long, covering the
/// terminal's auto-repeat delay.
const HOLD_INITIAL_MS: u64 = 300;
/// Without release events a repeating key lapses this long after its last repeat.
const HOLD_REPEAT_MS: u64 = 80;
const MESSAGE_TTL: Duration = Duration::from_secs(3);
const SECOND: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Screen {
    Menu,
    Game,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MenuItem {
    Single,
    Multiplayer,
    Load,
    Quit,
}

impl MenuItem {
    pub const ALL: [Self; 4] = [Self::Single, Self::Multiplayer, Self::Load, Self::Quit];

    pub const fn label(self) -> &'static str {
        match self {
            Self::Single => "Single player",
            Self::Multiplayer => "Multiplayer",
            Self::Load => "Load game",
            Self::Quit => "Quit",
        }
    }

    fn index(self) -> usize {
        Self::ALL.iter().position(|&m| m == self).unwrap_or(0)
    }

    fn next(self) -> Self {
        Self::ALL[(self.index() + 1) % Self::ALL.len()]
    }

    fn prev(self) -> Self {
        Self::ALL[(self.index() + Self::ALL.len() - 1) % Self::ALL.len()]
    }
}

/// A movement key the player is holding down.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct HeldKey {
    pressed: Instant,
    last_seen: Instant,
}

impl HeldKey {
    fn new(now: Instant) -> Self {
        Self {
            pressed: now,
            last_seen: now,
        }
    }

    /// Whether the key counts as released when the terminal never reports releases.
    fn lapsed(&self, now: Instant) -> bool {
        let grace = if self.last_seen == self.pressed {
            HOLD_INITIAL_MS
        } else {
            HOLD_REPEAT_MS
        };
        now.saturating_duration_since(self.last_seen) > Duration::from_millis(grace)
    }
}

pub struct App {
    config: GameConfig,
    theme: Theme,
    save_path: PathBuf,
    screen: Screen,
    menu_selected: MenuItem,
    session: Option<Session>,
    held: HashMap<Command, HeldKey>,
    /// Set once the terminal is known to report key releases.
    release_events: bool,
    last_frame: Instant,
    poll_elapsed: Duration,
    second_elapsed: Duration,
    pending_clears: Vec<(Instant, ConnectionId)>,
    fade: ClearFade,
    message: Option<(String, Instant)>,
    games: u64,
}

impl App {
    pub fn new(config: GameConfig, theme: Theme, save_path: PathBuf) -> Self {
        Self {
            config,
            theme,
            save_path,
            screen: Screen::Menu,
            menu_selected: MenuItem::Single,
            session: None,
            held: HashMap::new(),
            release_events: false,
            last_frame: Instant::now(),
            poll_elapsed: Duration::ZERO,
            second_elapsed: Duration::ZERO,
            pending_clears: Vec::new(),
            fade: ClearFade::default(),
            message: None,
            games: 0,
        }
    }

    pub fn run(&mut self) -> Result<()> {
        use crossterm::{
            event::{KeyboardEnhancementFlags, PopKeyboardEnhancementFlags, PushKeyboardEnhancementFlags},
            execute,
            terminal::{
                EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode,
                supports_keyboard_enhancement,
            },
        };

        enable_raw_mode()?;
        let mut stdout = std::io::stdout();
        execute!(stdout, EnterAlternateScreen)?;

        // Release events let held keys stop exactly when let go.
        self.release_events = supports_keyboard_enhancement().unwrap_or(false);
        let _ = execute!(
            stdout,
            PushKeyboardEnhancementFlags(KeyboardEnhancementFlags::REPORT_EVENT_TYPES)
        );
        info!(release_events = self.release_events, "terminal ready");

        let mut terminal = ratatui::DefaultTerminal::new(ratatui::backend::CrosstermBackend::new(stdout))?;
        let result = self.run_loop(&mut terminal);

        let _ = execute!(std::io::stdout(), PopKeyboardEnhancementFlags);
        execute!(std::io::stdout(), LeaveAlternateScreen)?;
        disable_raw_mode()?;

        result
    }

    fn run_loop(&mut self, terminal: &mut DefaultTerminal) -> Result<()> {
        self.last_frame = Instant::now();
        loop {
            let now = Instant::now();
            self.advance_clock(now);
            self.fade.settle();
            if self
                .message
                .as_ref()
                .is_some_and(|(_, at)| now.saturating_duration_since(*at) > MESSAGE_TTL)
            {
                self.message = None;
            }

            terminal.draw(|f| {
                ui::draw(
                    f,
                    &self.theme,
                    self.screen,
                    self.menu_selected,
                    self.session.as_ref(),
                    self.message.as_ref().map(|(m, _)| m.as_str()),
                    &mut self.fade,
                    now,
                );
            })?;

            // ~60 FPS
            let frame_duration = Duration::from_millis(16);
            let timeout = frame_duration.saturating_sub(now.elapsed());
            if event::poll(timeout)? {
                while event::poll(Duration::ZERO)? {
                    if let Event::Key(key) = event::read()? {
                        if !self.handle_key(key, Instant::now()) {
                            return Ok(());
                        }
                    }
                }
            }
        }
    }

    /// Feed elapsed wall time to the session as ticks.
    fn advance_clock(&mut self, now: Instant) {
        let elapsed = now.saturating_duration_since(self.last_frame);
        self.last_frame = now;

        let mut due = Vec::new();
        self.pending_clears.retain(|&(at, id)| {
            let ready = at <= now;
            if ready {
                due.push(id);
            }
            !ready
        });

        if let Some(session) = self.session.as_mut() {
            for id in due {
                session.tick(Tick::ClearConnection(id));
            }
            if session.state() == SessionState::Playing {
                if !self.release_events {
                    self.held.retain(|_, key| !key.lapsed(now));
                }
                session.set_held(self.held.keys().copied());

                self.poll_elapsed += elapsed;
                let poll = self.config.poll_interval;
                while self.poll_elapsed >= poll && session.state() == SessionState::Playing {
                    self.poll_elapsed -= poll;
                    session.tick(Tick::Poll);
                }
                self.second_elapsed += elapsed;
                while self.second_elapsed >= SECOND && session.state() == SessionState::Playing {
                    self.second_elapsed -= SECOND;
                    session.tick(Tick::Countdown);
                }
            }
        }
        self.drain_session_events(now);
    }

    /// Returns `false` when the app should exit.
    fn handle_key(&mut self, key: KeyEvent, now: Instant) -> bool {
        let action = key_to_action(key);
        if key.kind == KeyEventKind::Release {
            self.release_events = true;
            if let Action::Move(command) = action {
                self.held.remove(&command);
                if let Some(session) = self.session.as_mut() {
                    session.release(command);
                }
            }
            return true;
        }
        match self.screen {
            Screen::Menu => self.handle_menu_key(action),
            Screen::Game => {
                self.handle_game_key(key, action, now);
                true
            }
        }
    }

    fn handle_menu_key(&mut self, action: Action) -> bool {
        match action {
            Action::Move(command) => match command.dir {
                Direction::Up | Direction::Left => {
                    self.menu_selected = self.menu_selected.prev();
                }
                Direction::Down | Direction::Right => {
                    self.menu_selected = self.menu_selected.next();
                }
            },
            Action::Confirm => match self.menu_selected {
                MenuItem::Single => self.start_new(Mode::Single),
                MenuItem::Multiplayer => self.start_new(Mode::Double),
                MenuItem::Load => self.load_game(),
                MenuItem::Quit => return false,
            },
            Action::Quit => return false,
            Action::Pause | Action::None => {}
        }
        true
    }

    fn handle_game_key(&mut self, key: KeyEvent, action: Action, now: Instant) {
        let Some(session) = self.session.as_mut() else {
            self.leave_game();
            return;
        };
        let mut leave = false;
        let mut save = false;
        match session.state() {
            SessionState::PreparedNew | SessionState::PreparedLoad => match action {
                Action::Quit => leave = true,
                _ if session.state() == SessionState::PreparedNew => session.start_game(),
                _ => session.resume_game(),
            },
            SessionState::Playing => match action {
                Action::Move(command) => {
                    self.held
                        .entry(command)
                        .and_modify(|held| held.last_seen = now)
                        .or_insert_with(|| HeldKey::new(now));
                    session.hold(command);
                }
                Action::Pause | Action::Quit => {
                    session.pause_game();
                    self.held.clear();
                }
                Action::Confirm | Action::None => {}
            },
            SessionState::Paused if is_save_key(key) => save = true,
            SessionState::Paused => match action {
                Action::Pause | Action::Confirm => session.resume_game(),
                Action::Quit => {
                    session.stop_game();
                    leave = true;
                }
                Action::Move(_) | Action::None => {}
            },
            SessionState::Stopped => session.request_back_to_menu(),
            SessionState::Unprepared => leave = true,
        }
        if save {
            self.save();
        }
        if leave {
            self.leave_game();
        } else {
            self.drain_session_events(now);
        }
    }

    fn drain_session_events(&mut self, now: Instant) {
        let Some(session) = self.session.as_mut() else {
            return;
        };
        let mut back = false;
        for event in session.drain_events() {
            match event {
                SessionEvent::MatchValidated { connection, .. } => {
                    self.pending_clears
                        .push((now + self.config.connection_display, connection));
                    if let Some(c) = session.connection(connection) {
                        self.fade.push([(c.from, c.group), (c.to, c.group)]);
                    }
                }
                SessionEvent::ItemConsumed { by, kind, at } => {
                    debug!(?by, ?kind, %at, "item picked up");
                }
                SessionEvent::Ended(outcome) => {
                    info!(?outcome, "game over");
                    self.held.clear();
                }
                SessionEvent::BackToMenu => back = true,
                SessionEvent::MatchRejected { .. } | SessionEvent::ScoreChanged { .. } => {}
            }
        }
        if back {
            self.leave_game();
        }
    }

    fn next_rng(&mut self) -> SessionRng {
        self.games += 1;
        match self.config.seed {
            Some(seed) => SessionRng::new(seed.wrapping_add(self.games - 1)),
            None => SessionRng::from_random(),
        }
    }

    fn start_new(&mut self, mode: Mode) {
        let mut session = Session::new(self.config.clone(), self.next_rng());
        match session.prepare_new_game(mode) {
            Ok(()) => self.enter_game(session),
            Err(err) => {
                warn!(%err, "could not prepare a new game");
                self.flash(format!("Could not generate a board: {err}"));
            }
        }
    }

    fn load_game(&mut self) {
        let snapshot = match storage::load_snapshot(&self.save_path, self.config.rows, self.config.cols) {
            Ok(snapshot) => snapshot,
            Err(err) => {
                warn!("load failed: {err:#}");
                self.flash(format!("Load failed: {err:#}"));
                return;
            }
        };
        let mut session = Session::new(self.config.clone(), self.next_rng());
        match session.prepare_saved_game(snapshot) {
            Ok(()) => self.enter_game(session),
            Err(err) => {
                warn!(%err, "saved game rejected");
                self.flash(format!("Load failed: {err}"));
            }
        }
    }

    fn save(&mut self) {
        let Some(session) = self.session.as_ref() else {
            return;
        };
        match storage::save_snapshot(&self.save_path, &session.snapshot()) {
            Ok(()) => {
                info!(path = %self.save_path.display(), "game saved");
                self.flash(format!("Saved to {}", self.save_path.display()));
            }
            Err(err) => {
                warn!("save failed: {err:#}");
                self.flash(format!("Save failed: {err:#}"));
            }
        }
    }

    fn enter_game(&mut self, session: Session) {
        self.session = Some(session);
        self.screen = Screen::Game;
        self.reset_clock();
    }

    fn leave_game(&mut self) {
        self.session = None;
        self.screen = Screen::Menu;
        self.reset_clock();
    }

    fn reset_clock(&mut self) {
        self.held.clear();
        self.pending_clears.clear();
        self.fade.clear();
        self.poll_elapsed = Duration::ZERO;
        self.second_elapsed = Duration::ZERO;
        self.last_frame = Instant::now();
    }

    fn flash(&mut self, message: String) {
        self.message = Some((message, Instant::now()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossterm::event::{KeyCode, KeyModifiers};
    use crate::grid::TokenId;

    fn press(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    fn release(code: KeyCode) -> KeyEvent {
        KeyEvent::new_with_kind(code, KeyModifiers::NONE, KeyEventKind::Release)
    }

    fn app(name: &str) -> App {
        let config = GameConfig {
            seed: Some(7),
            ..GameConfig::default()
        };
        let path = std::env::temp_dir().join(format!("qlinktui-app-{}-{name}.txt", std::process::id()));
        App::new(config, Theme::default(), path)
    }

    fn state(app: &App) -> Option<SessionState> {
        app.session.as_ref().map(Session::state)
    }

    #[test]
    fn test_menu_wraps_around() {
        assert_eq!(MenuItem::Single.prev(), MenuItem::Quit);
        assert_eq!(MenuItem::Quit.next(), MenuItem::Single);
        assert_eq!(MenuItem::Single.next(), MenuItem::Multiplayer);
    }

    #[test]
    fn test_held_key_lapses_without_release() {
        let t0 = Instant::now();
        let mut key = HeldKey::new(t0);
        assert!(!key.lapsed(t0 + Duration::from_millis(HOLD_INITIAL_MS)));
        assert!(key.lapsed(t0 + Duration::from_millis(HOLD_INITIAL_MS + 1)));
        key.last_seen = t0 + Duration::from_millis(400);
        assert!(key.lapsed(t0 + Duration::from_millis(400 + HOLD_REPEAT_MS + 1)));
    }

    #[test]
    fn test_menu_to_game_and_back() {
        let mut app = app("flow");
        let now = Instant::now();
        assert!(app.handle_key(press(KeyCode::Enter), now));
        assert_eq!(app.screen, Screen::Game);
        assert_eq!(state(&app), Some(SessionState::PreparedNew));

        app.handle_key(press(KeyCode::Char('x')), now);
        assert_eq!(state(&app), Some(SessionState::Playing));
        app.handle_key(press(KeyCode::Char('p')), now);
        assert_eq!(state(&app), Some(SessionState::Paused));
        app.handle_key(press(KeyCode::Char('p')), now);
        assert_eq!(state(&app), Some(SessionState::Playing));
        app.handle_key(press(KeyCode::Char('q')), now);
        app.handle_key(press(KeyCode::Char('q')), now);
        assert_eq!(app.screen, Screen::Menu);
        assert!(app.session.is_none());
    }

    #[test]
    fn test_quit_from_menu() {
        let mut app = app("quit");
        let now = Instant::now();
        app.handle_key(press(KeyCode::Up), now);
        assert_eq!(app.menu_selected, MenuItem::Quit);
        assert!(!app.handle_key(press(KeyCode::Enter), now));
    }

    #[test]
    fn test_countdown_follows_wall_clock() {
        let mut app = app("clock");
        let now = Instant::now();
        app.handle_key(press(KeyCode::Enter), now);
        app.handle_key(press(KeyCode::Enter), now);
        let start = app.last_frame;
        app.advance_clock(start + Duration::from_millis(1_010));
        let session = app.session.as_ref().expect("session");
        assert_eq!(session.remaining_secs(), 59);
    }

    #[test]
    fn test_release_stops_holding() {
        let mut app = app("release");
        let now = Instant::now();
        app.handle_key(press(KeyCode::Enter), now);
        app.handle_key(press(KeyCode::Enter), now);
        app.handle_key(press(KeyCode::Char('d')), now);
        let right = Command::new(TokenId::A, Direction::Right);
        assert!(app.held.contains_key(&right));
        assert!(app.session.as_ref().is_some_and(|s| s.is_held(right)));
        app.handle_key(release(KeyCode::Char('d')), now);
        assert!(app.release_events);
        assert!(app.held.is_empty());
        assert!(app.session.as_ref().is_some_and(|s| !s.is_held(right)));
    }

    #[test]
    fn test_save_while_paused_writes_file() {
        let mut app = app("save");
        let now = Instant::now();
        app.handle_key(press(KeyCode::Enter), now);
        app.handle_key(press(KeyCode::Enter), now);
        app.handle_key(press(KeyCode::Char('p')), now);
        app.handle_key(press(KeyCode::Char('s')), now);
        assert!(app.save_path.exists());
        assert!(app.message.as_ref().is_some_and(|(m, _)| m.starts_with("Saved")));

        // Back to the menu and load it again.
        app.handle_key(press(KeyCode::Char('q')), now);
        app.menu_selected = MenuItem::Load;
        app.handle_key(press(KeyCode::Enter), now);
        assert_eq!(state(&app), Some(SessionState::PreparedLoad));
        let _ = std::fs::remove_file(&app.save_path);
    }
}
