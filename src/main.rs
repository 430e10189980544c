//! qlinktui: QLink/Lianliankan-style tile matching for one or two players in the terminal.

mod app;
mod config;
mod grid;
mod input;
mod rng;
mod scanner;
mod session;
mod snapshot;
mod solver;
mod storage;
mod theme;
mod token;
mod ui;

use anyhow::{Context, Result};
use app::App;
use clap::{Parser, ValueEnum};
use config::GameConfig;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing_subscriber::EnvFilter;

fn main() -> Result<()> {
    let args = Args::parse();
    if let Some(path) = args.log_file.as_deref() {
        init_logging(path, &args.log)?;
    }
    let config = args.game_config();
    config.validate().context("invalid game options")?;
    let theme = theme::Theme::load(args.theme.as_deref(), args.palette).unwrap_or_default();
    let save_path = args.save_file.clone().unwrap_or_else(storage::default_save_path);
    tracing::info!(?config, save = %save_path.display(), "starting");

    let mut app = App::new(config, theme, save_path);
    app.run()?;
    Ok(())
}

/// Log to a file; the terminal belongs to the game.
fn init_logging(path: &Path, filter: &str) -> Result<()> {
    let file = std::fs::File::create(path)
        .with_context(|| format!("creating log file {}", path.display()))?;
    let filter = EnvFilter::try_new(filter).with_context(|| format!("bad log filter {filter:?}"))?;
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::sync::Mutex::new(file))
        .with_ansi(false)
        .init();
    Ok(())
}

/// QLink-style tile matching in the terminal.
#[derive(Debug, Parser)]
#[command(
    name = "qlinktui",
    version,
    about = "QLink/Lianliankan-style tile matching in the terminal, for one or two players.",
    long_about = "qlinktui is a terminal take on QLink (Lianliankan).\n\n\
        Walk your token into a tile to choose it, then into another tile of the same colour. \
        The pair disappears if the two can be joined by a line with at most two turns that \
        passes only through empty cells. Clear the board before the time runs out.\n\n\
        Items appear on the board now and then: E adds time, S shuffles the tiles, H shows a hint.\n\n\
        CONTROLS:\n  WASD        Move player 1    Arrows      Move player 2\n  \
        P           Pause / resume   S           Save (while paused)\n  \
        Q / Esc     Pause, then back to the menu\n\n\
        Use --theme to load a btop-style theme (e.g. onedark.theme)."
)]
pub struct Args {
    /// Board rows.
    #[arg(long, default_value = "15", value_name = "N")]
    pub rows: usize,

    /// Board columns.
    #[arg(long, default_value = "30", value_name = "N")]
    pub cols: usize,

    /// Number of tile groups (colours).
    #[arg(long, default_value = "5", value_name = "N")]
    pub groups: u8,

    /// Tiles on a fresh board; must split into even groups.
    #[arg(long, default_value = "200", value_name = "N")]
    pub tiles: usize,

    /// Starting time in seconds.
    #[arg(long, default_value = "60", value_name = "SECS")]
    pub time: u32,

    /// Maximum turns on a connecting line.
    #[arg(long, default_value = "2", value_name = "N")]
    pub turns: u32,

    /// Chance in percent that an item appears each second.
    #[arg(long, default_value = "40", value_name = "PERCENT")]
    pub spawn_chance: u8,

    /// How long a hint stays up, in ms.
    #[arg(long, default_value = "10000", value_name = "MS")]
    pub hint_ms: u64,

    /// Movement poll interval in ms. Tokens move 2 px per poll.
    #[arg(long, default_value = "20", value_name = "MS")]
    pub poll_ms: u64,

    /// Seed for reproducible boards.
    #[arg(long, value_name = "SEED")]
    pub seed: Option<u64>,

    /// Save file. Defaults to $XDG_DATA_HOME/qlinktui/save.txt.
    #[arg(long, value_name = "FILE")]
    pub save_file: Option<PathBuf>,

    /// Write logs to this file. Nothing is logged without it.
    #[arg(long, value_name = "FILE")]
    pub log_file: Option<PathBuf>,

    /// Log filter, e.g. "info" or "qlinktui=debug".
    #[arg(long, default_value = "info", value_name = "FILTER")]
    pub log: String,

    /// Path to theme file (btop-style theme[key]=\"value\"). Uses One Dark if not set.
    #[arg(short, long, value_name = "FILE")]
    pub theme: Option<PathBuf>,

    /// Colour palette: normal (theme), high-contrast, or colorblind.
    #[arg(long, default_value = "normal")]
    pub palette: Palette,
}

impl Args {
    fn game_config(&self) -> GameConfig {
        GameConfig {
            rows: self.rows,
            cols: self.cols,
            groups: self.groups,
            tiles: self.tiles,
            initial_time_secs: self.time,
            max_turns: self.turns,
            item_spawn_percent: self.spawn_chance,
            hint_duration: Duration::from_millis(self.hint_ms),
            poll_interval: Duration::from_millis(self.poll_ms),
            seed: self.seed,
            ..GameConfig::default()
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum Palette {
    #[default]
    Normal,

    #[value(alias = "highcontrast", alias = "contrast")]
    HighContrast,

    #[value(alias = "colourblind")]
    Colorblind,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_game_config() {
        let args = Args::parse_from(["qlinktui"]);
        assert_eq!(args.game_config(), GameConfig::default());
    }

    #[test]
    fn test_args_flow_into_config() {
        let args = Args::parse_from([
            "qlinktui", "--rows", "6", "--cols", "8", "--groups", "2", "--tiles", "12", "--seed", "3",
            "--palette", "contrast",
        ]);
        let config = args.game_config();
        assert_eq!((config.rows, config.cols, config.tiles), (6, 8, 12));
        assert_eq!(config.seed, Some(3));
        assert_eq!(args.palette, Palette::HighContrast);
        assert!(config.validate().is_ok());
    }
}
