//! Game configuration: board size, tile groups, timers, pixel geometry.

use std::time::Duration;
use thiserror::Error;

/// Everything a session needs to know up front. Built from CLI args in `main`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GameConfig {
    pub rows: usize,
    pub cols: usize,
    /// Number of distinct tile groups (content ids 1..=groups).
    pub groups: u8,
    /// Total tiles on a fresh board; split evenly across groups.
    pub tiles: usize,
    pub initial_time_secs: u32,
    /// Maximum direction changes on a connecting path.
    pub max_turns: u32,
    pub cell_width: i32,
    pub cell_height: i32,
    /// Side of the token's square hit box, in pixels.
    pub token_size: i32,
    /// Side of an item's square hit box, centered in its cell.
    pub item_size: i32,
    /// Pixels a token travels per poll tick.
    pub move_step: i32,
    pub score_per_match: u32,
    pub extend_secs: u32,
    pub hint_duration: Duration,
    pub poll_interval: Duration,
    pub connection_display: Duration,
    /// Chance (percent) that an item appears on a countdown tick.
    pub item_spawn_percent: u8,
    pub placement_trials: u32,
    pub seed: Option<u64>,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            rows: 15,
            cols: 30,
            groups: 5,
            tiles: 200,
            initial_time_secs: 60,
            max_turns: 2,
            cell_width: 40,
            cell_height: 40,
            token_size: 20,
            item_size: 20,
            move_step: 2,
            score_per_match: 5,
            extend_secs: 30,
            hint_duration: Duration::from_millis(10_000),
            poll_interval: Duration::from_millis(20),
            connection_display: Duration::from_millis(1_000),
            item_spawn_percent: 40,
            placement_trials: 1_000,
            seed: None,
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("board must be at least 3x3 so tokens can start off the edge (got {rows}x{cols})")]
    BoardTooSmall { rows: usize, cols: usize },
    #[error("need at least one tile group")]
    NoGroups,
    #[error("a fresh board needs at least one pair of tiles")]
    NoTiles,
    #[error("{tiles} tiles do not split evenly into {groups} groups")]
    UnevenGroups { tiles: usize, groups: u8 },
    #[error("each group needs an even number of tiles (got {per_group})")]
    OddGroupSize { per_group: usize },
    #[error("{tiles} tiles leave fewer than two free cells on a {rows}x{cols} board")]
    TooManyTiles { tiles: usize, rows: usize, cols: usize },
    #[error("cell size {width}x{height} must be positive and even")]
    BadCellSize { width: i32, height: i32 },
    #[error("{what} size {size} must be positive, even and fit inside a cell")]
    BadHitBox { what: &'static str, size: i32 },
    #[error("move step must be between 1 and half the token size (got {0})")]
    BadMoveStep(i32),
    #[error("item spawn chance is a percentage (got {0})")]
    BadSpawnChance(u8),
    #[error("poll interval must be at least 1 ms")]
    ZeroPollInterval,
}

impl GameConfig {
    /// Check the board invariants: equal, even group sizes and room for the tokens.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.rows < 3 || self.cols < 3 {
            return Err(ConfigError::BoardTooSmall {
                rows: self.rows,
                cols: self.cols,
            });
        }
        if self.groups == 0 {
            return Err(ConfigError::NoGroups);
        }
        if self.tiles == 0 {
            return Err(ConfigError::NoTiles);
        }
        if self.tiles % self.groups as usize != 0 {
            return Err(ConfigError::UnevenGroups {
                tiles: self.tiles,
                groups: self.groups,
            });
        }
        let per_group = self.tiles_per_group();
        if per_group % 2 != 0 {
            return Err(ConfigError::OddGroupSize { per_group });
        }
        if self.tiles + 1 >= self.rows * self.cols {
            return Err(ConfigError::TooManyTiles {
                tiles: self.tiles,
                rows: self.rows,
                cols: self.cols,
            });
        }
        if self.cell_width <= 0
            || self.cell_height <= 0
            || self.cell_width % 2 != 0
            || self.cell_height % 2 != 0
        {
            return Err(ConfigError::BadCellSize {
                width: self.cell_width,
                height: self.cell_height,
            });
        }
        let smallest_side = self.cell_width.min(self.cell_height);
        for (what, size) in [("token", self.token_size), ("item", self.item_size)] {
            if size <= 0 || size % 2 != 0 || size > smallest_side {
                return Err(ConfigError::BadHitBox { what, size });
            }
        }
        if self.move_step <= 0 || self.move_step > self.token_size / 2 {
            return Err(ConfigError::BadMoveStep(self.move_step));
        }
        if self.item_spawn_percent > 100 {
            return Err(ConfigError::BadSpawnChance(self.item_spawn_percent));
        }
        if self.poll_interval.is_zero() {
            return Err(ConfigError::ZeroPollInterval);
        }
        Ok(())
    }

    #[inline]
    pub fn tiles_per_group(&self) -> usize {
        self.tiles / self.groups.max(1) as usize
    }
}
