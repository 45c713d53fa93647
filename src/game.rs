//! Game state: single falling tile, row clears, level/speed, game over and restart.

use crate::GameConfig;
use crate::input::Key;
use crate::playfield::{Coord, Playfield, TileColor};
use log::{debug, info};
use rand::SeedableRng;
use rand::rngs::StdRng;

/// Top-level run state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Active,
    GameOver,
}

/// What one call to [`Game::step`] did. Render adapters redraw on `changed` and
/// may animate on the event flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StepResult {
    pub changed: bool,
    pub row_cleared: bool,
    pub tile_added: bool,
    pub game_over: bool,
}

#[derive(Debug)]
pub struct Game {
    pub playfield: Playfield,
    /// Tiles spawned this game.
    pub tiles: u32,
    /// Rows cleared this game.
    pub rows: u32,
    pub score: u32,
    pub level: u32,
    state: RunState,
    active_tile: Coord,
    /// Driver iterations since the last gravity step, wraps at `ticks_per_step`.
    tick: u32,
    /// Never below 1.
    ticks_per_step: u32,
    rows_per_level: u32,
    initial_ticks_per_step: u32,
    mono: bool,
    rng: StdRng,
}

impl Game {
    /// New game record in GAME_OVER with an empty playfield; any key starts play.
    pub fn new(config: &GameConfig) -> Self {
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };
        Self {
            playfield: Playfield::new(config.width, config.height),
            tiles: 0,
            rows: 0,
            score: 0,
            level: 0,
            state: RunState::GameOver,
            active_tile: Coord::default(),
            tick: 0,
            ticks_per_step: config.initial_ticks_per_step.max(1),
            rows_per_level: config.rows_per_level.max(1),
            initial_ticks_per_step: config.initial_ticks_per_step.max(1),
            mono: config.mono,
            rng,
        }
    }

    #[inline]
    pub fn state(&self) -> RunState {
        self.state
    }

    #[inline]
    pub fn is_active(&self) -> bool {
        self.state == RunState::Active
    }

    /// Coordinate of the falling tile; meaningful only while active.
    #[cfg(test)]
    pub fn active_tile(&self) -> Coord {
        self.active_tile
    }

    #[cfg(test)]
    pub fn tick(&self) -> u32 {
        self.tick
    }

    #[inline]
    pub fn ticks_per_step(&self) -> u32 {
        self.ticks_per_step
    }

    /// Called by the driver once after every `step`.
    pub fn advance_tick(&mut self) {
        self.tick = (self.tick + 1) % self.ticks_per_step;
    }

    /// One driver iteration: key handling, then a gravity step when the tick
    /// counter is 0, then restart from GAME_OVER on any nonzero key.
    pub fn step(&mut self, key: Key) -> StepResult {
        let mut result = StepResult::default();

        if self.is_active() {
            result.changed = match key {
                Key::Left => self.move_left(),
                Key::Right => self.move_right(),
                Key::Down => self.hard_drop(),
                _ => false,
            };

            if self.tick == 0 {
                self.gravity_step(&mut result);
            }
        }

        if self.state == RunState::GameOver && !key.is_none() {
            self.new_game();
            result.changed = true;
            result.tile_added = true;
        }

        result.game_over = self.state == RunState::GameOver;
        result
    }

    fn gravity_step(&mut self, result: &mut StepResult) {
        result.changed = true;

        if self.clear_bottom_row() {
            result.row_cleared = true;
            self.rows += 1;
            self.score += self.level + 1;
            debug!("row cleared: rows={} score={}", self.rows, self.score);
            if self.rows % self.rows_per_level == 0 {
                self.advance_level();
            }
        }

        // A row shift or hard drop can leave the active coordinate empty.
        if !self.playfield.is_occupied(self.active_tile) || !self.move_down() {
            if self.spawn_tile() {
                result.tile_added = true;
                self.tiles += 1;
            } else {
                self.game_over();
            }
        }
    }

    fn new_game(&mut self) {
        self.state = RunState::Active;
        self.tiles = 0;
        self.rows = 0;
        self.score = 0;
        self.level = 0;
        self.tick = 0;
        self.playfield.reset_all();
        // Cannot fail on an empty board.
        self.spawn_tile();
        self.tiles += 1;
        info!("new game: {}x{} playfield", self.playfield.width, self.playfield.height);
    }

    fn game_over(&mut self) {
        self.state = RunState::GameOver;
        self.ticks_per_step = self.initial_ticks_per_step;
        info!(
            "game over: tiles={} rows={} score={} level={}",
            self.tiles, self.rows, self.score, self.level
        );
    }

    fn advance_level(&mut self) {
        self.level += 1;
        self.ticks_per_step = match self.ticks_per_step {
            0..=1 => 1,
            n @ 2..=10 => n - 1,
            n @ 11..=20 => n - 2,
            n => n.saturating_sub(10).max(1),
        };
        info!("level {}: ticks per step {}", self.level, self.ticks_per_step);
    }

    /// Places a tile at the top-center column. False if that cell is taken.
    fn spawn_tile(&mut self) -> bool {
        self.active_tile = Coord::new((self.playfield.width - 1) / 2, 0);
        if self.playfield.is_occupied(self.active_tile) {
            return false;
        }
        let color = (!self.mono).then(|| TileColor::random(&mut self.rng));
        self.playfield.place(self.active_tile, color);
        true
    }

    fn move_to(&mut self, to: Coord) {
        self.playfield.copy_cell(to, self.active_tile);
        self.playfield.clear_cell(self.active_tile);
        self.active_tile = to;
    }

    fn move_left(&mut self) -> bool {
        let Coord { x, y } = self.active_tile;
        if x > 0 && !self.playfield.is_occupied(Coord::new(x - 1, y)) {
            self.move_to(Coord::new(x - 1, y));
            return true;
        }
        false
    }

    fn move_right(&mut self) -> bool {
        let Coord { x, y } = self.active_tile;
        if x + 1 < self.playfield.width && !self.playfield.is_occupied(Coord::new(x + 1, y)) {
            self.move_to(Coord::new(x + 1, y));
            return true;
        }
        false
    }

    fn move_down(&mut self) -> bool {
        let Coord { x, y } = self.active_tile;
        if y < self.playfield.bottom() && !self.playfield.is_occupied(Coord::new(x, y + 1)) {
            self.move_to(Coord::new(x, y + 1));
            return true;
        }
        false
    }

    /// Drops the tile as far as it goes and forces a gravity step.
    fn hard_drop(&mut self) -> bool {
        let mut moved = false;
        while self.move_down() {
            moved = true;
        }
        self.tick = 0;
        moved
    }

    /// If the landing row is full, shifts every row down by one and empties row 0.
    fn clear_bottom_row(&mut self) -> bool {
        let bottom = self.playfield.bottom();
        if !self.playfield.is_row_full(bottom) {
            return false;
        }
        for y in (1..=bottom).rev() {
            self.playfield.copy_row(y, y - 1);
        }
        self.playfield.clear_row(0);
        true
    }
}
