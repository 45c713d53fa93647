//! Stetris: single-tile falling-block game for the Sense HAT LED matrix and the terminal.

mod app;
mod game;
mod input;
mod logging;
mod playfield;
mod sensehat;
mod theme;
mod ui;

use anyhow::Result;
use app::App;
use clap::{Parser, ValueEnum};
use log::{LevelFilter, info, warn};
use thiserror::Error;

/// Construction-time game constants. Not changed while the game runs.
#[derive(Debug, Clone)]
pub struct GameConfig {
    pub width: usize,
    pub height: usize,
    /// Driver tick interval in microseconds.
    pub tick_us: u64,
    pub rows_per_level: u32,
    /// Ticks per gravity step at level 0.
    pub initial_ticks_per_step: u32,
    /// Single block colour instead of random tile colours.
    pub mono: bool,
    pub seed: Option<u64>,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            width: 8,
            height: 8,
            tick_us: 10_000,
            rows_per_level: 2,
            initial_ticks_per_step: 50,
            mono: false,
            seed: None,
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("playfield must be at least 1x1, got {width}x{height}")]
    EmptyPlayfield { width: usize, height: usize },
    #[error("playfield {width}x{height} does not fit a terminal frame")]
    PlayfieldTooLarge { width: usize, height: usize },
    #[error("tick interval must be nonzero")]
    ZeroTick,
    #[error("rows per level must be at least 1")]
    ZeroRowsPerLevel,
    #[error("initial speed must be at least 1 tick per step")]
    ZeroSpeed,
}

impl GameConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.width == 0 || self.height == 0 {
            return Err(ConfigError::EmptyPlayfield {
                width: self.width,
                height: self.height,
            });
        }
        let (bw, bh) = ui::board_size(self.width, self.height);
        if bw.is_none() || bh.is_none() {
            return Err(ConfigError::PlayfieldTooLarge {
                width: self.width,
                height: self.height,
            });
        }
        if self.tick_us == 0 {
            return Err(ConfigError::ZeroTick);
        }
        if self.rows_per_level == 0 {
            return Err(ConfigError::ZeroRowsPerLevel);
        }
        if self.initial_ticks_per_step == 0 {
            return Err(ConfigError::ZeroSpeed);
        }
        Ok(())
    }
}

impl From<&Args> for GameConfig {
    fn from(args: &Args) -> Self {
        Self {
            width: args.width as usize,
            height: args.height as usize,
            tick_us: args.tick_us,
            rows_per_level: args.rows_per_level,
            initial_ticks_per_step: args.initial_speed,
            mono: args.mono,
            seed: args.seed,
        }
    }
}

fn main() -> Result<()> {
    let args = Args::parse();
    if let Some(path) = &args.log_file {
        logging::init_log(args.log_level, path)?;
    }
    let config = GameConfig::from(&args);
    config.validate()?;
    let theme = theme::Theme::load(args.theme.as_deref()).unwrap_or_else(|e| {
        warn!("theme not loaded, using defaults: {e}");
        theme::Theme::default()
    });
    info!("starting with {config:?}, output {:?}", args.output);
    let mut app = App::new(args, config, theme)?;
    app.run()?;
    Ok(())
}

/// Single-tile falling-block game on the Sense HAT LED matrix and/or the terminal.
#[derive(Debug, Parser)]
#[command(
    name = "stetris",
    version,
    about = "Single-tile falling-block game for the Raspberry Pi Sense HAT LED matrix and the terminal.",
    long_about = "Stetris drops one cell at a time onto a small playfield. Fill the bottom row to clear it; \
        every few rows the game speeds up. The game ends when the spawn cell is blocked.\n\n\
        CONTROLS (keyboard or Sense HAT joystick):\n  Left/Right  Move    Down  Drop    any key  New game    Enter  Quit\n\n\
        Vim keys h/l/j/k work too."
)]
pub struct Args {
    /// Where to draw: the terminal, the Sense HAT LED matrix, or both.
    #[arg(short, long, default_value = "console")]
    pub output: Output,

    /// Playfield width in cells. The LED matrix shows the top-left 8x8 cells.
    #[arg(long, default_value = "8", value_name = "COLS")]
    pub width: u16,

    /// Playfield height in cells.
    #[arg(long, default_value = "8", value_name = "ROWS")]
    pub height: u16,

    /// Driver tick interval in microseconds.
    #[arg(long, default_value = "10000", value_name = "USEC")]
    pub tick_us: u64,

    /// Cleared rows needed to advance one level.
    #[arg(long, default_value = "2", value_name = "N")]
    pub rows_per_level: u32,

    /// Ticks between gravity steps at level 0 (lower is faster).
    #[arg(long, default_value = "50", value_name = "TICKS")]
    pub initial_speed: u32,

    /// Draw every tile in one colour instead of random colours.
    #[arg(long)]
    pub mono: bool,

    /// Fixed seed for tile colours.
    #[arg(long, value_name = "SEED")]
    pub seed: Option<u64>,

    /// Disable the row-clear flash in the terminal.
    #[arg(long)]
    pub no_animation: bool,

    /// Path to theme file (btop-style theme[key]=\"value\"). Uses One Dark if not set.
    #[arg(short, long, value_name = "FILE")]
    pub theme: Option<std::path::PathBuf>,

    /// Write a log to this file.
    #[arg(long, value_name = "FILE")]
    pub log_file: Option<std::path::PathBuf>,

    /// Log level for --log-file (off, error, warn, info, debug, trace).
    #[arg(long, default_value = "info", value_name = "LEVEL")]
    pub log_level: LevelFilter,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum Output {
    #[default]
    Console,
    #[value(alias = "sensehat", alias = "led")]
    Matrix,
    Both,
}

impl Output {
    pub fn console(self) -> bool {
        matches!(self, Self::Console | Self::Both)
    }

    pub fn matrix(self) -> bool {
        matches!(self, Self::Matrix | Self::Both)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_args_match_default_config() {
        let args = Args::parse_from(["stetris"]);
        let config = GameConfig::from(&args);
        let default = GameConfig::default();
        assert_eq!(config.width, default.width);
        assert_eq!(config.height, default.height);
        assert_eq!(config.tick_us, default.tick_us);
        assert_eq!(config.rows_per_level, default.rows_per_level);
        assert_eq!(config.initial_ticks_per_step, default.initial_ticks_per_step);
        assert_eq!(args.output, Output::Console);
        assert_eq!(args.log_level, LevelFilter::Info);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_parse_options() {
        let args = Args::parse_from([
            "stetris", "--output", "both", "--width", "10", "--mono", "--seed", "5", "--log-level", "debug",
        ]);
        assert!(args.output.console() && args.output.matrix());
        let config = GameConfig::from(&args);
        assert_eq!(config.width, 10);
        assert!(config.mono);
        assert_eq!(config.seed, Some(5));
        assert_eq!(args.log_level, LevelFilter::Debug);
        assert!(Args::parse_from(["stetris", "-o", "led"]).output.matrix());
    }

    #[test]
    fn test_validate_rejects_zero_constants() {
        let zero_speed = GameConfig {
            initial_ticks_per_step: 0,
            ..GameConfig::default()
        };
        assert_eq!(zero_speed.validate(), Err(ConfigError::ZeroSpeed));
        let empty = GameConfig {
            height: 0,
            ..GameConfig::default()
        };
        assert!(matches!(empty.validate(), Err(ConfigError::EmptyPlayfield { .. })));
        let zero_rows = GameConfig {
            rows_per_level: 0,
            ..GameConfig::default()
        };
        assert_eq!(zero_rows.validate(), Err(ConfigError::ZeroRowsPerLevel));
    }

    #[test]
    fn test_validate_rejects_playfield_wider_than_a_frame() {
        let wide = GameConfig {
            width: 40_000,
            height: 4,
            ..GameConfig::default()
        };
        assert_eq!(
            wide.validate(),
            Err(ConfigError::PlayfieldTooLarge {
                width: 40_000,
                height: 4
            })
        );
        let tall = GameConfig {
            height: usize::from(u16::MAX),
            ..GameConfig::default()
        };
        assert!(matches!(tall.validate(), Err(ConfigError::PlayfieldTooLarge { .. })));
        let widest = GameConfig {
            width: (usize::from(u16::MAX) - 2) / 2,
            ..GameConfig::default()
        };
        assert!(widest.validate().is_ok());
    }
}
