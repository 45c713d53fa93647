//! App: terminal init, device setup, fixed-interval driver loop.

use crate::game::{Game, StepResult};
use crate::input::{InputSource, Key, Keyboard};
use crate::sensehat::{Joystick, LedMatrix};
use crate::theme::Theme;
use crate::{Args, GameConfig};
use anyhow::Result;
use crossterm::{execute, terminal::LeaveAlternateScreen};
use log::{info, trace, warn};
use ratatui::DefaultTerminal;
use std::thread;
use std::time::{Duration, Instant};
use tachyonfx::Effect;

pub struct App {
    args: Args,
    config: GameConfig,
    theme: Theme,
    game: Game,
    /// Present with `--output matrix|both`.
    matrix: Option<LedMatrix>,
    /// Polled in order; the first non-empty key wins.
    inputs: Vec<Box<dyn InputSource>>,
    /// TachyonFX flash over the board after a row clear.
    row_clear_effect: Option<Effect>,
    /// Last time we processed the row-clear effect (for delta).
    row_clear_effect_process_time: Option<Instant>,
}

impl App {
    pub fn new(args: Args, config: GameConfig, theme: Theme) -> Result<Self> {
        let mut inputs: Vec<Box<dyn InputSource>> = Vec::new();
        let matrix = if args.output.matrix() {
            let matrix = LedMatrix::open()?;
            inputs.push(Box::new(Joystick::open()?));
            Some(matrix)
        } else {
            None
        };
        inputs.push(Box::new(Keyboard));
        let game = Game::new(&config);
        Ok(Self {
            args,
            config,
            theme,
            game,
            matrix,
            inputs,
            row_clear_effect: None,
            row_clear_effect_process_time: None,
        })
    }

    pub fn run(&mut self) -> Result<()> {
        use crossterm::terminal::{EnterAlternateScreen, disable_raw_mode, enable_raw_mode};

        // Raw mode in every output mode so single key presses reach the keyboard source.
        enable_raw_mode()?;
        let result = if self.args.output.console() {
            let mut stdout = std::io::stdout();
            let result = execute!(stdout, EnterAlternateScreen)
                .map_err(anyhow::Error::from)
                .and_then(|()| {
                    let mut terminal = DefaultTerminal::new(ratatui::backend::CrosstermBackend::new(stdout))?;
                    self.run_loop(Some(&mut terminal))
                });
            leave_alternate_screen(&mut std::io::stdout());
            result
        } else {
            self.run_loop(None)
        };
        disable_raw_mode()?;

        result
    }

    fn run_loop(&mut self, mut terminal: Option<&mut DefaultTerminal>) -> Result<()> {
        let tick_interval = Duration::from_micros(self.config.tick_us);
        let initial = StepResult {
            changed: true,
            ..StepResult::default()
        };
        self.render(terminal.as_deref_mut(), initial)?;

        loop {
            let started = Instant::now();
            let key = first_key(&mut self.inputs)?;
            if key == Key::Confirm {
                info!(
                    "quit: tiles {} rows {} score {} level {} ({} ticks per step)",
                    self.game.tiles,
                    self.game.rows,
                    self.game.score,
                    self.game.level,
                    self.game.ticks_per_step()
                );
                return Ok(());
            }

            let result = self.game.step(key);
            self.render(terminal.as_deref_mut(), result)?;

            let elapsed = started.elapsed();
            match residual(tick_interval, elapsed) {
                Some(rest) => thread::sleep(rest),
                None => trace!("tick overrun: {elapsed:?} > {tick_interval:?}"),
            }
            self.game.advance_tick();
        }
    }

    fn render(&mut self, terminal: Option<&mut DefaultTerminal>, result: StepResult) -> Result<()> {
        if let Some(matrix) = self.matrix.as_mut() {
            matrix.render(&self.game.playfield, result.changed)?;
        }

        let Some(terminal) = terminal else {
            return Ok(());
        };
        let flash = result.row_cleared && !self.args.no_animation;
        if !result.changed && !flash && self.row_clear_effect.is_none() {
            return Ok(());
        }
        let now = Instant::now();
        terminal.draw(|f| {
            crate::ui::draw(
                f,
                &self.game,
                &self.theme,
                flash,
                &mut self.row_clear_effect,
                &mut self.row_clear_effect_process_time,
                now,
            );
        })?;
        if self.row_clear_effect.as_ref().is_some_and(|e| e.done()) {
            self.row_clear_effect = None;
            self.row_clear_effect_process_time = None;
        }
        Ok(())
    }
}

/// Restore the main screen. Failures are logged; the loop result still wins.
fn leave_alternate_screen<W: std::io::Write>(out: &mut W) {
    if let Err(e) = execute!(out, LeaveAlternateScreen) {
        warn!("failed to leave alternate screen: {e}");
    }
}

/// First non-empty key across `sources`, in order.
fn first_key(sources: &mut [Box<dyn InputSource>]) -> Result<Key> {
    for source in sources {
        let key = source.poll_key()?;
        if !key.is_none() {
            return Ok(key);
        }
    }
    Ok(Key::None)
}

/// Sleep budget left in this tick; `None` when processing overran it.
fn residual(tick_interval: Duration, elapsed: Duration) -> Option<Duration> {
    tick_interval.checked_sub(elapsed).filter(|rest| !rest.is_zero())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;

    struct Scripted(VecDeque<Key>);

    impl InputSource for Scripted {
        fn poll_key(&mut self) -> Result<Key> {
            Ok(self.0.pop_front().unwrap_or_default())
        }
    }

    fn scripted(keys: &[Key]) -> Box<dyn InputSource> {
        Box::new(Scripted(keys.iter().copied().collect()))
    }

    #[test]
    fn test_first_key_prefers_earlier_source() {
        let mut sources = vec![scripted(&[Key::None, Key::Left]), scripted(&[Key::Down, Key::Right])];
        assert_eq!(first_key(&mut sources).unwrap(), Key::Down);
        assert_eq!(first_key(&mut sources).unwrap(), Key::Left);
        assert_eq!(first_key(&mut sources).unwrap(), Key::Right);
        assert_eq!(first_key(&mut sources).unwrap(), Key::None);
    }

    #[test]
    fn test_first_key_empty() {
        assert_eq!(first_key(&mut []).unwrap(), Key::None);
    }

    struct BrokenPipe;

    impl std::io::Write for BrokenPipe {
        fn write(&mut self, _: &[u8]) -> std::io::Result<usize> {
            Err(std::io::ErrorKind::BrokenPipe.into())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_leave_alternate_screen() {
        let mut out = Vec::new();
        leave_alternate_screen(&mut out);
        assert_eq!(out, b"\x1b[?1049l");
        // Errors are reported through the log, not propagated.
        leave_alternate_screen(&mut BrokenPipe);
    }

    #[test]
    fn test_residual_sleep() {
        let tick = Duration::from_micros(10_000);
        assert_eq!(residual(tick, Duration::from_micros(2_500)), Some(Duration::from_micros(7_500)));
        assert_eq!(residual(tick, tick), None);
        assert_eq!(residual(tick, Duration::from_millis(25)), None);
    }
}
