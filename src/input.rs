//! Key codes and input sources: terminal keyboard (normal and vim-style keys).

use anyhow::Result;
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use std::time::Duration;

/// One input code per driver iteration. `None` is the "nothing pressed" code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Key {
    #[default]
    None,
    Left,
    Right,
    Down,
    Up,
    /// Leaves the driver loop; never reaches the game.
    Confirm,
}

impl Key {
    #[inline]
    pub fn is_none(self) -> bool {
        self == Self::None
    }
}

/// Non-blocking key source. Absence of input is `Ok(Key::None)`, not a wait.
pub trait InputSource {
    fn poll_key(&mut self) -> Result<Key>;
}

/// Map key event to a key code. Only presses count; repeats and releases map to `None`.
pub fn key_from_event(key: KeyEvent) -> Key {
    let KeyEvent {
        code,
        modifiers,
        kind,
        ..
    } = key;
    if kind != KeyEventKind::Press {
        return Key::None;
    }
    if modifiers == KeyModifiers::CONTROL {
        return match code {
            KeyCode::Char('c') => Key::Confirm,
            _ => Key::None,
        };
    }
    let no_mod = modifiers.is_empty() || modifiers == KeyModifiers::SHIFT;
    if !no_mod {
        return Key::None;
    }
    match code {
        KeyCode::Enter | KeyCode::Esc | KeyCode::Char('q') => Key::Confirm,
        KeyCode::Left | KeyCode::Char('h') => Key::Left,
        KeyCode::Right | KeyCode::Char('l') => Key::Right,
        KeyCode::Down | KeyCode::Char('j') => Key::Down,
        KeyCode::Up | KeyCode::Char('k') => Key::Up,
        _ => Key::None,
    }
}

/// Terminal keyboard via crossterm. Expects raw mode to be enabled by the caller.
#[derive(Debug, Default)]
pub struct Keyboard;

impl InputSource for Keyboard {
    /// Drains pending events until the first recognised press; later events stay queued.
    fn poll_key(&mut self) -> Result<Key> {
        while event::poll(Duration::ZERO)? {
            if let Event::Key(key) = event::read()? {
                let code = key_from_event(key);
                if !code.is_none() {
                    return Ok(code);
                }
            }
        }
        Ok(Key::None)
    }
}
