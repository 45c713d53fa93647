//! Console colours: btop-style `theme[key]="value"` files and hex → ratatui Color.

use crate::playfield::TileColor;
use ratatui::style::Color;
use std::collections::HashMap;
use std::path::Path;
use thiserror::Error;

/// Tile palette and UI colours for the console view.
#[derive(Debug, Clone)]
pub struct Theme {
    /// Tile colours in [`TileColor::ALL`] order: red, green, blue, magenta, cyan, yellow.
    pub tiles: [Color; 6],
    /// Block colour when tiles carry no colour (monochrome).
    pub block: Color,
    /// Playfield background.
    pub bg: Color,
    /// Board / sidebar border.
    pub div_line: Color,
    /// Counter values.
    pub main_fg: Color,
    /// Labels and titles.
    pub title: Color,
    /// Row-clear flash.
    pub flash: Color,
}

#[derive(Debug, Error)]
pub enum ThemeError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid hex: {0}")]
    InvalidHex(String),
}

impl Default for Theme {
    fn default() -> Self {
        Self::onedark_default()
    }
}

/// (key, fallback) pairs for the six tile colours, in [`TileColor::ALL`] order.
const TILE_KEYS: [(&str, Color); 6] = [
    ("cpu_end", Color::Rgb(0xE0, 0x6C, 0x75)),
    ("mem_box", Color::Rgb(0x98, 0xC3, 0x79)),
    ("cpu_box", Color::Rgb(0x61, 0xAF, 0xEF)),
    ("net_box", Color::Rgb(0xC6, 0x78, 0xDD)),
    ("hi_fg", Color::Rgb(0x56, 0xB6, 0xC2)),
    ("title", Color::Rgb(0xE5, 0xC0, 0x7B)),
];

impl Theme {
    /// One Dark defaults.
    pub fn onedark_default() -> Self {
        Self::from_map(&HashMap::new())
    }

    /// Load theme from a btop-style file. Falls back to One Dark when no path is given.
    pub fn load(path: Option<&Path>) -> Result<Self, ThemeError> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        let s = std::fs::read_to_string(path)?;
        Ok(Self::from_map(&parse_theme_file(&s)))
    }

    fn from_map(map: &HashMap<String, String>) -> Self {
        let get = |key: &str, fallback: Color| {
            map.get(key)
                .and_then(|v| parse_hex(v).ok())
                .unwrap_or(fallback)
        };
        let tiles = TILE_KEYS.map(|(key, fallback)| get(key, fallback));
        Self {
            tiles,
            block: tiles[TileColor::Red.index()],
            bg: get("meter_bg", Color::Rgb(0x31, 0x35, 0x3F)),
            div_line: get("div_line", Color::Rgb(0x3F, 0x44, 0x4F)),
            main_fg: get("main_fg", Color::Rgb(0xAB, 0xB2, 0xBF)),
            title: get("title", Color::Rgb(0xE5, 0xC0, 0x7B)),
            flash: get("selected_fg", Color::White),
        }
    }

    /// Colour of an occupied cell.
    #[inline]
    pub fn tile_color(&self, color: Option<TileColor>) -> Color {
        color.map_or(self.block, |c| self.tiles[c.index()])
    }
}

/// Parse btop-style theme file into key -> value map.
fn parse_theme_file(s: &str) -> HashMap<String, String> {
    let mut map = HashMap::new();
    for line in s.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let Some(stripped) = line.strip_prefix("theme[") else {
            continue;
        };
        let Some(end) = stripped.find(']') else {
            continue;
        };
        let key = stripped[..end].trim();
        let rest = stripped[end + 1..].trim();
        if let Some(value) = rest.strip_prefix('=') {
            let value = value.trim().trim_matches('"').trim_matches('\'');
            if !value.is_empty() {
                map.insert(key.to_string(), value.to_string());
            }
        }
    }
    map
}

fn hex_digits(s: &str) -> Result<u8, ThemeError> {
    u8::from_str_radix(s, 16).map_err(|_| ThemeError::InvalidHex(s.to_string()))
}

/// Parse hex colour "#RRGGBB" or "#RGB" into ratatui Color.
pub fn parse_hex(s: &str) -> Result<Color, ThemeError> {
    let s = s.trim().trim_start_matches('#');
    if !s.is_ascii() {
        return Err(ThemeError::InvalidHex(s.to_string()));
    }
    let (r, g, b) = match s.len() {
        6 => (hex_digits(&s[0..2])?, hex_digits(&s[2..4])?, hex_digits(&s[4..6])?),
        3 => (
            hex_digits(&s[0..1])? * 17,
            hex_digits(&s[1..2])? * 17,
            hex_digits(&s[2..3])? * 17,
        ),
        _ => return Err(ThemeError::InvalidHex(s.to_string())),
    };
    Ok(Color::Rgb(r, g, b))
}
