//! Console view: bordered board (two columns per cell), counters sidebar, row-clear flash.

use crate::game::{Game, RunState};
use crate::theme::Theme;
use ratatui::Frame;
use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::style::{Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Paragraph, Widget};
use std::time::Instant;
use tachyonfx::{Duration as TfxDuration, Effect, EffectRenderer, Interpolation, fx};

/// Terminal columns per playfield cell; keeps cells roughly square.
const CELL_WIDTH: u16 = 2;
const SIDEBAR_WIDTH: u16 = 22;
const ROW_CLEAR_FLASH_MS: u32 = 250;

/// Outer board size in terminal cells (grid + border). `None` where it exceeds a frame coordinate.
pub fn board_size(width: usize, height: usize) -> (Option<u16>, Option<u16>) {
    let w = u16::try_from(width)
        .ok()
        .and_then(|w| w.checked_mul(CELL_WIDTH))
        .and_then(|w| w.checked_add(2));
    let h = u16::try_from(height).ok().and_then(|h| h.checked_add(2));
    (w, h)
}

/// Draw one frame. `row_cleared` starts a new flash over the board; a running
/// flash in `row_clear_effect` is advanced by the time since its last frame.
pub fn draw(
    frame: &mut Frame,
    game: &Game,
    theme: &Theme,
    row_cleared: bool,
    row_clear_effect: &mut Option<Effect>,
    row_clear_process_time: &mut Option<Instant>,
    now: Instant,
) {
    let area = frame.area();
    let (bw, bh) = board_size(game.playfield.width, game.playfield.height);
    let (bw, bh) = (bw.unwrap_or(u16::MAX), bh.unwrap_or(u16::MAX));

    let horiz = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Fill(1),
            Constraint::Length(bw),
            Constraint::Length(SIDEBAR_WIDTH),
            Constraint::Fill(1),
        ])
        .split(area);
    let vert = |r: Rect| {
        Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Fill(1), Constraint::Length(bh), Constraint::Fill(1)])
            .split(r)[1]
    };
    let board_area = vert(horiz[1]);
    let sidebar_area = vert(horiz[2]);

    let board_rect = draw_board(frame, game, theme, board_area);
    draw_sidebar(frame, game, theme, sidebar_area);

    if row_cleared {
        *row_clear_effect = Some(
            fx::fade_from(theme.flash, theme.flash, (ROW_CLEAR_FLASH_MS, Interpolation::Linear))
                .with_area(board_rect),
        );
        *row_clear_process_time = None;
    }
    apply_row_clear_effect(frame, board_rect, row_clear_effect, row_clear_process_time, now);
}

fn apply_row_clear_effect(
    frame: &mut Frame,
    board_rect: Rect,
    row_clear_effect: &mut Option<Effect>,
    row_clear_process_time: &mut Option<Instant>,
    now: Instant,
) {
    let Some(effect) = row_clear_effect else {
        return;
    };
    let delta = row_clear_process_time
        .map(|t| now.saturating_duration_since(t))
        .unwrap_or(std::time::Duration::ZERO);
    let delta_ms = delta.as_millis().min(u32::MAX as u128) as u32;
    *row_clear_process_time = Some(now);
    frame.render_effect(effect, board_rect, TfxDuration::from_millis(delta_ms));
}

/// Returns the inner rect the cells were drawn into.
fn draw_board(frame: &mut Frame, game: &Game, theme: &Theme, area: Rect) -> Rect {
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(theme.div_line).bg(theme.bg))
        .title(Span::styled(" Stetris ", Style::default().fg(theme.title)));
    let inner = block.inner(area);
    block.render(area, frame.buffer_mut());

    let buf = frame.buffer_mut();
    let empty = Style::default().bg(theme.bg);
    // Only the cells that fit the inner rect; wider grids are cut off on the right and bottom.
    let cols = usize::from(inner.width / CELL_WIDTH);
    for (ry, row) in (inner.y..inner.bottom()).zip(game.playfield.rows()) {
        for (rx, cell) in (inner.x..inner.right()).step_by(usize::from(CELL_WIDTH)).zip(row.iter().take(cols)) {
            if cell.occupied {
                let color = theme.tile_color(cell.color);
                buf.set_string(rx, ry, "██", Style::default().fg(color).bg(theme.bg));
            } else {
                buf.set_string(rx, ry, "  ", empty);
            }
        }
    }
    inner
}

fn draw_sidebar(frame: &mut Frame, game: &Game, theme: &Theme, area: Rect) {
    let label = Style::default().fg(theme.title);
    let value = Style::default().fg(theme.main_fg);
    let counter = |name: &'static str, n: u32| {
        Line::from(vec![
            Span::styled(format!(" {name:<7}"), label),
            Span::styled(format!("{n:>10}"), value),
        ])
    };

    let mut lines = vec![
        counter("Tiles:", game.tiles),
        counter("Rows:", game.rows),
        counter("Score:", game.score),
        counter("Level:", game.level),
        Line::from(""),
    ];
    match game.state() {
        RunState::GameOver => {
            lines.push(Line::from(Span::styled(
                " Game Over",
                Style::default().fg(theme.tile_color(None)).add_modifier(Modifier::BOLD),
            )));
            lines.push(Line::from(Span::styled(" any key: new game", value)));
        }
        RunState::Active => {
            lines.push(Line::from(Span::styled(" ←/→ move  ↓ drop", value)));
        }
    }
    lines.push(Line::from(Span::styled(" Enter: quit", value)));

    Paragraph::new(lines)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Style::default().fg(theme.div_line).bg(theme.bg)),
        )
        .render(area, frame.buffer_mut());
}
