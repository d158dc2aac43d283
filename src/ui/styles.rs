//! Palette and text styles for the TUI dashboard.

use ratatui::prelude::*;

pub const TITLE_FG: Color = Color::Rgb(250, 220, 90);
pub const COLUMN_FG: Color = Color::Rgb(120, 200, 160);

pub const CURSOR_BG: Color = Color::Rgb(40, 110, 80);
pub const CURSOR_FG: Color = Color::White;

pub const WIN_COLOR: Color = Color::Rgb(110, 220, 130);
pub const LOSS_COLOR: Color = Color::Rgb(235, 110, 100);
pub const SLOW_COLOR: Color = Color::Rgb(240, 200, 90);

pub const FRAME_COLOR: Color = Color::Rgb(70, 80, 75);
pub const BODY_COLOR: Color = Color::Rgb(215, 220, 215);
pub const DIM_COLOR: Color = Color::Rgb(130, 140, 135);

fn bold(color: Color) -> Style {
    Style::default().fg(color).add_modifier(Modifier::BOLD)
}

pub fn title_style() -> Style {
    bold(TITLE_FG)
}

pub fn column_style() -> Style {
    bold(COLUMN_FG)
}

pub fn cursor_style() -> Style {
    bold(CURSOR_FG).bg(CURSOR_BG)
}

pub fn frame_style() -> Style {
    Style::default().fg(FRAME_COLOR)
}

pub fn body_style() -> Style {
    Style::default().fg(BODY_COLOR)
}

pub fn dim_style() -> Style {
    Style::default().fg(DIM_COLOR)
}

pub fn win_style() -> Style {
    bold(WIN_COLOR)
}

pub fn loss_style() -> Style {
    bold(LOSS_COLOR)
}

pub fn slow_style() -> Style {
    bold(SLOW_COLOR)
}

/// Colors a latency against the race deadline: green in the first third,
/// yellow up to two thirds, red beyond.
pub fn latency_style(latency_ms: f64, deadline_ms: f64) -> Style {
    if latency_ms < deadline_ms / 3.0 {
        win_style()
    } else if latency_ms < deadline_ms * 2.0 / 3.0 {
        slow_style()
    } else {
        loss_style()
    }
}
