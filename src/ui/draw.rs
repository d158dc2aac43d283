//! Rendering for the TUI dashboard.

use std::time::Instant;

use ratatui::{
    prelude::*,
    widgets::{Block, Borders, Cell, Gauge, Paragraph, Row, Table, Wrap},
};

use super::styles::*;
use crate::app::{App, Mode};

const SPARK_LEVELS: [char; 8] = ['▁', '▂', '▃', '▄', '▅', '▆', '▇', '█'];
const SPARK_WIDTH: usize = 12;

pub fn draw_ui(frame: &mut Frame, app: &App) {
    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Length(4),
            Constraint::Min(0),
            Constraint::Length(5),
        ])
        .split(frame.area());

    let body = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(55), Constraint::Percentage(45)])
        .split(rows[2]);

    draw_header(frame, rows[0], app);
    draw_session(frame, rows[1], app);
    draw_providers(frame, body[0], app);
    draw_details(frame, body[1], app);
    draw_keys(frame, rows[3]);
}

fn panel(title: &str) -> Block<'_> {
    Block::default()
        .title(title)
        .title_style(title_style())
        .borders(Borders::ALL)
        .border_style(frame_style())
}

fn label(text: &str) -> Span<'_> {
    Span::styled(text, dim_style())
}

fn bar(fraction: f64, width: usize) -> String {
    let filled = ((fraction.clamp(0.0, 1.0)) * width as f64) as usize;
    format!(
        "{}{}",
        "█".repeat(filled),
        "░".repeat(width.saturating_sub(filled))
    )
}

fn format_uptime(secs: u64) -> String {
    match secs {
        0..=59 => format!("{secs}s"),
        60..=3599 => format!("{}m {}s", secs / 60, secs % 60),
        _ => format!("{}h {}m", secs / 3600, (secs % 3600) / 60),
    }
}

fn draw_header(frame: &mut Frame, area: Rect, app: &App) {
    let title = format!(" CEP Race :: {} ", app.cep);
    frame.render_widget(panel(&title), area);
}

fn draw_session(frame: &mut Frame, area: Rect, app: &App) {
    let rate = app.tally.success_rate();
    let rate_style = if rate > 95.0 {
        win_style()
    } else if rate > 80.0 {
        slow_style()
    } else {
        loss_style()
    };

    let text = vec![
        Line::from(vec![
            label("Uptime "),
            Span::styled(format_uptime(app.session_uptime().as_secs()), body_style()),
            label("  Lookups "),
            Span::styled(app.tally.lookups.to_string(), body_style()),
            label("  Won "),
            Span::styled(app.tally.won.to_string(), win_style()),
            label("  Lost "),
            Span::styled(
                app.tally.lost.to_string(),
                if app.tally.lost > 0 {
                    loss_style()
                } else {
                    body_style()
                },
            ),
        ]),
        Line::from(vec![
            label("Rate "),
            Span::styled(format!("{:.1}/s", app.tally.per_second(Instant::now())), slow_style()),
            label("  Avg "),
            Span::styled(format!("{:.0} ms", app.average_latency()), body_style()),
            label("  Success "),
            Span::styled(format!("[{}] {:.1}%", bar(rate / 100.0, 15), rate), rate_style),
        ]),
    ];

    frame.render_widget(Paragraph::new(text).block(panel(" Session ")), area);
}

/// Renders the most recent samples as a one-line sparkline.
fn sparkline(samples: &[u64]) -> String {
    if samples.is_empty() {
        return "─".repeat(SPARK_WIDTH);
    }

    let recent = &samples[samples.len().saturating_sub(SPARK_WIDTH)..];
    let max = recent.iter().copied().max().unwrap_or(0);
    let min = recent.iter().copied().min().unwrap_or(0);
    let span = (max - min).max(1) as f64;

    recent
        .iter()
        .map(|&v| {
            let level = ((v - min) as f64 / span * 7.0) as usize;
            SPARK_LEVELS[level.min(7)]
        })
        .collect()
}

fn draw_providers(frame: &mut Frame, area: Rect, app: &App) {
    let deadline_ms = app.client.config().deadline.as_secs_f64() * 1000.0;
    let total_wins: u64 = app.stats_snapshot.values().map(|s| s.wins).sum();

    let header = Row::new(
        ["Provider", "Wins", "Avg ms", "Failed", "Timeouts", "Trend", "Share"]
            .into_iter()
            .map(|h| Cell::from(h).style(column_style())),
    )
    .bottom_margin(1);

    let rows = app.providers.iter().enumerate().map(|(idx, id)| {
        let stats = app.stats_snapshot.get(id).cloned().unwrap_or_default();
        let share = if total_wins > 0 {
            stats.wins as f64 / total_wins as f64
        } else {
            0.0
        };

        let samples: Vec<u64> = app
            .latency_history
            .get(id)
            .map(|h| h.iter().copied().collect())
            .unwrap_or_default();

        let racing = app.mode == Mode::Race && idx < app.racing;
        let name_style = if racing { body_style() } else { dim_style() };

        let row = Row::new(vec![
            Cell::from(id.to_string()).style(name_style),
            Cell::from(stats.wins.to_string()).style(if stats.wins > 0 {
                win_style()
            } else {
                body_style()
            }),
            Cell::from(format!("{:.1}", stats.avg_latency_ms)),
            Cell::from(stats.errors.to_string()).style(if stats.errors > 0 {
                loss_style()
            } else {
                body_style()
            }),
            Cell::from(stats.timeouts.to_string()).style(if stats.timeouts > 0 {
                slow_style()
            } else {
                body_style()
            }),
            Cell::from(sparkline(&samples))
                .style(latency_style(stats.avg_latency_ms, deadline_ms)),
            Cell::from(format!("[{}] {:.0}%", bar(share, 10), share * 100.0)),
        ]);

        if idx == app.selected_idx {
            row.style(cursor_style())
        } else {
            row
        }
    });

    let title = match app.mode {
        Mode::Race => format!(" Providers (racing {}) ", app.racing),
        Mode::SingleProvider => " Providers ".to_string(),
    };

    let table = Table::new(
        rows,
        [
            Constraint::Length(12),
            Constraint::Length(5),
            Constraint::Length(7),
            Constraint::Length(7),
            Constraint::Length(9),
            Constraint::Length(SPARK_WIDTH as u16),
            Constraint::Min(16),
        ],
    )
    .header(header)
    .block(panel(&title))
    .column_spacing(1);

    frame.render_widget(table, area);
}

fn draw_details(frame: &mut Frame, area: Rect, app: &App) {
    let mut constraints = vec![Constraint::Length(6), Constraint::Min(0)];
    if app.batch.running {
        constraints.push(Constraint::Length(3));
    }

    let parts = Layout::default()
        .direction(Direction::Vertical)
        .constraints(constraints)
        .split(area);

    draw_setup(frame, parts[0], app);
    draw_last_lookup(frame, parts[1], app);
    if app.batch.running {
        draw_batch(frame, parts[2], app);
    }
}

fn draw_setup(frame: &mut Frame, area: Rect, app: &App) {
    let cfg = app.client.config();
    let target = app
        .selected_provider_id()
        .map(|id| id.to_string())
        .unwrap_or_else(|| "-".into());
    let batch = if app.batch.running {
        format!("running {}/{}", app.batch.finished, app.batch.size)
    } else {
        format!("off ({} per run)", app.batch.size)
    };
    let mode = match app.mode {
        Mode::Race => format!("Race ({} providers)", app.racing),
        Mode::SingleProvider => "Single Provider".to_string(),
    };

    let text = vec![
        Line::from(vec![
            label("Mode     "),
            Span::styled(
                mode,
                if app.mode == Mode::Race {
                    slow_style()
                } else {
                    win_style()
                },
            ),
        ]),
        Line::from(vec![
            label("Selected "),
            Span::styled(target, body_style()),
        ]),
        Line::from(vec![
            label("Deadline "),
            Span::styled(format!("{:?}", cfg.deadline), body_style()),
            label("  connect "),
            Span::styled(format!("{:?}", cfg.connect_timeout), body_style()),
        ]),
        Line::from(vec![label("Batch    "), Span::styled(batch, body_style())]),
    ];

    frame.render_widget(
        Paragraph::new(text)
            .block(panel(" Setup "))
            .wrap(Wrap { trim: false }),
        area,
    );
}

fn draw_last_lookup(frame: &mut Frame, area: Rect, app: &App) {
    let deadline_ms = app.client.config().deadline.as_secs_f64() * 1000.0;
    let winner = app
        .last_provider
        .as_ref()
        .map(|id| id.to_string())
        .unwrap_or_else(|| "-".into());
    let (latency, latency_style) = match app.last_latency_ms {
        Some(ms) => (format!("{ms:.1} ms"), latency_style(ms, deadline_ms)),
        None => ("-".to_string(), dim_style()),
    };

    let text = vec![
        Line::from(vec![label("Provider "), Span::styled(winner, win_style())]),
        Line::from(vec![label("Latency  "), Span::styled(latency, latency_style)]),
        Line::from(vec![
            label("Result   "),
            Span::styled(app.status.as_str(), body_style()),
        ]),
    ];

    frame.render_widget(
        Paragraph::new(text)
            .block(panel(" Last Lookup "))
            .wrap(Wrap { trim: false }),
        area,
    );
}

fn draw_batch(frame: &mut Frame, area: Rect, app: &App) {
    let gauge = Gauge::default()
        .block(panel(" Batch "))
        .gauge_style(win_style())
        .ratio(app.batch.progress())
        .label(format!("{}/{}", app.batch.finished, app.batch.size));

    frame.render_widget(gauge, area);
}

fn draw_keys(frame: &mut Frame, area: Rect) {
    let key = |k: &'static str| Span::styled(k, slow_style());
    let hint = |h: &'static str| Span::styled(h, dim_style());

    let lines = vec![
        Line::from(vec![
            key(" ↑/↓"),
            hint(" select  "),
            key("Space"),
            hint(" query selected  "),
            key("Tab"),
            hint(" mode  "),
            key("+/-"),
            hint(" providers raced"),
        ]),
        Line::from(vec![
            key(" r"),
            hint(" race  "),
            key("b"),
            hint(" batch  "),
            key(",/."),
            hint(" batch size  "),
            key("s"),
            hint(" reset stats  "),
            key("q"),
            hint(" quit"),
        ]),
    ];

    frame.render_widget(Paragraph::new(lines).block(panel(" Keys ")), area);
}
