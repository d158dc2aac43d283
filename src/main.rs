//! Races CEP lookup providers from the command line.
//!
//! `cep-race <CEP>` runs a single race and prints the winning payload, which is
//! the raw JSON returned by the fastest provider. Without an argument an
//! interactive dashboard starts instead, featuring:
//! - Race and single-provider modes
//! - Batch lookups
//! - Per-provider wins, failures, timeouts and latency trends

mod app;
mod env;
mod lookup;
mod ui;

use std::{fs::File, sync::Mutex, time::Duration};

use app::{App, AppEvent};
use cep_race::{cep::Cep, RaceClient, RaceResult};
use color_eyre::Result;
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind};
use env::{build_client_from_env, cep_from_env, log_file_from_env};
use lookup::spawn_lookup;
use tokio::sync::mpsc;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
use ui::draw_ui;

const DEFAULT_FILTER: &str = "cep_race=info";

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| DEFAULT_FILTER.into())
}

/// Logs to stderr; used when no terminal UI owns the screen.
fn init_stderr_tracing() {
    tracing_subscriber::registry()
        .with(env_filter())
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

/// Logs to `CEP_RACE_LOG_FILE` if set; the dashboard otherwise runs without logs.
fn init_file_tracing() -> Result<()> {
    if let Some(path) = log_file_from_env() {
        let file = File::create(path)?;
        tracing_subscriber::registry()
            .with(env_filter())
            .with(
                tracing_subscriber::fmt::layer()
                    .with_ansi(false)
                    .with_writer(Mutex::new(file)),
            )
            .init();
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    dotenvy::dotenv().ok();

    match std::env::args().nth(1) {
        Some(raw) => {
            init_stderr_tracing();
            let (client, _providers) = build_client_from_env()?;
            run_once(&client, &raw).await
        }
        None => {
            init_file_tracing()?;
            let (client, _providers) = build_client_from_env()?;
            let mut app = App::new(client, cep_from_env()?);

            let mut terminal = ratatui::init();
            terminal.clear()?;

            let result = run_app(&mut terminal, &mut app).await;

            ratatui::restore();

            result
        }
    }
}

async fn run_once(client: &RaceClient, raw: &str) -> Result<()> {
    let cep = Cep::parse(raw)?;
    info!(%cep, providers = client.provider_ids().len(), "racing lookup");

    match client.race(cep.as_str()).await? {
        RaceResult::Won(winner) => {
            println!(
                "Response from {}:\n{}",
                winner.provider,
                String::from_utf8_lossy(&winner.payload)
            );
            Ok(())
        }
        RaceResult::AllFailed(failures) => {
            for failure in &failures {
                error!(provider = %failure.provider, cause = %failure.cause, "Error");
            }
            color_eyre::eyre::bail!("all {} providers failed", failures.len())
        }
        RaceResult::TimedOut(deadline) => {
            error!("Timeout: no response within {deadline:?}");
            color_eyre::eyre::bail!("no response within {deadline:?}")
        }
    }
}

async fn run_app(terminal: &mut ratatui::DefaultTerminal, app: &mut App) -> Result<()> {
    let (tx, mut rx) = mpsc::unbounded_channel::<AppEvent>();

    app.refresh_stats();

    loop {
        while let Ok(ev) = rx.try_recv() {
            match ev {
                AppEvent::LookupFinished {
                    provider,
                    latency_ms,
                    ok,
                    message,
                    batched,
                } => {
                    app.finish_lookup(provider, latency_ms, ok, message, batched);
                }
            }
        }

        terminal.draw(|frame| draw_ui(frame, app))?;

        if app.take_batch_launch() {
            spawn_lookup(app, tx.clone(), true);
        }

        if crossterm::event::poll(Duration::from_millis(50))? {
            if let Event::Key(KeyEvent {
                code,
                kind: KeyEventKind::Press,
                ..
            }) = event::read()?
            {
                match code {
                    KeyCode::Char('q') => break,
                    KeyCode::Up => app.move_selection(false),
                    KeyCode::Down => app.move_selection(true),
                    KeyCode::Tab => app.toggle_mode(),
                    KeyCode::Char('r') => {
                        spawn_lookup(app, tx.clone(), false);
                    }
                    KeyCode::Char(' ') => {
                        app.mode = app::Mode::SingleProvider;
                        spawn_lookup(app, tx.clone(), false);
                    }
                    KeyCode::Char('b') => {
                        app.toggle_batch();
                    }
                    KeyCode::Char('+') | KeyCode::Char('=') => {
                        app.adjust_racing(true);
                    }
                    KeyCode::Char('-') | KeyCode::Char('_') => {
                        app.adjust_racing(false);
                    }
                    KeyCode::Char('[') | KeyCode::Char(',') => {
                        app.resize_batch(false);
                    }
                    KeyCode::Char(']') | KeyCode::Char('.') => {
                        app.resize_batch(true);
                    }
                    KeyCode::Char('s') => {
                        app.reset_stats();
                    }
                    _ => {}
                }
            }
        }
    }

    Ok(())
}
