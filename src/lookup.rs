//! Lookup execution for the TUI dashboard.

use std::time::Instant;

use cep_race::{Outcome, ProviderId, RaceResult};
use tokio::sync::mpsc;

use crate::app::{App, AppEvent, Mode};

const PREVIEW_CHARS: usize = 80;

/// Collapses a payload into a single bounded line for display.
pub fn preview(payload: &[u8]) -> String {
    let text = String::from_utf8_lossy(payload);
    let flat: String = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if flat.chars().count() > PREVIEW_CHARS {
        let cut: String = flat.chars().take(PREVIEW_CHARS).collect();
        format!("{cut}…")
    } else {
        flat
    }
}

/// Spawns a lookup based on the current app configuration.
///
/// The lookup runs in a background task and reports through `tx`.
pub fn spawn_lookup(app: &App, tx: mpsc::UnboundedSender<AppEvent>, batched: bool) {
    let client = app.client.clone();
    let mode = app.mode;
    let selected = app.selected_provider_id();
    let racing = app.racing;
    let cep = app.cep.clone();

    tokio::spawn(async move {
        let start = Instant::now();

        let (provider, result): (Option<ProviderId>, Result<String, String>) = match mode {
            Mode::Race => match client.race_first(racing, cep.as_str()).await {
                Ok(RaceResult::Won(success)) => {
                    (Some(success.provider), Ok(preview(&success.payload)))
                }
                Ok(RaceResult::AllFailed(failures)) => {
                    let causes = failures
                        .iter()
                        .map(|f| format!("{}: {}", f.provider, f.cause))
                        .collect::<Vec<_>>()
                        .join("; ");
                    (None, Err(format!("all providers failed ({causes})")))
                }
                Ok(RaceResult::TimedOut(deadline)) => {
                    (None, Err(format!("timed out after {deadline:?}")))
                }
                Err(e) => (None, Err(e.to_string())),
            },
            Mode::SingleProvider => match selected {
                Some(id) => match client.fetch_single(&id, cep.as_str()).await {
                    Some(Outcome::Success(success)) => (Some(id), Ok(preview(&success.payload))),
                    Some(Outcome::Failure(failure)) => (Some(id), Err(failure.cause.to_string())),
                    None => (Some(id), Err("provider not configured".to_string())),
                },
                None => (None, Err("No provider selected".to_string())),
            },
        };

        let elapsed_ms = start.elapsed().as_secs_f64() * 1000.0;
        let (ok, message) = match result {
            Ok(msg) => (true, msg),
            Err(msg) => (false, msg),
        };

        let _ = tx.send(AppEvent::LookupFinished {
            provider,
            latency_ms: elapsed_ms,
            ok,
            message,
            batched,
        });
    });
}
