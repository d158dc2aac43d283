//! Dashboard state: what is selected, what is running, and what came back.

use std::{
    collections::{HashMap, VecDeque},
    time::{Duration, Instant},
};

use cep_race::{cep::Cep, ProviderId, ProviderStatsSnapshot, RaceClient};

const HISTORY_LEN: usize = 100;
const BATCH_STEP: usize = 5;
const MAX_BATCH: usize = 50;

/// How the dashboard queries providers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Race the first `racing` providers.
    Race,
    /// Query only the selected provider.
    SingleProvider,
}

/// Events emitted by background lookups.
#[derive(Debug)]
pub enum AppEvent {
    LookupFinished {
        provider: Option<ProviderId>,
        latency_ms: f64,
        ok: bool,
        message: String,
        /// Launched by a running batch rather than a key press.
        batched: bool,
    },
}

/// Back-to-back lookups started with `b`, one in flight at a time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Batch {
    pub size: usize,
    pub launched: usize,
    pub finished: usize,
    pub running: bool,
}

impl Batch {
    fn new(size: usize) -> Self {
        Self {
            size,
            launched: 0,
            finished: 0,
            running: false,
        }
    }

    fn wants_launch(&self) -> bool {
        self.running && self.launched < self.size && self.launched == self.finished
    }

    pub fn progress(&self) -> f64 {
        if self.size == 0 {
            return 0.0;
        }
        (self.finished as f64 / self.size as f64).clamp(0.0, 1.0)
    }
}

/// Lookup totals for the current session.
#[derive(Debug, Default)]
pub struct Tally {
    pub lookups: u64,
    pub won: u64,
    pub lost: u64,
    finished_at: VecDeque<Instant>,
}

impl Tally {
    fn record(&mut self, ok: bool, at: Instant) {
        self.lookups += 1;
        if ok {
            self.won += 1;
        } else {
            self.lost += 1;
        }

        self.finished_at.push_back(at);
        if let Some(cutoff) = at.checked_sub(Duration::from_secs(1)) {
            while self.finished_at.front().is_some_and(|&t| t <= cutoff) {
                self.finished_at.pop_front();
            }
        }
    }

    pub fn success_rate(&self) -> f64 {
        if self.lookups == 0 {
            return 0.0;
        }
        self.won as f64 / self.lookups as f64 * 100.0
    }

    /// Lookups finished during the second before `now`.
    pub fn per_second(&self, now: Instant) -> f64 {
        let recent = match now.checked_sub(Duration::from_secs(1)) {
            Some(cutoff) => self.finished_at.iter().filter(|&&t| t > cutoff).count(),
            None => self.finished_at.len(),
        };
        recent as f64
    }
}

pub struct App {
    pub client: RaceClient,
    pub providers: Vec<ProviderId>,
    pub cep: Cep,
    pub selected_idx: usize,
    pub mode: Mode,
    /// How many providers, from the top of the list, take part in a race.
    pub racing: usize,
    pub status: String,
    pub last_provider: Option<ProviderId>,
    pub last_latency_ms: Option<f64>,
    pub stats_snapshot: HashMap<ProviderId, ProviderStatsSnapshot>,
    pub batch: Batch,
    pub tally: Tally,
    pub session_start: Instant,
    pub latency_history: HashMap<ProviderId, VecDeque<u64>>,
}

impl App {
    pub fn new(client: RaceClient, cep: Cep) -> Self {
        let providers = client.provider_ids();
        let racing = providers.len();

        Self {
            client,
            providers,
            cep,
            selected_idx: 0,
            mode: Mode::Race,
            racing,
            status: String::from("Ready. Press 'r' to race a lookup or 'b' for a batch"),
            last_provider: None,
            last_latency_ms: None,
            stats_snapshot: HashMap::new(),
            batch: Batch::new(BATCH_STEP * 2),
            tally: Tally::default(),
            session_start: Instant::now(),
            latency_history: HashMap::new(),
        }
    }

    pub fn move_selection(&mut self, forward: bool) {
        let n = self.providers.len();
        if n == 0 {
            return;
        }
        self.selected_idx = if forward {
            (self.selected_idx + 1) % n
        } else {
            (self.selected_idx + n - 1) % n
        };
    }

    pub fn adjust_racing(&mut self, grow: bool) {
        self.racing = if grow {
            (self.racing + 1).min(self.providers.len())
        } else {
            self.racing.saturating_sub(1).max(1)
        };
    }

    pub fn toggle_mode(&mut self) {
        self.mode = match self.mode {
            Mode::Race => Mode::SingleProvider,
            Mode::SingleProvider => Mode::Race,
        };
    }

    pub fn toggle_batch(&mut self) {
        if self.batch.running {
            self.batch.running = false;
            self.status = "Batch stopped".to_string();
        } else {
            self.batch = Batch {
                running: true,
                ..Batch::new(self.batch.size)
            };
            self.status = format!("Batch started: {} lookups", self.batch.size);
        }
    }

    pub fn resize_batch(&mut self, grow: bool) {
        if self.batch.running {
            return;
        }
        self.batch.size = if grow {
            (self.batch.size + BATCH_STEP).min(MAX_BATCH)
        } else {
            self.batch.size.saturating_sub(BATCH_STEP).max(BATCH_STEP)
        };
    }

    /// Claims the next batch slot, if the batch is ready for another lookup.
    pub fn take_batch_launch(&mut self) -> bool {
        if !self.batch.wants_launch() {
            return false;
        }
        self.batch.launched += 1;
        true
    }

    pub fn refresh_stats(&mut self) {
        self.stats_snapshot = self.client.provider_stats();
    }

    pub fn reset_stats(&mut self) {
        self.client.reset_stats();
        self.refresh_stats();
        self.latency_history.clear();
        self.status = "Stats reset".to_string();
    }

    pub fn finish_lookup(
        &mut self,
        provider: Option<ProviderId>,
        latency_ms: f64,
        ok: bool,
        message: String,
        batched: bool,
    ) {
        self.refresh_stats();
        self.tally.record(ok, Instant::now());
        self.last_latency_ms = Some(latency_ms);
        self.status = format!("{} {} ({:.0} ms)", if ok { "✓" } else { "✗" }, message, latency_ms);

        if let (true, Some(id)) = (ok, &provider) {
            let history = self.latency_history.entry(id.clone()).or_default();
            history.push_back(latency_ms as u64);
            if history.len() > HISTORY_LEN {
                history.pop_front();
            }
        }
        self.last_provider = provider;

        if batched && self.batch.running {
            self.batch.finished += 1;
            if self.batch.finished >= self.batch.size {
                self.batch.running = false;
                self.status = format!("Batch complete: {} lookups", self.batch.finished);
            }
        }
    }

    pub fn selected_provider_id(&self) -> Option<ProviderId> {
        self.providers.get(self.selected_idx).cloned()
    }

    pub fn session_uptime(&self) -> Duration {
        self.session_start.elapsed()
    }

    /// Mean latency over every recorded winning lookup.
    pub fn average_latency(&self) -> f64 {
        let samples = self.latency_history.values().flatten();
        let (total, count) = samples.fold((0u64, 0u64), |(t, c), &ms| (t + ms, c + 1));
        if count == 0 {
            0.0
        } else {
            total as f64 / count as f64
        }
    }
}
