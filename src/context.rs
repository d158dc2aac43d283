//! Shared deadline and cancellation signal for one race.

use std::{
    future::Future,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    time::Duration,
};

use tokio::time::{self, Instant};
use tokio_util::sync::CancellationToken;

use crate::errors::FetchError;

/// Stand-in deadline for budgets too large to add to the clock, about 30 years out.
const FAR_FUTURE: Duration = Duration::from_secs(86_400 * 365 * 30);

/// Deadline plus cancellation signal shared by every fetcher of a race.
///
/// Clones observe the same state. The only transition is armed → cancelled,
/// which is monotonic; [`ExecutionContext::cancel`] reports whether the call
/// performed it.
#[derive(Debug, Clone)]
pub struct ExecutionContext {
    deadline: Instant,
    token: CancellationToken,
    fired: Arc<AtomicBool>,
}

impl ExecutionContext {
    /// Creates an armed context expiring `budget` from now.
    ///
    /// Budgets past what the clock can represent are clamped to a far-future
    /// deadline.
    pub fn with_deadline(budget: Duration) -> Self {
        let now = Instant::now();
        let deadline = now
            .checked_add(budget)
            .or_else(|| now.checked_add(FAR_FUTURE))
            .unwrap_or(now);
        Self {
            deadline,
            token: CancellationToken::new(),
            fired: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn deadline(&self) -> Instant {
        self.deadline
    }

    /// Time left before the deadline, zero once it has passed.
    pub fn remaining(&self) -> Duration {
        self.deadline.saturating_duration_since(Instant::now())
    }

    pub fn deadline_elapsed(&self) -> bool {
        Instant::now() >= self.deadline
    }

    /// Cancels the context.
    ///
    /// Returns `true` for the single call that moved the context to cancelled,
    /// `false` for every later call.
    pub fn cancel(&self) -> bool {
        if self.fired.swap(true, Ordering::AcqRel) {
            return false;
        }
        self.token.cancel();
        true
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Whether fetchers should stop: cancelled or past the deadline.
    pub fn is_done(&self) -> bool {
        self.is_cancelled() || self.deadline_elapsed()
    }

    /// Resolves once the context is cancelled or its deadline passes.
    pub async fn done(&self) {
        tokio::select! {
            _ = self.token.cancelled() => {}
            _ = time::sleep_until(self.deadline) => {}
        }
    }

    /// Drives `fut` unless the context finishes first.
    ///
    /// Cancellation wins ties so no work completes after the signal was observed.
    pub async fn run<F: Future>(&self, fut: F) -> Result<F::Output, FetchError> {
        tokio::select! {
            biased;
            _ = self.done() => Err(FetchError::Cancelled),
            out = fut => Ok(out),
        }
    }

    /// Returns a guard that cancels the context when dropped.
    pub fn cancel_on_drop(&self) -> CancelOnDrop {
        CancelOnDrop { ctx: self.clone() }
    }
}

/// Cancels its context on drop, whichever path the owner leaves by.
#[derive(Debug)]
pub struct CancelOnDrop {
    ctx: ExecutionContext,
}

impl Drop for CancelOnDrop {
    fn drop(&mut self) {
        self.ctx.cancel();
    }
}
