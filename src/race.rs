//! First-success-wins race across providers under one deadline.

use std::{collections::HashSet, time::Duration};

use tokio::{
    sync::mpsc,
    time::{self, Instant},
};
use tracing::{info, trace, warn};

use crate::{
    context::ExecutionContext,
    errors::RaceError,
    fetcher::{fetch_outcome, Failure, Outcome, Provider, Success},
};

/// Final result of one race.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RaceResult {
    /// The first success dequeued.
    Won(Success),
    /// Every provider failed; one entry per provider, in arrival order.
    AllFailed(Vec<Failure>),
    /// The deadline passed before a winner or a complete set of failures.
    TimedOut(Duration),
}

impl RaceResult {
    pub fn winner(&self) -> Option<&Success> {
        match self {
            Self::Won(success) => Some(success),
            _ => None,
        }
    }

    pub fn is_won(&self) -> bool {
        matches!(self, Self::Won(_))
    }

    /// Converts the result into the winning outcome, mapping losses to errors.
    pub fn into_result(self) -> Result<Success, RaceError> {
        match self {
            Self::Won(success) => Ok(success),
            Self::AllFailed(failures) => Err(RaceError::AllFailed(failures)),
            Self::TimedOut(deadline) => Err(RaceError::Timeout(deadline)),
        }
    }
}

fn validate(providers: &[Provider], deadline: Duration) -> Result<(), RaceError> {
    if providers.is_empty() {
        return Err(RaceError::NoProviders);
    }
    if deadline.is_zero() {
        return Err(RaceError::InvalidDeadline(deadline));
    }

    let mut seen = HashSet::with_capacity(providers.len());
    for provider in providers {
        if !seen.insert(&provider.id) {
            return Err(RaceError::DuplicateProvider(provider.id.clone()));
        }
    }

    Ok(())
}

/// Races every provider concurrently and returns the first success.
///
/// Each provider runs on its own task and reports exactly one [`Outcome`] into a
/// channel sized for all of them, so reporting never blocks. The shared context
/// is cancelled once on every exit path, including this future being dropped;
/// abandoned fetchers unwind on their own after the call returns and their
/// outcomes are discarded.
///
/// Fails only on invalid input: an empty provider set, duplicate ids or a zero
/// deadline.
pub async fn race(providers: &[Provider], deadline: Duration) -> Result<RaceResult, RaceError> {
    validate(providers, deadline)?;

    let start = Instant::now();
    let ctx = ExecutionContext::with_deadline(deadline);
    let _cancel = ctx.cancel_on_drop();

    let (tx, mut rx) = mpsc::channel::<Outcome>(providers.len());
    for provider in providers {
        let provider = provider.clone();
        let ctx = ctx.clone();
        let tx = tx.clone();

        tokio::spawn(async move {
            let outcome = fetch_outcome(&ctx, &provider).await;
            if tx.try_send(outcome).is_err() {
                trace!(provider = %provider.id, "race already concluded, outcome discarded");
            }
        });
    }
    drop(tx);

    let expiry = time::sleep_until(ctx.deadline());
    tokio::pin!(expiry);

    let mut failures = Vec::with_capacity(providers.len());

    let result = loop {
        tokio::select! {
            biased;
            received = rx.recv() => match received {
                Some(Outcome::Success(success)) => break RaceResult::Won(success),
                // The context is only cancelled here once the race is over, so a
                // cancelled fetch seen now means the deadline passed.
                Some(Outcome::Failure(failure))
                    if failure.cause.is_cancelled() && ctx.deadline_elapsed() =>
                {
                    break RaceResult::TimedOut(deadline);
                }
                Some(Outcome::Failure(failure)) => {
                    failures.push(failure);
                    if failures.len() == providers.len() {
                        break RaceResult::AllFailed(failures);
                    }
                }
                // Every task is gone without a full report; only a runtime
                // shutting down drops one before it sends.
                None => break RaceResult::AllFailed(failures),
            },
            _ = &mut expiry => break RaceResult::TimedOut(deadline),
        }
    };

    ctx.cancel();

    let elapsed = start.elapsed();
    match &result {
        RaceResult::Won(success) => {
            info!(winner = %success.provider, ?elapsed, bytes = success.payload.len(), "race won");
        }
        RaceResult::AllFailed(failures) => {
            info!(failed = failures.len(), ?elapsed, "all providers failed");
        }
        RaceResult::TimedOut(deadline) => {
            warn!(?deadline, providers = providers.len(), "race timed out");
        }
    }

    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        config::ProviderId,
        errors::FetchError,
        fetcher::testing::{Exploding, Oblivious, Scripted},
    };

    const SECOND: Duration = Duration::from_secs(1);

    async fn settle() {
        time::sleep(Duration::from_millis(1)).await;
    }

    #[tokio::test(start_paused = true)]
    async fn fastest_success_wins_and_losers_are_cancelled() {
        let a = Scripted::ok(100, r#"{"cep":"X"}"#);
        let b = Scripted::ok(500, r#"{"ok":true}"#);
        let providers = vec![Provider::new("a", a.clone()), Provider::new("b", b.clone())];
        let start = Instant::now();

        let result = race(&providers, SECOND).await.unwrap();

        let winner = result.winner().expect("a should win");
        assert_eq!(winner.provider, ProviderId::from("a"));
        assert_eq!(&winner.payload[..], br#"{"cep":"X"}"#);
        assert!(start.elapsed() < Duration::from_millis(200));

        settle().await;
        assert_eq!(a.cancellations(), 0);
        assert_eq!(b.cancellations(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn all_failures_are_reported_in_completion_order() {
        let providers = vec![
            Provider::new("a", Scripted::err(20, FetchError::Status(503))),
            Provider::new("b", Scripted::err(5, FetchError::Connection("refused".into()))),
        ];

        let result = race(&providers, SECOND).await.unwrap();

        let RaceResult::AllFailed(failures) = result else {
            panic!("expected all failed");
        };
        let causes: Vec<_> = failures
            .iter()
            .map(|f| (f.provider.as_str(), f.cause.clone()))
            .collect();
        assert_eq!(
            causes,
            vec![
                ("b", FetchError::Connection("refused".into())),
                ("a", FetchError::Status(503)),
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn slow_providers_time_out_at_deadline() {
        let a = Scripted::ok(2_000, "late");
        let b = Scripted::ok(2_000, "later");
        let providers = vec![Provider::new("a", a.clone()), Provider::new("b", b.clone())];
        let start = Instant::now();

        let result = race(&providers, SECOND).await.unwrap();

        assert_eq!(result, RaceResult::TimedOut(SECOND));
        let elapsed = start.elapsed();
        assert!(elapsed >= SECOND && elapsed < Duration::from_millis(1_100));

        settle().await;
        assert_eq!(a.cancellations() + b.cancellations(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn success_after_failures_still_wins() {
        let providers = vec![
            Provider::new("a", Scripted::err(10, FetchError::Read("reset".into()))),
            Provider::new("b", Scripted::ok(300, "payload")),
        ];

        let result = race(&providers, SECOND).await.unwrap();

        assert_eq!(result.winner().map(|w| w.provider.as_str()), Some("b"));
    }

    #[tokio::test(start_paused = true)]
    async fn failure_then_timeout_is_a_timeout() {
        let providers = vec![
            Provider::new("a", Scripted::err(10, FetchError::Status(500))),
            Provider::new("b", Scripted::ok(5_000, "never")),
        ];

        let result = race(&providers, Duration::from_millis(300)).await.unwrap();

        assert_eq!(result, RaceResult::TimedOut(Duration::from_millis(300)));
    }

    #[tokio::test(start_paused = true)]
    async fn simultaneous_successes_produce_one_winner() {
        let scripts: Vec<_> = (0..8).map(|_| Scripted::ok(50, "same")).collect();
        let providers: Vec<_> = scripts
            .iter()
            .enumerate()
            .map(|(i, s)| Provider::new(format!("p{i}").as_str(), s.clone()))
            .collect();

        let result = race(&providers, SECOND).await.unwrap();

        let winner = result.winner().expect("one provider should win");
        assert!(providers.iter().any(|p| p.id == winner.provider));

        settle().await;
        assert!(scripts.iter().all(|s| s.started() == 1));
    }

    #[tokio::test(start_paused = true)]
    async fn panicking_provider_is_reported_without_waiting_for_deadline() {
        let providers = vec![
            Provider::new("failing", Scripted::err(10, FetchError::Status(500))),
            Provider::new("boom", Exploding),
        ];
        let start = Instant::now();

        let result = race(&providers, SECOND).await.unwrap();

        let RaceResult::AllFailed(failures) = result else {
            panic!("expected every provider to fail");
        };
        assert_eq!(failures.len(), 2);
        assert!(failures
            .iter()
            .any(|f| matches!(f.cause, FetchError::Panicked(_)) && f.provider.as_str() == "boom"));
        assert!(start.elapsed() < Duration::from_millis(100));
    }

    #[tokio::test(start_paused = true)]
    async fn unbounded_deadline_does_not_overflow() {
        let providers = vec![Provider::new("a", Scripted::ok(1, "quick"))];

        let result = race(&providers, Duration::MAX).await.unwrap();

        assert_eq!(result.winner().map(|w| w.provider.as_str()), Some("a"));
    }

    #[tokio::test(start_paused = true)]
    async fn oblivious_fetchers_cannot_outlast_deadline() {
        let providers = vec![Provider::new("stubborn", Oblivious(Duration::from_secs(30)))];
        let start = Instant::now();

        let result = race(&providers, Duration::from_millis(250)).await.unwrap();

        assert!(matches!(result, RaceResult::TimedOut(_)));
        assert!(start.elapsed() < SECOND);
    }

    #[tokio::test(start_paused = true)]
    async fn dropping_the_race_cancels_fetchers() {
        let a = Scripted::ok(5_000, "slow");
        let providers = vec![Provider::new("a", a.clone())];

        let abandoned = time::timeout(Duration::from_millis(50), race(&providers, SECOND)).await;

        assert!(abandoned.is_err());
        settle().await;
        assert_eq!(a.cancellations(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn repeated_races_agree() {
        let providers = vec![
            Provider::new("a", Scripted::ok(100, "a")),
            Provider::new("b", Scripted::err(10, FetchError::Status(404))),
        ];

        let first = race(&providers, SECOND).await.unwrap();
        let second = race(&providers, SECOND).await.unwrap();

        assert_eq!(first.winner().map(|w| &w.payload), second.winner().map(|w| &w.payload));
        assert!(first.is_won() && second.is_won());
    }

    #[tokio::test]
    async fn invalid_input_is_rejected() {
        assert!(matches!(race(&[], SECOND).await, Err(RaceError::NoProviders)));

        let one = vec![Provider::new("a", Scripted::ok(0, "x"))];
        assert!(matches!(
            race(&one, Duration::ZERO).await,
            Err(RaceError::InvalidDeadline(_))
        ));

        let twins = vec![
            Provider::new("a", Scripted::ok(0, "x")),
            Provider::new("a", Scripted::ok(0, "y")),
        ];
        assert!(matches!(
            race(&twins, SECOND).await,
            Err(RaceError::DuplicateProvider(id)) if id.as_str() == "a"
        ));
    }

    #[test]
    fn into_result_maps_losses_to_errors() {
        let timed_out = RaceResult::TimedOut(SECOND).into_result();
        assert!(matches!(timed_out, Err(RaceError::Timeout(d)) if d == SECOND));

        let failed = RaceResult::AllFailed(vec![]).into_result();
        assert!(matches!(failed, Err(RaceError::AllFailed(f)) if f.is_empty()));
    }
}
