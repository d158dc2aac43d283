//! Repeated lookups under bounded concurrency.
//!
//! Fires `NUM_LOOKUPS` races against the public CEP services with at most
//! `MAX_IN_FLIGHT` running at once, then prints how often each provider won.
//! Keep the numbers small: these are shared public APIs.

use std::{
    sync::Arc,
    time::{Duration, Instant},
};

use cep_race::{cep, ProviderId, RaceClient, RaceConfig};
use tokio::sync::{mpsc, Semaphore};

const NUM_LOOKUPS: usize = 20;
const MAX_IN_FLIGHT: usize = 4;

#[derive(Debug)]
enum LookupOutcome {
    Ok {
        provider: ProviderId,
        latency: Duration,
    },
    Err {
        error: String,
        latency: Duration,
    },
}

#[derive(Debug)]
struct LookupResult {
    idx: usize,
    outcome: LookupOutcome,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let client = RaceClient::new(cep::default_providers(), RaceConfig::patient())?;

    let (tx, mut rx) = mpsc::channel::<LookupResult>(MAX_IN_FLIGHT * 2);
    let semaphore = Arc::new(Semaphore::new(MAX_IN_FLIGHT));

    let consumer = tokio::spawn(async move {
        let mut results = Vec::with_capacity(NUM_LOOKUPS);

        while let Some(res) = rx.recv().await {
            match &res.outcome {
                LookupOutcome::Ok { provider, latency } => {
                    println!("[lookup {:03}] OK   provider={} latency={:?}", res.idx, provider, latency);
                }
                LookupOutcome::Err { error, latency } => {
                    println!("[lookup {:03}] ERR  latency={:?} error={}", res.idx, latency, error);
                }
            }
            results.push(res);
        }

        results
    });

    for idx in 0..NUM_LOOKUPS {
        let client = client.clone();
        let tx = tx.clone();
        let sem = semaphore.clone();

        tokio::spawn(async move {
            let Ok(_permit) = sem.acquire_owned().await else {
                return;
            };

            let start = Instant::now();
            let res = client.lookup(cep::DEFAULT_CEP).await;
            let latency = start.elapsed();

            let outcome = match res {
                Ok(winner) => LookupOutcome::Ok {
                    provider: winner.provider,
                    latency,
                },
                Err(e) => LookupOutcome::Err {
                    error: e.to_string(),
                    latency,
                },
            };

            let _ = tx.send(LookupResult { idx, outcome }).await;
        });
    }

    drop(tx);
    let results = consumer.await?;

    let errors = results
        .iter()
        .filter(|r| matches!(r.outcome, LookupOutcome::Err { .. }))
        .count();

    println!("\n=== summary ===");
    println!("lookups   : {}", NUM_LOOKUPS);
    println!("successes : {}", NUM_LOOKUPS - errors);
    println!("errors    : {}", errors);

    let mut stats: Vec<_> = client.provider_stats().into_iter().collect();
    stats.sort_by(|a, b| a.0.cmp(&b.0));
    for (provider, s) in stats {
        println!(
            "provider {:>10}: wins = {:3}, avg_latency = {:8.3} ms, failed = {}, timeouts = {}",
            provider.as_str(),
            s.wins,
            s.avg_latency_ms,
            s.errors,
            s.timeouts,
        );
    }

    Ok(())
}
