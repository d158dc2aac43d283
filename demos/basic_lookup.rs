//! Basic example racing the public CEP services.
//!
//! Looks up a CEP against BrasilAPI and ViaCEP at once and prints whichever
//! answers first, then inspects the failures or timeout when nobody does.

use std::{env, time::Instant};

use cep_race::{cep, RaceClient, RaceConfig, RaceResult};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let raw = env::args().nth(1).unwrap_or_else(|| cep::DEFAULT_CEP.to_string());
    let cep = cep::Cep::parse(&raw)?;

    let providers = cep::default_providers();
    eprintln!(
        "Using providers:\n{}",
        providers
            .iter()
            .map(|p| format!("- {}: {}", p.id, p.target(cep.as_str())))
            .collect::<Vec<_>>()
            .join("\n")
    );

    let client = RaceClient::new(providers, RaceConfig::default())?;

    let t0 = Instant::now();
    let result = client.race(cep.as_str()).await?;
    let dt = t0.elapsed();

    match result {
        RaceResult::Won(winner) => {
            println!(
                "[won]      provider={} latency={:?} race={:?} bytes={}",
                winner.provider,
                winner.latency,
                dt,
                winner.payload.len()
            );
            println!("{}", String::from_utf8_lossy(&winner.payload));
        }
        RaceResult::AllFailed(failures) => {
            println!("[failed]   race={:?}", dt);
            for failure in failures {
                println!("  {} after {:?}: {}", failure.provider, failure.latency, failure.cause);
            }
        }
        RaceResult::TimedOut(deadline) => {
            println!("[timeout]  no response within {:?}", deadline);
        }
    }

    Ok(())
}
