//! Races redundant data providers for the same resource and keeps the first success.
//!
//! Every provider is queried concurrently under one shared deadline. The first
//! successful payload wins, every other in-flight request is cancelled, and the
//! caller gets exactly one of: the winner, the full list of per-provider
//! failures, or a timeout.
//!
//! # Quick Start
//!
//! ```no_run
//! use cep_race::{cep, RaceClient, RaceConfig};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = RaceClient::new(cep::default_providers(), RaceConfig::default())?;
//!
//! let winner = client.lookup("01153000").await?;
//! println!(
//!     "Response from {}:\n{}",
//!     winner.provider,
//!     String::from_utf8_lossy(&winner.payload)
//! );
//! # Ok(())
//! # }
//! ```
//!
//! # Race Semantics
//!
//! 1. One task per provider is launched at once, all sharing an [`ExecutionContext`]
//! 2. Outcomes are consumed in completion order; the first success wins
//! 3. If every provider fails, the race reports all failures in arrival order
//! 4. If the deadline passes first, the race reports a timeout
//! 5. On every path the context is cancelled exactly once
//!
//! Custom sources plug in through the [`Fetch`] trait; [`race`] runs any set
//! of [`Provider`]s directly.

pub mod cep;
pub mod client;
pub mod config;
pub mod context;
pub mod errors;
pub mod fetcher;
pub mod race;

pub use bytes::Bytes;
pub use client::{ProviderStatsSnapshot, RaceClient};
pub use config::{ProviderConfig, ProviderId, RaceConfig};
pub use context::ExecutionContext;
pub use errors::{FetchError, RaceError};
pub use fetcher::{fetch_outcome, Failure, Fetch, HttpFetcher, Outcome, Provider, Success};
pub use race::{race, RaceResult};
