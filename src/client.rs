use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
};

use bytes::Bytes;

use crate::{
    config::{ProviderConfig, ProviderId, RaceConfig},
    context::ExecutionContext,
    errors::RaceError,
    fetcher::{fetch_outcome, Fetch, Outcome, Provider, Success},
    race::{race, RaceResult},
};

#[derive(Debug, Default)]
struct ProviderStats {
    wins: u64,
    total_latency_ms: f64,
    errors: u64,
    timeouts: u64,
}

/// Snapshot of provider performance statistics.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProviderStatsSnapshot {
    /// Number of times this provider won the race.
    pub wins: u64,
    /// Average latency in milliseconds for winning calls.
    pub avg_latency_ms: f64,
    /// Number of races lost with every provider failing, this one included.
    pub errors: u64,
    /// Number of races that timed out with this provider taking part.
    pub timeouts: u64,
}

#[derive(Clone)]
enum Source {
    /// HTTP endpoint; the URL is resolved against the lookup key on every race.
    Http(ProviderConfig),
    /// Caller supplied fetcher, used as-is regardless of the key.
    Custom(Arc<dyn Fetch>),
}

/// Races lookups across a fixed set of redundant providers.
///
/// Every call launches all providers at once and keeps the first successful
/// payload. The client is cheap to clone; clones share the HTTP connection
/// pool and the statistics.
#[derive(Clone)]
pub struct RaceClient {
    providers: Arc<Vec<(ProviderId, Source)>>,
    http: reqwest::Client,
    cfg: RaceConfig,
    stats: Arc<Mutex<HashMap<ProviderId, ProviderStats>>>,
}

impl RaceClient {
    /// Creates a client racing the given HTTP providers.
    ///
    /// # Example
    /// ```no_run
    /// use cep_race::{ProviderConfig, RaceClient, RaceConfig};
    ///
    /// let providers = vec![
    ///     ProviderConfig::new("brasilapi", "https://brasilapi.com.br/api/cep/v1/{key}"),
    ///     ProviderConfig::new("viacep", "http://viacep.com.br/ws/{key}/json/"),
    /// ];
    ///
    /// let client = RaceClient::new(providers, RaceConfig::default()).unwrap();
    /// ```
    pub fn new(provider_cfgs: Vec<ProviderConfig>, cfg: RaceConfig) -> Result<Self, RaceError> {
        let sources = provider_cfgs
            .into_iter()
            .map(|pcfg| (pcfg.id.clone(), Source::Http(pcfg)))
            .collect();
        Self::build(sources, cfg)
    }

    /// Creates a client racing caller supplied fetchers.
    pub fn from_providers(providers: Vec<Provider>, cfg: RaceConfig) -> Result<Self, RaceError> {
        let sources = providers
            .into_iter()
            .map(|p| (p.id.clone(), Source::Custom(p.shared_fetcher())))
            .collect();
        Self::build(sources, cfg)
    }

    fn build(sources: Vec<(ProviderId, Source)>, cfg: RaceConfig) -> Result<Self, RaceError> {
        cfg.validate()?;
        if sources.is_empty() {
            return Err(RaceError::NoProviders);
        }

        let mut stats_map = HashMap::new();
        for (id, _) in &sources {
            if stats_map.insert(id.clone(), ProviderStats::default()).is_some() {
                return Err(RaceError::DuplicateProvider(id.clone()));
            }
        }

        let http = reqwest::Client::builder()
            .connect_timeout(cfg.connect_timeout)
            .user_agent(cfg.user_agent.clone())
            .build()
            .map_err(|e| RaceError::HttpClient(e.to_string()))?;

        Ok(Self {
            providers: Arc::new(sources),
            http,
            cfg,
            stats: Arc::new(Mutex::new(stats_map)),
        })
    }

    /// Identifiers of the configured providers, in configuration order.
    pub fn provider_ids(&self) -> Vec<ProviderId> {
        self.providers.iter().map(|(id, _)| id.clone()).collect()
    }

    pub fn config(&self) -> &RaceConfig {
        &self.cfg
    }

    fn provider_for(&self, id: &ProviderId, source: &Source, key: &str) -> Provider {
        match source {
            Source::Http(pcfg) => Provider::http(self.http.clone(), pcfg, key),
            Source::Custom(fetcher) => Provider::from_shared(id.clone(), fetcher.clone()),
        }
    }

    /// Returns a snapshot of accumulated performance statistics for each provider.
    pub fn provider_stats(&self) -> HashMap<ProviderId, ProviderStatsSnapshot> {
        let Ok(stats) = self.stats.lock() else {
            return HashMap::new();
        };

        stats
            .iter()
            .map(|(id, s)| {
                let avg = if s.wins > 0 {
                    s.total_latency_ms / (s.wins as f64)
                } else {
                    0.0
                };

                (
                    id.clone(),
                    ProviderStatsSnapshot {
                        wins: s.wins,
                        avg_latency_ms: avg,
                        errors: s.errors,
                        timeouts: s.timeouts,
                    },
                )
            })
            .collect()
    }

    /// Clears all accumulated statistics.
    pub fn reset_stats(&self) {
        if let Ok(mut stats) = self.stats.lock() {
            for entry in stats.values_mut() {
                *entry = ProviderStats::default();
            }
        }
    }

    fn record(&self, raced: &[Provider], result: &RaceResult) {
        let Ok(mut stats) = self.stats.lock() else {
            return;
        };

        match result {
            RaceResult::Won(success) => {
                if let Some(entry) = stats.get_mut(&success.provider) {
                    entry.wins += 1;
                    entry.total_latency_ms += success.latency.as_secs_f64() * 1000.0;
                }
            }
            RaceResult::AllFailed(failures) => {
                for failure in failures {
                    if let Some(entry) = stats.get_mut(&failure.provider) {
                        entry.errors += 1;
                    }
                }
            }
            RaceResult::TimedOut(_) => {
                for provider in raced {
                    if let Some(entry) = stats.get_mut(&provider.id) {
                        entry.timeouts += 1;
                    }
                }
            }
        }
    }

    /// Races every provider for `key` and returns the full race result.
    pub async fn race(&self, key: &str) -> Result<RaceResult, RaceError> {
        self.race_first(self.providers.len(), key).await
    }

    /// Races only the first `count` configured providers for `key`.
    pub async fn race_first(&self, count: usize, key: &str) -> Result<RaceResult, RaceError> {
        let providers: Vec<Provider> = self
            .providers
            .iter()
            .take(count)
            .map(|(id, source)| self.provider_for(id, source, key))
            .collect();

        let result = race(&providers, self.cfg.deadline).await?;
        self.record(&providers, &result);
        Ok(result)
    }

    /// Races every provider for `key`, returning the winner or why nobody won.
    pub async fn lookup(&self, key: &str) -> Result<Success, RaceError> {
        self.race(key).await?.into_result()
    }

    /// Races every provider for `key`, returning only the winning payload.
    pub async fn lookup_any(&self, key: &str) -> Result<Bytes, RaceError> {
        let success = self.lookup(key).await?;
        Ok(success.payload)
    }

    /// Queries a single provider without racing, bounded by the same deadline.
    ///
    /// Returns `None` if `id` is not configured.
    pub async fn fetch_single(&self, id: &ProviderId, key: &str) -> Option<Outcome> {
        let (id, source) = self.providers.iter().find(|(pid, _)| pid == id)?;
        let provider = self.provider_for(id, source, key);

        let ctx = ExecutionContext::with_deadline(self.cfg.deadline);
        let _cancel = ctx.cancel_on_drop();
        Some(fetch_outcome(&ctx, &provider).await)
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::{errors::FetchError, fetcher::testing::Scripted};

    fn client(providers: Vec<Provider>) -> RaceClient {
        RaceClient::from_providers(providers, RaceConfig::default()).unwrap()
    }

    #[test]
    fn rejects_empty_and_duplicate_providers() {
        assert!(matches!(
            RaceClient::new(vec![], RaceConfig::default()),
            Err(RaceError::NoProviders)
        ));

        let twins = vec![
            ProviderConfig::new("a", "http://a/{key}"),
            ProviderConfig::new("a", "http://b/{key}"),
        ];
        assert!(matches!(
            RaceClient::new(twins, RaceConfig::default()),
            Err(RaceError::DuplicateProvider(_))
        ));
    }

    #[test]
    fn rejects_zero_deadline() {
        let cfg = RaceConfig::default().with_deadline(Duration::ZERO);
        let providers = vec![ProviderConfig::new("a", "http://a/{key}")];
        assert!(matches!(
            RaceClient::new(providers, cfg),
            Err(RaceError::InvalidDeadline(_))
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn wins_and_errors_are_recorded() {
        let client = client(vec![
            Provider::new("fast", Scripted::ok(50, "payload")),
            Provider::new("broken", Scripted::err(10, FetchError::Status(502))),
        ]);

        let payload = client.lookup_any("01153000").await.unwrap();
        assert_eq!(&payload[..], b"payload");

        let stats = client.provider_stats();
        let fast = &stats[&ProviderId::from("fast")];
        assert_eq!(fast.wins, 1);
        assert!(fast.avg_latency_ms >= 50.0);
        assert_eq!(stats[&ProviderId::from("broken")].errors, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn all_failed_and_timeouts_are_recorded() {
        let failing = client(vec![
            Provider::new("a", Scripted::err(10, FetchError::Status(500))),
            Provider::new("b", Scripted::err(20, FetchError::Read("eof".into()))),
        ]);
        assert!(matches!(
            failing.lookup("x").await,
            Err(RaceError::AllFailed(f)) if f.len() == 2
        ));
        assert!(failing.provider_stats().values().all(|s| s.errors == 1));

        let slow = client(vec![Provider::new("a", Scripted::ok(5_000, "late"))]);
        assert!(matches!(slow.lookup("x").await, Err(RaceError::Timeout(_))));
        assert_eq!(slow.provider_stats()[&ProviderId::from("a")].timeouts, 1);

        slow.reset_stats();
        assert_eq!(
            slow.provider_stats()[&ProviderId::from("a")],
            ProviderStatsSnapshot::default()
        );
    }

    #[tokio::test(start_paused = true)]
    async fn single_provider_fetch_skips_the_race() {
        let client = client(vec![
            Provider::new("a", Scripted::ok(10, "from a")),
            Provider::new("b", Scripted::ok(1, "from b")),
        ]);

        let outcome = client.fetch_single(&ProviderId::from("a"), "k").await;
        assert!(matches!(
            outcome,
            Some(Outcome::Success(Success { ref payload, .. })) if &payload[..] == b"from a"
        ));
        assert!(client
            .fetch_single(&ProviderId::from("missing"), "k")
            .await
            .is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn race_first_limits_the_field() {
        let fast = Scripted::ok(1, "fast");
        let client = client(vec![
            Provider::new("slow", Scripted::ok(100, "slow")),
            Provider::new("fast", fast.clone()),
        ]);

        let result = client.race_first(1, "k").await.unwrap();

        assert_eq!(result.winner().map(|w| w.provider.as_str()), Some("slow"));
        assert_eq!(fast.started(), 0);
        assert!(matches!(
            client.race_first(0, "k").await,
            Err(RaceError::NoProviders)
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn timeouts_only_count_providers_that_raced() {
        let client = client(vec![
            Provider::new("a", Scripted::ok(5_000, "late")),
            Provider::new("b", Scripted::ok(5_000, "later")),
        ]);

        let result = client.race_first(1, "k").await.unwrap();

        assert!(matches!(result, RaceResult::TimedOut(_)));
        let stats = client.provider_stats();
        assert_eq!(stats[&ProviderId::from("a")].timeouts, 1);
        assert_eq!(stats[&ProviderId::from("b")].timeouts, 0);
    }

    #[test]
    fn provider_ids_keep_configuration_order() {
        let client = RaceClient::new(
            vec![
                ProviderConfig::new("z", "http://z/{key}"),
                ProviderConfig::new("a", "http://a/{key}"),
            ],
            RaceConfig::default(),
        )
        .unwrap();

        assert_eq!(
            client.provider_ids(),
            vec![ProviderId::from("z"), ProviderId::from("a")]
        );
    }
}
