use std::{fmt, sync::Arc, time::Duration};

use crate::errors::RaceError;

/// Placeholder substituted with the lookup key in provider URLs.
pub const KEY_PLACEHOLDER: &str = "{key}";

/// Unique identifier for a provider within one race.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ProviderId(pub Arc<str>);

impl ProviderId {
    pub fn new(id: impl Into<Arc<str>>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ProviderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ProviderId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

/// Configuration for a single HTTP provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderConfig {
    /// Unique identifier for this provider.
    pub id: ProviderId,
    /// Endpoint URL. May contain `{key}`, replaced by the lookup key on every race.
    pub url: String,
}

impl ProviderConfig {
    pub fn new(id: impl Into<Arc<str>>, url: impl Into<String>) -> Self {
        Self {
            id: ProviderId::new(id),
            url: url.into(),
        }
    }

    /// Resolves the URL to fetch for `key`.
    pub fn target(&self, key: &str) -> String {
        self.url.replace(KEY_PLACEHOLDER, key)
    }
}

/// Race configuration.
///
/// The deadline bounds the whole race: every provider shares it, and the race
/// reports a timeout when it passes without a winner.
#[derive(Debug, Clone)]
pub struct RaceConfig {
    /// Overall budget for one race.
    pub deadline: Duration,

    /// Upper bound on establishing a single connection.
    ///
    /// Kept separate from the deadline so a provider that never accepts the
    /// connection fails on its own instead of only through the race timeout.
    pub connect_timeout: Duration,

    /// `User-Agent` sent with every request.
    pub user_agent: String,
}

impl Default for RaceConfig {
    fn default() -> Self {
        Self {
            deadline: Duration::from_secs(1),
            connect_timeout: Duration::from_millis(800),
            user_agent: concat!("cep-race/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

impl RaceConfig {
    /// Creates a configuration tuned for interactive use:
    /// - 500ms deadline
    /// - 300ms connect timeout
    pub fn fast() -> Self {
        Self {
            deadline: Duration::from_millis(500),
            connect_timeout: Duration::from_millis(300),
            ..Self::default()
        }
    }

    /// Creates a configuration for slow or distant providers:
    /// - 3 second deadline
    /// - 2 second connect timeout
    pub fn patient() -> Self {
        Self {
            deadline: Duration::from_secs(3),
            connect_timeout: Duration::from_secs(2),
            ..Self::default()
        }
    }

    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = deadline;
        self
    }

    pub fn validate(&self) -> Result<(), RaceError> {
        if self.deadline.is_zero() {
            return Err(RaceError::InvalidDeadline(self.deadline));
        }
        Ok(())
    }
}

/// Parses a comma separated `name=url` list of providers.
///
/// Blank entries are skipped, so trailing commas are accepted.
pub fn parse_provider_list(raw: &str) -> Result<Vec<ProviderConfig>, RaceError> {
    let mut providers = Vec::new();

    for entry in raw.split(',').map(str::trim).filter(|e| !e.is_empty()) {
        let (name, url) = entry
            .split_once('=')
            .ok_or_else(|| RaceError::InvalidProviderSpec(entry.to_string()))?;
        let (name, url) = (name.trim(), url.trim());

        if name.is_empty() || url.is_empty() {
            return Err(RaceError::InvalidProviderSpec(entry.to_string()));
        }

        providers.push(ProviderConfig::new(name, url));
    }

    Ok(providers)
}

/// Parses a strictly positive deadline expressed in milliseconds.
pub fn parse_deadline_ms(raw: &str) -> Result<Duration, RaceError> {
    let ms: u64 = raw
        .trim()
        .parse()
        .map_err(|_| RaceError::InvalidDeadline(Duration::ZERO))?;
    let deadline = Duration::from_millis(ms);
    if deadline.is_zero() {
        return Err(RaceError::InvalidDeadline(deadline));
    }
    Ok(deadline)
}
