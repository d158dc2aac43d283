use std::time::Duration;

use crate::{config::ProviderId, fetcher::Failure};

/// Errors a single provider fetch can end with.
///
/// These never escape a fetcher: they are captured into a [`Failure`] outcome.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum FetchError {
    /// Opening or using the connection to the provider failed.
    #[error("connection error: {0}")]
    Connection(String),

    /// The provider answered with a non-success HTTP status.
    #[error("unexpected status {0}")]
    Status(u16),

    /// Consuming the response body failed.
    #[error("read error: {0}")]
    Read(String),

    /// The fetcher panicked; carries the panic message when there is one.
    #[error("fetcher panicked: {0}")]
    Panicked(String),

    /// The fetch was abandoned because the race concluded or its deadline passed.
    #[error("cancelled")]
    Cancelled,
}

impl FetchError {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}

/// Errors that can occur when racing providers.
#[derive(thiserror::Error, Debug)]
pub enum RaceError {
    /// No providers were configured.
    #[error("no providers configured")]
    NoProviders,

    /// Two providers share the same identifier.
    #[error("duplicate provider id {0}")]
    DuplicateProvider(ProviderId),

    /// The race deadline must be strictly positive.
    #[error("invalid race deadline {0:?}")]
    InvalidDeadline(Duration),

    /// A provider entry in configuration text was not `name=url`.
    #[error("invalid provider entry {0:?}, expected name=url")]
    InvalidProviderSpec(String),

    /// The shared HTTP client could not be built.
    #[error("failed to initialize HTTP client: {0}")]
    HttpClient(String),

    /// Every provider failed before the deadline.
    ///
    /// Contains one failure per provider, in arrival order.
    #[error("all providers failed: {0:?}")]
    AllFailed(Vec<Failure>),

    /// No provider succeeded within the deadline.
    #[error("race timed out after {0:?}")]
    Timeout(Duration),
}
