//! Provider fetchers: one request/response cycle against one external source.

use std::{
    any::Any,
    fmt,
    panic::AssertUnwindSafe,
    pin::pin,
    sync::Arc,
    time::Duration,
};

use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use futures::{FutureExt, StreamExt};
use tokio::time::Instant;
use tracing::debug;

use crate::{
    config::{ProviderConfig, ProviderId},
    context::ExecutionContext,
    errors::FetchError,
};

/// Capability to fetch one payload from an external source.
///
/// Implementations must observe `ctx` at every I/O boundary and return
/// [`FetchError::Cancelled`] once it is done.
#[async_trait]
pub trait Fetch: Send + Sync {
    async fn fetch(&self, ctx: &ExecutionContext) -> Result<Bytes, FetchError>;
}

/// A named source taking part in a race.
#[derive(Clone)]
pub struct Provider {
    pub id: ProviderId,
    fetcher: Arc<dyn Fetch>,
}

impl Provider {
    pub fn new(id: impl Into<ProviderId>, fetcher: impl Fetch + 'static) -> Self {
        Self {
            id: id.into(),
            fetcher: Arc::new(fetcher),
        }
    }

    pub fn from_shared(id: impl Into<ProviderId>, fetcher: Arc<dyn Fetch>) -> Self {
        Self {
            id: id.into(),
            fetcher,
        }
    }

    pub fn shared_fetcher(&self) -> Arc<dyn Fetch> {
        self.fetcher.clone()
    }

    /// Builds an HTTP provider targeting `cfg`'s URL resolved for `key`.
    pub fn http(client: reqwest::Client, cfg: &ProviderConfig, key: &str) -> Self {
        Self::new(cfg.id.clone(), HttpFetcher::new(client, cfg.target(key)))
    }
}

impl fmt::Debug for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Provider").field("id", &self.id).finish()
    }
}

/// Fetches a URL with a single GET and returns the full body.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: reqwest::Client,
    url: String,
}

impl HttpFetcher {
    pub fn new(client: reqwest::Client, url: impl Into<String>) -> Self {
        Self {
            client,
            url: url.into(),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl Fetch for HttpFetcher {
    async fn fetch(&self, ctx: &ExecutionContext) -> Result<Bytes, FetchError> {
        let response = ctx
            .run(self.client.get(&self.url).send())
            .await?
            .map_err(|e| FetchError::Connection(error_chain(&e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status(status.as_u16()));
        }

        // Read chunk by chunk so cancellation lands between reads. Dropping the
        // stream on any early return releases the connection.
        let mut body = BytesMut::new();
        let mut stream = pin!(response.bytes_stream());
        while let Some(chunk) = ctx.run(stream.next()).await? {
            let chunk = chunk.map_err(|e| FetchError::Read(error_chain(&e)))?;
            body.extend_from_slice(&chunk);
        }

        Ok(body.freeze())
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        (*msg).to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

fn error_chain(err: &dyn std::error::Error) -> String {
    let mut msg = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        msg.push_str(": ");
        msg.push_str(&cause.to_string());
        source = cause.source();
    }
    msg
}

/// A provider that returned a payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Success {
    pub provider: ProviderId,
    pub payload: Bytes,
    /// Time from launch to the last byte.
    pub latency: Duration,
}

/// A provider that could not return a payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Failure {
    pub provider: ProviderId,
    pub cause: FetchError,
    pub latency: Duration,
}

/// Result of one provider's fetch attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Success(Success),
    Failure(Failure),
}

impl Outcome {
    pub fn provider(&self) -> &ProviderId {
        match self {
            Self::Success(s) => &s.provider,
            Self::Failure(f) => &f.provider,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }
}

/// Runs `provider`'s fetcher under `ctx` and always produces exactly one outcome.
///
/// The fetcher is bounded by the context even if it ignores it: once the
/// context is done the attempt resolves to [`FetchError::Cancelled`]. A
/// panicking fetcher resolves to [`FetchError::Panicked`]. An already-finished
/// context never starts the fetch.
pub async fn fetch_outcome(ctx: &ExecutionContext, provider: &Provider) -> Outcome {
    let start = Instant::now();
    let result = if ctx.is_done() {
        Err(FetchError::Cancelled)
    } else {
        // The fetcher is polled first so a cooperative one unwinds on its own.
        tokio::select! {
            biased;
            fetched = AssertUnwindSafe(provider.fetcher.fetch(ctx)).catch_unwind() => {
                fetched.unwrap_or_else(|payload| Err(FetchError::Panicked(panic_message(&*payload))))
            }
            _ = ctx.done() => Err(FetchError::Cancelled),
        }
    };
    let latency = start.elapsed();

    match result {
        Ok(payload) => {
            debug!(provider = %provider.id, ?latency, bytes = payload.len(), "provider succeeded");
            Outcome::Success(Success {
                provider: provider.id.clone(),
                payload,
                latency,
            })
        }
        Err(cause) => {
            debug!(provider = %provider.id, ?latency, %cause, "provider failed");
            Outcome::Failure(Failure {
                provider: provider.id.clone(),
                cause,
                latency,
            })
        }
    }
}


#[cfg(test)]
mod tests {
    use super::{testing::*, *};

    #[tokio::test(start_paused = true)]
    async fn success_carries_payload_and_provider() {
        let ctx = ExecutionContext::with_deadline(Duration::from_secs(1));
        let provider = Provider::new("a", Scripted::ok(100, r#"{"cep":"X"}"#));

        let outcome = fetch_outcome(&ctx, &provider).await;

        let Outcome::Success(success) = outcome else {
            panic!("expected success");
        };
        assert_eq!(success.provider, ProviderId::from("a"));
        assert_eq!(&success.payload[..], br#"{"cep":"X"}"#);
        assert!(success.latency >= Duration::from_millis(100));
    }

    #[tokio::test(start_paused = true)]
    async fn failure_keeps_underlying_cause() {
        let ctx = ExecutionContext::with_deadline(Duration::from_secs(1));
        let cause = FetchError::Connection("refused".into());
        let provider = Provider::new("b", Scripted::err(0, cause.clone()));

        let outcome = fetch_outcome(&ctx, &provider).await;

        assert_eq!(outcome.provider().as_str(), "b");
        assert!(matches!(outcome, Outcome::Failure(Failure { cause: c, .. }) if c == cause));
    }

    #[tokio::test(start_paused = true)]
    async fn cancelled_context_never_starts_fetch() {
        let ctx = ExecutionContext::with_deadline(Duration::from_secs(1));
        ctx.cancel();
        let script = Scripted::ok(10, "unused");
        let provider = Provider::new("a", script.clone());

        let outcome = fetch_outcome(&ctx, &provider).await;

        assert_eq!(script.started(), 0);
        assert!(
            matches!(outcome, Outcome::Failure(Failure { cause, .. }) if cause.is_cancelled())
        );
    }

    #[tokio::test(start_paused = true)]
    async fn oblivious_fetcher_is_cut_at_deadline() {
        let ctx = ExecutionContext::with_deadline(Duration::from_millis(200));
        let provider = Provider::new("slow", Oblivious(Duration::from_secs(5)));
        let start = Instant::now();

        let outcome = fetch_outcome(&ctx, &provider).await;

        assert!(start.elapsed() < Duration::from_secs(1));
        assert!(
            matches!(outcome, Outcome::Failure(Failure { cause, .. }) if cause.is_cancelled())
        );
    }

    #[tokio::test(start_paused = true)]
    async fn panicking_fetcher_becomes_a_failure() {
        let ctx = ExecutionContext::with_deadline(Duration::from_secs(1));
        let provider = Provider::new("boom", Exploding);

        let outcome = fetch_outcome(&ctx, &provider).await;

        let Outcome::Failure(failure) = outcome else {
            panic!("expected failure");
        };
        assert_eq!(failure.provider.as_str(), "boom");
        assert_eq!(failure.cause, FetchError::Panicked("provider blew up".into()));
    }

    #[test]
    fn error_chain_joins_sources() {
        #[derive(Debug, thiserror::Error)]
        #[error("outer")]
        struct Outer(#[source] std::io::Error);

        let err = Outer(std::io::Error::new(std::io::ErrorKind::Other, "inner"));
        assert_eq!(error_chain(&err), "outer: inner");
    }
}
