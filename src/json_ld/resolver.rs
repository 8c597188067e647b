use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use moka::future::Cache;
use reqwest::{Client, header};
use serde_json::Value;
use tracing::debug;

use crate::error::Error;

static APP_USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"),);
const ACCEPT_LD_JSON: &str = "application/ld+json, application/json";

/// Fetches remote JSON-LD context documents with a fixed per-request bound
/// and keeps successful bodies in a freshness-bounded cache. Failures are
/// returned to the caller, never retried here.
#[derive(Clone)]
pub(crate) struct ContextResolver {
    client: Client,
    cache: Cache<String, Value>,
    fetches: Arc<AtomicU64>,
}

impl ContextResolver {
    pub(crate) fn new(fetch_timeout: Duration, freshness: Duration) -> ContextResolver {
        ContextResolver {
            client: Client::builder()
                .http1_only()
                .user_agent(APP_USER_AGENT)
                .gzip(true)
                .timeout(fetch_timeout)
                .build()
                .unwrap(),
            cache: Cache::builder()
                .max_capacity(1024)
                .time_to_live(freshness)
                .build(),
            fetches: Arc::new(AtomicU64::new(0)),
        }
    }

    pub(crate) async fn resolve(&self, url: &str) -> Result<Value, Error> {
        if let Some(body) = self.cache.get(url).await {
            debug!(target: "ld", url, "context cache hit");
            return Ok(body);
        }
        let body = self.fetch(url).await?;
        self.cache.insert(url.to_owned(), body.clone()).await;
        Ok(body)
    }

    /// Network fetches performed so far; cache hits do not count.
    pub(crate) fn fetch_count(&self) -> u64 {
        self.fetches.load(Ordering::Relaxed)
    }

    async fn fetch(&self, url: &str) -> Result<Value, Error> {
        self.fetches.fetch_add(1, Ordering::Relaxed);
        debug!(target: "ld", url, "fetching remote context");
        let response = self
            .client
            .get(url)
            .header(header::ACCEPT, ACCEPT_LD_JSON)
            .send()
            .await
            .map_err(|error| fetch_error(url, error))?;
        if let Err(error) = response.error_for_status_ref() {
            return Err(fetch_error(url, error));
        }
        response.json().await.map_err(|error| {
            if error.is_decode() && !error.is_timeout() {
                Error::InvalidContext {
                    url: url.to_owned(),
                }
            } else {
                fetch_error(url, error)
            }
        })
    }
}

fn fetch_error(url: &str, error: reqwest::Error) -> Error {
    if error.is_timeout() {
        return Error::FetchTimeout {
            url: url.to_owned(),
        };
    }
    Error::FetchError {
        url: url.to_owned(),
        reason: error.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use std::time::{Duration, Instant};

    use anyhow::Result;
    use axum::routing::get;
    use axum::{Json, Router};
    use serde_json::json;
    use tokio::net::TcpListener;

    use crate::error::Error;

    use super::ContextResolver;

    fn resolver(timeout: Duration) -> ContextResolver {
        ContextResolver::new(timeout, Duration::from_secs(300))
    }

    async fn serve_contexts() -> Result<String> {
        let app = Router::new()
            .route(
                "/ctx",
                get(|| async { Json(json!({"@context": {"name": "https://schema.org/name"}})) }),
            )
            .route("/not-json", get(|| async { "certainly not JSON" }));
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        Ok(format!("http://{addr}"))
    }

    #[tokio::test]
    async fn repeated_resolve_fetches_once() -> Result<()> {
        let base = serve_contexts().await?;
        let resolver = resolver(Duration::from_secs(7));
        let url = format!("{base}/ctx");
        let first = resolver.resolve(&url).await.unwrap();
        let second = resolver.resolve(&url).await.unwrap();
        assert_eq!(first, second);
        assert_eq!(resolver.fetch_count(), 1);
        Ok(())
    }

    #[tokio::test]
    async fn distinct_urls_fetch_separately() -> Result<()> {
        let base = serve_contexts().await?;
        let resolver = resolver(Duration::from_secs(7));
        resolver.resolve(&format!("{base}/ctx")).await.unwrap();
        let _ = resolver.resolve(&format!("{base}/not-json")).await;
        assert_eq!(resolver.fetch_count(), 2);
        Ok(())
    }

    #[tokio::test]
    async fn non_json_body_is_invalid_context() -> Result<()> {
        let base = serve_contexts().await?;
        let resolver = resolver(Duration::from_secs(7));
        let url = format!("{base}/not-json");
        let error = resolver.resolve(&url).await.unwrap_err();
        assert!(matches!(error, Error::InvalidContext { url: u } if u == url));
        Ok(())
    }

    #[tokio::test]
    async fn http_failure_is_fetch_error() -> Result<()> {
        let base = serve_contexts().await?;
        let resolver = resolver(Duration::from_secs(7));
        let url = format!("{base}/no-such-context");
        let error = resolver.resolve(&url).await.unwrap_err();
        assert!(matches!(error, Error::FetchError { .. }));
        Ok(())
    }

    #[tokio::test]
    async fn silent_remote_times_out_at_the_configured_bound() -> Result<()> {
        // Accept connections but never answer.
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        tokio::spawn(async move {
            let mut sockets = vec![];
            loop {
                if let Ok((socket, _)) = listener.accept().await {
                    sockets.push(socket);
                }
            }
        });

        let bound = Duration::from_millis(500);
        let resolver = resolver(bound);
        let url = format!("http://{addr}/ctx");
        let started = Instant::now();
        let error = resolver.resolve(&url).await.unwrap_err();
        let elapsed = started.elapsed();

        assert!(matches!(error, Error::FetchTimeout { url: u } if u == url));
        assert!(
            elapsed >= Duration::from_millis(400),
            "gave up too early: {elapsed:?}"
        );
        assert!(elapsed < Duration::from_secs(5), "gave up too late: {elapsed:?}");
        Ok(())
    }
}
