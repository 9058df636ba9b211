//! Non-blocking HTTP and local-file fetcher.
//!
//! Requests run on a small private tokio runtime; the calling thread only
//! ever polls a shared slot table, so `fetch` never blocks. Each URL gets one
//! slot: the first call starts the request, later calls observe it until the
//! caller releases the bytes. Error statuses are reported to a single poll and
//! then forgotten, so the next call retries.
//!
//! URLs without an `http://` or `https://` scheme are read from the local
//! filesystem (an optional `file://` prefix and any query string are
//! stripped), with a missing file reported as 404.
//!
//! The fetcher owns its runtime and must not be dropped from inside another
//! async context.

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tokio::runtime::Runtime;
use tokio::sync::Semaphore;
use tracing::{debug, warn};

use super::types::{ByteFetcher, FetchError, FetchFlags, FetchOutcome, STATUS_NETWORK_ERROR};

/// Default request timeout in seconds.
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Default number of deferred requests allowed in flight at once.
pub const DEFAULT_MAX_CONCURRENT: usize = 8;

/// Default User-Agent header.
pub const DEFAULT_USER_AGENT: &str = concat!("skylayer/", env!("CARGO_PKG_VERSION"));

/// Settings for [`HttpFetcher`].
#[derive(Debug, Clone)]
pub struct HttpFetcherConfig {
    pub timeout: Duration,
    /// Limit for requests flagged as deferred; others start immediately.
    pub max_concurrent: usize,
    pub user_agent: String,
}

impl Default for HttpFetcherConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            max_concurrent: DEFAULT_MAX_CONCURRENT,
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }
}

enum Slot {
    InFlight,
    Done(FetchOutcome),
}

/// Polling fetcher backed by reqwest.
pub struct HttpFetcher {
    client: reqwest::Client,
    runtime: Runtime,
    slots: Arc<DashMap<String, Slot>>,
    deferred: Arc<Semaphore>,
}

impl HttpFetcher {
    /// Creates a fetcher with default configuration.
    pub fn new() -> Result<Self, FetchError> {
        Self::with_config(HttpFetcherConfig::default())
    }

    /// Creates a fetcher with custom configuration.
    pub fn with_config(config: HttpFetcherConfig) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .user_agent(config.user_agent)
            .build()?;

        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(2)
            .thread_name("skylayer-fetch")
            .enable_all()
            .build()
            .map_err(FetchError::Runtime)?;

        Ok(Self {
            client,
            runtime,
            slots: Arc::new(DashMap::new()),
            deferred: Arc::new(Semaphore::new(config.max_concurrent.max(1))),
        })
    }

    /// Number of URLs currently tracked (in flight or awaiting release).
    pub fn tracked(&self) -> usize {
        self.slots.len()
    }

    fn spawn(&self, url: String, flags: FetchFlags) {
        let client = self.client.clone();
        let slots = Arc::clone(&self.slots);
        let limiter = flags.deferred.then(|| Arc::clone(&self.deferred));

        self.runtime.spawn(async move {
            let _permit = match limiter {
                Some(semaphore) => semaphore.acquire_owned().await.ok(),
                None => None,
            };

            let outcome = if is_remote(&url) {
                fetch_http(&client, &url).await
            } else {
                fetch_file(&url).await
            };

            if outcome.code() == 404 && !flags.accept_404 {
                warn!(url = %url, "Resource not found");
            }
            slots.insert(url, Slot::Done(outcome));
        });
    }
}

impl ByteFetcher for HttpFetcher {
    fn fetch(&self, url: &str, flags: FetchFlags) -> FetchOutcome {
        match self.slots.entry(url.to_string()) {
            Entry::Occupied(entry) => match entry.get() {
                Slot::InFlight => return FetchOutcome::Pending,
                Slot::Done(FetchOutcome::Ready(bytes)) => return FetchOutcome::Ready(bytes.clone()),
                // Failures are handed out once; the next call starts a new request.
                Slot::Done(_) => {
                    return match entry.remove() {
                        Slot::Done(outcome) => outcome,
                        Slot::InFlight => FetchOutcome::Pending,
                    };
                }
            },
            Entry::Vacant(entry) => {
                entry.insert(Slot::InFlight);
            }
        }
        debug!(url, deferred = flags.deferred, "Starting fetch");
        self.spawn(url.to_string(), flags);
        FetchOutcome::Pending
    }

    fn release(&self, url: &str) {
        self.slots
            .remove_if(url, |_, slot| matches!(slot, Slot::Done(_)));
    }
}

/// Whether `url` must go through HTTP rather than the filesystem.
pub fn is_remote(url: &str) -> bool {
    url.starts_with("http://") || url.starts_with("https://")
}

async fn fetch_http(client: &reqwest::Client, url: &str) -> FetchOutcome {
    let response = match client.get(url).send().await {
        Ok(response) => response,
        Err(e) => {
            debug!(url, error = %e, "Request failed");
            return FetchOutcome::Status(STATUS_NETWORK_ERROR);
        }
    };

    let status = response.status();
    if !status.is_success() {
        return FetchOutcome::Status(status.as_u16());
    }

    match response.bytes().await {
        Ok(body) => FetchOutcome::Ready(body),
        Err(e) => {
            debug!(url, error = %e, "Failed to read response body");
            FetchOutcome::Status(STATUS_NETWORK_ERROR)
        }
    }
}

async fn fetch_file(url: &str) -> FetchOutcome {
    let path = url.strip_prefix("file://").unwrap_or(url);
    let path = path.split('?').next().unwrap_or(path);

    match tokio::fs::read(path).await {
        Ok(data) => FetchOutcome::Ready(Bytes::from(data)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => FetchOutcome::Status(404),
        Err(e) => {
            debug!(path, error = %e, "Failed to read local file");
            FetchOutcome::Status(500)
        }
    }
}
