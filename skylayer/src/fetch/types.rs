//! Types shared by byte fetchers.

use bytes::Bytes;
use thiserror::Error;

/// Status used when a request failed before any HTTP status was received.
pub const STATUS_NETWORK_ERROR: u16 = 598;

/// Hints passed along with a fetch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FetchFlags {
    /// A 404 is an expected answer and should not be reported as an error.
    pub accept_404: bool,
    /// The request may be queued behind other deferred requests.
    pub deferred: bool,
}

impl FetchFlags {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn accept_404(mut self) -> Self {
        self.accept_404 = true;
        self
    }

    pub fn deferred(mut self) -> Self {
        self.deferred = true;
        self
    }
}

/// Result of polling a fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchOutcome {
    /// The request is in flight; ask again later.
    Pending,
    /// The body is available.
    Ready(Bytes),
    /// The request finished without a body (non-2xx status or transport error).
    Status(u16),
}

impl FetchOutcome {
    /// Numeric status: 0 while pending, 200 when ready.
    pub fn code(&self) -> u16 {
        match self {
            FetchOutcome::Pending => 0,
            FetchOutcome::Ready(_) => 200,
            FetchOutcome::Status(code) => *code,
        }
    }

    pub fn is_pending(&self) -> bool {
        matches!(self, FetchOutcome::Pending)
    }

    /// The server confirmed the resource does not exist (4xx).
    pub fn is_missing(&self) -> bool {
        matches!(self, FetchOutcome::Status(code) if (400..500).contains(code))
    }
}

/// Errors raised while setting up a fetcher.
#[derive(Debug, Error)]
pub enum FetchError {
    /// The HTTP client could not be built.
    #[error("Failed to create HTTP client: {0}")]
    Client(#[from] reqwest::Error),

    /// The background runtime could not be started.
    #[error("Failed to start fetch runtime: {0}")]
    Runtime(#[source] std::io::Error),
}

/// Non-blocking source of raw bytes.
///
/// `fetch` is polled once per frame until it stops returning
/// [`FetchOutcome::Pending`]. Polling a URL that is already in flight must not
/// issue a second request.
pub trait ByteFetcher: Send + Sync {
    /// Start or poll the fetch of `url`.
    fn fetch(&self, url: &str, flags: FetchFlags) -> FetchOutcome;

    /// Drop any bytes retained for `url` once the caller has consumed them.
    fn release(&self, _url: &str) {}
}

impl<T: ByteFetcher + ?Sized> ByteFetcher for std::sync::Arc<T> {
    fn fetch(&self, url: &str, flags: FetchFlags) -> FetchOutcome {
        (**self).fetch(url, flags)
    }

    fn release(&self, url: &str) {
        (**self).release(url)
    }
}
