//! In-memory fetcher for bundled resources.
//!
//! Serves a fixed table of URL → outcome, which is how offline or embedded
//! surveys are shipped, and records how often each URL was requested.
//! Unknown URLs answer 404.

use std::collections::HashMap;

use bytes::Bytes;
use parking_lot::Mutex;

use super::types::{ByteFetcher, FetchFlags, FetchOutcome};

/// Fetcher answering from an in-memory table.
#[derive(Default)]
pub struct MemoryFetcher {
    resources: Mutex<HashMap<String, FetchOutcome>>,
    requests: Mutex<HashMap<String, usize>>,
}

impl MemoryFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Serve `data` for `url`.
    pub fn insert(&self, url: impl Into<String>, data: impl Into<Bytes>) {
        self.resources
            .lock()
            .insert(url.into(), FetchOutcome::Ready(data.into()));
    }

    /// Answer `url` with a bare status code.
    pub fn insert_status(&self, url: impl Into<String>, code: u16) {
        self.resources
            .lock()
            .insert(url.into(), FetchOutcome::Status(code));
    }

    /// Keep `url` pending until it is replaced.
    pub fn set_pending(&self, url: impl Into<String>) {
        self.resources
            .lock()
            .insert(url.into(), FetchOutcome::Pending);
    }

    pub fn remove(&self, url: &str) {
        self.resources.lock().remove(url);
    }

    /// Number of `fetch` calls made for `url`.
    pub fn request_count(&self, url: &str) -> usize {
        self.requests.lock().get(url).copied().unwrap_or(0)
    }

    /// Number of `fetch` calls made for any URL.
    pub fn total_requests(&self) -> usize {
        self.requests.lock().values().sum()
    }

    /// Number of `fetch` calls whose URL contains `fragment`.
    pub fn requests_matching(&self, fragment: &str) -> usize {
        self.requests
            .lock()
            .iter()
            .filter(|(url, _)| url.contains(fragment))
            .map(|(_, count)| *count)
            .sum()
    }
}

impl ByteFetcher for MemoryFetcher {
    fn fetch(&self, url: &str, _flags: FetchFlags) -> FetchOutcome {
        *self.requests.lock().entry(url.to_string()).or_insert(0) += 1;
        self.resources
            .lock()
            .get(url)
            .cloned()
            .unwrap_or(FetchOutcome::Status(404))
    }
}
