//! Byte-fetch abstraction.
//!
//! The engine never waits on I/O. It polls a [`ByteFetcher`] once per frame
//! and treats [`FetchOutcome::Pending`] as "ask again later". A 4xx status is
//! a cheap, cacheable answer (the tile does not exist); any other status is a
//! transient error.
//!
//! # Implementations
//!
//! - [`HttpFetcher`]: reqwest on a private tokio runtime, plus local files
//! - [`MemoryFetcher`]: fixed in-memory table, for bundled surveys

mod http;
mod memory;
mod types;

pub use http::{
    is_remote, HttpFetcher, HttpFetcherConfig, DEFAULT_MAX_CONCURRENT, DEFAULT_TIMEOUT_SECS,
    DEFAULT_USER_AGENT,
};
pub use memory::MemoryFetcher;
pub use types::{ByteFetcher, FetchError, FetchFlags, FetchOutcome, STATUS_NETWORK_ERROR};
