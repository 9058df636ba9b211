//! Common types and utilities shared across CLI commands.

use std::sync::Arc;
use std::time::{Duration, Instant};

use skylayer::codec::ImageCodec;
use skylayer::config::ConfigFile;
use skylayer::fetch::{HttpFetcher, HttpFetcherConfig};
use skylayer::resolver::TileResolver;
use skylayer::survey::Survey;
use skylayer::tile::TileStore;
use skylayer::worker::DecodePool;

use crate::error::CliError;

/// Interval between two polls of the engine.
const POLL_INTERVAL: Duration = Duration::from_millis(10);

/// One survey wired to a live fetcher, a decode pool and a cache.
pub struct Session {
    pub resolver: TileResolver<HttpFetcher>,
    pub survey: Survey<ImageCodec>,
    pub cache: TileStore<ImageCodec>,
    /// How long to wait for anything before giving up.
    pub timeout: Duration,
}

impl Session {
    /// Build a session for the survey at `url` from the user configuration.
    pub fn open(url: &str, config: &ConfigFile) -> Result<Self, CliError> {
        let fetcher = HttpFetcher::with_config(HttpFetcherConfig::from(&config.fetch))?;
        let pool = DecodePool::new(config.decode.threads)?;
        Ok(Self {
            resolver: TileResolver::new(fetcher, pool),
            survey: Survey::new(url, 0.0, Arc::new(ImageCodec::new())),
            cache: TileStore::new(config.cache.memory_size),
            // Manifest, mosaic and tile are fetched one after the other.
            timeout: Duration::from_secs(config.fetch.timeout.saturating_mul(3)),
        })
    }

    /// Drive the survey until its manifest and mosaic have settled.
    pub fn wait_ready(&mut self) -> Result<(), CliError> {
        let Session {
            resolver,
            survey,
            cache,
            timeout,
        } = self;
        let ready = poll_until(*timeout, || {
            resolver.update_survey(survey, cache) || survey.is_failed()
        });
        if survey.is_failed() {
            return Err(CliError::SurveyUnavailable {
                url: survey.url().to_string(),
            });
        }
        if !ready {
            return Err(CliError::Timeout {
                what: "survey manifest".to_string(),
                secs: timeout.as_secs(),
            });
        }
        Ok(())
    }
}

/// Call `step` until it returns `true` or `timeout` elapses.
///
/// Returns whether `step` succeeded.
pub fn poll_until<F>(timeout: Duration, mut step: F) -> bool
where
    F: FnMut() -> bool,
{
    let deadline = Instant::now() + timeout;
    loop {
        if step() {
            return true;
        }
        if Instant::now() >= deadline {
            return false;
        }
        std::thread::sleep(POLL_INTERVAL);
    }
}

/// Load the user configuration, falling back to defaults on error.
pub fn load_config() -> ConfigFile {
    match ConfigFile::load() {
        Ok(config) => config,
        Err(e) => {
            tracing::warn!(error = %e, "Ignoring invalid configuration file");
            ConfigFile::default()
        }
    }
}
