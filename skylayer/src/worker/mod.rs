//! Background decode workers.
//!
//! Decoding a tile must never stall the render thread. [`DecodePool`] runs
//! jobs on a shared rayon pool and hands back a [`DecodeHandle`] that the
//! caller polls once per frame:
//!
//! - the job receives exclusive ownership of its input (the fetched bytes)
//! - the result travels back through a oneshot channel and is only visible
//!   through [`DecodeHandle::poll`]
//! - polling never blocks, and once complete keeps reporting completion
//!   without touching the channel again
//!
//! There is no cancellation: a scheduled job always runs to completion.
//!
//! # Example
//!
//! ```
//! use skylayer::worker::DecodePool;
//!
//! let pool = DecodePool::new(1).unwrap();
//! let mut handle = pool.schedule(|| 6 * 7);
//! while !handle.poll() {
//!     std::thread::yield_now();
//! }
//! assert_eq!(handle.take().unwrap().unwrap(), 42);
//! ```

use std::fmt;

use thiserror::Error;
use tokio::sync::oneshot;
use tokio::sync::oneshot::error::TryRecvError;
use tracing::warn;

/// Errors raised by the decode pool.
#[derive(Debug, Error)]
pub enum WorkerError {
    /// The thread pool could not be created.
    #[error("Failed to build decode pool: {0}")]
    Build(#[from] rayon::ThreadPoolBuildError),

    /// The job ended without producing a result (it panicked).
    #[error("Decode worker exited without a result")]
    Lost,
}

/// Shared pool of decode threads.
pub struct DecodePool {
    pool: rayon::ThreadPool,
}

impl DecodePool {
    /// Create a pool with `threads` workers (0 picks one per CPU).
    pub fn new(threads: usize) -> Result<Self, WorkerError> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .thread_name(|i| format!("skylayer-decode-{}", i))
            // Without a handler rayon aborts the process on a panicking job.
            .panic_handler(|_| warn!("Decode job panicked"))
            .build()?;
        Ok(Self { pool })
    }

    pub fn threads(&self) -> usize {
        self.pool.current_num_threads()
    }

    /// Run `job` on a worker thread.
    pub fn schedule<T, F>(&self, job: F) -> DecodeHandle<T>
    where
        T: Send + 'static,
        F: FnOnce() -> T + Send + 'static,
    {
        let (tx, rx) = oneshot::channel();
        self.pool.spawn(move || {
            // The receiver may already be gone if the tile was dropped.
            let _ = tx.send(job());
        });
        DecodeHandle {
            state: HandleState::Running(rx),
        }
    }
}

impl fmt::Debug for DecodePool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DecodePool")
            .field("threads", &self.threads())
            .finish()
    }
}

enum HandleState<T> {
    Running(oneshot::Receiver<T>),
    Finished(Result<T, WorkerError>),
    Taken,
}

/// Poll-based handle on a scheduled job.
pub struct DecodeHandle<T> {
    state: HandleState<T>,
}

impl<T> DecodeHandle<T> {
    /// Check for completion without blocking.
    ///
    /// Returns `true` once the job has finished; repeated calls after that
    /// keep returning `true`.
    pub fn poll(&mut self) -> bool {
        let HandleState::Running(rx) = &mut self.state else {
            return true;
        };
        match rx.try_recv() {
            Ok(value) => {
                self.state = HandleState::Finished(Ok(value));
                true
            }
            Err(TryRecvError::Empty) => false,
            Err(TryRecvError::Closed) => {
                warn!("Decode job dropped its result");
                self.state = HandleState::Finished(Err(WorkerError::Lost));
                true
            }
        }
    }

    /// Whether completion has not been observed yet.
    pub fn is_running(&self) -> bool {
        matches!(self.state, HandleState::Running(_))
    }

    /// Take the result of a finished job.
    ///
    /// Returns `None` while the job is running or after the result was taken.
    pub fn take(&mut self) -> Option<Result<T, WorkerError>> {
        if !matches!(self.state, HandleState::Finished(_)) {
            return None;
        }
        match std::mem::replace(&mut self.state, HandleState::Taken) {
            HandleState::Finished(result) => Some(result),
            _ => None,
        }
    }
}

impl<T> fmt::Debug for DecodeHandle<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = match self.state {
            HandleState::Running(_) => "running",
            HandleState::Finished(_) => "finished",
            HandleState::Taken => "taken",
        };
        f.debug_struct("DecodeHandle").field("state", &state).finish()
    }
}
