//! Tile resolution: cache lookup, fetch, decode and parent short-circuits.
//!
//! [`TileResolver::resolve`] never blocks. Each call advances the state of
//! one node as far as it can and reports where it stands:
//!
//! ```text
//! cache hit ──► poll decode ──► Ok | Pending | Error
//!     │ miss
//!     ▼
//! survey ready? ──no──► Pending
//!     │
//! depth in [min, max]? ──no──► NotFound
//!     │
//! ancestors min..d-1 resolved? ──► Pending | NotFound | Error
//!     │
//! parent marks quadrant missing? ──yes──► NotFound (no fetch)
//!     │
//! fetch ──► Pending | 4xx: mark parent, NotFound | other: Error
//!     │ bytes
//!     ▼
//! decode inline (Ok | Error) or on the pool (Pending)
//! ```

mod render;
mod select;

pub use render::{PaintQuad, RenderProgress, TilePainter};
pub use select::Selection;

use std::sync::Arc;

use tracing::{debug, error, trace, warn};

use crate::codec::{CodecError, PayloadCodec};
use crate::coord::{TileKey, TilePos, BOOTSTRAP_DEPTH, MAX_DEPTH};
use crate::fetch::{ByteFetcher, FetchFlags, FetchOutcome, STATUS_NETWORK_ERROR};
use crate::survey::Survey;
use crate::tile::{LoadProgress, Tile, TileState, TileStore};
use crate::worker::DecodePool;

/// Options for a single resolution.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ResolveFlags {
    /// Only report what is already cached; never fetch.
    pub cache_only: bool,
    /// Decode on the worker pool instead of the calling thread.
    pub load_in_thread: bool,
    /// Use the bootstrap mosaic instead of real tiles.
    pub force_bootstrap: bool,
    /// Crop the bootstrap mosaic when no real tile or ancestor is ready.
    pub allow_bootstrap: bool,
    /// Rendering a planet seen from outside its surface.
    pub planet: bool,
}

impl ResolveFlags {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cache_only(mut self) -> Self {
        self.cache_only = true;
        self
    }

    pub fn load_in_thread(mut self) -> Self {
        self.load_in_thread = true;
        self
    }

    pub fn force_bootstrap(mut self) -> Self {
        self.force_bootstrap = true;
        self
    }

    pub fn allow_bootstrap(mut self) -> Self {
        self.allow_bootstrap = true;
        self
    }

    pub fn planet(mut self) -> Self {
        self.planet = true;
        self
    }
}

/// Where a node stands after a resolution attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TileStatus {
    /// Payload available.
    Ok,
    /// Data in flight; ask again later.
    Pending,
    /// The node does not exist in this survey.
    NotFound,
    /// Fetch or decode failed.
    Error,
    /// The request could not reach the server; may succeed later.
    Unreachable,
    /// Not cached, and the caller asked not to fetch.
    Uncached,
}

/// Result of [`TileResolver::resolve`].
#[derive(Debug)]
pub struct Resolution<P> {
    pub payload: Option<Arc<P>>,
    pub status: TileStatus,
}

impl<P> Resolution<P> {
    fn ready(payload: Arc<P>) -> Self {
        Self {
            payload: Some(payload),
            status: TileStatus::Ok,
        }
    }

    fn status(status: TileStatus) -> Self {
        Self {
            payload: None,
            status,
        }
    }

    fn from_state(state: TileState<P>) -> Self {
        match state {
            TileState::Ready(payload) => Self::ready(payload),
            TileState::Loading => Self::status(TileStatus::Pending),
            TileState::Failed => Self::status(TileStatus::Error),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.status == TileStatus::Ok
    }
}

/// Drives fetch and decode of survey tiles through a shared cache.
pub struct TileResolver<F> {
    fetcher: F,
    pool: DecodePool,
}

impl<F: ByteFetcher> TileResolver<F> {
    pub fn new(fetcher: F, pool: DecodePool) -> Self {
        Self { fetcher, pool }
    }

    pub fn fetcher(&self) -> &F {
        &self.fetcher
    }

    pub fn pool(&self) -> &DecodePool {
        &self.pool
    }

    /// Advance the survey's manifest and mosaic loading.
    pub fn update_survey<C: PayloadCodec>(
        &self,
        survey: &mut Survey<C>,
        cache: &mut TileStore<C>,
    ) -> bool {
        survey.update(&self.fetcher, &self.pool, cache)
    }

    /// Resolve one node of `survey`.
    ///
    /// With [`ResolveFlags::force_bootstrap`] the node is replaced by the
    /// virtual mosaic tile of its base face.
    pub fn resolve<C: PayloadCodec>(
        &self,
        survey: &mut Survey<C>,
        cache: &mut TileStore<C>,
        pos: TilePos,
        flags: ResolveFlags,
    ) -> Resolution<C::Payload> {
        if pos.depth > MAX_DEPTH {
            return Resolution::status(TileStatus::NotFound);
        }
        let pos = if flags.force_bootstrap {
            TilePos::new(BOOTSTRAP_DEPTH, pos.face())
        } else {
            pos
        };
        let key = survey.key(pos);

        if let Some(state) = poll_cached(cache, &key) {
            return Resolution::from_state(state);
        }
        if flags.cache_only {
            return Resolution::status(TileStatus::Uncached);
        }
        if !self.update_survey(survey, cache) {
            return Resolution::status(TileStatus::Pending);
        }
        if flags.force_bootstrap {
            return restore_bootstrap(survey, cache, key);
        }
        if !in_range(survey, pos.depth) {
            return Resolution::status(TileStatus::NotFound);
        }

        // Ancestors first, shallowest to deepest.
        for depth in survey.order_min()..pos.depth {
            let ancestor = pos.ancestor_at(depth);
            let parent = self.resolve_loaded(survey, cache, ancestor, flags);
            if parent.status != TileStatus::Ok {
                trace!(tile = %pos, ancestor = %ancestor, status = ?parent.status, "Ancestor not ready");
                return Resolution::status(parent.status);
            }
        }
        self.load(survey, cache, pos, flags)
    }

    /// Lookup-or-load for a node whose ancestors are all resolved.
    fn resolve_loaded<C: PayloadCodec>(
        &self,
        survey: &Survey<C>,
        cache: &mut TileStore<C>,
        pos: TilePos,
        flags: ResolveFlags,
    ) -> Resolution<C::Payload> {
        match poll_cached(cache, &survey.key(pos)) {
            Some(state) => Resolution::from_state(state),
            None => self.load(survey, cache, pos, flags),
        }
    }

    fn load<C: PayloadCodec>(
        &self,
        survey: &Survey<C>,
        cache: &mut TileStore<C>,
        pos: TilePos,
        flags: ResolveFlags,
    ) -> Resolution<C::Payload> {
        // Parents below the minimum depth are never loaded, so there is nothing to mark.
        let parent_key = pos
            .parent()
            .filter(|parent| parent.depth >= survey.order_min())
            .map(|parent| survey.key(parent));
        if let Some(parent_key) = &parent_key {
            let missing = cache
                .peek(parent_key)
                .is_some_and(|parent| parent.missing_children().contains(pos.quadrant()));
            if missing {
                return Resolution::status(TileStatus::NotFound);
            }
        }

        let url = survey.tile_url(pos);
        let mut fetch_flags = FetchFlags::new().accept_404();
        if pos.depth > 0 {
            fetch_flags = fetch_flags.deferred();
        }

        let bytes = match self.fetcher.fetch(&url, fetch_flags) {
            FetchOutcome::Pending => return Resolution::status(TileStatus::Pending),
            FetchOutcome::Ready(bytes) => bytes,
            outcome if outcome.is_missing() => {
                if let Some(parent_key) = parent_key {
                    if let Some(parent) = cache.peek_mut(&parent_key) {
                        parent.mark_missing(pos.quadrant());
                    }
                }
                debug!(tile = %pos, "Tile does not exist");
                return Resolution::status(TileStatus::NotFound);
            }
            FetchOutcome::Status(STATUS_NETWORK_ERROR) => {
                return Resolution::status(TileStatus::Unreachable);
            }
            outcome => {
                error!(url, status = outcome.code(), "Cannot get tile");
                return Resolution::status(TileStatus::Error);
            }
        };
        self.fetcher.release(&url);

        let key = survey.key(pos);
        let codec = Arc::clone(survey.codec());
        if flags.load_in_thread {
            let job_codec = Arc::clone(&codec);
            let handle = self.pool.schedule(move || job_codec.construct(pos, &bytes));
            insert(cache, key, Tile::loading(pos, codec, handle), 0);
            debug!(%key, "Tile decode scheduled");
            return Resolution::status(TileStatus::Pending);
        }

        let result = codec.construct(pos, &bytes);
        let (tile, cost) = Tile::decoded(pos, codec, result);
        let state = tile.state();
        insert(cache, key, tile, 0);
        cache.set_cost(&key, cost);
        Resolution::from_state(state)
    }

    /// Decode `bytes` for `pos` on the calling thread and cache the result.
    ///
    /// Any tile already cached at that position is returned unchanged.
    pub fn add_manual_tile<C: PayloadCodec>(
        &self,
        survey: &Survey<C>,
        cache: &mut TileStore<C>,
        pos: TilePos,
        bytes: &[u8],
    ) -> Result<Arc<C::Payload>, CodecError> {
        add_manual_tile(survey, cache, pos, bytes)
    }
}

/// Decode `bytes` for `pos` synchronously and cache the result.
pub fn add_manual_tile<C: PayloadCodec>(
    survey: &Survey<C>,
    cache: &mut TileStore<C>,
    pos: TilePos,
    bytes: &[u8],
) -> Result<Arc<C::Payload>, CodecError> {
    let key = survey.key(pos);
    if let Some(TileState::Ready(payload)) = cache.get(&key).map(|tile| tile.state()) {
        return Ok(payload);
    }
    let decoded = survey.codec().construct(pos, bytes)?;
    let (tile, cost) = Tile::decoded(pos, Arc::clone(survey.codec()), Ok(decoded));
    let payload = match tile.state() {
        TileState::Ready(payload) => payload,
        _ => return Err(CodecError::Empty),
    };
    // A failed tile in the way is replaced.
    cache.remove(&key);
    insert(cache, key, tile, cost);
    Ok(payload)
}

fn in_range<C: PayloadCodec>(survey: &Survey<C>, depth: i32) -> bool {
    let above_max = survey.order() != 0 && depth > survey.order();
    !above_max && depth >= survey.order_min()
}

/// Poll a cached tile, finalizing it if its decode just finished.
fn poll_cached<C: PayloadCodec>(
    cache: &mut TileStore<C>,
    key: &TileKey,
) -> Option<TileState<C::Payload>> {
    let tile = cache.get(key)?;
    if let LoadProgress::Finished { cost } = tile.poll_loader() {
        debug!(%key, cost, "Tile decode finished");
        cache.set_cost(key, cost);
    }
    cache.peek(key).map(Tile::state)
}

/// Recreate an evicted virtual mosaic tile.
fn restore_bootstrap<C: PayloadCodec>(
    survey: &Survey<C>,
    cache: &mut TileStore<C>,
    key: TileKey,
) -> Resolution<C::Payload> {
    match survey.bootstrap_tile(key.index) {
        Some((tile, cost)) => {
            let state = tile.state();
            insert(cache, key, tile, cost);
            Resolution::from_state(state)
        }
        None => Resolution::status(TileStatus::NotFound),
    }
}

fn insert<C: PayloadCodec>(cache: &mut TileStore<C>, key: TileKey, tile: Tile<C>, cost: u64) {
    if let Err(e) = cache.put(key, tile, cost) {
        warn!(%key, error = %e, "Tile not cached");
    }
}
