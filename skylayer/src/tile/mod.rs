//! Cache entries for survey tiles.
//!
//! A [`Tile`] is created when a lookup misses and bytes are available. It is
//! a placeholder while its decode runs in the background, then becomes either
//! ready (payload set) or failed (error flag set, no payload). Failure is
//! permanent for that tile instance; a retry requires evicting it first.

use std::sync::Arc;

use tracing::warn;

use crate::cache::{Evict, Release, TileCache};
use crate::codec::{CodecError, Decoded, PayloadCodec};
use crate::coord::{QuadMask, TileKey, TilePos};
use crate::worker::{DecodeHandle, WorkerError};

/// Handle on a background tile decode.
pub type TileDecode<P> = DecodeHandle<Result<Decoded<P>, CodecError>>;

/// Cache shared by every survey using codec `C`.
pub type TileStore<C> = TileCache<TileKey, Tile<C>>;

/// Observable state of a tile.
#[derive(Debug)]
pub enum TileState<P> {
    /// Decode still running.
    Loading,
    /// Decode failed; the tile will never get a payload.
    Failed,
    Ready(Arc<P>),
}

/// Result of [`Tile::poll_loader`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadProgress {
    /// No decode attached.
    Idle,
    Running,
    /// The decode finished during this poll; `cost` is the real cache cost.
    Finished { cost: u64 },
}

/// One quadtree node of one survey, as stored in the cache.
pub struct Tile<C: PayloadCodec> {
    pos: TilePos,
    codec: Arc<C>,
    missing: QuadMask,
    error: bool,
    payload: Option<Arc<C::Payload>>,
    loader: Option<TileDecode<C::Payload>>,
}

impl<C: PayloadCodec> Tile<C> {
    /// Placeholder tile waiting on a background decode.
    pub fn loading(pos: TilePos, codec: Arc<C>, loader: TileDecode<C::Payload>) -> Self {
        Self {
            pos,
            codec,
            missing: QuadMask::EMPTY,
            error: false,
            payload: None,
            loader: Some(loader),
        }
    }

    /// Tile built from a decode done on the calling thread.
    ///
    /// Returns the tile and its cache cost.
    pub fn decoded(
        pos: TilePos,
        codec: Arc<C>,
        result: Result<Decoded<C::Payload>, CodecError>,
    ) -> (Self, u64) {
        let mut tile = Self {
            pos,
            codec,
            missing: QuadMask::EMPTY,
            error: false,
            payload: None,
            loader: None,
        };
        let cost = tile.apply(result);
        (tile, cost)
    }

    pub fn pos(&self) -> TilePos {
        self.pos
    }

    pub fn payload(&self) -> Option<&Arc<C::Payload>> {
        self.payload.as_ref()
    }

    pub fn is_error(&self) -> bool {
        self.error
    }

    pub fn is_loading(&self) -> bool {
        self.loader.is_some()
    }

    /// Quadrants known to have no displayable child.
    pub fn missing_children(&self) -> QuadMask {
        self.missing
    }

    /// Record that the child in `quadrant` does not exist.
    pub fn mark_missing(&mut self, quadrant: u8) {
        self.missing.insert(quadrant);
    }

    pub fn state(&self) -> TileState<C::Payload> {
        if self.loader.is_some() {
            TileState::Loading
        } else if let Some(payload) = &self.payload {
            TileState::Ready(Arc::clone(payload))
        } else {
            TileState::Failed
        }
    }

    /// Poll the background decode and finalize the tile once it is done.
    pub fn poll_loader(&mut self) -> LoadProgress {
        let Some(loader) = self.loader.as_mut() else {
            return LoadProgress::Idle;
        };
        if !loader.poll() {
            return LoadProgress::Running;
        }
        let result = loader.take();
        self.loader = None;

        let cost = match result {
            Some(Ok(decoded)) => self.apply(decoded),
            Some(Err(e)) => self.fail(&e),
            None => self.fail(&WorkerError::Lost),
        };
        LoadProgress::Finished { cost }
    }

    fn apply(&mut self, result: Result<Decoded<C::Payload>, CodecError>) -> u64 {
        match result {
            Ok(decoded) => {
                self.payload = Some(Arc::new(decoded.payload));
                self.missing = self.missing.union(decoded.transparency);
                decoded.cost
            }
            Err(e) => self.fail(&e),
        }
    }

    fn fail(&mut self, err: &dyn std::error::Error) -> u64 {
        warn!(tile = %self.pos, error = %err, "Cannot decode tile");
        self.error = true;
        0
    }
}

impl<C: PayloadCodec> Evict for Tile<C> {
    fn release(&mut self) -> Release {
        // Never free a tile whose decode is still running.
        if let Some(loader) = self.loader.as_mut() {
            if !loader.poll() {
                return Release::Keep;
            }
        }
        match &self.payload {
            Some(payload) => self.codec.destroy(payload),
            None => Release::Free,
        }
    }
}
