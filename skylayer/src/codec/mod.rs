//! Payload codecs: turning fetched tile bytes into render payloads.
//!
//! The tile machinery is generic over a [`PayloadCodec`], so the same cache,
//! resolver and fallback logic serve image surveys and any other payload kind
//! stored in a HiPS pyramid.
//!
//! ```text
//! fetched bytes ──► PayloadCodec::construct ──► Decoded { payload, cost, transparency }
//!                                                  │
//!                         cache eviction ◄─────────┘ PayloadCodec::destroy (Free | Keep)
//! ```
//!
//! # Available Codecs
//!
//! - [`ImageCodec`] - decodes JPEG/PNG/WebP tiles into shared RGBA textures

mod error;
mod raster;
mod texture;

pub use raster::{decode_rgba, quadrant_transparency, ImageCodec, ImageTile};
pub use error::CodecError;
pub use texture::{PixelRect, Texture};

use std::sync::Arc;

use image::RgbaImage;

use crate::cache::Release;
use crate::coord::{QuadMask, TilePos};

/// Decoded whole-sky mosaic shared by a survey and its virtual tiles.
pub type Mosaic = Arc<RgbaImage>;

/// Output of a successful decode.
#[derive(Debug)]
pub struct Decoded<P> {
    pub payload: P,
    /// Cache cost, roughly the decoded size in bytes.
    pub cost: u64,
    /// Quadrants that are fully transparent and need no children.
    pub transparency: QuadMask,
}

impl<P> Decoded<P> {
    pub fn new(payload: P, cost: u64) -> Self {
        Self {
            payload,
            cost,
            transparency: QuadMask::EMPTY,
        }
    }

    pub fn with_transparency(mut self, transparency: QuadMask) -> Self {
        self.transparency = transparency;
        self
    }
}

/// Capability turning raw tile bytes into an opaque payload and back.
///
/// `construct` runs on decode worker threads, so codecs must be `Send + Sync`
/// and should not touch engine state.
pub trait PayloadCodec: Send + Sync + 'static {
    type Payload: Send + Sync + 'static;

    /// Decode the bytes fetched for `pos`.
    fn construct(&self, pos: TilePos, bytes: &[u8])
        -> Result<Decoded<Self::Payload>, CodecError>;

    /// Build the virtual tile exposing `mosaic` for base face `face`.
    ///
    /// Codecs without a notion of mosaic keep the default, which disables the
    /// bootstrap fallback for their surveys.
    fn construct_bootstrap(&self, _face: u64, _mosaic: &Mosaic) -> Option<Decoded<Self::Payload>> {
        None
    }

    /// Tear down a payload leaving the cache, or defer by returning
    /// [`Release::Keep`].
    fn destroy(&self, _payload: &Self::Payload) -> Release {
        Release::Free
    }
}

/// Payloads that can be drawn as a texture.
pub trait Textured {
    fn texture(&self) -> Option<Texture>;
}
