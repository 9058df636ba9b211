//! Default codec for image surveys.

use std::sync::Arc;

use image::RgbaImage;
use tracing::trace;

use super::{CodecError, Decoded, Mosaic, PayloadCodec, Texture, Textured};
use crate::cache::Release;
use crate::coord::{QuadMask, TilePos};

/// Payload of an image survey tile.
#[derive(Debug, Clone)]
pub struct ImageTile {
    texture: Texture,
    bootstrap: bool,
}

impl ImageTile {
    pub fn new(pixels: RgbaImage) -> Self {
        Self {
            texture: Texture::new(Arc::new(pixels)),
            bootstrap: false,
        }
    }

    /// Whether this payload is a virtual tile over the survey mosaic.
    pub fn is_bootstrap(&self) -> bool {
        self.bootstrap
    }

    pub fn width(&self) -> u32 {
        self.texture.width()
    }

    pub fn height(&self) -> u32 {
        self.texture.height()
    }
}

impl Textured for ImageTile {
    fn texture(&self) -> Option<Texture> {
        Some(self.texture.clone())
    }
}

/// Decodes JPEG, PNG and WebP tiles (format sniffed from the bytes).
#[derive(Debug, Clone, Copy, Default)]
pub struct ImageCodec;

impl ImageCodec {
    pub fn new() -> Self {
        Self
    }
}

impl PayloadCodec for ImageCodec {
    type Payload = ImageTile;

    fn construct(&self, pos: TilePos, bytes: &[u8]) -> Result<Decoded<ImageTile>, CodecError> {
        let pixels = decode_rgba(bytes)?;
        let (width, height) = pixels.dimensions();
        let transparency = quadrant_transparency(&pixels);
        trace!(tile = %pos, width, height, transparency = transparency.bits(), "Decoded image tile");

        let cost = u64::from(width) * u64::from(height) * 4;
        Ok(Decoded::new(ImageTile::new(pixels), cost).with_transparency(transparency))
    }

    fn construct_bootstrap(&self, _face: u64, mosaic: &Mosaic) -> Option<Decoded<ImageTile>> {
        let tile = ImageTile {
            texture: Texture::new(Arc::clone(mosaic)),
            bootstrap: true,
        };
        // The mosaic pixels are owned and accounted for by the survey.
        Some(Decoded::new(tile, 0))
    }

    fn destroy(&self, payload: &ImageTile) -> Release {
        if !payload.bootstrap && Arc::strong_count(payload.texture.pixels()) > 1 {
            // A texture handed to the renderer still references the pixels.
            return Release::Keep;
        }
        Release::Free
    }
}

/// Decode an encoded image into RGBA pixels.
pub fn decode_rgba(bytes: &[u8]) -> Result<RgbaImage, CodecError> {
    if bytes.is_empty() {
        return Err(CodecError::Empty);
    }
    let pixels = image::load_from_memory(bytes)?.into_rgba8();
    let (width, height) = pixels.dimensions();
    if width == 0 || height == 0 {
        return Err(CodecError::InvalidDimensions { width, height });
    }
    Ok(pixels)
}

/// Quadrants of `pixels` whose alpha is zero everywhere.
///
/// Quadrant `i` covers the block starting at `((i / 2) * w / 2, (i % 2) * h / 2)`,
/// matching the child numbering of the quadtree.
pub fn quadrant_transparency(pixels: &RgbaImage) -> QuadMask {
    let (width, height) = pixels.dimensions();
    let (half_w, half_h) = (width / 2, height / 2);
    let mut mask = QuadMask::EMPTY;
    if half_w == 0 || half_h == 0 {
        return mask;
    }

    for quadrant in 0..4u8 {
        let x0 = u32::from(quadrant / 2) * half_w;
        let y0 = u32::from(quadrant % 2) * half_h;
        let transparent = (y0..y0 + half_h)
            .all(|y| (x0..x0 + half_w).all(|x| pixels.get_pixel(x, y)[3] == 0));
        if transparent {
            mask.insert(quadrant);
        }
    }
    mask
}
