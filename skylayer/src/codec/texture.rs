//! Shared RGBA textures handed to the renderer.

use std::sync::Arc;

use image::RgbaImage;

/// Pixel rectangle inside an image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PixelRect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl PixelRect {
    pub const fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }
}

/// A region of a shared, immutable RGBA image.
///
/// Cloning is cheap. The pixels stay alive as long as any clone does, which
/// is how a tile payload outlives the textures derived from it.
#[derive(Debug, Clone)]
pub struct Texture {
    pixels: Arc<RgbaImage>,
    region: PixelRect,
}

impl Texture {
    /// Texture covering the whole image.
    pub fn new(pixels: Arc<RgbaImage>) -> Self {
        let region = PixelRect::new(0, 0, pixels.width(), pixels.height());
        Self { pixels, region }
    }

    /// Sub-texture; `rect` is relative to this texture and clamped to it.
    pub fn crop(&self, rect: PixelRect) -> Texture {
        let x = rect.x.min(self.region.width);
        let y = rect.y.min(self.region.height);
        let width = rect.width.min(self.region.width - x);
        let height = rect.height.min(self.region.height - y);
        Texture {
            pixels: Arc::clone(&self.pixels),
            region: PixelRect::new(self.region.x + x, self.region.y + y, width, height),
        }
    }

    pub fn pixels(&self) -> &Arc<RgbaImage> {
        &self.pixels
    }

    /// Region of [`Texture::pixels`] this texture covers.
    pub fn region(&self) -> PixelRect {
        self.region
    }

    pub fn width(&self) -> u32 {
        self.region.width
    }

    pub fn height(&self) -> u32 {
        self.region.height
    }

    /// Whether both textures view the same pixel buffer.
    pub fn shares_pixels(&self, other: &Texture) -> bool {
        Arc::ptr_eq(&self.pixels, &other.pixels)
    }

    /// Copy the covered region into an owned image.
    pub fn to_image(&self) -> RgbaImage {
        let PixelRect {
            x,
            y,
            width,
            height,
        } = self.region;
        image::imageops::crop_imm(self.pixels.as_ref(), x, y, width, height).to_image()
    }
}
