//! Texture-coordinate remapping between a node and its ancestors.
//!
//! When a node's own tile is not loaded, the renderer draws the matching
//! quarter (or sixteenth, ...) of an ancestor's texture instead. Each step up
//! the tree scales the unit square by one half and shifts it into the child's
//! quadrant: quadrant `i` starts at `(i / 2, i % 2) * 0.5`.

use super::TilePos;

/// Four UV corners of a textured quad.
pub type UvQuad = [[f64; 2]; 4];

/// Corner order used when looking at the sphere from outside (sky).
pub const UV_OUTSIDE: UvQuad = [[0.0, 0.0], [0.0, 1.0], [1.0, 0.0], [1.0, 1.0]];

/// Corner order used when looking at the sphere from inside (planets).
pub const UV_INSIDE: UvQuad = [[0.0, 0.0], [1.0, 0.0], [0.0, 1.0], [1.0, 1.0]];

/// Full-frame UV quad for the given viewing side.
pub fn default_uv_quad(outside: bool) -> UvQuad {
    if outside {
        UV_OUTSIDE
    } else {
        UV_INSIDE
    }
}

/// Axis-aligned affine map `p -> p * scale + offset` on UV space.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct UvTransform {
    scale: f64,
    offset: [f64; 2],
}

impl Default for UvTransform {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl UvTransform {
    pub const IDENTITY: UvTransform = UvTransform {
        scale: 1.0,
        offset: [0.0, 0.0],
    };

    /// Map from a child's UV space into its parent's, for the child sitting
    /// in `quadrant`.
    pub fn child(quadrant: u8) -> Self {
        debug_assert!(quadrant < 4);
        Self {
            scale: 0.5,
            offset: [
                f64::from(quadrant / 2) * 0.5,
                f64::from(quadrant % 2) * 0.5,
            ],
        }
    }

    /// Direct map from `pos` into the UV space of its ancestor `levels` up.
    ///
    /// Equivalent to folding [`UvTransform::ascend`] over every quadrant on
    /// the path, but computed in one step by de-interleaving the index bits.
    pub fn to_ancestor(pos: TilePos, levels: u32) -> Self {
        debug_assert!(levels <= 31);
        let local = pos.index & ((1u64 << (2 * levels)) - 1);
        let (mut x, mut y) = (0u64, 0u64);
        for level in 0..levels {
            let quadrant = (local >> (2 * level)) & 0b11;
            x |= (quadrant >> 1) << level;
            y |= (quadrant & 1) << level;
        }
        let denom = (1u64 << levels) as f64;
        Self {
            scale: 1.0 / denom,
            offset: [x as f64 / denom, y as f64 / denom],
        }
    }

    /// Apply `self`, then `next`.
    pub fn then(self, next: UvTransform) -> Self {
        Self {
            scale: self.scale * next.scale,
            offset: [
                self.offset[0] * next.scale + next.offset[0],
                self.offset[1] * next.scale + next.offset[1],
            ],
        }
    }

    /// Extend this map one level up, from a node in `quadrant` to its parent.
    pub fn ascend(self, quadrant: u8) -> Self {
        self.then(Self::child(quadrant))
    }

    pub fn scale(&self) -> f64 {
        self.scale
    }

    pub fn offset(&self) -> [f64; 2] {
        self.offset
    }

    pub fn apply(&self, uv: [f64; 2]) -> [f64; 2] {
        [
            uv[0] * self.scale + self.offset[0],
            uv[1] * self.scale + self.offset[1],
        ]
    }

    pub fn apply_quad(&self, quad: &UvQuad) -> UvQuad {
        quad.map(|uv| self.apply(uv))
    }
}
