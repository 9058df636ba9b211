//! Quadtree addressing for HEALPix tile pyramids.
//!
//! A survey is a forest of 12 quadtrees, one per HEALPix base face. A node is
//! addressed by its depth (HiPS "order") and its nested pixel index at that
//! depth; the four children of pixel `p` are `4p..4p+3`.
//!
//! Depth `-1` is reserved for the virtual tiles that expose the bootstrap
//! mosaic, so depths are signed throughout.

mod uv;

pub use uv::{default_uv_quad, UvQuad, UvTransform, UV_INSIDE, UV_OUTSIDE};

use std::fmt;

/// Number of HEALPix base faces (roots of the quadtree forest).
pub const ROOT_FACES: u64 = 12;

/// Depth used for the virtual bootstrap-mosaic tiles.
pub const BOOTSTRAP_DEPTH: i32 = -1;

/// Deepest order representable with a 64-bit nested index.
pub const MAX_DEPTH: i32 = 29;

/// Position of one node in the quadtree forest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TilePos {
    /// Quadtree depth (HiPS order).
    pub depth: i32,
    /// Nested pixel index at `depth`.
    pub index: u64,
}

impl TilePos {
    /// Create a new tile position.
    pub const fn new(depth: i32, index: u64) -> Self {
        Self { depth, index }
    }

    /// The 12 roots of the forest at depth 0.
    pub fn roots() -> impl Iterator<Item = TilePos> {
        (0..ROOT_FACES).map(|index| TilePos::new(0, index))
    }

    /// Quadrant (0-3) this node occupies inside its parent.
    #[inline]
    pub fn quadrant(&self) -> u8 {
        (self.index % 4) as u8
    }

    /// Parent node, or `None` for roots and virtual tiles.
    #[inline]
    pub fn parent(&self) -> Option<TilePos> {
        (self.depth > 0).then(|| TilePos::new(self.depth - 1, self.index / 4))
    }

    /// Child node in the given quadrant.
    #[inline]
    pub fn child(&self, quadrant: u8) -> TilePos {
        debug_assert!(quadrant < 4);
        TilePos::new(self.depth + 1, self.index * 4 + u64::from(quadrant))
    }

    /// The four children, in quadrant order.
    pub fn children(&self) -> [TilePos; 4] {
        [self.child(0), self.child(1), self.child(2), self.child(3)]
    }

    /// Ancestor at a shallower (or equal) depth.
    ///
    /// `depth` must be in `0..=self.depth`.
    #[inline]
    pub fn ancestor_at(&self, depth: i32) -> TilePos {
        debug_assert!((0..=self.depth).contains(&depth));
        let levels = (self.depth - depth) as u32;
        TilePos::new(depth, self.index >> (2 * levels))
    }

    /// Base face (0-11) this node belongs to.
    #[inline]
    pub fn face(&self) -> u64 {
        if self.depth <= 0 {
            self.index
        } else {
            self.index >> (2 * self.depth as u32)
        }
    }

    /// HEALPix `nside` parameter for this depth.
    #[inline]
    pub fn nside(&self) -> u64 {
        1u64 << self.depth.max(0)
    }
}

impl fmt::Display for TilePos {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "N{}/{}", self.depth, self.index)
    }
}

/// Cache key for one tile of one survey.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TileKey {
    /// 32-bit hash of the survey URL.
    pub survey: u32,
    pub depth: i32,
    pub index: u64,
}

impl TileKey {
    pub fn new(survey: u32, pos: TilePos) -> Self {
        Self {
            survey,
            depth: pos.depth,
            index: pos.index,
        }
    }

    pub fn pos(&self) -> TilePos {
        TilePos::new(self.depth, self.index)
    }
}

impl fmt::Display for TileKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:08x}:N{}/{}", self.survey, self.depth, self.index)
    }
}

/// Per-quadrant bit set.
///
/// Bit `i` set means quadrant `i` has no displayable child, either because
/// the server confirmed the tile is absent or because that quarter of the
/// decoded image is fully transparent.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct QuadMask(u8);

impl QuadMask {
    pub const EMPTY: QuadMask = QuadMask(0);
    pub const FULL: QuadMask = QuadMask(0b1111);

    /// Build a mask from raw bits; only the low four bits are kept.
    pub const fn from_bits(bits: u8) -> Self {
        Self(bits & 0b1111)
    }

    pub const fn bits(self) -> u8 {
        self.0
    }

    pub fn contains(self, quadrant: u8) -> bool {
        quadrant < 4 && self.0 & (1 << quadrant) != 0
    }

    pub fn insert(&mut self, quadrant: u8) {
        debug_assert!(quadrant < 4);
        self.0 |= 1 << (quadrant & 0b11);
    }

    pub fn union(self, other: QuadMask) -> QuadMask {
        QuadMask(self.0 | other.0)
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    pub fn is_full(self) -> bool {
        self.0 == Self::FULL.0
    }
}

/// Celestial reference frame a survey is expressed in.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum Frame {
    /// International Celestial Reference Frame.
    Icrf,
    /// Astrometric (ICRF, light-time corrected) frame.
    #[default]
    Astrometric,
    /// Observed (topocentric) frame, used for ground/atmosphere layers.
    Observed,
}

/// HEALPix projection descriptor for the node a texture belongs to.
///
/// The renderer owns the projection math; the engine only tells it which
/// pixel the texture covers so geometry and texture stay consistent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HealpixProjection {
    pub nside: u64,
    pub pix: u64,
    /// Swap the texture axes (always set for HiPS tiles).
    pub swap: bool,
    /// Looking at the sphere from outside (sky) rather than inside (planet).
    pub outside: bool,
}

impl HealpixProjection {
    pub fn for_tile(pos: TilePos, outside: bool) -> Self {
        Self {
            nside: pos.nside(),
            pix: pos.index,
            swap: true,
            outside,
        }
    }
}
