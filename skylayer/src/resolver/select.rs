//! Choosing something displayable for a node.
//!
//! When the exact tile is not ready yet, the closest ready ancestor is drawn
//! instead with its UVs narrowed to the node's footprint. When no ancestor is
//! ready either and the caller allows it, the bootstrap mosaic is cropped to
//! the node's base cell.

use super::{ResolveFlags, TileResolver, TileStatus};
use crate::codec::{PayloadCodec, PixelRect, Texture, Textured};
use crate::coord::{default_uv_quad, HealpixProjection, TilePos, UvQuad, UvTransform, MAX_DEPTH};
use crate::fetch::ByteFetcher;
use crate::survey::Survey;
use crate::tile::TileStore;

/// What to draw for one node.
#[derive(Debug, Clone)]
pub struct Selection {
    /// Texture to draw, if anything is available.
    pub texture: Option<Texture>,
    /// UV corners inside `texture`.
    pub uv: UvQuad,
    /// Projection of the node actually drawn.
    pub projection: HealpixProjection,
    /// Suggested opacity in `[0, 1]`.
    pub fade: f64,
    /// The node is drawn at the best resolution it will ever get.
    pub loaded: bool,
    /// Node whose data is drawn, or the requested node when nothing is.
    pub source: TilePos,
}

impl Selection {
    fn empty(pos: TilePos, outside: bool) -> Self {
        Self {
            texture: None,
            uv: default_uv_quad(outside),
            projection: HealpixProjection::for_tile(pos, outside),
            fade: 1.0,
            loaded: false,
            source: pos,
        }
    }

    fn drawn_from(
        mut self,
        source: TilePos,
        transform: UvTransform,
        texture: Option<Texture>,
        target_depth: i32,
    ) -> Self {
        self.uv = transform.apply_quad(&self.uv);
        self.projection = HealpixProjection::for_tile(source, self.projection.outside);
        self.texture = texture;
        self.loaded = source.depth == target_depth;
        self.source = source;
        self
    }
}

impl<F: ByteFetcher> TileResolver<F> {
    /// Pick the best texture currently available for `pos`.
    ///
    /// Never blocks; data that is not ready yet is requested and a coarser
    /// stand-in returned meanwhile.
    pub fn select_displayable<C>(
        &self,
        survey: &mut Survey<C>,
        cache: &mut TileStore<C>,
        pos: TilePos,
        flags: ResolveFlags,
    ) -> Selection
    where
        C: PayloadCodec,
        C::Payload: Textured,
    {
        let selection = Selection::empty(pos, !flags.planet);
        if pos.depth > MAX_DEPTH || !self.update_survey(survey, cache) {
            return selection;
        }
        let (min, max) = (survey.order_min(), survey.order());
        let target_depth = pos.depth.min(max);

        if !flags.force_bootstrap {
            if pos.depth <= max {
                let exact = self.resolve(survey, cache, pos, flags);
                match exact.status {
                    TileStatus::Ok => {
                        let texture = exact.payload.and_then(|p| p.texture());
                        return selection.drawn_from(pos, UvTransform::IDENTITY, texture, target_depth);
                    }
                    TileStatus::NotFound | TileStatus::Error => {
                        return Selection {
                            loaded: true,
                            ..selection
                        };
                    }
                    _ => {}
                }
            }

            let mut transform = UvTransform::IDENTITY;
            let mut node = pos;
            while node.depth > min {
                transform = transform.ascend(node.quadrant());
                node = TilePos::new(node.depth - 1, node.index / 4);
                if node.depth > max {
                    continue;
                }
                if let Some(payload) = self.resolve(survey, cache, node, flags).payload {
                    return selection.drawn_from(node, transform, payload.texture(), target_depth);
                }
            }
        }

        if !(flags.force_bootstrap || flags.allow_bootstrap) || pos.depth < min {
            return selection;
        }
        let base = pos.ancestor_at(min);
        let bootstrap = self.resolve(survey, cache, base, flags.force_bootstrap());
        let Some(mosaic) = bootstrap.payload.and_then(|p| p.texture()) else {
            return selection;
        };
        let texture = mosaic_cell(&mosaic, base, survey.mosaic_columns());
        let transform = UvTransform::to_ancestor(pos, (pos.depth - min) as u32);
        selection.drawn_from(base, transform, Some(texture), target_depth)
    }
}

/// Crop the cell of `pos` out of a mosaic laid out `columns` cells wide.
fn mosaic_cell(mosaic: &Texture, pos: TilePos, columns: u32) -> Texture {
    let columns = u64::from(columns.max(1));
    let width = u64::from(mosaic.width());
    let cell = width / columns;
    let x = (pos.index % columns) * width / columns;
    let y = (pos.index / columns) * width / columns;
    mosaic.crop(PixelRect::new(x as u32, y as u32, cell as u32, cell as u32))
}
