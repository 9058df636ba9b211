//! Drawing a survey: traverse the visible nodes and paint what is available.

use tracing::trace;

use super::{ResolveFlags, TileResolver};
use crate::codec::{PayloadCodec, Texture, Textured};
use crate::coord::{Frame, HealpixProjection, UvQuad};
use crate::fetch::ByteFetcher;
use crate::survey::Survey;
use crate::tile::TileStore;
use crate::traverse::{render_traverse, RenderPlan, TraverseError, View};

/// One textured quad handed to the painter.
#[derive(Debug)]
pub struct PaintQuad<'a> {
    pub frame: Frame,
    pub texture: &'a Texture,
    pub uv: &'a UvQuad,
    pub projection: &'a HealpixProjection,
    /// Geometry subdivisions per side.
    pub split: u32,
    /// Painter alpha already multiplied by the selection fade.
    pub alpha: f64,
}

/// Renderer side of a survey draw.
pub trait TilePainter {
    /// Current painter opacity; 0 skips the survey entirely.
    fn alpha(&self) -> f64;

    fn paint_quad(&mut self, quad: &PaintQuad<'_>);
}

/// How much of a draw used final-resolution tiles.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RenderProgress {
    /// Nodes visited at render depth.
    pub total: usize,
    /// Nodes drawn at their best resolution.
    pub loaded: usize,
}

impl RenderProgress {
    pub fn is_complete(&self) -> bool {
        self.loaded == self.total
    }
}

impl<F: ByteFetcher> TileResolver<F> {
    /// Draw `survey` as seen through `view`.
    ///
    /// `angle` is the angular size of the sphere in radians. Tiles are
    /// decoded on the worker pool; anything not ready yet is replaced by a
    /// coarser stand-in, down to the bootstrap mosaic.
    pub fn render<C, V, P>(
        &self,
        survey: &mut Survey<C>,
        cache: &mut TileStore<C>,
        view: &V,
        painter: &mut P,
        angle: f64,
        split_order: Option<i32>,
    ) -> Result<RenderProgress, TraverseError>
    where
        C: PayloadCodec,
        C::Payload: Textured,
        V: View + ?Sized,
        P: TilePainter + ?Sized,
    {
        let mut progress = RenderProgress::default();
        if painter.alpha() == 0.0 || !self.update_survey(survey, cache) {
            return Ok(progress);
        }

        let plan = RenderPlan::new(survey, view, angle, split_order);
        let flags = ResolveFlags {
            load_in_thread: true,
            allow_bootstrap: true,
            ..plan.flags
        };
        render_traverse(view, &plan, |pos, split| {
            progress.total += 1;
            let selection = self.select_displayable(survey, cache, pos, flags);
            if selection.loaded {
                progress.loaded += 1;
            }
            let Some(texture) = &selection.texture else {
                return;
            };
            let quad = PaintQuad {
                frame: plan.frame,
                texture,
                uv: &selection.uv,
                projection: &selection.projection,
                split,
                alpha: painter.alpha() * selection.fade,
            };
            painter.paint_quad(&quad);
        })?;

        trace!(
            survey = %survey.url(),
            total = progress.total,
            loaded = progress.loaded,
            "Survey rendered"
        );
        Ok(progress)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::ImageCodec;
    use crate::coord::TilePos;
    use crate::fetch::MemoryFetcher;
    use crate::worker::DecodePool;
    use std::sync::Arc;

    struct AllVisible;

    impl View for AllVisible {
        fn framebuffer_width(&self) -> f64 {
            800.0
        }

        fn projection_scaling(&self) -> f64 {
            1.0
        }

        fn is_tile_clipped(&self, _frame: Frame, _pos: TilePos, _outside: bool) -> bool {
            false
        }
    }

    struct CountingPainter {
        alpha: f64,
        painted: usize,
    }

    impl TilePainter for CountingPainter {
        fn alpha(&self) -> f64 {
            self.alpha
        }

        fn paint_quad(&mut self, _quad: &PaintQuad<'_>) {
            self.painted += 1;
        }
    }

    #[test]
    fn test_progress_completion() {
        assert!(RenderProgress::default().is_complete());
        assert!(!RenderProgress { total: 12, loaded: 3 }.is_complete());
        assert!(RenderProgress { total: 12, loaded: 12 }.is_complete());
    }

    #[test]
    fn test_invisible_painter_skips_survey() {
        let fetcher = Arc::new(MemoryFetcher::new());
        fetcher.insert("mem://s/properties", "hips_order = 3\n");
        let resolver = TileResolver::new(Arc::clone(&fetcher), DecodePool::new(1).unwrap());
        let mut survey = Survey::new("mem://s", 0.0, Arc::new(ImageCodec::new()));
        let mut cache = TileStore::new(1 << 20);
        let mut painter = CountingPainter { alpha: 0.0, painted: 0 };

        let progress = resolver
            .render(&mut survey, &mut cache, &AllVisible, &mut painter, 1.0, None)
            .unwrap();
        assert_eq!(progress, RenderProgress::default());
        assert_eq!(fetcher.total_requests(), 0);
    }

    #[test]
    fn test_missing_tiles_count_as_loaded() {
        // No tile is served, so every node is definitively absent.
        let fetcher = Arc::new(MemoryFetcher::new());
        fetcher.insert("mem://s/properties", "hips_order = 3\nhips_order_min = 3\nhips_tile_format = eph\n");
        let resolver = TileResolver::new(Arc::clone(&fetcher), DecodePool::new(1).unwrap());
        let mut survey = Survey::new("mem://s", 0.0, Arc::new(ImageCodec::new()));
        let mut cache = TileStore::new(1 << 20);
        let mut painter = CountingPainter { alpha: 1.0, painted: 0 };

        let progress = resolver
            .render(&mut survey, &mut cache, &AllVisible, &mut painter, 1.0, None)
            .unwrap();
        assert_eq!(progress.total, 768);
        assert!(progress.is_complete());
        assert_eq!(painter.painted, 0);
    }
}
