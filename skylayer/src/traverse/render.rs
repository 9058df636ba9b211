//! View-driven traversal: pick the depth to draw at and visit visible nodes.

use std::f64::consts::{SQRT_2, TAU};

use super::{traverse, Traversal, TraverseError, Visit};
use crate::codec::PayloadCodec;
use crate::coord::{Frame, TilePos, MAX_DEPTH};
use crate::resolver::ResolveFlags;
use crate::survey::{Survey, FALLBACK_TILE_WIDTH};

/// Deepest order ever drawn, whatever the zoom.
pub const MAX_RENDER_ORDER: i32 = 9;

/// Render depth below which a survey with a mosaic draws only the mosaic.
const FORCE_BOOTSTRAP_BELOW: i32 = -5;

/// What the renderer exposes to the traversal.
pub trait View {
    /// Framebuffer width in pixels.
    fn framebuffer_width(&self) -> f64;

    /// Horizontal scaling of the projection.
    fn projection_scaling(&self) -> f64;

    /// Whether the node's footprint lies entirely outside the view.
    fn is_tile_clipped(&self, frame: Frame, pos: TilePos, outside: bool) -> bool;
}

/// Ideal depth for drawing a sphere spanning `angle` radians.
///
/// Picks the order at which one tile texel maps to roughly one screen pixel.
/// A `tile_width` of 0 means unknown.
pub fn render_order(framebuffer_width: f64, projection_scaling: f64, angle: f64, tile_width: u32) -> i32 {
    let pix_per_rad = framebuffer_width / projection_scaling.atan() / 2.0;
    let px = pix_per_rad * angle;
    let w = if tile_width == 0 {
        FALLBACK_TILE_WIDTH
    } else {
        tile_width
    };
    (px / (4.0 * SQRT_2 * f64::from(w))).log2().round() as i32
}

/// Parameters of one view-driven traversal.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RenderPlan {
    /// Depth at which nodes are handed to the callback.
    pub render_order: i32,
    /// Depth the geometry is split to.
    pub split_order: i32,
    pub flags: ResolveFlags,
    pub frame: Frame,
}

impl RenderPlan {
    /// Plan the traversal of `survey` for `view`.
    ///
    /// `angle` is the angular size of the sphere in radians; anything below
    /// a full turn is a planet seen from outside its surface. `split_order`
    /// of `None` picks the default.
    pub fn new<C, V>(survey: &Survey<C>, view: &V, angle: f64, split_order: Option<i32>) -> Self
    where
        C: PayloadCodec,
        V: View + ?Sized,
    {
        let mut order = render_order(
            view.framebuffer_width(),
            view.projection_scaling(),
            angle,
            survey.tile_width(),
        );
        let mut flags = ResolveFlags::default();
        if angle < TAU {
            flags.planet = true;
        }
        // Very low resolution: the mosaic alone is enough.
        if order < FORCE_BOOTSTRAP_BELOW && survey.mosaic().is_some() {
            flags.force_bootstrap = true;
        }

        order = order
            .max(survey.order_min())
            .min(survey.order())
            .min(MAX_RENDER_ORDER);

        let default_split = if flags.force_bootstrap { 2 } else { 3 };
        let split_order = split_order
            .unwrap_or(default_split)
            .min(MAX_DEPTH)
            .max(order);

        Self {
            render_order: order,
            split_order,
            flags,
            frame: survey.frame(),
        }
    }

    /// Number of geometry subdivisions per rendered tile side.
    pub fn split(&self) -> u32 {
        1 << (self.split_order - self.render_order).clamp(0, MAX_DEPTH)
    }
}

/// Visit every unclipped node at the plan's render order.
///
/// The callback receives the node and the split factor.
pub fn render_traverse<V, F>(view: &V, plan: &RenderPlan, mut callback: F) -> Result<Traversal, TraverseError>
where
    V: View + ?Sized,
    F: FnMut(TilePos, u32),
{
    let outside = !plan.flags.planet;
    let split = plan.split();
    traverse(|pos| {
        if view.is_tile_clipped(plan.frame, pos, outside) {
            return Visit::Stop;
        }
        if pos.depth < plan.render_order {
            return Visit::Expand;
        }
        callback(pos, split);
        Visit::Stop
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::ImageCodec;
    use crate::fetch::MemoryFetcher;
    use crate::tile::TileStore;
    use crate::worker::DecodePool;
    use std::sync::Arc;

    struct TestView {
        width: f64,
        scaling: f64,
        /// Only nodes of this face are visible.
        face: Option<u64>,
    }

    impl View for TestView {
        fn framebuffer_width(&self) -> f64 {
            self.width
        }

        fn projection_scaling(&self) -> f64 {
            self.scaling
        }

        fn is_tile_clipped(&self, _frame: Frame, pos: TilePos, _outside: bool) -> bool {
            self.face.is_some_and(|face| pos.face() != face)
        }
    }

    fn ready_survey(manifest: &str) -> Survey<ImageCodec> {
        let fetcher = MemoryFetcher::new();
        fetcher.insert("mem://s/properties", manifest.to_string());
        let pool = DecodePool::new(1).unwrap();
        let mut cache = TileStore::new(1 << 20);
        let mut survey = Survey::new("mem://s", 0.0, Arc::new(ImageCodec::new()));
        for _ in 0..10 {
            if survey.update(&fetcher, &pool, &mut cache) {
                return survey;
            }
        }
        panic!("survey not ready");
    }

    #[test]
    fn test_render_order_formula() {
        // scaling = tan(1) so pix_per_rad = width / 2.
        let scaling = 1f64.tan();
        let width = 2.0 * 4.0 * SQRT_2 * 256.0 * 8.0;
        assert_eq!(render_order(width, scaling, 1.0, 0), 3);
        assert_eq!(render_order(width, scaling, 1.0, 256), 3);
        assert_eq!(render_order(width, scaling, 1.0, 512), 2);
        assert_eq!(render_order(width, scaling, 4.0, 256), 5);
    }

    #[test]
    fn test_plan_clamps_to_survey_range() {
        let survey = ready_survey("hips_order = 11\nhips_order_min = 3\n");
        let scaling = 1f64.tan();

        let tiny = TestView { width: 10.0, scaling, face: None };
        let plan = RenderPlan::new(&survey, &tiny, TAU, None);
        assert_eq!(plan.render_order, 3);
        assert_eq!(plan.split_order, 3);
        assert!(!plan.flags.planet);
        // No mosaic: never forced.
        assert!(!plan.flags.force_bootstrap);

        let huge = TestView { width: 1e9, scaling, face: None };
        let plan = RenderPlan::new(&survey, &huge, TAU, Some(1));
        assert_eq!(plan.render_order, MAX_RENDER_ORDER);
        assert_eq!(plan.split_order, MAX_RENDER_ORDER);
        assert_eq!(plan.split(), 1);
    }

    #[test]
    fn test_huge_split_order_is_clamped() {
        let survey = ready_survey("hips_order = 5\nhips_order_min = 0\n");
        let view = TestView { width: 10.0, scaling: 1f64.tan(), face: None };
        let plan = RenderPlan::new(&survey, &view, TAU, Some(40));
        assert_eq!(plan.render_order, 0);
        assert_eq!(plan.split_order, MAX_DEPTH);
        assert_eq!(plan.split(), 1 << MAX_DEPTH);
    }

    #[test]
    fn test_planet_mode_and_split() {
        let survey = ready_survey("hips_order = 5\nhips_order_min = 0\n");
        let view = TestView { width: 10.0, scaling: 1f64.tan(), face: None };
        let plan = RenderPlan::new(&survey, &view, 1.0, Some(4));
        assert!(plan.flags.planet);
        assert_eq!(plan.render_order, 0);
        assert_eq!(plan.split(), 16);
    }

    #[test]
    fn test_render_traverse_visits_unclipped_nodes() {
        let survey = ready_survey("hips_order = 5\nhips_order_min = 1\n");
        let view = TestView { width: 10.0, scaling: 1f64.tan(), face: Some(7) };
        let plan = RenderPlan::new(&survey, &view, TAU, None);
        assert_eq!(plan.render_order, 1);

        let mut visited = Vec::new();
        let summary = render_traverse(&view, &plan, |pos, split| {
            assert_eq!(split, 4);
            visited.push(pos);
        })
        .unwrap();
        assert_eq!(visited, TilePos::new(0, 7).children());
        assert_eq!(summary.visited, 12 + 4);
    }
}
