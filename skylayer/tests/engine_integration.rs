//! Integration tests for the tile engine.
//!
//! These tests drive a survey end to end through an in-memory fetcher:
//! - manifest loading and URL templating
//! - resolution, idempotence and the missing-child short-circuit
//! - coarser stand-ins and the bootstrap mosaic fallback
//! - a full render pass with a test view and painter
//! - cache budget enforcement with an eviction veto
//!
//! Run with: `cargo test --test engine_integration`

use std::f64::consts::TAU;
use std::io::Cursor;
use std::sync::Arc;
use std::time::Duration;

use image::{DynamicImage, ImageFormat, Rgba, RgbaImage};

use skylayer::cache::Release;
use skylayer::codec::{ImageCodec, PixelRect, Textured};
use skylayer::coord::{Frame, HealpixProjection, TilePos, UV_OUTSIDE};
use skylayer::fetch::MemoryFetcher;
use skylayer::resolver::{PaintQuad, ResolveFlags, TilePainter, TileResolver, TileStatus};
use skylayer::survey::{Survey, TileFormat};
use skylayer::tile::TileStore;
use skylayer::traverse::View;
use skylayer::worker::DecodePool;

// ============================================================================
// Helper Functions
// ============================================================================

const BASE: &str = "mem://surveys/dss";

/// Encode a solid-colour PNG.
fn png(width: u32, height: u32, color: [u8; 4]) -> Vec<u8> {
    let mut buf = Vec::new();
    DynamicImage::ImageRgba8(RgbaImage::from_pixel(width, height, Rgba(color)))
        .write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)
        .unwrap();
    buf
}

fn tile_url(pos: TilePos) -> String {
    format!(
        "{}/Norder{}/Dir{}/Npix{}.png",
        BASE,
        pos.depth,
        (pos.index / 10000) * 10000,
        pos.index
    )
}

struct Engine {
    fetcher: Arc<MemoryFetcher>,
    resolver: TileResolver<Arc<MemoryFetcher>>,
    survey: Survey<ImageCodec>,
    cache: TileStore<ImageCodec>,
}

/// Build an engine over `manifest`, without loading anything yet.
fn engine(manifest: &str, budget: u64) -> Engine {
    let fetcher = Arc::new(MemoryFetcher::new());
    fetcher.insert(format!("{}/properties", BASE), manifest.to_string());
    let resolver = TileResolver::new(Arc::clone(&fetcher), DecodePool::new(2).unwrap());
    Engine {
        fetcher,
        resolver,
        survey: Survey::new(BASE, 0.0, Arc::new(ImageCodec::new())),
        cache: TileStore::new(budget),
    }
}

impl Engine {
    fn serve(&self, pos: TilePos) {
        self.fetcher.insert(tile_url(pos), png(2, 2, [200, 100, 50, 255]));
    }

    /// Update the survey until its manifest and mosaic have settled.
    fn wait_ready(&mut self) {
        for _ in 0..1000 {
            if self.resolver.update_survey(&mut self.survey, &mut self.cache) {
                return;
            }
            std::thread::sleep(Duration::from_millis(2));
        }
        panic!("survey never became ready");
    }

    fn resolve(&mut self, pos: TilePos) -> skylayer::resolver::Resolution<skylayer::codec::ImageTile> {
        self.resolver
            .resolve(&mut self.survey, &mut self.cache, pos, ResolveFlags::new())
    }
}

/// Sees only the nodes of one base face.
struct FaceView {
    face: u64,
}

impl View for FaceView {
    fn framebuffer_width(&self) -> f64 {
        4096.0
    }

    fn projection_scaling(&self) -> f64 {
        1.0
    }

    fn is_tile_clipped(&self, _frame: Frame, pos: TilePos, _outside: bool) -> bool {
        pos.face() != self.face
    }
}

#[derive(Default)]
struct RecordingPainter {
    alpha: f64,
    quads: Vec<(TilePos, PixelRect, u32, f64)>,
}

impl TilePainter for RecordingPainter {
    fn alpha(&self) -> f64 {
        self.alpha
    }

    fn paint_quad(&mut self, quad: &PaintQuad<'_>) {
        let pos = TilePos::new(quad.projection.nside.trailing_zeros() as i32, quad.projection.pix);
        self.quads
            .push((pos, quad.texture.region(), quad.split, quad.alpha));
    }
}

// ============================================================================
// Survey Loading
// ============================================================================

#[test]
fn test_manifest_drives_survey_metadata() {
    let mut e = engine(
        "# DSS colored\n\
         obs_title = DSS colored\n\
         hips_order = 5\n\
         hips_order_min = 2\n\
         hips_tile_format = png\n\
         hips_release_date = 2019-01-02T15:27Z\n",
        1 << 20,
    );
    e.wait_ready();

    assert_eq!(e.survey.order(), 5);
    assert_eq!(e.survey.order_min(), 2);
    assert_eq!(e.survey.format(), TileFormat::Png);
    assert!((e.survey.release_date() - 58485.64375).abs() < 1e-6);
    assert_eq!(e.survey.label(), Some("DSS colored"));
    // No cache buster for non-HTTP surveys.
    assert_eq!(e.survey.tile_url(TilePos::new(3, 5)), tile_url(TilePos::new(3, 5)));
    // The mosaic was requested once and found missing.
    assert!(e.survey.mosaic().is_none());
    assert_eq!(e.fetcher.request_count(&format!("{}/Norder2/Allsky.png", BASE)), 1);

    e.wait_ready();
    assert_eq!(e.fetcher.request_count(&format!("{}/properties", BASE)), 1);
}

#[test]
fn test_failed_manifest_is_final() {
    let fetcher = Arc::new(MemoryFetcher::new());
    let resolver = TileResolver::new(Arc::clone(&fetcher), DecodePool::new(1).unwrap());
    let mut survey = Survey::new(BASE, 0.0, Arc::new(ImageCodec::new()));
    let mut cache = TileStore::new(1 << 20);

    for _ in 0..3 {
        let res = resolver.resolve(&mut survey, &mut cache, TilePos::new(3, 0), ResolveFlags::new());
        assert_eq!(res.status, TileStatus::Pending);
    }
    assert!(survey.is_failed());
    assert_eq!(fetcher.request_count(&format!("{}/properties", BASE)), 1);
}

// ============================================================================
// Resolution
// ============================================================================

#[test]
fn test_same_key_resolves_to_same_payload() {
    let mut e = engine("hips_order = 3\nhips_order_min = 3\nhips_tile_format = png\n", 1 << 20);
    e.wait_ready();
    let pos = TilePos::new(3, 17);
    e.serve(pos);

    let first = e.resolve(pos);
    let second = e.resolve(pos);
    assert!(first.is_ok());
    assert!(Arc::ptr_eq(
        first.payload.as_ref().unwrap(),
        second.payload.as_ref().unwrap()
    ));
    assert_eq!(e.fetcher.request_count(&tile_url(pos)), 1);
    assert_eq!(e.cache.cost(&e.survey.key(pos)), Some(2 * 2 * 4));
}

#[test]
fn test_missing_tile_is_remembered_by_parent() {
    // Only children of a cached parent can be marked, so the parent depth
    // must be within range.
    let mut e = engine("hips_order = 3\nhips_order_min = 2\nhips_tile_format = png\n", 1 << 20);
    e.wait_ready();
    let parent = TilePos::new(2, 1);
    e.serve(parent);
    let child = TilePos::new(3, 5);

    assert_eq!(e.resolve(child).status, TileStatus::NotFound);
    let parent_tile = e.cache.peek(&e.survey.key(parent)).unwrap();
    assert!(parent_tile.missing_children().contains(1));
    assert_eq!(e.fetcher.request_count(&tile_url(child)), 1);

    // Known-missing children are never fetched again.
    for _ in 0..5 {
        assert_eq!(e.resolve(child).status, TileStatus::NotFound);
    }
    assert_eq!(e.fetcher.request_count(&tile_url(child)), 1);
}

#[test]
fn test_nodes_outside_order_range_are_not_fetched() {
    let mut e = engine("hips_order = 3\nhips_order_min = 3\nhips_tile_format = png\n", 1 << 20);
    e.wait_ready();

    assert_eq!(e.resolve(TilePos::new(3, 5)).status, TileStatus::NotFound);
    assert_eq!(e.resolve(TilePos::new(2, 1)).status, TileStatus::NotFound);
    assert_eq!(e.resolve(TilePos::new(4, 20)).status, TileStatus::NotFound);
    assert_eq!(e.fetcher.requests_matching("Norder2/"), 0);
    assert_eq!(e.fetcher.requests_matching("Norder4/"), 0);
}

#[test]
fn test_transparent_quadrant_prunes_child() {
    let mut e = engine("hips_order = 4\nhips_order_min = 3\nhips_tile_format = png\n", 1 << 20);
    e.wait_ready();
    let parent = TilePos::new(3, 8);
    // Quadrant 0 (top-left block) fully transparent.
    let mut pixels = RgbaImage::from_pixel(4, 4, Rgba([10, 20, 30, 255]));
    for y in 0..2 {
        for x in 0..2 {
            pixels.put_pixel(x, y, Rgba([0, 0, 0, 0]));
        }
    }
    let mut buf = Vec::new();
    DynamicImage::ImageRgba8(pixels)
        .write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)
        .unwrap();
    e.fetcher.insert(tile_url(parent), buf);
    e.serve(parent.child(0));
    e.serve(parent.child(3));

    assert_eq!(e.resolve(parent.child(0)).status, TileStatus::NotFound);
    assert_eq!(e.fetcher.request_count(&tile_url(parent.child(0))), 0);
    assert!(e.resolve(parent.child(3)).is_ok());
}

// ============================================================================
// Displayable Selection
// ============================================================================

#[test]
fn test_ancestor_stands_in_for_pending_tile() {
    let mut e = engine("hips_order = 4\nhips_order_min = 3\nhips_tile_format = png\n", 1 << 20);
    e.wait_ready();
    let parent = TilePos::new(3, 0);
    let child = parent.child(2);
    e.serve(parent);
    e.fetcher.set_pending(tile_url(child));

    let sel = e
        .resolver
        .select_displayable(&mut e.survey, &mut e.cache, child, ResolveFlags::new());
    assert!(sel.texture.is_some());
    assert!(!sel.loaded);
    assert_eq!(sel.source, parent);
    assert_eq!(sel.projection, HealpixProjection::for_tile(parent, true));
    assert_eq!(sel.uv, [[0.5, 0.0], [0.5, 0.5], [1.0, 0.0], [1.0, 0.5]]);

    // Once the exact tile arrives it replaces the stand-in.
    e.serve(child);
    let sel = e
        .resolver
        .select_displayable(&mut e.survey, &mut e.cache, child, ResolveFlags::new());
    assert!(sel.loaded);
    assert_eq!(sel.source, child);
    assert_eq!(sel.uv, UV_OUTSIDE);
}

#[test]
fn test_missing_tile_counts_as_loaded() {
    let mut e = engine("hips_order = 3\nhips_order_min = 3\nhips_tile_format = png\n", 1 << 20);
    e.wait_ready();
    let sel = e.resolver.select_displayable(
        &mut e.survey,
        &mut e.cache,
        TilePos::new(3, 99),
        ResolveFlags::new(),
    );
    assert!(sel.texture.is_none());
    assert!(sel.loaded);
}

#[test]
fn test_bootstrap_mosaic_fallback_crops_base_cell() {
    let mut e = engine("hips_order = 5\nhips_order_min = 3\nhips_tile_format = png\n", 1 << 20);
    // 27 columns of 2x2 cells.
    e.fetcher
        .insert(format!("{}/Norder3/Allsky.png", BASE), png(54, 58, [9, 9, 9, 255]));
    e.wait_ready();
    assert_eq!(e.survey.mosaic_columns(), 27);
    assert!(e.survey.mosaic().is_some());

    let base = TilePos::new(3, 5);
    let pos = base.child(1);
    e.fetcher.set_pending(tile_url(base));

    let sel = e.resolver.select_displayable(
        &mut e.survey,
        &mut e.cache,
        pos,
        ResolveFlags::new().allow_bootstrap(),
    );
    let texture = sel.texture.expect("mosaic fallback");
    assert_eq!(texture.region(), PixelRect::new(10, 0, 2, 2));
    assert_eq!(sel.source, base);
    assert!(!sel.loaded);
    assert_eq!(sel.uv, [[0.0, 0.5], [0.0, 1.0], [0.5, 0.5], [0.5, 1.0]]);
    assert_eq!(e.fetcher.request_count(&tile_url(pos)), 0);
}

#[test]
fn test_mosaic_fallback_needs_opt_in() {
    let mut e = engine("hips_order = 5\nhips_order_min = 3\nhips_tile_format = png\n", 1 << 20);
    e.fetcher
        .insert(format!("{}/Norder3/Allsky.png", BASE), png(54, 58, [9, 9, 9, 255]));
    e.wait_ready();
    assert!(e.survey.mosaic().is_some());

    let base = TilePos::new(3, 5);
    e.fetcher.set_pending(tile_url(base));
    let sel = e.resolver.select_displayable(
        &mut e.survey,
        &mut e.cache,
        base.child(1),
        ResolveFlags::new(),
    );
    assert!(sel.texture.is_none());
    assert_eq!(sel.source, base.child(1));
    assert!(!sel.loaded);
}

#[test]
fn test_too_deep_selection_is_empty() {
    let mut e = engine("hips_order = 5\nhips_order_min = 0\nhips_tile_format = png\n", 1 << 20);
    e.wait_ready();
    let pos = TilePos::new(34, 0);
    let sel = e.resolver.select_displayable(
        &mut e.survey,
        &mut e.cache,
        pos,
        ResolveFlags::new().allow_bootstrap(),
    );
    assert!(sel.texture.is_none());
    assert!(!sel.loaded);
    assert_eq!(sel.source, pos);
    assert_eq!(e.fetcher.requests_matching("Npix"), 0);
}

#[test]
fn test_force_bootstrap_skips_real_tiles() {
    let mut e = engine("hips_order = 5\nhips_order_min = 3\nhips_tile_format = png\n", 1 << 20);
    e.fetcher
        .insert(format!("{}/Norder3/Allsky.png", BASE), png(54, 58, [9, 9, 9, 255]));
    e.wait_ready();
    let pos = TilePos::new(3, 40);
    e.serve(pos);

    let sel = e.resolver.select_displayable(
        &mut e.survey,
        &mut e.cache,
        pos,
        ResolveFlags::new().force_bootstrap(),
    );
    assert_eq!(sel.texture.unwrap().region(), PixelRect::new(26, 2, 2, 2));
    assert_eq!(e.fetcher.requests_matching("Npix"), 0);
}

// ============================================================================
// Render Pass
// ============================================================================

#[test]
fn test_render_until_complete() {
    let mut e = engine(
        "hips_order = 3\nhips_order_min = 3\nhips_tile_format = png\nhips_tile_width = 64\n",
        1 << 20,
    );
    for index in 0..64 {
        e.serve(TilePos::new(3, index));
    }
    let view = FaceView { face: 0 };
    let mut painter = RecordingPainter {
        alpha: 0.5,
        ..Default::default()
    };

    let mut progress = None;
    for _ in 0..1000 {
        painter.quads.clear();
        let p = e
            .resolver
            .render(&mut e.survey, &mut e.cache, &view, &mut painter, TAU, None)
            .unwrap();
        if p.total > 0 && p.is_complete() {
            progress = Some(p);
            break;
        }
        std::thread::sleep(Duration::from_millis(2));
    }

    let progress = progress.expect("render never completed");
    assert_eq!(progress.total, 64);
    assert_eq!(progress.loaded, 64);
    assert_eq!(painter.quads.len(), 64);
    assert!(painter
        .quads
        .iter()
        .all(|(pos, _, split, alpha)| pos.depth == 3 && pos.face() == 0 && *split == 1 && *alpha == 0.5));
    assert_eq!(e.fetcher.requests_matching("Norder3/Dir0/Npix"), 64);
}

#[test]
fn test_render_skipped_when_transparent() {
    let mut e = engine("hips_order = 3\nhips_tile_format = png\n", 1 << 20);
    let mut painter = RecordingPainter::default();
    let progress = e
        .resolver
        .render(&mut e.survey, &mut e.cache, &FaceView { face: 0 }, &mut painter, TAU, None)
        .unwrap();
    assert_eq!(progress.total, 0);
    assert!(painter.quads.is_empty());
    assert_eq!(e.fetcher.total_requests(), 0);
}

// ============================================================================
// Cache Budget
// ============================================================================

#[test]
fn test_budget_respects_eviction_veto() {
    // Room for one 2x2 tile (16 bytes) only.
    let mut e = engine("hips_order = 3\nhips_order_min = 3\nhips_tile_format = png\n", 20);
    e.wait_ready();
    let (a, b, c) = (TilePos::new(3, 1), TilePos::new(3, 2), TilePos::new(3, 3));
    for pos in [a, b, c] {
        e.serve(pos);
    }

    // A texture handed to the renderer pins its tile.
    let held = e.resolve(a).payload.unwrap().texture().unwrap();
    assert!(e.resolve(b).is_ok());
    assert!(e.cache.contains(&e.survey.key(a)));
    assert!(e.cache.total_cost() > e.cache.budget());
    assert!(e.cache.stats().vetoes >= 1);

    drop(held);
    assert!(e.resolve(c).is_ok());
    assert!(!e.cache.contains(&e.survey.key(a)));
    assert!(!e.cache.contains(&e.survey.key(b)));
    assert!(e.cache.contains(&e.survey.key(c)));
    assert!(e.cache.total_cost() <= e.cache.budget());

    // Evicted tiles are fetched again on demand, pushing out the oldest.
    assert!(e.resolve(a).is_ok());
    assert_eq!(e.fetcher.request_count(&tile_url(a)), 2);
    assert!(!e.cache.contains(&e.survey.key(c)));
    assert_eq!(e.cache.remove(&e.survey.key(a)), Some(Release::Free));
    assert!(e.cache.is_empty());
}
