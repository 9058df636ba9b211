//! Survey metadata and bootstrap.
//!
//! A [`Survey`] is one HiPS pyramid. It becomes ready in two steps, both
//! driven by [`Survey::update`] on every call and never blocking:
//!
//! 1. fetch and parse `<base>/properties` once
//! 2. fetch `<base>/Norder<min>/Allsky.<ext>`, decode it on the worker pool
//!    and register 12 virtual tiles at depth -1 that expose it
//!
//! A missing or undecodable mosaic only disables the bootstrap fallback. A
//! manifest failure is final: the survey never becomes ready.

mod date;
mod format;
mod hipslist;
mod properties;
mod url;

pub use date::{parse_hips_date, MJD_UNIX_EPOCH};
pub use format::TileFormat;
pub use hipslist::{parse_hipslist, HipsListEntry};
pub use properties::{parse_properties, ManifestError, Properties};
pub use url::{allsky_path, resource_url, tile_path};

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use image::RgbaImage;
use tracing::{debug, error, info, warn};

use crate::codec::{decode_rgba, CodecError, Mosaic, PayloadCodec};
use crate::coord::{Frame, TileKey, TilePos, BOOTSTRAP_DEPTH, ROOT_FACES};
use crate::fetch::{ByteFetcher, FetchFlags, FetchOutcome};
use crate::tile::{Tile, TileStore};
use crate::worker::{DecodeHandle, DecodePool};

/// Minimum order assumed until the manifest says otherwise.
pub const DEFAULT_ORDER_MIN: i32 = 3;

/// Tile width used for render-order selection when the manifest gives none.
pub const FALLBACK_TILE_WIDTH: u32 = 256;

enum ManifestState {
    Unloaded,
    Loaded,
    Failed,
}

enum MosaicState {
    Unrequested,
    Loading(DecodeHandle<Result<RgbaImage, CodecError>>),
    Ready(Mosaic),
    Unavailable,
}

/// One progressive image pyramid.
pub struct Survey<C: PayloadCodec> {
    url: String,
    hash: u32,
    codec: Arc<C>,
    format: TileFormat,
    order: i32,
    order_min: i32,
    tile_width: u32,
    release_date: f64,
    frame: Frame,
    label: Option<String>,
    properties: Properties,
    manifest: ManifestState,
    mosaic: MosaicState,
}

impl<C: PayloadCodec> Survey<C> {
    /// Create a survey rooted at `url`.
    ///
    /// `release_date` is the MJD advertised by a HiPS list, or 0 if unknown;
    /// the manifest value replaces it once loaded.
    pub fn new(url: impl Into<String>, release_date: f64, codec: Arc<C>) -> Self {
        let url = url.into().trim_end_matches('/').to_string();
        let hash = url_hash(&url);
        Self {
            url,
            hash,
            codec,
            format: TileFormat::default(),
            order: 0,
            order_min: DEFAULT_ORDER_MIN,
            tile_width: 0,
            release_date,
            frame: Frame::default(),
            label: None,
            properties: Properties::default(),
            manifest: ManifestState::Unloaded,
            mosaic: MosaicState::Unrequested,
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// 32-bit identity used in tile keys.
    pub fn hash(&self) -> u32 {
        self.hash
    }

    pub fn codec(&self) -> &Arc<C> {
        &self.codec
    }

    pub fn format(&self) -> TileFormat {
        self.format
    }

    /// Deepest order, 0 while unknown.
    pub fn order(&self) -> i32 {
        self.order
    }

    pub fn order_min(&self) -> i32 {
        self.order_min
    }

    /// Tile width in pixels, 0 while unknown.
    pub fn tile_width(&self) -> u32 {
        self.tile_width
    }

    pub fn release_date(&self) -> f64 {
        self.release_date
    }

    pub fn frame(&self) -> Frame {
        self.frame
    }

    pub fn set_frame(&mut self, frame: Frame) {
        self.frame = frame;
    }

    /// Display label; derived from the manifest unless set explicitly.
    pub fn label(&self) -> Option<&str> {
        self.label.as_deref()
    }

    pub fn set_label(&mut self, label: impl Into<String>) {
        self.label = Some(label.into());
    }

    pub fn properties(&self) -> &Properties {
        &self.properties
    }

    /// Decoded bootstrap mosaic, if available.
    pub fn mosaic(&self) -> Option<&Mosaic> {
        match &self.mosaic {
            MosaicState::Ready(mosaic) => Some(mosaic),
            _ => None,
        }
    }

    /// Whether the manifest is parsed and the mosaic step has settled.
    ///
    /// This does not advance loading; see [`Survey::update`].
    pub fn is_ready(&self) -> bool {
        matches!(self.manifest, ManifestState::Loaded)
            && matches!(
                self.mosaic,
                MosaicState::Ready(_) | MosaicState::Unavailable
            )
    }

    /// Whether the manifest could not be loaded.
    pub fn is_failed(&self) -> bool {
        matches!(self.manifest, ManifestState::Failed)
    }

    pub fn key(&self, pos: TilePos) -> TileKey {
        TileKey::new(self.hash, pos)
    }

    /// URL of a resource below the survey root.
    pub fn url_for(&self, path: &str) -> String {
        resource_url(&self.url, path, self.release_date)
    }

    pub fn tile_url(&self, pos: TilePos) -> String {
        self.url_for(&tile_path(pos, self.format.ext()))
    }

    pub fn allsky_url(&self) -> String {
        self.url_for(&allsky_path(self.order_min, self.format.ext()))
    }

    /// Number of columns of the mosaic grid (`floor(sqrt(12 * 4^min))`).
    pub fn mosaic_columns(&self) -> u32 {
        let tiles = ROOT_FACES as f64 * 4f64.powi(self.order_min);
        tiles.sqrt().floor() as u32
    }

    /// Advance loading and report readiness.
    ///
    /// Safe to call every frame: fetches already in flight are only polled.
    pub fn update<F>(&mut self, fetcher: &F, pool: &DecodePool, cache: &mut TileStore<C>) -> bool
    where
        F: ByteFetcher + ?Sized,
    {
        match self.manifest {
            ManifestState::Failed => return false,
            ManifestState::Unloaded => {
                if !self.load_manifest(fetcher) {
                    return false;
                }
            }
            ManifestState::Loaded => {}
        }
        self.update_mosaic(fetcher, pool, cache)
    }

    /// Returns whether the manifest is now loaded.
    fn load_manifest<F: ByteFetcher + ?Sized>(&mut self, fetcher: &F) -> bool {
        let url = self.url_for("properties");
        let result = match fetcher.fetch(&url, FetchFlags::new()) {
            FetchOutcome::Pending => return false,
            FetchOutcome::Status(status) => Err(ManifestError::Unavailable {
                url: url.clone(),
                status,
            }),
            FetchOutcome::Ready(bytes) => {
                fetcher.release(&url);
                parse_properties(&String::from_utf8_lossy(&bytes))
            }
        };

        match result {
            Ok(props) => {
                self.apply_properties(props);
                self.manifest = ManifestState::Loaded;
                info!(
                    survey = %self.url,
                    order = self.order,
                    order_min = self.order_min,
                    format = %self.format,
                    "Survey manifest loaded"
                );
                true
            }
            Err(e) => {
                error!(survey = %self.url, error = %e, "Cannot load survey manifest");
                self.manifest = ManifestState::Failed;
                false
            }
        }
    }

    fn apply_properties(&mut self, props: Properties) {
        if let Some(order) = props.order {
            self.order = order;
        }
        if let Some(order_min) = props.order_min {
            self.order_min = order_min;
        }
        if let Some(width) = props.tile_width {
            self.tile_width = width;
        }
        if let Some(date) = props.release_date {
            self.release_date = date;
        }
        if let Some(format) = props.format {
            self.format = format;
        }
        if !self.format.has_mosaic() {
            self.mosaic = MosaicState::Unavailable;
        }
        if self.label.is_none() {
            let label = props
                .get("obs_collection")
                .or_else(|| props.get("obs_title"))
                .unwrap_or(&self.url)
                .to_string();
            self.label = Some(label);
        }
        self.properties = props;
    }

    /// Returns whether the mosaic step has settled.
    fn update_mosaic<F: ByteFetcher + ?Sized>(
        &mut self,
        fetcher: &F,
        pool: &DecodePool,
        cache: &mut TileStore<C>,
    ) -> bool {
        match &mut self.mosaic {
            MosaicState::Ready(_) | MosaicState::Unavailable => true,
            MosaicState::Unrequested => {
                let url = self.allsky_url();
                match fetcher.fetch(&url, FetchFlags::new().accept_404()) {
                    FetchOutcome::Pending => {}
                    FetchOutcome::Status(status) => {
                        debug!(survey = %self.url, status, "No bootstrap mosaic");
                        self.mosaic = MosaicState::Unavailable;
                    }
                    FetchOutcome::Ready(bytes) => {
                        fetcher.release(&url);
                        let handle = pool.schedule(move || decode_rgba(&bytes));
                        self.mosaic = MosaicState::Loading(handle);
                    }
                }
                false
            }
            MosaicState::Loading(handle) => {
                if !handle.poll() {
                    return false;
                }
                match handle.take() {
                    Some(Ok(Ok(pixels))) => {
                        let mosaic = Arc::new(pixels);
                        self.add_bootstrap_tiles(&mosaic, cache);
                        self.mosaic = MosaicState::Ready(mosaic);
                    }
                    Some(Ok(Err(e))) => {
                        warn!(survey = %self.url, error = %e, "Cannot decode bootstrap mosaic");
                        self.mosaic = MosaicState::Unavailable;
                    }
                    Some(Err(e)) => {
                        warn!(survey = %self.url, error = %e, "Bootstrap mosaic decode lost");
                        self.mosaic = MosaicState::Unavailable;
                    }
                    None => self.mosaic = MosaicState::Unavailable,
                }
                true
            }
        }
    }

    fn add_bootstrap_tiles(&self, mosaic: &Mosaic, cache: &mut TileStore<C>) {
        for face in 0..ROOT_FACES {
            if let Some((tile, cost)) = self.build_bootstrap_tile(face, mosaic) {
                let key = self.key(tile.pos());
                if cache.put(key, tile, cost).is_err() {
                    debug!(%key, "Bootstrap tile already cached");
                }
            }
        }
    }

    /// Virtual tile at depth -1 over the mosaic for base face `face`.
    ///
    /// Returns `None` if the mosaic is not decoded or the codec does not
    /// support bootstrap tiles.
    pub fn bootstrap_tile(&self, face: u64) -> Option<(Tile<C>, u64)> {
        let mosaic = self.mosaic()?;
        self.build_bootstrap_tile(face, mosaic)
    }

    fn build_bootstrap_tile(&self, face: u64, mosaic: &Mosaic) -> Option<(Tile<C>, u64)> {
        let decoded = self.codec.construct_bootstrap(face, mosaic)?;
        let pos = TilePos::new(BOOTSTRAP_DEPTH, face);
        Some(Tile::decoded(pos, Arc::clone(&self.codec), Ok(decoded)))
    }
}

fn url_hash(url: &str) -> u32 {
    let mut hasher = DefaultHasher::new();
    url.hash(&mut hasher);
    let h = hasher.finish();
    (h ^ (h >> 32)) as u32
}
