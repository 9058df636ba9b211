//! Tile URL templating.

use crate::coord::TilePos;
use crate::fetch::is_remote;

/// Number of tiles stored per `Dir` directory.
const TILES_PER_DIR: u64 = 10_000;

/// Path of a tile relative to the survey root.
pub fn tile_path(pos: TilePos, ext: &str) -> String {
    format!(
        "Norder{}/Dir{}/Npix{}.{}",
        pos.depth,
        (pos.index / TILES_PER_DIR) * TILES_PER_DIR,
        pos.index,
        ext
    )
}

/// Path of the bootstrap mosaic relative to the survey root.
pub fn allsky_path(order_min: i32, ext: &str) -> String {
    format!("Norder{}/Allsky.{}", order_min, ext)
}

/// Join `path` to `base`, adding the release-date cache buster for remote
/// surveys with a known release date.
pub fn resource_url(base: &str, path: &str, release_date: f64) -> String {
    let mut url = format!("{}/{}", base, path);
    if release_date != 0.0 && is_remote(base) {
        url.push_str(&format!("?v={}", release_date as i64));
    }
    url
}
