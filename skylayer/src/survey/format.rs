//! Tile image formats advertised by a survey.

use std::fmt;

/// Encoding of the tiles of a survey (`hips_tile_format`).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum TileFormat {
    #[default]
    Jpeg,
    Png,
    Webp,
    /// Ephemeris tables rather than images. Such surveys have no mosaic.
    Eph,
}

impl TileFormat {
    /// Pick the format from a `hips_tile_format` value.
    ///
    /// The value may list several formats (`"png jpeg"`); the first match in
    /// the order webp, jpeg, png, eph wins. Returns `None` when nothing
    /// matches.
    pub fn from_property(value: &str) -> Option<Self> {
        [
            ("webp", TileFormat::Webp),
            ("jpeg", TileFormat::Jpeg),
            ("png", TileFormat::Png),
            ("eph", TileFormat::Eph),
        ]
        .into_iter()
        .find(|(needle, _)| value.contains(needle))
        .map(|(_, format)| format)
    }

    /// File extension used in tile URLs.
    pub fn ext(&self) -> &'static str {
        match self {
            TileFormat::Jpeg => "jpg",
            TileFormat::Png => "png",
            TileFormat::Webp => "webp",
            TileFormat::Eph => "eph",
        }
    }

    /// Whether the survey can have an `Allsky` mosaic in this format.
    pub fn has_mosaic(&self) -> bool {
        !matches!(self, TileFormat::Eph)
    }
}

impl fmt::Display for TileFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.ext())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_property() {
        assert_eq!(TileFormat::from_property("png"), Some(TileFormat::Png));
        assert_eq!(TileFormat::from_property("jpeg"), Some(TileFormat::Jpeg));
        assert_eq!(TileFormat::from_property("eph"), Some(TileFormat::Eph));
        assert_eq!(TileFormat::from_property("fits"), None);
    }

    #[test]
    fn test_first_match_order() {
        // webp is preferred even when listed last.
        assert_eq!(
            TileFormat::from_property("png jpeg webp"),
            Some(TileFormat::Webp)
        );
        assert_eq!(TileFormat::from_property("png jpeg"), Some(TileFormat::Jpeg));
    }

    #[test]
    fn test_ext() {
        assert_eq!(TileFormat::default().ext(), "jpg");
        assert_eq!(TileFormat::Webp.to_string(), "webp");
        assert!(!TileFormat::Eph.has_mosaic());
        assert!(TileFormat::Png.has_mosaic());
    }
}
