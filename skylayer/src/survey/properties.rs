//! Survey manifest (`properties` file) parsing.
//!
//! The manifest is a line-oriented `key = value` file without sections. Every
//! key is kept in the property map; a handful of well-known keys are also
//! decoded into typed fields.

use std::collections::BTreeMap;

use ini::{Ini, ParseOption};
use thiserror::Error;
use tracing::warn;

use super::date::parse_hips_date;
use super::format::TileFormat;

/// Errors raised while loading a survey manifest.
#[derive(Debug, Error)]
pub enum ManifestError {
    /// The manifest could not be fetched.
    #[error("Cannot get survey properties at '{url}': status {status}")]
    Unavailable { url: String, status: u16 },

    /// The manifest is not valid `key = value` text.
    #[error("Cannot parse survey properties: {0}")]
    Parse(#[from] ini::ParseError),
}

/// Parsed survey manifest.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Properties {
    /// Every key/value pair, including the ones decoded below.
    pub values: BTreeMap<String, String>,
    /// `hips_order`
    pub order: Option<i32>,
    /// `hips_order_min`
    pub order_min: Option<i32>,
    /// `hips_tile_width`
    pub tile_width: Option<u32>,
    /// `hips_release_date`, as MJD.
    pub release_date: Option<f64>,
    /// `hips_tile_format`
    pub format: Option<TileFormat>,
}

impl Properties {
    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }
}

/// Parse the text of a `properties` file.
///
/// `hips_service_url` is kept in the map but never used to redirect requests.
pub fn parse_properties(text: &str) -> Result<Properties, ManifestError> {
    let opt = ParseOption {
        enabled_escape: false,
        ..ParseOption::default()
    };
    let ini = Ini::load_from_str_opt(text, opt)?;

    let mut props = Properties::default();
    for (key, value) in ini.general_section().iter() {
        let value = value.trim();
        match key {
            "hips_order" => props.order = parse_number(key, value),
            "hips_order_min" => props.order_min = parse_number(key, value),
            "hips_tile_width" => props.tile_width = parse_number(key, value),
            "hips_release_date" => props.release_date = Some(parse_hips_date(value)),
            "hips_tile_format" => {
                props.format = TileFormat::from_property(value);
                if props.format.is_none() {
                    warn!(format = value, "Unknown HiPS tile format");
                }
            }
            _ => {}
        }
        props.values.insert(key.to_string(), value.to_string());
    }
    Ok(props)
}

fn parse_number<T: std::str::FromStr>(key: &str, value: &str) -> Option<T> {
    match value.parse() {
        Ok(n) => Some(n),
        Err(_) => {
            warn!(key, value, "Ignoring non-numeric survey property");
            None
        }
    }
}
