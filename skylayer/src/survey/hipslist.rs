//! Parsing of HiPS list documents.
//!
//! A HiPS list is a sequence of property records, one per survey, separated
//! by blank lines. Only the service URL and release date are extracted.

use super::date::parse_hips_date;

/// One survey advertised by a HiPS list.
#[derive(Debug, Clone, PartialEq)]
pub struct HipsListEntry {
    pub service_url: String,
    /// Release date as MJD, 0 if absent.
    pub release_date: f64,
}

/// Extract every record that has a `hips_service_url`.
pub fn parse_hipslist(text: &str) -> Vec<HipsListEntry> {
    let mut entries = Vec::new();
    let mut service_url: Option<String> = None;
    let mut release_date = 0.0;

    for line in text.lines() {
        let line = line.trim();
        if line.is_empty() {
            if let Some(url) = service_url.take() {
                entries.push(HipsListEntry {
                    service_url: url,
                    release_date,
                });
                release_date = 0.0;
            }
            continue;
        }
        if line.starts_with('#') {
            continue;
        }
        let Some((key, value)) = line.split_once('=') else {
            continue;
        };
        match key.trim() {
            "hips_service_url" => service_url = Some(value.trim().to_string()),
            "hips_release_date" => release_date = parse_hips_date(value),
            _ => {}
        }
    }

    if let Some(url) = service_url {
        entries.push(HipsListEntry {
            service_url: url,
            release_date,
        });
    }
    entries
}
