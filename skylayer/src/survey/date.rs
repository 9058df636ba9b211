//! HiPS date parsing.

use chrono::NaiveDateTime;
use tracing::warn;

/// Unix epoch (1970-01-01T00:00Z) as a Modified Julian Date.
pub const MJD_UNIX_EPOCH: f64 = 40587.0;

const SECONDS_PER_DAY: f64 = 86_400.0;

/// Parse a HiPS date such as `2019-01-02T15:27Z` into a Modified Julian Date.
///
/// Returns 0 (unknown) when the string is not in that format.
pub fn parse_hips_date(value: &str) -> f64 {
    match NaiveDateTime::parse_from_str(value.trim(), "%Y-%m-%dT%H:%MZ") {
        Ok(date) => date.and_utc().timestamp() as f64 / SECONDS_PER_DAY + MJD_UNIX_EPOCH,
        Err(e) => {
            warn!(value, error = %e, "Cannot parse HiPS date");
            0.0
        }
    }
}
