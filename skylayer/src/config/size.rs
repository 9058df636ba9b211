//! Human-readable size parsing (e.g., "256MB", "1GB").

use thiserror::Error;

const KB: u64 = 1024;
const MB: u64 = 1024 * KB;
const GB: u64 = 1024 * MB;

/// Error parsing a size string.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("Invalid size '{input}' - expected format like '256MB', '1GB', or '512KB'")]
pub struct SizeParseError {
    input: String,
}

/// Parse a human-readable size string into bytes.
///
/// Bare numbers are bytes; `K`/`KB`, `M`/`MB` and `G`/`GB` suffixes are
/// powers of 1024. Case and surrounding whitespace are ignored.
///
/// ```
/// use skylayer::config::parse_size;
///
/// assert_eq!(parse_size("1024").unwrap(), 1024);
/// assert_eq!(parse_size("256MB").unwrap(), 256 * 1024 * 1024);
/// assert_eq!(parse_size("1 g").unwrap(), 1024 * 1024 * 1024);
/// ```
pub fn parse_size(s: &str) -> Result<u64, SizeParseError> {
    let invalid = || SizeParseError {
        input: s.to_string(),
    };
    let trimmed = s.trim();
    let upper = trimmed.to_uppercase();
    let unit = upper.strip_suffix('B').unwrap_or(&upper);

    let (digits, multiplier) = match unit.chars().last() {
        Some('G') => (&unit[..unit.len() - 1], GB),
        Some('M') => (&unit[..unit.len() - 1], MB),
        Some('K') => (&unit[..unit.len() - 1], KB),
        _ => (unit, 1),
    };
    let value: u64 = digits.trim().parse().map_err(|_| invalid())?;
    value.checked_mul(multiplier).ok_or_else(invalid)
}

/// Format a byte count with the largest unit that divides it evenly.
///
/// ```
/// use skylayer::config::format_size;
///
/// assert_eq!(format_size(256 * 1024 * 1024), "256MB");
/// assert_eq!(format_size(1500), "1500");
/// ```
pub fn format_size(bytes: u64) -> String {
    match bytes {
        0 => "0".to_string(),
        b if b % GB == 0 => format!("{}GB", b / GB),
        b if b % MB == 0 => format!("{}MB", b / MB),
        b if b % KB == 0 => format!("{}KB", b / KB),
        b => b.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_units() {
        assert_eq!(parse_size("0").unwrap(), 0);
        assert_eq!(parse_size("12").unwrap(), 12);
        assert_eq!(parse_size("2k").unwrap(), 2048);
        assert_eq!(parse_size("2KB").unwrap(), 2048);
        assert_eq!(parse_size(" 3 MB ").unwrap(), 3 * MB);
        assert_eq!(parse_size("4gb").unwrap(), 4 * GB);
        assert_eq!(parse_size("7B").unwrap(), 7);
    }

    #[test]
    fn test_parse_invalid() {
        assert!(parse_size("").is_err());
        assert!(parse_size("MB").is_err());
        assert!(parse_size("lots").is_err());
        assert!(parse_size("-1MB").is_err());
        assert!(parse_size("99999999999999999999GB").is_err());
        assert_eq!(
            parse_size("1TB").unwrap_err().to_string(),
            "Invalid size '1TB' - expected format like '256MB', '1GB', or '512KB'"
        );
    }

    #[test]
    fn test_format_roundtrip() {
        for bytes in [0, 1, 1000, KB, 3 * MB, 256 * MB, 2 * GB] {
            assert_eq!(parse_size(&format_size(bytes)).unwrap(), bytes);
        }
        assert_eq!(format_size(1536), "1536");
        assert_eq!(format_size(1536 * KB), "1536KB");
    }
}
