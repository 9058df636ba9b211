//! Cache statistics snapshot.

use std::fmt;

/// Counters describing cache activity since creation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    /// Entries dropped to stay within budget or by explicit removal.
    pub evictions: u64,
    /// Eviction attempts refused by the entry.
    pub vetoes: u64,
    /// Resident entries at snapshot time.
    pub entries: usize,
    /// Total cost of resident entries at snapshot time.
    pub total_cost: u64,
}

impl CacheStats {
    /// Hit rate in `[0, 1]`, or 0 when there were no lookups.
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

impl fmt::Display for CacheStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} entries, {} bytes, {} hits, {} misses, {} evictions, {} vetoes",
            self.entries, self.total_cost, self.hits, self.misses, self.evictions, self.vetoes
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hit_rate() {
        assert_eq!(CacheStats::default().hit_rate(), 0.0);
        let stats = CacheStats {
            hits: 3,
            misses: 1,
            ..Default::default()
        };
        assert!((stats.hit_rate() - 0.75).abs() < f64::EPSILON);
    }

    #[test]
    fn test_display() {
        let stats = CacheStats {
            entries: 2,
            total_cost: 1024,
            vetoes: 1,
            ..Default::default()
        };
        let display = stats.to_string();
        assert!(display.contains("2 entries"));
        assert!(display.contains("1024 bytes"));
        assert!(display.contains("1 vetoes"));
    }
}
