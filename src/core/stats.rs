use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Database statistics for monitoring
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseStats {
    // Index metrics
    pub set_count: usize,
    pub list_count: usize,
    pub id_count: usize,
    pub type_count: usize,

    // Query metrics
    pub queries_executed: u64,
    pub query_pool_capacity: usize,
    pub query_pool_available: usize,

    pub cache: CacheStats,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
    pub gc_runs: u64,
    pub entries: usize,
    pub size_bytes: i64,
    pub limit_bytes: i64,
    pub last_gc: Option<DateTime<Utc>>,
}

impl CacheStats {
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            return 0.0;
        }
        self.hits as f64 / total as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hit_rate_handles_no_traffic() {
        let mut stats = CacheStats::default();
        assert_eq!(stats.hit_rate(), 0.0);
        stats.hits = 3;
        stats.misses = 1;
        assert_eq!(stats.hit_rate(), 0.75);
    }

    #[test]
    fn serializes_last_gc_as_rfc3339() {
        let stats = CacheStats {
            last_gc: Some(DateTime::parse_from_rfc3339("2024-01-02T03:04:05Z").unwrap().with_timezone(&Utc)),
            ..CacheStats::default()
        };
        let json = serde_json::to_string(&stats).unwrap();
        assert!(json.contains("\"last_gc\":\"2024-01-02T03:04:05Z\""));
    }
}
