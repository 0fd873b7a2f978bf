use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use serde::{Serialize, Deserialize};
use crate::core::error::Result;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub storage_path: PathBuf,

    // Query / result pools
    pub max_results: usize,                 // Result buffer capacity, caps limit()
    pub default_limit: usize,               // Limit applied to a fresh query
    pub max_sets: usize,                    // Filters a single query may hold
    pub query_pool_size: usize,             // Max in-flight queries

    // Resource cache
    pub cache_size: i64,                    // Bytes before eviction kicks in
    pub cache_ttl_secs: u64,
    pub cache_buckets: usize,               // Rounded up to a power of two
    pub cache_preload: usize,               // Resources warmed on open

    // Set construction and strategy selection
    pub small_set_threshold: usize,         // Below this, sets are sorted arrays
    pub set_driven_threshold: usize,        // Smallest filter must be below this...
    pub set_driven_min_sort: usize,         // ...and the sort source above this

    pub batch_sizes: Vec<usize>,            // Prepared statement menu for batched fills
}

impl Default for Config {
    fn default() -> Self {
        Config {
            storage_path: PathBuf::from("./data/index.db"),

            max_results: 100,
            default_limit: 50,
            max_sets: 32,
            query_pool_size: num_cpus::get() * 4,

            cache_size: 64 * 1024 * 1024,      // 64MB of payloads
            cache_ttl_secs: 300,
            cache_buckets: 16,
            cache_preload: 0,

            small_set_threshold: 32,
            set_driven_threshold: 500,
            set_driven_min_sort: 1000,

            batch_sizes: vec![25, 20, 15, 10, 5, 4, 3, 2, 1],
        }
    }
}

impl Config {
    /// Load a JSON config file; absent fields keep their defaults
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let raw = fs::read(path)?;
        let config = serde_json::from_slice(&raw)?;
        Ok(config)
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }

    pub fn bucket_count(&self) -> usize {
        self.cache_buckets.max(1).next_power_of_two()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn partial_json_keeps_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"max_results": 20, "cache_buckets": 10}}"#).unwrap();

        let config = Config::from_json_file(file.path()).unwrap();
        assert_eq!(config.max_results, 20);
        assert_eq!(config.default_limit, 50);
        assert_eq!(config.bucket_count(), 16);
        assert_eq!(config.batch_sizes.last(), Some(&1));
    }

    #[test]
    fn malformed_json_is_a_parse_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "{{not json").unwrap();

        let err = Config::from_json_file(file.path()).unwrap_err();
        assert_eq!(err.kind, crate::core::error::ErrorKind::Parse);
    }
}
