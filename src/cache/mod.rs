pub mod bucket;
pub mod resource_cache;

pub use resource_cache::Cache;
