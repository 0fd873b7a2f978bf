pub mod pool;
pub mod tracker;
