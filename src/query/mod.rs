pub mod executor;
pub mod filter;
pub mod query;

pub use query::{Query, QueryState};
