pub mod results;

pub use results::{QueryResult, ResultBuffer};
