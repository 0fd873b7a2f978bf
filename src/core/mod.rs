pub mod config;
pub mod database;
pub mod error;
pub mod idmap;
pub mod intern;
pub mod stats;
pub mod types;
