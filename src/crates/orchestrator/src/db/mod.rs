//! Database layer: connection management, row models, repositories

pub mod connection;
pub mod models;
pub mod repositories;

pub use connection::{Database, DatabasePool};
pub use repositories::SqliteStateStore;
