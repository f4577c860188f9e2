//! SQLite storage layer.
//!
//! `SqliteSessionStore` backed by a WAL-mode database with split read/write
//! connection pools.

pub mod pool;
pub mod session;
