//! SQLite storage layer for the payload queue.
//!
//! Provides:
//! - Schema initialization and connection pragmas
//! - Read connection pool for batch retrieval
//! - Row and batch types handed to callers

pub mod batch;
pub mod reader;
pub mod schema;
