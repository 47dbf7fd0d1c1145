//! Test utilities for payload queue tests.
//!
//! Provides:
//! - Temporary database fixtures
//! - Queue constructors with small capacities
//! - A minimal analytics payload type

use payloadq::{JsonSerializer, PayloadQueue, QueueConfig};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tempfile::TempDir;

/// Test fixture that manages a temporary database directory.
///
/// The directory is automatically cleaned up when the fixture is dropped.
pub struct TestFixture {
    /// Temporary directory for test database
    pub temp_dir: TempDir,
    /// Path to the database file
    pub db_path: PathBuf,
}

impl TestFixture {
    /// Create a new test fixture with a temporary database directory.
    pub fn new() -> Self {
        payloadq::observability::tracing::init_test_tracing();
        let temp_dir = TempDir::new().expect("failed to create temp dir");
        let db_path = temp_dir.path().join("test.db");
        Self { temp_dir, db_path }
    }

    /// Config pointing at this fixture's database.
    pub fn config(&self, max_queue_size: u64) -> QueueConfig {
        QueueConfig::new(&self.db_path).with_max_queue_size(max_queue_size)
    }

    /// Open a typed queue over this fixture's database.
    pub fn queue(&self, max_queue_size: u64) -> PayloadQueue<JsonSerializer<Event>> {
        PayloadQueue::new(self.config(max_queue_size))
    }
}

impl Default for TestFixture {
    fn default() -> Self {
        Self::new()
    }
}

/// Minimal analytics event used as the queued payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    pub name: String,
    pub user_id: String,
}

/// Build an event named `name`.
pub fn event(name: &str) -> Event {
    Event {
        name: name.to_string(),
        user_id: "user-1".to_string(),
    }
}
