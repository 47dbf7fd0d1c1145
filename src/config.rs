//! Configuration for the payload queue.
//!
//! Supports:
//! - CLI arguments via clap
//! - Environment variable overrides
//! - A plain [`QueueConfig`] for embedding the queue as a library

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::time::Duration;

/// Default ceiling on queued payloads.
pub const DEFAULT_MAX_QUEUE_SIZE: u64 = 10_000;

/// Default number of rows fetched per flush batch.
pub const DEFAULT_BATCH_SIZE: usize = 20;

/// Payloadq: inspect and drain a durable payload queue.
#[derive(Parser, Debug, Clone)]
#[command(name = "payloadq")]
#[command(author, version, about, long_about = None)]
pub struct Config {
    /// Path to the SQLite queue database
    #[arg(long, env = "PAYLOADQ_DB", default_value = "./data/payloads.db")]
    pub db: PathBuf,

    /// Maximum number of payloads the queue accepts
    #[arg(long, env = "PAYLOADQ_MAX_QUEUE_SIZE", default_value_t = DEFAULT_MAX_QUEUE_SIZE)]
    pub max_queue_size: u64,

    /// Size of the reader connection pool
    #[arg(long, env = "PAYLOADQ_READER_POOL_SIZE", default_value_t = 4)]
    pub reader_pool_size: u32,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "RUST_LOG", default_value = "info")]
    pub log_level: String,

    #[command(subcommand)]
    pub command: Command,
}

/// Queue operations exposed by the CLI.
#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Append a JSON payload to the queue
    Enqueue {
        /// JSON document to enqueue
        payload: String,
    },
    /// Print the number of queued payloads
    Count,
    /// Print the oldest payloads without removing them
    Peek {
        #[arg(short, long, default_value_t = 10)]
        limit: usize,
    },
    /// Remove payloads with ids in the inclusive range
    Ack { min_id: i64, max_id: i64 },
    /// Print every queued payload as a JSON line and acknowledge it
    Drain {
        #[arg(short, long, default_value_t = DEFAULT_BATCH_SIZE)]
        batch_size: usize,
    },
}

impl Config {
    /// Parse configuration from CLI arguments and environment.
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Build the library configuration for the selected database.
    pub fn queue_config(&self) -> QueueConfig {
        QueueConfig {
            db_path: self.db.clone(),
            max_queue_size: self.max_queue_size,
            reader_pool_size: self.reader_pool_size,
            ..QueueConfig::default()
        }
    }
}

/// Settings for a single [`PayloadQueue`](crate::PayloadQueue).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueConfig {
    /// Database file backing the queue. Created on first use.
    pub db_path: PathBuf,
    /// Capacity ceiling; inserts fail once this many rows are queued.
    pub max_queue_size: u64,
    /// Maximum number of pooled read-only connections.
    pub reader_pool_size: u32,
    /// How long SQLite waits on a locked database before failing.
    pub busy_timeout: Duration,
}

impl QueueConfig {
    /// Create a config for `db_path` with default limits.
    pub fn new(db_path: impl Into<PathBuf>) -> Self {
        Self {
            db_path: db_path.into(),
            ..Self::default()
        }
    }

    /// Override the capacity ceiling.
    #[must_use]
    pub fn with_max_queue_size(mut self, max_queue_size: u64) -> Self {
        self.max_queue_size = max_queue_size;
        self
    }
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            db_path: PathBuf::from("./data/payloads.db"),
            max_queue_size: DEFAULT_MAX_QUEUE_SIZE,
            reader_pool_size: 4,
            busy_timeout: Duration::from_secs(5),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = QueueConfig::default();
        assert_eq!(config.max_queue_size, DEFAULT_MAX_QUEUE_SIZE);
        assert_eq!(config.reader_pool_size, 4);
    }

    #[test]
    fn test_cli_overrides_flow_into_queue_config() {
        let config = Config::parse_from([
            "payloadq",
            "--db",
            "/tmp/q.db",
            "--max-queue-size",
            "3",
            "count",
        ]);
        let queue = config.queue_config();
        assert_eq!(queue.db_path, PathBuf::from("/tmp/q.db"));
        assert_eq!(queue.max_queue_size, 3);
        assert!(matches!(config.command, Command::Count));
    }

    #[test]
    fn test_builder_overrides_capacity() {
        let config = QueueConfig::new("q.db").with_max_queue_size(7);
        assert_eq!(config.max_queue_size, 7);
        assert_eq!(config.db_path, PathBuf::from("q.db"));
    }
}
