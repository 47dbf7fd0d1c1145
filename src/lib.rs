//! Payloadq: a durable, bounded payload queue for on-device analytics.
//!
//! Payloads are buffered in a single SQLite table until a flush cycle
//! delivers them upstream and acknowledges the delivered id range.
//!
//! # Architecture
//!
//! - **Durable**: every accepted payload is a row in WAL-mode SQLite
//! - **Bounded**: inserts are rejected once `max_queue_size` rows are queued
//! - **Cheap sizing**: the row count is cached in memory after one scan
//! - **Ordered**: batches come back oldest first and are removed by id range
//!
//! # Modules
//!
//! - [`config`]: CLI and library configuration
//! - [`error`]: Error types shared by the queue and flusher
//! - [`flush`]: Fetch, deliver, acknowledge cycle
//! - [`observability`]: Metrics and tracing setup
//! - [`queue`]: The payload queue itself
//! - [`registry`]: One queue instance per storage location
//! - [`serializer`]: Payload encoding collaborators
//! - [`storage`]: SQLite schema, reader pool and batch types

// Lint configuration
#![warn(clippy::all)]
#![allow(
    clippy::module_name_repetitions,    // queue::PayloadQueue is fine
    clippy::must_use_candidate,         // Not all functions need #[must_use]
    clippy::missing_errors_doc,         // Error docs can be verbose
    clippy::missing_panics_doc,         // Panic docs can be verbose
    clippy::needless_raw_string_hashes, // r#""# is fine for SQL
    clippy::similar_names               // min_id/max_id are fine
)]

pub mod config;
pub mod error;
pub mod flush;
pub mod observability;
pub mod queue;
pub mod registry;
pub mod serializer;
pub mod storage;

pub use config::QueueConfig;
pub use error::{FlushError, QueueError};
pub use flush::{Deliver, FlushOutcome, Flusher};
pub use queue::PayloadQueue;
pub use serializer::{JsonSerializer, PayloadSerializer};
pub use storage::batch::{Batch, QueuedPayload, RowId, StoredPayload};
