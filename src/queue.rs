//! Durable, bounded payload queue.
//!
//! All mutations (insert, range delete, the first row count and the lazy
//! storage open) run under one mutex that owns the writer connection and the
//! cached count. Batch reads go through the read-only [`ReaderPool`] and only
//! hold the mutex long enough to clone the pool handle.

use rusqlite::Connection;
use std::fs;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use crate::config::QueueConfig;
use crate::error::QueueError;
use crate::observability::metrics;
use crate::serializer::{JsonSerializer, PayloadSerializer};
use crate::storage::batch::{Batch, QueuedPayload, RowId, StoredPayload};
use crate::storage::reader::ReaderPool;
use crate::storage::schema;

/// Open handles to the queue database.
struct Storage {
    writer: Connection,
    readers: ReaderPool,
}

impl Storage {
    fn open(config: &QueueConfig) -> Result<Self, QueueError> {
        if let Some(parent) = config.db_path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let writer = Connection::open(&config.db_path)?;
        schema::apply_pragmas(&writer, config.busy_timeout)?;
        schema::initialize_schema(&writer)?;

        let readers = ReaderPool::new(&config.db_path, config.reader_pool_size)?;

        tracing::info!(path = %config.db_path.display(), "Opened payload queue storage");
        Ok(Self { writer, readers })
    }
}

/// State guarded by the queue mutex.
#[derive(Default)]
struct QueueState {
    storage: Option<Storage>,
    count: u64,
    initialized: bool,
}

impl QueueState {
    /// Open storage on first use. A failed open is retried on the next call.
    fn open(&mut self, config: &QueueConfig) -> Result<&mut Storage, QueueError> {
        let storage = match self.storage.take() {
            Some(storage) => storage,
            None => Storage::open(config)?,
        };
        Ok(self.storage.insert(storage))
    }

    /// Seed the cached count from a full scan, once.
    fn reconcile(&mut self, config: &QueueConfig) -> Result<u64, QueueError> {
        if !self.initialized {
            let storage = self.open(config)?;
            let count = schema::count_rows(&storage.writer)?;
            self.count = count;
            self.initialized = true;
            tracing::debug!(count, "Initialized cached row count");
        }
        Ok(self.count)
    }
}

/// A durable FIFO of serialized payloads with a capacity ceiling.
///
/// The queue must be the only writer of its table; the cached count is
/// exact only as long as every insert and delete goes through it.
pub struct PayloadQueue<S: PayloadSerializer = JsonSerializer> {
    config: QueueConfig,
    serializer: S,
    state: Mutex<QueueState>,
}

impl<S: PayloadSerializer + Default> PayloadQueue<S> {
    /// Create a queue with the default serializer. Storage is opened lazily.
    pub fn new(config: QueueConfig) -> Self {
        Self::with_serializer(config, S::default())
    }
}

impl<S: PayloadSerializer> PayloadQueue<S> {
    /// Create a queue with an explicit serializer. Storage is opened lazily.
    pub fn with_serializer(config: QueueConfig, serializer: S) -> Self {
        Self {
            config,
            serializer,
            state: Mutex::new(QueueState::default()),
        }
    }

    pub fn config(&self) -> &QueueConfig {
        &self.config
    }

    // State is only written after a storage call succeeds; poisoning is ignored.
    fn lock(&self) -> MutexGuard<'_, QueueState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn log_failure(&self, operation: &'static str, error: &QueueError) {
        if error.is_storage() {
            tracing::error!(
                operation,
                path = %self.config.db_path.display(),
                error = %error,
                "Payload queue storage failure"
            );
        }
    }

    /// Serialize and enqueue a payload, returning its row id.
    ///
    /// Fails with [`QueueError::CapacityExceeded`] once `max_queue_size`
    /// rows are queued. No row is written and the count is untouched on
    /// any failure.
    pub fn add(&self, payload: &S::Payload) -> Result<RowId, QueueError> {
        let start = Instant::now();
        let blob = self.serializer.serialize(payload).map_err(|e| {
            tracing::warn!(error = %e, "Failed to serialize payload");
            QueueError::Serialization(e.to_string())
        })?;
        let serialization = start.elapsed();

        self.insert(&blob, serialization)
    }

    /// Enqueue an already-serialized blob, returning its row id.
    pub fn add_blob(&self, blob: &[u8]) -> Result<RowId, QueueError> {
        self.insert(blob, Duration::ZERO)
    }

    fn insert(&self, blob: &[u8], serialization: Duration) -> Result<RowId, QueueError> {
        let start = Instant::now();
        let mut state = self.lock();
        let lock_wait = start.elapsed();

        let result = self.try_insert(&mut state, blob);

        match &result {
            Ok(id) => {
                metrics::record_enqueue(&self.config.db_path, state.count);
                tracing::debug!(
                    id,
                    bytes = blob.len(),
                    serialization_us = serialization.as_micros() as u64,
                    lock_us = lock_wait.as_micros() as u64,
                    insert_us = start.elapsed().saturating_sub(lock_wait).as_micros() as u64,
                    "Payload enqueued"
                );
            }
            Err(QueueError::CapacityExceeded { count, max }) => {
                metrics::record_rejection(&self.config.db_path);
                tracing::warn!(count, max, "Can't add payload, the queue is at its max size");
            }
            Err(error) => self.log_failure("insert", error),
        }

        result
    }

    /// Number of queued rows.
    ///
    /// The first call scans the table; later calls read the cached count.
    pub fn row_count(&self) -> Result<u64, QueueError> {
        let mut state = self.lock();
        state
            .reconcile(&self.config)
            .inspect_err(|error| self.log_failure("count", error))
    }

    /// Read up to `limit` raw rows, oldest first, without decoding them.
    pub fn fetch_blobs(&self, limit: usize) -> Result<Vec<StoredPayload>, QueueError> {
        if limit == 0 {
            return Ok(Vec::new());
        }

        let readers = {
            let mut state = self.lock();
            state.open(&self.config)?.readers.clone()
        };
        readers.fetch_oldest(limit)
    }

    /// Read up to `limit` decoded payloads, oldest first.
    ///
    /// Rows that fail to decode are left in storage and reported in
    /// [`Batch::skipped`]. A storage failure yields an empty batch.
    pub fn get_batch(&self, limit: usize) -> Batch<S::Payload> {
        let rows = match self.fetch_blobs(limit) {
            Ok(rows) => rows,
            Err(error) => {
                self.log_failure("read", &error);
                return Batch::empty();
            }
        };

        let mut batch = Batch {
            entries: Vec::with_capacity(rows.len()),
            skipped: Vec::new(),
        };
        for row in rows {
            match self.serializer.deserialize(&row.payload) {
                Ok(payload) => batch.entries.push(QueuedPayload {
                    id: row.id,
                    payload,
                }),
                Err(error) => {
                    tracing::warn!(
                        id = row.id,
                        error = %error,
                        "Skipping payload that failed to decode"
                    );
                    batch.skipped.push(row.id);
                }
            }
        }

        if !batch.skipped.is_empty() {
            metrics::record_skipped(&self.config.db_path, batch.skipped.len());
        }
        batch
    }

    /// Delete rows with `min_id <= id <= max_id` and return how many went away.
    ///
    /// Removing an already-removed range returns `Ok(0)`. On failure the
    /// cached count is unchanged.
    pub fn remove_range(&self, min_id: RowId, max_id: RowId) -> Result<usize, QueueError> {
        let mut state = self.lock();

        let result = self.try_remove(&mut state, min_id, max_id);

        match &result {
            Ok(removed) => {
                metrics::record_removal(&self.config.db_path, *removed, state.count);
                tracing::debug!(
                    min_id,
                    max_id,
                    removed,
                    remaining = state.count,
                    "Removed payload range"
                );
            }
            Err(error) => self.log_failure("remove", error),
        }

        result
    }

    fn try_insert(&self, state: &mut QueueState, blob: &[u8]) -> Result<RowId, QueueError> {
        let count = state.reconcile(&self.config)?;
        if count >= self.config.max_queue_size {
            return Err(QueueError::CapacityExceeded {
                count,
                max: self.config.max_queue_size,
            });
        }

        let storage = state.open(&self.config)?;
        let id = schema::insert_payload(&storage.writer, blob)?;
        state.count += 1;
        Ok(id)
    }

    fn try_remove(
        &self,
        state: &mut QueueState,
        min_id: RowId,
        max_id: RowId,
    ) -> Result<usize, QueueError> {
        state.reconcile(&self.config)?;
        let storage = state.open(&self.config)?;
        let removed = schema::delete_range(&storage.writer, min_id, max_id)?;
        state.count = state.count.saturating_sub(removed as u64);
        Ok(removed)
    }
}

impl<S: PayloadSerializer> std::fmt::Debug for PayloadQueue<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PayloadQueue")
            .field("db_path", &self.config.db_path)
            .field("max_queue_size", &self.config.max_queue_size)
            .finish_non_exhaustive()
    }
}
