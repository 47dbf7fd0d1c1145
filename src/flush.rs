//! Flush cycle: fetch the oldest batch, deliver it, acknowledge it.
//!
//! Rows are only removed after [`Deliver::deliver`] reports success, and
//! only the id range that was actually read is removed. The flusher does no
//! scheduling of its own; callers run it from a background thread or timer.

use crate::error::FlushError;
use crate::queue::PayloadQueue;
use crate::serializer::PayloadSerializer;
use crate::storage::batch::QueuedPayload;

/// Upstream transport for a batch of payloads.
pub trait Deliver<P> {
    type Error: std::fmt::Display;

    /// Deliver `batch` in order. Returning `Ok` acknowledges every entry.
    fn deliver(&mut self, batch: &[QueuedPayload<P>]) -> Result<(), Self::Error>;
}

impl<P, E, F> Deliver<P> for F
where
    F: FnMut(&[QueuedPayload<P>]) -> Result<(), E>,
    E: std::fmt::Display,
{
    type Error = E;

    fn deliver(&mut self, batch: &[QueuedPayload<P>]) -> Result<(), E> {
        self(batch)
    }
}

/// Result of one flush cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlushOutcome {
    /// The queue was empty.
    Idle,
    /// A batch was delivered and its id range removed.
    Delivered { delivered: usize, removed: usize },
    /// The batch held only undecodable rows; they were removed.
    Discarded(usize),
}

/// Drives the fetch, deliver, acknowledge cycle over one queue.
pub struct Flusher<'q, S: PayloadSerializer, D> {
    queue: &'q PayloadQueue<S>,
    deliver: D,
    batch_size: usize,
}

impl<'q, S, D> Flusher<'q, S, D>
where
    S: PayloadSerializer,
    D: Deliver<S::Payload>,
{
    pub fn new(queue: &'q PayloadQueue<S>, deliver: D, batch_size: usize) -> Self {
        Self {
            queue,
            deliver,
            batch_size: batch_size.max(1),
        }
    }

    /// Give back the delivery collaborator.
    pub fn into_inner(self) -> D {
        self.deliver
    }

    /// Run a single cycle.
    ///
    /// On delivery failure nothing is removed and the same rows are read
    /// again next cycle.
    #[tracing::instrument(skip(self), fields(batch_size = self.batch_size))]
    pub fn flush_once(&mut self) -> Result<FlushOutcome, FlushError> {
        let batch = self.queue.get_batch(self.batch_size);
        let Some((min_id, max_id)) = batch.id_range() else {
            return Ok(FlushOutcome::Idle);
        };

        if batch.entries.is_empty() {
            let removed = self.queue.remove_range(min_id, max_id)?;
            tracing::warn!(min_id, max_id, removed, "Discarded undecodable payloads");
            return Ok(FlushOutcome::Discarded(removed));
        }

        if let Err(e) = self.deliver.deliver(&batch.entries) {
            tracing::warn!(error = %e, count = batch.decoded_len(), "Batch delivery failed");
            return Err(FlushError::Delivery(e.to_string()));
        }

        let removed = self.queue.remove_range(min_id, max_id)?;
        tracing::debug!(
            delivered = batch.decoded_len(),
            removed,
            min_id,
            max_id,
            "Batch delivered"
        );
        Ok(FlushOutcome::Delivered {
            delivered: batch.decoded_len(),
            removed,
        })
    }

    /// Run cycles until the queue is empty, returning the delivered count.
    ///
    /// Stops at the first error.
    pub fn flush(&mut self) -> Result<usize, FlushError> {
        let mut total = 0;
        loop {
            match self.flush_once()? {
                FlushOutcome::Idle => return Ok(total),
                FlushOutcome::Delivered { delivered, .. } => total += delivered,
                FlushOutcome::Discarded(_) => {}
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::QueueConfig;
    use serde_json::{json, Value};
    use tempfile::TempDir;

    fn queue(temp_dir: &TempDir) -> PayloadQueue {
        PayloadQueue::new(QueueConfig::new(temp_dir.path().join("flush.db")))
    }

    #[test]
    fn test_flush_once_on_empty_queue_is_idle() {
        let temp_dir = TempDir::new().unwrap();
        let queue = queue(&temp_dir);
        let mut flusher =
            Flusher::new(&queue, |_: &[QueuedPayload<Value>]| Ok::<_, String>(()), 5);
        assert_eq!(flusher.flush_once().unwrap(), FlushOutcome::Idle);
    }

    #[test]
    fn test_flush_delivers_in_order_and_empties_queue() {
        let temp_dir = TempDir::new().unwrap();
        let queue = queue(&temp_dir);
        for n in 0..5 {
            queue.add(&json!({ "n": n })).unwrap();
        }

        let mut seen = Vec::new();
        let delivered = Flusher::new(
            &queue,
            |batch: &[QueuedPayload<Value>]| {
                seen.extend(batch.iter().map(|e| e.payload["n"].as_i64().unwrap()));
                Ok::<_, String>(())
            },
            2,
        )
        .flush()
        .unwrap();

        assert_eq!(delivered, 5);
        assert_eq!(seen, vec![0, 1, 2, 3, 4]);
        assert_eq!(queue.row_count().unwrap(), 0);
    }

    #[test]
    fn test_failed_delivery_keeps_rows() {
        let temp_dir = TempDir::new().unwrap();
        let queue = queue(&temp_dir);
        queue.add(&json!("a")).unwrap();
        queue.add(&json!("b")).unwrap();

        let mut flusher = Flusher::new(
            &queue,
            |_: &[QueuedPayload<Value>]| Err::<(), _>("upstream unavailable"),
            10,
        );
        let err = flusher.flush_once().unwrap_err();
        assert!(matches!(err, FlushError::Delivery(ref msg) if msg == "upstream unavailable"));
        assert_eq!(queue.row_count().unwrap(), 2);
        assert_eq!(queue.get_batch(10).decoded_len(), 2);
    }

    #[test]
    fn test_poison_rows_inside_delivered_range_are_removed() {
        let temp_dir = TempDir::new().unwrap();
        let queue = queue(&temp_dir);
        queue.add(&json!(1)).unwrap();
        queue.add_blob(b"\xff not json").unwrap();
        queue.add(&json!(3)).unwrap();

        let mut flusher =
            Flusher::new(&queue, |_: &[QueuedPayload<Value>]| Ok::<_, String>(()), 10);
        assert_eq!(
            flusher.flush_once().unwrap(),
            FlushOutcome::Delivered {
                delivered: 2,
                removed: 3
            }
        );
        assert_eq!(queue.row_count().unwrap(), 0);
    }

    #[test]
    fn test_batch_of_only_poison_rows_is_discarded() {
        let temp_dir = TempDir::new().unwrap();
        let queue = queue(&temp_dir);
        queue.add_blob(b"{broken").unwrap();
        queue.add(&json!("ok")).unwrap();

        let mut calls = 0;
        let mut flusher = Flusher::new(
            &queue,
            |_: &[QueuedPayload<Value>]| {
                calls += 1;
                Ok::<_, String>(())
            },
            1,
        );
        assert_eq!(flusher.flush_once().unwrap(), FlushOutcome::Discarded(1));
        assert_eq!(
            flusher.flush_once().unwrap(),
            FlushOutcome::Delivered {
                delivered: 1,
                removed: 1
            }
        );
        assert_eq!(flusher.flush_once().unwrap(), FlushOutcome::Idle);
        drop(flusher);
        assert_eq!(calls, 1);
    }
}
