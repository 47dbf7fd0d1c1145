//! Error types for queue and flush operations.

use thiserror::Error;

/// Error type for [`PayloadQueue`](crate::PayloadQueue) operations.
///
/// Nothing here is fatal to the host process: every variant leaves the
/// queue usable and its cached count unchanged.
#[derive(Debug, Error)]
pub enum QueueError {
    #[error("queue is full: {count} of {max} payloads queued")]
    CapacityExceeded { count: u64, max: u64 },

    #[error("Database error: {0}")]
    Storage(#[from] rusqlite::Error),

    #[error("Failed to create connection pool: {0}")]
    Pool(#[from] r2d2::Error),

    #[error("Failed to prepare storage location: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to serialize payload: {0}")]
    Serialization(String),
}

impl QueueError {
    /// True for failures of the underlying storage (open, read, write).
    pub fn is_storage(&self) -> bool {
        matches!(self, Self::Storage(_) | Self::Pool(_) | Self::Io(_))
    }
}

/// Error type for [`Flusher`](crate::Flusher) cycles.
#[derive(Debug, Error)]
pub enum FlushError {
    #[error(transparent)]
    Queue(#[from] QueueError),

    #[error("delivery failed: {0}")]
    Delivery(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_storage_classification() {
        let io = QueueError::from(std::io::Error::other("disk full"));
        assert!(io.is_storage());

        let full = QueueError::CapacityExceeded { count: 3, max: 3 };
        assert!(!full.is_storage());
        assert_eq!(full.to_string(), "queue is full: 3 of 3 payloads queued");
    }
}
