//! Process-wide queue registry.
//!
//! Tracks the single [`PayloadQueue`] per storage location so that every
//! producer and flush task in the process shares one cached count and one
//! writer lock. The registry has its own lock, separate from the queues'
//! mutation locks.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, OnceLock, PoisonError};

use crate::config::QueueConfig;
use crate::queue::PayloadQueue;

static REGISTRY: OnceLock<Mutex<HashMap<PathBuf, Arc<PayloadQueue>>>> = OnceLock::new();

fn registry() -> &'static Mutex<HashMap<PathBuf, Arc<PayloadQueue>>> {
    REGISTRY.get_or_init(|| Mutex::new(HashMap::new()))
}

/// Registry key for a database path.
fn location(path: &Path) -> PathBuf {
    std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf())
}

/// Get the queue for `config.db_path`, creating it on first request.
///
/// Later calls for the same location return the existing instance; their
/// config is ignored.
pub fn shared(config: QueueConfig) -> Arc<PayloadQueue> {
    let key = location(&config.db_path);
    let mut queues = registry().lock().unwrap_or_else(PoisonError::into_inner);

    if let Some(queue) = queues.get(&key) {
        if queue.config() != &config {
            tracing::debug!(
                path = %key.display(),
                "Queue already registered, ignoring new configuration"
            );
        }
        return Arc::clone(queue);
    }

    tracing::debug!(path = %key.display(), "Registering payload queue");
    let queue = Arc::new(PayloadQueue::new(config));
    queues.insert(key, Arc::clone(&queue));
    queue
}

/// Drop the registry's handle for `path`.
///
/// The queue closes once every outstanding `Arc` is dropped. Returns true
/// if a queue was registered.
pub fn forget(path: &Path) -> bool {
    let mut queues = registry().lock().unwrap_or_else(PoisonError::into_inner);
    queues.remove(&location(path)).is_some()
}

/// Number of registered queues.
#[cfg(test)]
pub fn registered_count() -> usize {
    registry()
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .len()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_same_location_shares_instance() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("shared.db");

        let first = shared(QueueConfig::new(&path));
        let second = shared(QueueConfig::new(&path).with_max_queue_size(1));
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(second.config().max_queue_size, first.config().max_queue_size);

        assert!(forget(&path));
        assert!(!forget(&path));
    }

    #[test]
    fn test_different_locations_are_independent() {
        let temp_dir = TempDir::new().unwrap();
        let a = shared(QueueConfig::new(temp_dir.path().join("a.db")));
        let b = shared(QueueConfig::new(temp_dir.path().join("b.db")));
        assert!(!Arc::ptr_eq(&a, &b));
        assert!(registered_count() >= 2);

        forget(&temp_dir.path().join("a.db"));
        forget(&temp_dir.path().join("b.db"));
    }

    #[test]
    fn test_concurrent_first_access_creates_one_instance() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("race.db");

        let queues: Vec<_> = std::thread::scope(|scope| {
            let handles: Vec<_> = (0..8)
                .map(|_| scope.spawn(|| shared(QueueConfig::new(&path))))
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });

        for queue in &queues[1..] {
            assert!(Arc::ptr_eq(&queues[0], queue));
        }
        forget(&path);
    }
}
