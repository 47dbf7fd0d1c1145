//! Payloadq: inspect and drain a durable payload queue.
//!
//! # Usage
//!
//! ```bash
//! payloadq --db ./data/payloads.db enqueue '{"event":"Signed Up"}'
//! payloadq --db ./data/payloads.db peek --limit 5
//! payloadq --db ./data/payloads.db drain --batch-size 20
//! ```
//!
//! Environment variables can also be used:
//! - `PAYLOADQ_DB`: Path to the queue database
//! - `PAYLOADQ_MAX_QUEUE_SIZE`: Capacity ceiling
//! - `RUST_LOG`: Log level (trace, debug, info, warn, error)

use anyhow::{bail, Context};
use payloadq::config::{Command, Config};
use payloadq::observability::metrics::init_metrics;
use payloadq::observability::tracing::init_tracing;
use payloadq::{Flusher, PayloadQueue, QueuedPayload};
use serde_json::Value;
use std::io::Write;

fn main() -> anyhow::Result<()> {
    // Parse configuration from CLI arguments and environment
    let config = Config::parse_args();

    // Initialize tracing/logging
    init_tracing(&config.log_level);

    // Initialize metrics
    init_metrics();

    if config.max_queue_size == 0 {
        bail!("--max-queue-size must be positive");
    }

    let queue: PayloadQueue = PayloadQueue::new(config.queue_config());

    match config.command {
        Command::Enqueue { payload } => {
            let value: Value =
                serde_json::from_str(&payload).context("payload must be a JSON document")?;
            let id = queue.add(&value)?;
            println!("{id}");
        }
        Command::Count => {
            println!("{}", queue.row_count()?);
        }
        Command::Peek { limit } => {
            let batch = queue.get_batch(limit);
            for entry in &batch.entries {
                println!("{}\t{}", entry.id, entry.payload);
            }
            if !batch.skipped.is_empty() {
                tracing::warn!(
                    skipped = ?batch.skipped,
                    "Some payloads could not be decoded"
                );
            }
        }
        Command::Ack { min_id, max_id } => {
            let removed = queue.remove_range(min_id, max_id)?;
            println!("{removed}");
        }
        Command::Drain { batch_size } => {
            let stdout = std::io::stdout();
            let mut flusher = Flusher::new(
                &queue,
                |batch: &[QueuedPayload<Value>]| -> std::io::Result<()> {
                    let mut out = stdout.lock();
                    for entry in batch {
                        writeln!(out, "{}", entry.payload)?;
                    }
                    out.flush()
                },
                batch_size,
            );
            let delivered = flusher.flush()?;
            tracing::info!(delivered, "Queue drained");
        }
    }

    Ok(())
}
