//! Observability infrastructure.
//!
//! Provides:
//! - Structured tracing via tracing-subscriber
//! - OpenTelemetry metrics for queue depth and throughput

pub mod metrics;
pub mod tracing;
