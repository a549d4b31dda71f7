//! Lightweight in-process metrics.
//!
//! Counters, gauges, and a latency histogram stored as atomics and rendered in
//! Prometheus text format on demand.

pub mod metrics;

pub use metrics::BusMetrics;
