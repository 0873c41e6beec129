//! Observability subsystem: Prometheus exposition helpers.
//!
//! Structured logging is initialized in `main` via `tracing-subscriber`;
//! modules emit through the `tracing` macros directly.

pub mod exporter;
