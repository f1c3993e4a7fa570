//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Gates and server produce:
//!     → logging.rs (structured log events)
//!     → metrics.rs (admission, retry and auth counters)
//!
//! Consumers:
//!     → Log aggregation (stdout, JSON lines)
//!     → Metrics endpoint (Prometheus scrape)
//! ```
//!
//! # Design Decisions
//! - Structured logging (tracing fields) for machine parsing
//! - Request ID flows through every log line via the trace span
//! - Metrics are cheap (atomic increments) and recorded even with no exporter

pub mod logging;
pub mod metrics;
