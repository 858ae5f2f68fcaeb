//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Supervisor, resolver, control API produce:
//!     → logging.rs (structured log events)
//!     → metrics.rs (counters, gauges)
//!
//! Consumers:
//!     → stdout (pretty or JSON)
//!     → Metrics endpoint (Prometheus scrape, optional)
//! ```
//!
//! # Design Decisions
//! - Structured fields (run_id, pid, source) on every lifecycle log line
//! - Metrics are cheap and safe to record without an exporter

pub mod logging;
pub mod metrics;
