//! Resilience helpers.
//!
//! # Design Decisions
//! - Readiness polling backs off exponentially with jitter
//! - Auto-restart uses a fixed delay instead (see supervisor)

pub mod backoff;
