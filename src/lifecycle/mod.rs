//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (startup.rs):
//!     Config → logging/metrics → supervisor → control listener → optional autostart
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → Shutdown::trigger
//!
//! Shutdown (shutdown.rs):
//!     trigger → control server drains → supervisor stops core → OS proxy restored
//! ```
//!
//! # Design Decisions
//! - Listener binds before autostart so the API can observe the first start
//! - The core is always stopped before the process exits

pub mod shutdown;
pub mod signals;
pub mod startup;

pub use shutdown::Shutdown;
pub use startup::{run, StartupError};
