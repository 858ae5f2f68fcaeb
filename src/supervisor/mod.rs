//! Proxy-core supervision.
//!
//! # Data Flow
//! ```text
//! start(selector)
//!     → sources::ConfigResolver (download config.yaml)
//!     → launcher.rs (spawn core with -d <dir>)
//!     → readiness.rs (poll external-controller, or fixed warm-up)
//!     → sysproxy (point the OS at the core's port)
//!     → Running
//!
//! child exit (watcher task)
//!     → Stopped | Error
//!     → auto-restart after delay, or system proxy disabled
//! ```

pub mod core;
pub mod error;
pub mod launcher;
pub mod readiness;
pub mod state;

pub use self::core::{CoreStatus, StartOutcome, StopOutcome, Supervisor, SupervisorOptions};
pub use error::{SupervisorError, SupervisorResult};
pub use launcher::CoreLauncher;
pub use readiness::ReadinessProbe;
pub use state::CoreState;
