//! qmr-proxyd: proxy-core supervisor library.
//!
//! Resolves a subscription URL into a core config on disk, runs the core
//! process, points the OS proxy at it, and exposes all of that through a
//! local control API.

pub mod config;
pub mod control;
pub mod lifecycle;
pub mod observability;
pub mod relay;
pub mod resilience;
pub mod sources;
pub mod supervisor;
pub mod sysproxy;

pub use config::DaemonConfig;
pub use control::ControlServer;
pub use lifecycle::Shutdown;
pub use relay::{CoreEvent, EventRelay};
pub use supervisor::{CoreState, Supervisor};
