//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! qmr-proxyd.toml
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → DaemonConfig (validated, immutable)
//!     → split into per-subsystem sections at startup
//!
//! On file change:
//!     watcher.rs detects change
//!     → loader.rs loads new config
//!     → validation.rs validates
//!     → daemon applies the hot-reloadable fields
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; most changes require a restart
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;
pub mod watcher;

pub use loader::{load_config, load_or_default, ConfigError};
pub use schema::DaemonConfig;
pub use schema::{
    ControlConfig, CoreConfig, LogFormat, ObservabilityConfig, ReadinessConfig, ResolverConfig,
    SupervisorConfig, SystemProxyConfig,
};
