//! Config source resolution.
//!
//! # Data Flow
//! ```text
//! sources.txt (one URL per line)
//!     → list.rs (parse, select by index/URL)
//!     → resolver.rs (GET with timeout → <base_dir>/<b64(url)>/config.yaml)
//!     → summary.rs (port, external-controller, proxy names)
//!     → ResolvedConfig handed to the supervisor
//! ```

pub mod error;
pub mod list;
pub mod resolver;
pub mod summary;

pub use error::ResolveError;
pub use list::{parse_sources, read_sources, SourceSelector};
pub use resolver::{dir_name_for, ConfigResolver, ResolvedConfig, CONFIG_FILE_NAME};
pub use summary::{load_summary, CoreConfigSummary};
