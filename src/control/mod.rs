//! Local control API.
//!
//! # Data Flow
//! ```text
//! desktop shell / qmr-cli
//!     → server.rs (request ID, tracing, timeout)
//!     → auth.rs (optional bearer key)
//!     → handlers.rs (start/stop/restart/status/...)
//!     → Supervisor
//!     → response.rs ({ success, code, message, data })
//!
//! Supervisor/relay events
//!     → events.rs (/events WebSocket, JSON text frames)
//! ```

pub mod auth;
pub mod events;
pub mod handlers;
pub mod response;
pub mod server;

pub use handlers::{AutoRestartRequest, ControlState, StartRequest};
pub use response::{ApiError, ApiResponse};
pub use server::ControlServer;
