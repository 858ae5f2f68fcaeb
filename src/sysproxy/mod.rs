//! OS-level proxy settings.
//!
//! # Responsibilities
//! - Point the OS proxy at the running core (`enable`)
//! - Switch it off again when the core stops (`disable`)
//! - Read back what the OS currently has (`current`)
//!
//! # Design Decisions
//! - One implementation per OS behind [`SystemProxy`]; callers never branch on platform
//! - Every call is an unconditional overwrite; nothing is cached or diffed
//! - `disable` leaves server and bypass values in place so re-enabling reuses them
//! - Multi-key writes are not transactional; a failure mid-way is reported, not rolled back
//! - Calls block on OS APIs or helper processes; async callers use `spawn_blocking`

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;

mod command;
pub mod memory;

#[cfg(target_os = "linux")]
pub mod linux;
#[cfg(target_os = "macos")]
pub mod macos;
#[cfg(windows)]
pub mod windows;

pub use memory::MemorySystemProxy;

/// OS proxy settings as read back from the platform.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SystemProxyState {
    pub enabled: bool,
    /// `host:port`
    pub server: String,
    pub bypass: Vec<String>,
}

#[derive(Debug, Error)]
pub enum SystemProxyError {
    #[error("registry write of {key} failed: {source}")]
    Registry {
        key: &'static str,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to run {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{program} exited with {status}: {stderr}")]
    Command {
        program: String,
        status: String,
        stderr: String,
    },

    #[error("invalid proxy server '{0}', expected host:port")]
    InvalidServer(String),

    #[error("settings reload notification failed: {0}")]
    Notify(String),

    #[error("system proxy is not supported on this platform")]
    Unsupported,

    #[error("system proxy task failed: {0}")]
    Task(String),
}

/// Platform proxy settings store.
pub trait SystemProxy: Send + Sync {
    /// Turn the proxy on with `server` (`host:port`) and the given bypass patterns.
    fn enable(&self, server: &str, bypass: &[String]) -> Result<(), SystemProxyError>;

    /// Turn the proxy off. Server and bypass stay as last written.
    fn disable(&self) -> Result<(), SystemProxyError>;

    fn current(&self) -> Result<SystemProxyState, SystemProxyError>;

    /// Short backend name for logs.
    fn name(&self) -> &'static str;
}

/// The settings store for the OS this binary was built for.
pub fn platform_default() -> Arc<dyn SystemProxy> {
    #[cfg(windows)]
    {
        Arc::new(windows::WindowsSystemProxy::new())
    }
    #[cfg(target_os = "linux")]
    {
        Arc::new(linux::GnomeSystemProxy::new())
    }
    #[cfg(target_os = "macos")]
    {
        Arc::new(macos::MacSystemProxy::new())
    }
    #[cfg(not(any(windows, target_os = "linux", target_os = "macos")))]
    {
        tracing::warn!("No system proxy backend for this platform, using in-memory store");
        Arc::new(MemorySystemProxy::new())
    }
}

/// Split `host:port`; IPv6 hosts may be bracketed.
pub fn split_server(server: &str) -> Result<(String, u16), SystemProxyError> {
    let invalid = || SystemProxyError::InvalidServer(server.to_string());
    let (host, port) = server.rsplit_once(':').ok_or_else(invalid)?;
    let host = host.trim_start_matches('[').trim_end_matches(']');
    if host.is_empty() {
        return Err(invalid());
    }
    let port = port.parse::<u16>().map_err(|_| invalid())?;
    Ok((host.to_string(), port))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_server() {
        assert_eq!(split_server("127.0.0.1:7890").unwrap(), ("127.0.0.1".to_string(), 7890));
        assert_eq!(split_server("[::1]:7890").unwrap(), ("::1".to_string(), 7890));
        assert!(matches!(split_server("127.0.0.1"), Err(SystemProxyError::InvalidServer(_))));
        assert!(matches!(split_server(":7890"), Err(SystemProxyError::InvalidServer(_))));
        assert!(matches!(split_server("host:99999"), Err(SystemProxyError::InvalidServer(_))));
    }
}
