//! Supervisor error definitions.

use thiserror::Error;

use crate::sources::ResolveError;
use crate::sysproxy::SystemProxyError;

/// Errors that can occur while starting or stopping the core.
#[derive(Debug, Error)]
pub enum SupervisorError {
    /// Config source could not be selected or downloaded.
    #[error(transparent)]
    Resolve(#[from] ResolveError),

    /// Binary missing or not executable.
    #[error("failed to spawn {binary}: {source}")]
    Spawn {
        binary: String,
        #[source]
        source: std::io::Error,
    },

    /// Process died before it was declared started.
    #[error("core exited during startup ({status})")]
    ExitedEarly { code: Option<i32>, status: String },

    /// External controller never answered.
    #[error("core controller at {address} not ready after {waited_ms}ms")]
    NotReady { address: String, waited_ms: u64 },

    /// OS proxy settings could not be written.
    #[error("system proxy: {0}")]
    SystemProxy(#[from] SystemProxyError),

    /// The task running the operation panicked or was aborted.
    #[error("supervisor task failed: {0}")]
    Task(String),
}

impl SupervisorError {
    /// Stable identifier surfaced through the control API.
    pub fn code(&self) -> &'static str {
        match self {
            SupervisorError::Resolve(e) => e.code(),
            SupervisorError::Spawn { .. } => "spawn_failed",
            SupervisorError::ExitedEarly { .. } => "exited_early",
            SupervisorError::NotReady { .. } => "not_ready",
            SupervisorError::SystemProxy(_) => "system_proxy_failed",
            SupervisorError::Task(_) => "internal_error",
        }
    }
}

pub type SupervisorResult<T> = Result<T, SupervisorError>;
