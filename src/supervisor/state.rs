//! Core lifecycle state machine.
//!
//! # States
//! - Stopped: no process owned
//! - Starting: resolving config, spawning, waiting for readiness
//! - Running: process up and wired into the OS proxy
//! - Stopping: termination requested, waiting for exit
//! - Error: last start failed or the process died unexpectedly
//!
//! # State Transitions
//! ```text
//! Stopped/Error → Starting → Running → Stopping → Stopped
//! Starting → Error: resolve, spawn, readiness or system proxy failure
//! Running → Error/Stopped: process exits on its own (non-zero / zero status)
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CoreState {
    #[default]
    Stopped,
    Starting,
    Running,
    Stopping,
    Error,
}

impl CoreState {
    pub fn as_str(&self) -> &'static str {
        match self {
            CoreState::Stopped => "stopped",
            CoreState::Starting => "starting",
            CoreState::Running => "running",
            CoreState::Stopping => "stopping",
            CoreState::Error => "error",
        }
    }

    /// A process may be owned in this state.
    pub fn is_active(&self) -> bool {
        matches!(self, CoreState::Starting | CoreState::Running | CoreState::Stopping)
    }
}

impl fmt::Display for CoreState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
