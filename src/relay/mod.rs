//! Status and log relay.
//!
//! # Responsibilities
//! - Carry core output lines and lifecycle transitions to whoever listens
//! - Never block the supervisor on a slow or absent listener
//!
//! # Design Decisions
//! - Fire-and-forget over a broadcast channel: no listeners means dropped
//! - Slow listeners lag and lose the oldest events; nothing is replayed

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::supervisor::CoreState;

/// Event pushed to UI listeners.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "kebab-case")]
pub enum CoreEvent {
    /// Lifecycle transition.
    StatusUpdate {
        state: CoreState,
        message: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        run_id: Option<Uuid>,
        #[serde(skip_serializing_if = "Option::is_none")]
        exit_code: Option<i32>,
    },
    /// Line from the core's stdout.
    Log { run_id: Uuid, line: String },
    /// Line from the core's stderr.
    Error { run_id: Uuid, line: String },
}

impl CoreEvent {
    pub fn status(state: CoreState, message: impl Into<String>) -> Self {
        CoreEvent::StatusUpdate {
            state,
            message: message.into(),
            run_id: None,
            exit_code: None,
        }
    }

    pub fn status_for_run(state: CoreState, run_id: Uuid, message: impl Into<String>) -> Self {
        CoreEvent::StatusUpdate {
            state,
            message: message.into(),
            run_id: Some(run_id),
            exit_code: None,
        }
    }
}

/// Broadcast fan-out of [`CoreEvent`]s.
#[derive(Debug, Clone)]
pub struct EventRelay {
    tx: broadcast::Sender<CoreEvent>,
}

impl EventRelay {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    pub fn emit(&self, event: CoreEvent) {
        // Err only means nobody is listening.
        let _ = self.tx.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<CoreEvent> {
        self.tx.subscribe()
    }

    pub fn listener_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for EventRelay {
    fn default() -> Self {
        Self::new(256)
    }
}
