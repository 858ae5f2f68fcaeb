//! In-process settings store.

use std::sync::Mutex;

use crate::sysproxy::{split_server, SystemProxy, SystemProxyError, SystemProxyState};

/// Keeps the proxy state in memory. Used on platforms without a backend and in tests.
#[derive(Debug, Default)]
pub struct MemorySystemProxy {
    state: Mutex<SystemProxyState>,
}

impl MemorySystemProxy {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, SystemProxyState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl SystemProxy for MemorySystemProxy {
    fn enable(&self, server: &str, bypass: &[String]) -> Result<(), SystemProxyError> {
        split_server(server)?;
        let mut state = self.lock();
        state.enabled = true;
        state.server = server.to_string();
        state.bypass = bypass.to_vec();
        Ok(())
    }

    fn disable(&self) -> Result<(), SystemProxyError> {
        self.lock().enabled = false;
        Ok(())
    }

    fn current(&self) -> Result<SystemProxyState, SystemProxyError> {
        Ok(self.lock().clone())
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}
