//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the daemon.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Root configuration for the proxy-core daemon.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct DaemonConfig {
    /// Local control API (start/stop/status, event stream).
    pub control: ControlConfig,

    /// Proxy-core executable and where its configs live.
    pub core: CoreConfig,

    /// Config download settings.
    pub resolver: ResolverConfig,

    /// Restart and shutdown behaviour.
    pub supervisor: SupervisorConfig,

    /// External-controller readiness probing.
    pub readiness: ReadinessConfig,

    /// OS-level proxy wiring.
    pub system_proxy: SystemProxyConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Control API configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ControlConfig {
    /// Bind address (e.g., "127.0.0.1:7895").
    pub bind_address: String,

    /// Bearer token required by the API. Empty disables auth.
    pub api_key: String,

    /// Upper bound for a single API request in seconds.
    pub request_timeout_secs: u64,

    /// Capacity of the event broadcast channel.
    pub event_buffer: usize,
}

impl Default for ControlConfig {
    fn default() -> Self {
        Self {
            bind_address: "127.0.0.1:7895".to_string(),
            api_key: String::new(),
            request_timeout_secs: 60,
            event_buffer: 256,
        }
    }
}

/// Proxy-core executable configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CoreConfig {
    /// Path to the mihomo/Clash binary.
    pub binary: PathBuf,

    /// Arguments passed to the binary. `{dir}` expands to the resolved config directory.
    pub args: Vec<String>,

    /// Directory holding one sub-directory per downloaded config source.
    pub base_dir: PathBuf,

    /// Flat text file with one config-source URL per line.
    pub sources_file: PathBuf,

    /// Start the core with the first source when the daemon boots.
    pub autostart: bool,
}

impl Default for CoreConfig {
    fn default() -> Self {
        let binary = if cfg!(windows) { "mihomo.exe" } else { "mihomo" };
        Self {
            binary: PathBuf::from(binary),
            args: vec!["-d".to_string(), "{dir}".to_string()],
            base_dir: PathBuf::from("profiles"),
            sources_file: PathBuf::from("sources.txt"),
            autostart: false,
        }
    }
}

/// Config download configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ResolverConfig {
    /// HTTP timeout for fetching a config body, in seconds.
    pub fetch_timeout_secs: u64,

    /// User-Agent sent to subscription providers.
    pub user_agent: String,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            fetch_timeout_secs: 10,
            user_agent: "clash.meta".to_string(),
        }
    }
}

impl ResolverConfig {
    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs)
    }
}

/// Supervisor behaviour.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SupervisorConfig {
    /// Restart the core after it exits on its own.
    pub auto_restart: bool,

    /// Delay before an automatic restart, in milliseconds.
    pub restart_delay_ms: u64,

    /// Fixed wait used instead of probing when readiness checks are disabled.
    pub warmup_ms: u64,

    /// How long `stop` waits for the process to exit, in seconds.
    pub stop_timeout_secs: u64,
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self {
            auto_restart: false,
            restart_delay_ms: 5_000,
            warmup_ms: 2_000,
            stop_timeout_secs: 5,
        }
    }
}

/// Readiness probe against the core's external controller.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ReadinessConfig {
    /// Probe the controller before declaring the core started.
    pub enabled: bool,

    /// Give up after this many seconds.
    pub timeout_secs: u64,

    /// First poll delay in milliseconds (doubles per attempt).
    pub base_interval_ms: u64,

    /// Upper bound for the poll delay in milliseconds.
    pub max_interval_ms: u64,

    /// Path probed on the controller.
    pub path: String,
}

impl Default for ReadinessConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            timeout_secs: 15,
            base_interval_ms: 100,
            max_interval_ms: 1_000,
            path: "/version".to_string(),
        }
    }
}

/// OS proxy settings configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SystemProxyConfig {
    /// Wire the OS proxy to the core on start.
    pub enabled: bool,

    /// Host written as the proxy server (port comes from the core config).
    pub host: String,

    /// Address patterns excluded from proxying.
    pub bypass: Vec<String>,

    /// Kill the core when enabling the OS proxy fails.
    pub rollback_on_failure: bool,
}

impl Default for SystemProxyConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            host: "127.0.0.1".to_string(),
            bypass: vec![
                "localhost".to_string(),
                "127.*".to_string(),
                "10.*".to_string(),
                "172.16.*".to_string(),
                "192.168.*".to_string(),
                "<local>".to_string(),
            ],
            rollback_on_failure: true,
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Log output format.
    pub log_format: LogFormat,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
            metrics_enabled: false,
            metrics_address: "127.0.0.1:9464".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minimal_config_uses_defaults() {
        let config: DaemonConfig = toml::from_str("").unwrap();
        assert_eq!(config.control.bind_address, "127.0.0.1:7895");
        assert_eq!(config.resolver.fetch_timeout_secs, 10);
        assert_eq!(config.supervisor.restart_delay_ms, 5_000);
        assert_eq!(config.core.args, vec!["-d", "{dir}"]);
        assert!(config.system_proxy.rollback_on_failure);
    }

    #[test]
    fn test_partial_sections_merge_with_defaults() {
        let config: DaemonConfig = toml::from_str(
            r#"
            [supervisor]
            auto_restart = true

            [observability]
            log_format = "json"
            "#,
        )
        .unwrap();

        assert!(config.supervisor.auto_restart);
        assert_eq!(config.supervisor.warmup_ms, 2_000);
        assert_eq!(config.observability.log_format, LogFormat::Json);
        assert_eq!(config.observability.log_level, "info");
    }
}
