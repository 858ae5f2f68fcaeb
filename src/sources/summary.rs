//! Fields the daemon reads out of a downloaded proxy-core config.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::sources::error::ResolveError;

pub const DEFAULT_PROXY_PORT: u16 = 7890;
pub const DEFAULT_EXTERNAL_CONTROLLER: &str = "127.0.0.1:9090";

/// Subset of the mihomo YAML schema. Unknown keys are ignored.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawCoreConfig {
    port: Option<u16>,
    #[serde(rename = "mixed-port")]
    mixed_port: Option<u16>,
    #[serde(rename = "external-controller")]
    external_controller: Option<String>,
    secret: Option<String>,
    proxies: Vec<Named>,
    #[serde(rename = "proxy-groups")]
    proxy_groups: Vec<Named>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct Named {
    name: Option<String>,
}

/// What the supervisor needs to know about a resolved config.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CoreConfigSummary {
    /// Port the core listens on for proxied traffic.
    pub proxy_port: u16,
    /// External controller address as written in the config.
    pub external_controller: String,
    #[serde(skip_serializing)]
    pub secret: Option<String>,
    pub proxy_names: Vec<String>,
    pub group_names: Vec<String>,
}

impl CoreConfigSummary {
    pub fn parse(yaml: &str) -> Result<Self, ResolveError> {
        let raw: RawCoreConfig = serde_yaml::from_str(yaml)?;

        let external_controller = raw
            .external_controller
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| DEFAULT_EXTERNAL_CONTROLLER.to_string());

        Ok(Self {
            proxy_port: raw.port.or(raw.mixed_port).unwrap_or(DEFAULT_PROXY_PORT),
            external_controller,
            secret: raw.secret.filter(|s| !s.is_empty()),
            proxy_names: names(raw.proxies),
            group_names: names(raw.proxy_groups),
        })
    }

    /// Address to probe the controller on. Wildcard binds map to loopback.
    pub fn controller_probe_address(&self) -> String {
        let addr = self.external_controller.as_str();
        let Some((host, port)) = addr.rsplit_once(':') else {
            return addr.to_string();
        };
        let host = host.trim_start_matches('[').trim_end_matches(']');
        match host {
            "" | "0.0.0.0" | "::" => format!("127.0.0.1:{}", port),
            _ => addr.to_string(),
        }
    }

    /// `host:port` written into the OS proxy settings.
    pub fn proxy_server(&self, host: &str) -> String {
        format!("{}:{}", host, self.proxy_port)
    }
}

fn names(entries: Vec<Named>) -> Vec<String> {
    entries.into_iter().filter_map(|n| n.name).collect()
}

/// Re-read a `config.yaml` already on disk.
pub fn load_summary(path: &Path) -> Result<CoreConfigSummary, ResolveError> {
    let body = std::fs::read_to_string(path)?;
    CoreConfigSummary::parse(&body)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_when_keys_absent() {
        let summary = CoreConfigSummary::parse("mode: rule\nlog-level: info\n").unwrap();
        assert_eq!(summary.proxy_port, 7890);
        assert_eq!(summary.external_controller, "127.0.0.1:9090");
        assert!(summary.secret.is_none());
    }

    #[test]
    fn test_literal_values_when_present() {
        let yaml = "port: 8080\nexternal-controller: 127.0.0.1:19090\nsecret: s3cret\n";
        let summary = CoreConfigSummary::parse(yaml).unwrap();
        assert_eq!(summary.proxy_port, 8080);
        assert_eq!(summary.external_controller, "127.0.0.1:19090");
        assert_eq!(summary.secret.as_deref(), Some("s3cret"));
    }

    #[test]
    fn test_mixed_port_fallback() {
        let summary = CoreConfigSummary::parse("mixed-port: 7897\n").unwrap();
        assert_eq!(summary.proxy_port, 7897);

        let summary = CoreConfigSummary::parse("port: 7000\nmixed-port: 7897\n").unwrap();
        assert_eq!(summary.proxy_port, 7000);
    }

    #[test]
    fn test_collects_proxy_and_group_names() {
        let yaml = r#"
proxies:
  - { name: "hk-01", type: ss, server: a.example, port: 443 }
  - { name: "jp-01", type: vmess, server: b.example, port: 443 }
proxy-groups:
  - name: Auto
    type: url-test
    proxies: [hk-01, jp-01]
"#;
        let summary = CoreConfigSummary::parse(yaml).unwrap();
        assert_eq!(summary.proxy_names, vec!["hk-01", "jp-01"]);
        assert_eq!(summary.group_names, vec!["Auto"]);
    }

    #[test]
    fn test_wildcard_controller_probes_loopback() {
        let mut summary = CoreConfigSummary::parse("external-controller: 0.0.0.0:9097\n").unwrap();
        assert_eq!(summary.controller_probe_address(), "127.0.0.1:9097");

        summary.external_controller = ":9098".into();
        assert_eq!(summary.controller_probe_address(), "127.0.0.1:9098");

        summary.external_controller = "[::]:9099".into();
        assert_eq!(summary.controller_probe_address(), "127.0.0.1:9099");

        summary.external_controller = "192.168.1.2:9090".into();
        assert_eq!(summary.controller_probe_address(), "192.168.1.2:9090");
    }

    #[test]
    fn test_non_mapping_body_is_malformed() {
        let err = CoreConfigSummary::parse("c3M6Ly9ZV1Z6TFRJMU5pMW5ZMjA2").unwrap_err();
        assert!(matches!(err, ResolveError::MalformedYaml(_)));
    }

    #[test]
    fn test_summary_round_trip_through_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        std::fs::write(&path, "port: 8080\n").unwrap();

        let summary = load_summary(&path).unwrap();
        assert_eq!(summary.proxy_port, 8080);
        assert_eq!(summary.external_controller, DEFAULT_EXTERNAL_CONTROLLER);
    }
}
