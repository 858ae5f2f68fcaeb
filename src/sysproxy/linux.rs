//! GNOME proxy settings via `gsettings`.

use crate::sysproxy::command::run;
use crate::sysproxy::{split_server, SystemProxy, SystemProxyError, SystemProxyState};

const GSETTINGS: &str = "gsettings";
const PROXY_SCHEMA: &str = "org.gnome.system.proxy";
const PROTOCOL_SCHEMAS: [&str; 3] = [
    "org.gnome.system.proxy.http",
    "org.gnome.system.proxy.https",
    "org.gnome.system.proxy.socks",
];

#[derive(Debug, Default)]
pub struct GnomeSystemProxy;

impl GnomeSystemProxy {
    pub fn new() -> Self {
        Self
    }
}

impl SystemProxy for GnomeSystemProxy {
    fn enable(&self, server: &str, bypass: &[String]) -> Result<(), SystemProxyError> {
        let (host, port) = split_server(server)?;
        let port = port.to_string();

        for schema in PROTOCOL_SCHEMAS {
            run(GSETTINGS, &["set", schema, "host", &host])?;
            run(GSETTINGS, &["set", schema, "port", &port])?;
        }
        run(GSETTINGS, &["set", PROXY_SCHEMA, "ignore-hosts", &format_list(bypass)])?;
        // Mode last so desktop components pick up a complete configuration.
        run(GSETTINGS, &["set", PROXY_SCHEMA, "mode", "manual"])?;
        Ok(())
    }

    fn disable(&self) -> Result<(), SystemProxyError> {
        run(GSETTINGS, &["set", PROXY_SCHEMA, "mode", "none"])?;
        Ok(())
    }

    fn current(&self) -> Result<SystemProxyState, SystemProxyError> {
        let mode = run(GSETTINGS, &["get", PROXY_SCHEMA, "mode"])?;
        let host = run(GSETTINGS, &["get", PROTOCOL_SCHEMAS[0], "host"])?;
        let port = run(GSETTINGS, &["get", PROTOCOL_SCHEMAS[0], "port"])?;
        let ignore = run(GSETTINGS, &["get", PROXY_SCHEMA, "ignore-hosts"])?;

        let host = unquote(&host);
        let server = if host.is_empty() {
            String::new()
        } else {
            format!("{}:{}", host, port.trim())
        };

        Ok(SystemProxyState {
            enabled: unquote(&mode) == "manual",
            server,
            bypass: parse_list(&ignore),
        })
    }

    fn name(&self) -> &'static str {
        "gsettings"
    }
}

fn unquote(value: &str) -> String {
    value.trim().trim_matches('\'').to_string()
}

/// Render a GVariant string array, e.g. `['localhost', '127.0.0.0/8']`.
fn format_list(items: &[String]) -> String {
    let quoted: Vec<String> = items
        .iter()
        .map(|item| format!("'{}'", item.replace('\\', "\\\\").replace('\'', "\\'")))
        .collect();
    format!("[{}]", quoted.join(", "))
}

/// Parse the GVariant array printed by `gsettings get`.
fn parse_list(value: &str) -> Vec<String> {
    let value = value.trim().trim_start_matches("@as").trim();
    let inner = value.trim_start_matches('[').trim_end_matches(']');
    inner
        .split(',')
        .map(unquote)
        .filter(|item| !item.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_list_round_trip() {
        let items = vec!["localhost".to_string(), "127.0.0.0/8".to_string()];
        let rendered = format_list(&items);
        assert_eq!(rendered, "['localhost', '127.0.0.0/8']");
        assert_eq!(parse_list(&rendered), items);
    }

    #[test]
    fn test_parse_empty_list() {
        assert!(parse_list("@as []").is_empty());
        assert!(parse_list("[]").is_empty());
    }
}
