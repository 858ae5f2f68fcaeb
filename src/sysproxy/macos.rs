//! macOS proxy settings via `networksetup`, applied to every enabled network service.

use crate::sysproxy::command::run;
use crate::sysproxy::{split_server, SystemProxy, SystemProxyError, SystemProxyState};

const NETWORKSETUP: &str = "networksetup";

#[derive(Debug, Default)]
pub struct MacSystemProxy;

impl MacSystemProxy {
    pub fn new() -> Self {
        Self
    }

    fn services(&self) -> Result<Vec<String>, SystemProxyError> {
        let output = run(NETWORKSETUP, &["-listallnetworkservices"])?;
        Ok(parse_services(&output))
    }
}

impl SystemProxy for MacSystemProxy {
    fn enable(&self, server: &str, bypass: &[String]) -> Result<(), SystemProxyError> {
        let (host, port) = split_server(server)?;
        let port = port.to_string();

        for service in self.services()? {
            let svc = service.as_str();
            run(NETWORKSETUP, &["-setwebproxy", svc, &host, &port])?;
            run(NETWORKSETUP, &["-setsecurewebproxy", svc, &host, &port])?;
            run(NETWORKSETUP, &["-setsocksfirewallproxy", svc, &host, &port])?;

            let mut args = vec!["-setproxybypassdomains", svc];
            if bypass.is_empty() {
                args.push("Empty");
            } else {
                args.extend(bypass.iter().map(String::as_str));
            }
            run(NETWORKSETUP, &args)?;
        }
        Ok(())
    }

    fn disable(&self) -> Result<(), SystemProxyError> {
        for service in self.services()? {
            let svc = service.as_str();
            run(NETWORKSETUP, &["-setwebproxystate", svc, "off"])?;
            run(NETWORKSETUP, &["-setsecurewebproxystate", svc, "off"])?;
            run(NETWORKSETUP, &["-setsocksfirewallproxystate", svc, "off"])?;
        }
        Ok(())
    }

    fn current(&self) -> Result<SystemProxyState, SystemProxyError> {
        let Some(service) = self.services()?.into_iter().next() else {
            return Ok(SystemProxyState::default());
        };
        let web = run(NETWORKSETUP, &["-getwebproxy", &service])?;
        let bypass = run(NETWORKSETUP, &["-getproxybypassdomains", &service])?;

        let mut state = parse_web_proxy(&web);
        state.bypass = parse_bypass(&bypass);
        Ok(state)
    }

    fn name(&self) -> &'static str {
        "networksetup"
    }
}

/// First line is a legend; `*` marks disabled services.
fn parse_services(output: &str) -> Vec<String> {
    output
        .lines()
        .skip(1)
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('*'))
        .map(str::to_string)
        .collect()
}

fn parse_web_proxy(output: &str) -> SystemProxyState {
    let mut state = SystemProxyState::default();
    let mut host = "";
    let mut port = "";
    for line in output.lines() {
        if let Some((key, value)) = line.split_once(':') {
            match key.trim() {
                "Enabled" => state.enabled = value.trim() == "Yes",
                "Server" => host = value.trim(),
                "Port" => port = value.trim(),
                _ => {}
            }
        }
    }
    if !host.is_empty() {
        state.server = format!("{}:{}", host, port);
    }
    state
}

fn parse_bypass(output: &str) -> Vec<String> {
    if output.starts_with("There aren't any") {
        return Vec::new();
    }
    output
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}
