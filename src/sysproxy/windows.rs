//! WinINet proxy settings (registry: Internet Settings) with a reload notification.

use std::ptr;

use windows_sys::Win32::Networking::WinInet::{
    InternetSetOptionW, INTERNET_OPTION_REFRESH, INTERNET_OPTION_SETTINGS_CHANGED,
};
use winreg::enums::HKEY_CURRENT_USER;
use winreg::RegKey;

use crate::sysproxy::{split_server, SystemProxy, SystemProxyError, SystemProxyState};

const INTERNET_SETTINGS_PATH: &str = r"Software\Microsoft\Windows\CurrentVersion\Internet Settings";
const PROXY_ENABLE: &str = "ProxyEnable";
const PROXY_SERVER: &str = "ProxyServer";
const PROXY_OVERRIDE: &str = "ProxyOverride";

#[derive(Debug, Default)]
pub struct WindowsSystemProxy;

impl WindowsSystemProxy {
    pub fn new() -> Self {
        Self
    }

    fn open_key(&self) -> Result<RegKey, SystemProxyError> {
        let hkcu = RegKey::predef(HKEY_CURRENT_USER);
        let (key, _) = hkcu
            .create_subkey(INTERNET_SETTINGS_PATH)
            .map_err(|source| SystemProxyError::Registry {
                key: INTERNET_SETTINGS_PATH,
                source,
            })?;
        Ok(key)
    }
}

impl SystemProxy for WindowsSystemProxy {
    fn enable(&self, server: &str, bypass: &[String]) -> Result<(), SystemProxyError> {
        split_server(server)?;
        let key = self.open_key()?;
        set(&key, PROXY_ENABLE, &1u32)?;
        set(&key, PROXY_SERVER, &server.to_string())?;
        set(&key, PROXY_OVERRIDE, &bypass.join(";"))?;
        notify_settings_changed()
    }

    fn disable(&self) -> Result<(), SystemProxyError> {
        let key = self.open_key()?;
        set(&key, PROXY_ENABLE, &0u32)?;
        notify_settings_changed()
    }

    fn current(&self) -> Result<SystemProxyState, SystemProxyError> {
        let key = self.open_key()?;
        let enabled = key.get_value::<u32, _>(PROXY_ENABLE).unwrap_or(0) != 0;
        let server = key.get_value::<String, _>(PROXY_SERVER).unwrap_or_default();
        let bypass = key
            .get_value::<String, _>(PROXY_OVERRIDE)
            .unwrap_or_default()
            .split(';')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect();
        Ok(SystemProxyState {
            enabled,
            server,
            bypass,
        })
    }

    fn name(&self) -> &'static str {
        "wininet"
    }
}

fn set<T: winreg::types::ToRegValue>(
    key: &RegKey,
    name: &'static str,
    value: &T,
) -> Result<(), SystemProxyError> {
    key.set_value(name, value)
        .map_err(|source| SystemProxyError::Registry { key: name, source })
}

/// Tell WinINet consumers to re-read the registry.
fn notify_settings_changed() -> Result<(), SystemProxyError> {
    for (option, label) in [
        (INTERNET_OPTION_SETTINGS_CHANGED, "INTERNET_OPTION_SETTINGS_CHANGED"),
        (INTERNET_OPTION_REFRESH, "INTERNET_OPTION_REFRESH"),
    ] {
        let ok = unsafe { InternetSetOptionW(ptr::null_mut(), option, ptr::null_mut(), 0) };
        if ok == 0 {
            let err = std::io::Error::last_os_error();
            return Err(SystemProxyError::Notify(format!("{}: {}", label, err)));
        }
    }
    Ok(())
}
