//! Proxy-core process spawning.

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::{Child, Command};

use crate::config::CoreConfig;

pub const DIR_PLACEHOLDER: &str = "{dir}";

#[cfg(windows)]
const CREATE_NO_WINDOW: u32 = 0x08000000;

/// Builds the core command line for a resolved config directory.
#[derive(Debug, Clone)]
pub struct CoreLauncher {
    binary: PathBuf,
    args: Vec<String>,
}

impl CoreLauncher {
    pub fn new(binary: impl Into<PathBuf>, args: Vec<String>) -> Self {
        Self {
            binary: binary.into(),
            args,
        }
    }

    pub fn from_config(config: &CoreConfig) -> Self {
        Self::new(&config.binary, config.args.clone())
    }

    pub fn binary(&self) -> &Path {
        &self.binary
    }

    /// Arguments with `{dir}` expanded.
    pub fn args_for(&self, dir: &Path) -> Vec<OsString> {
        self.args
            .iter()
            .map(|arg| {
                if arg == DIR_PLACEHOLDER {
                    dir.as_os_str().to_owned()
                } else if arg.contains(DIR_PLACEHOLDER) {
                    OsString::from(arg.replace(DIR_PLACEHOLDER, &dir.to_string_lossy()))
                } else {
                    OsString::from(arg)
                }
            })
            .collect()
    }

    /// Spawn with piped output. The child is killed if its handle is dropped.
    pub fn spawn(&self, dir: &Path) -> std::io::Result<Child> {
        let mut cmd = Command::new(&self.binary);
        cmd.args(self.args_for(dir))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        #[cfg(windows)]
        cmd.creation_flags(CREATE_NO_WINDOW);

        cmd.spawn()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_args_expand_placeholder() {
        let launcher = CoreLauncher::new(
            "mihomo",
            vec!["-d".into(), "{dir}".into(), "--ext-ui={dir}/ui".into()],
        );
        let args = launcher.args_for(Path::new("/tmp/profiles/abc"));
        assert_eq!(
            args,
            vec![
                OsString::from("-d"),
                OsString::from("/tmp/profiles/abc"),
                OsString::from("--ext-ui=/tmp/profiles/abc/ui"),
            ]
        );
    }

    #[tokio::test]
    async fn test_missing_binary_fails_to_spawn() {
        let launcher = CoreLauncher::new("/nonexistent/qmr/mihomo", vec!["{dir}".into()]);
        let err = launcher.spawn(Path::new(".")).unwrap_err();
        assert_eq!(err.kind(), std::io::ErrorKind::NotFound);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_spawn_passes_directory() {
        use tokio::io::AsyncReadExt;

        let launcher = CoreLauncher::new(
            "/bin/sh",
            vec!["-c".into(), "echo \"$1\"".into(), "core".into(), "{dir}".into()],
        );
        let mut child = launcher.spawn(Path::new("/tmp/qmr-dir")).unwrap();
        let mut out = String::new();
        child.stdout.take().unwrap().read_to_string(&mut out).await.unwrap();
        assert_eq!(out.trim(), "/tmp/qmr-dir");
        assert!(child.wait().await.unwrap().success());
    }
}
