//! Helper-process invocation for platforms configured through CLI tools.

#![cfg_attr(not(any(target_os = "linux", target_os = "macos")), allow(dead_code))]

use std::process::Command;

use crate::sysproxy::SystemProxyError;

/// Run `program args...` and return trimmed stdout. Arguments are passed as-is, never through a shell.
pub(crate) fn run(program: &str, args: &[&str]) -> Result<String, SystemProxyError> {
    tracing::debug!(program, ?args, "Running system proxy helper");
    let output = Command::new(program)
        .args(args)
        .output()
        .map_err(|source| SystemProxyError::Spawn {
            program: program.to_string(),
            source,
        })?;

    if !output.status.success() {
        return Err(SystemProxyError::Command {
            program: program.to_string(),
            status: output.status.to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        });
    }
    Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    #[test]
    fn test_run_captures_stdout() {
        assert_eq!(run("echo", &["  hi  "]).unwrap(), "hi");
    }

    #[test]
    fn test_non_zero_exit_reports_stderr() {
        let err = run("sh", &["-c", "echo boom >&2; exit 4"]).unwrap_err();
        match err {
            SystemProxyError::Command { stderr, .. } => assert_eq!(stderr, "boom"),
            other => panic!("unexpected error {:?}", other),
        }
    }

    #[test]
    fn test_missing_program_is_spawn_error() {
        assert!(matches!(
            run("qmr-definitely-not-installed", &[]),
            Err(SystemProxyError::Spawn { .. })
        ));
    }
}
