//! Post-install self-test.
//!
//! The test binary ships with the installed package. Its outcome is reported
//! on its own and never changes the result of the install that preceded it.

use std::process::Command;

use crate::core::context::InstallContext;

use super::error::{ExecuteError, failure_exit_status};
use super::util::{display_command, run_to_completion};

/// How a self-test outcome maps onto the process exit status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TestPolicy {
    /// After `install --test`: the install already succeeded, a failing test is only reported.
    Advisory,
    /// `formula test`: exit with the test's own code.
    Strict,
}

impl TestPolicy {
    pub fn exit_status(self, outcome: &Result<Option<i32>, ExecuteError>) -> u8 {
        match (self, outcome) {
            (TestPolicy::Advisory, _) | (TestPolicy::Strict, Ok(_)) => 0,
            (TestPolicy::Strict, Err(e)) => failure_exit_status(e.tool_exit_code().unwrap_or(1)),
        }
    }
}

/// Run `command args...` from inside the prefix. Returns the exit code (0).
pub fn run_self_test(
    ctx: &InstallContext,
    command: &str,
    args: &[String],
) -> Result<i32, ExecuteError> {
    let rendered = display_command(command, args);

    let mut cmd = Command::new(command);
    cmd.args(args).current_dir(&ctx.prefix);

    let done = run_to_completion(ctx, cmd, &rendered, "running self-test").map_err(|e| {
        ExecuteError::Test {
            cmd: rendered.clone(),
            code: None,
            stderr: format!("cannot run test binary: {}", e),
        }
    })?;

    if !done.success {
        return Err(ExecuteError::Test {
            cmd: rendered,
            code: done.code,
            stderr: done.stderr,
        });
    }
    Ok(0)
}

#[cfg(test)]
mod policy_tests {
    use super::*;

    fn failed(code: Option<i32>) -> Result<Option<i32>, ExecuteError> {
        Err(ExecuteError::Test {
            cmd: "run_all_tests".into(),
            code,
            stderr: String::new(),
        })
    }

    #[test]
    fn test_advisory_ignores_failure() {
        assert_eq!(TestPolicy::Advisory.exit_status(&failed(Some(4))), 0);
        assert_eq!(TestPolicy::Advisory.exit_status(&failed(None)), 0);
        assert_eq!(TestPolicy::Advisory.exit_status(&Ok(Some(0))), 0);
    }

    #[test]
    fn test_strict_uses_test_exit_code() {
        assert_eq!(TestPolicy::Strict.exit_status(&failed(Some(4))), 4);
        assert_eq!(TestPolicy::Strict.exit_status(&failed(None)), 1);
        assert_eq!(TestPolicy::Strict.exit_status(&failed(Some(300))), 1);
        assert_eq!(TestPolicy::Strict.exit_status(&Ok(Some(0))), 0);
        assert_eq!(TestPolicy::Strict.exit_status(&Ok(None)), 0);
    }

    #[test]
    fn test_strict_maps_unexpandable_command_to_one() {
        assert_eq!(TestPolicy::Strict.exit_status(&Err(ExecuteError::NoInterpreter)), 1);
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::os::unix::fs::PermissionsExt;

    fn script(dir: &std::path::Path, name: &str, body: &str) -> String {
        let path = dir.join(name);
        std::fs::write(&path, format!("#!/bin/sh\n{}\n", body)).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        path.to_string_lossy().into_owned()
    }

    #[test]
    fn test_passing_test() {
        let tmp = tempfile::tempdir().unwrap();
        let ctx = InstallContext::new(tmp.path(), tmp.path().join("work"));
        let cmd = script(tmp.path(), "ok", "exit 0");
        assert_eq!(run_self_test(&ctx, &cmd, &[]).unwrap(), 0);
    }

    #[test]
    fn test_failing_test_reports_code() {
        let tmp = tempfile::tempdir().unwrap();
        let ctx = InstallContext::new(tmp.path(), tmp.path().join("work"));
        let cmd = script(tmp.path(), "bad", "echo sandbox denied >&2; exit 5");

        let err = run_self_test(&ctx, &cmd, &[]).unwrap_err();
        assert_eq!(err.tool_exit_code(), Some(5));
        assert!(err.to_string().contains("sandbox denied"));
    }

    #[test]
    fn test_missing_binary_is_test_error() {
        let tmp = tempfile::tempdir().unwrap();
        let ctx = InstallContext::new(tmp.path(), tmp.path().join("work"));
        let missing = tmp.path().join("env/bin/run_all_tests");

        let err = run_self_test(&ctx, &missing.to_string_lossy(), &[]).unwrap_err();
        assert!(matches!(err, ExecuteError::Test { code: None, .. }));
    }
}
