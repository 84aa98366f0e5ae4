//! Build invocation - spawns the external build tool with a structured argument list.

use std::collections::BTreeMap;
use std::path::Path;
use std::process::Command;

use crate::core::context::InstallContext;

use super::error::ExecuteError;
use super::util::{display_command, run_to_completion};

/// Run `tool args...` in `cwd` with `env` added to the inherited environment.
///
/// Returns the tool's exit code (always 0 on success).
pub fn invoke_build(
    ctx: &InstallContext,
    tool: &str,
    args: &[String],
    env: &BTreeMap<String, String>,
    cwd: &Path,
) -> Result<i32, ExecuteError> {
    let rendered = display_command(tool, args);

    let mut cmd = Command::new(tool);
    cmd.args(args).envs(env).current_dir(cwd);

    let done = run_to_completion(ctx, cmd, &rendered, &format!("building with {}", tool))
        .map_err(|e| ExecuteError::Build {
            cmd: rendered.clone(),
            code: None,
            stderr: format!("failed to spawn {}: {}", tool, e),
        })?;

    if !done.success {
        return Err(ExecuteError::Build {
            cmd: rendered,
            code: done.code,
            stderr: done.stderr,
        });
    }
    Ok(done.code.unwrap_or(0))
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    fn ctx(dir: &Path) -> InstallContext {
        InstallContext::new(dir.join("prefix"), dir.join("work"))
    }

    #[test]
    fn test_args_are_passed_verbatim() {
        let tmp = tempfile::tempdir().unwrap();
        let args = vec![
            "-c".to_string(),
            "printf '%s' \"$1\" > out.txt".to_string(),
            "sh".to_string(),
            "VIRTUALENV=/a b/virtualenv.py -p /usr/bin/python3; rm -rf /".to_string(),
        ];
        let code = invoke_build(&ctx(tmp.path()), "sh", &args, &BTreeMap::new(), tmp.path()).unwrap();

        assert_eq!(code, 0);
        assert_eq!(
            std::fs::read_to_string(tmp.path().join("out.txt")).unwrap(),
            "VIRTUALENV=/a b/virtualenv.py -p /usr/bin/python3; rm -rf /"
        );
    }

    #[test]
    fn test_env_is_applied() {
        let tmp = tempfile::tempdir().unwrap();
        let mut env = BTreeMap::new();
        env.insert("FORMULA_TEST_VALUE".to_string(), "42".to_string());
        let args = vec!["-c".to_string(), "echo $FORMULA_TEST_VALUE > env.txt".to_string()];

        invoke_build(&ctx(tmp.path()), "sh", &args, &env, tmp.path()).unwrap();
        assert_eq!(
            std::fs::read_to_string(tmp.path().join("env.txt")).unwrap().trim(),
            "42"
        );
    }

    #[test]
    fn test_nonzero_exit_is_build_error_with_stderr() {
        let tmp = tempfile::tempdir().unwrap();
        let args = vec!["-c".to_string(), "echo 'no rule to make target' >&2; exit 2".to_string()];

        let err = invoke_build(&ctx(tmp.path()), "sh", &args, &BTreeMap::new(), tmp.path())
            .unwrap_err();
        match err {
            ExecuteError::Build { code, stderr, .. } => {
                assert_eq!(code, Some(2));
                assert!(stderr.contains("no rule to make target"));
            }
            other => panic!("expected build error, got {other}"),
        }
    }

    #[test]
    fn test_missing_tool_is_build_error() {
        let tmp = tempfile::tempdir().unwrap();
        let err = invoke_build(
            &ctx(tmp.path()),
            "definitely-not-a-real-build-tool",
            &[],
            &BTreeMap::new(),
            tmp.path(),
        )
        .unwrap_err();
        assert!(matches!(err, ExecuteError::Build { code: None, .. }));
    }
}
