//! Primary source acquisition - git clone at a pinned revision or branch, or a local tree.

use std::path::{Path, PathBuf};
use std::process::Command;

use crate::core::context::InstallContext;
use crate::core::output;
use crate::formula::{GitRef, Source};

use super::error::ExecuteError;
use super::util::{copy_tree, display_command, run_to_completion};

/// Only https://, http://, ssh://, git@ and file:// URLs are accepted.
fn validate_git_url(url: &str) -> Result<(), ExecuteError> {
    const SCHEMES: &[&str] = &["https://", "http://", "ssh://", "git@", "file://"];
    if SCHEMES.iter().any(|s| url.starts_with(s)) {
        Ok(())
    } else {
        Err(ExecuteError::Checkout {
            cmd: format!("git clone {}", url),
            stderr: format!(
                "unsupported git URL scheme; expected one of: {}",
                SCHEMES.join(", ")
            ),
        })
    }
}

/// Materialize `source` at `dest` (recreated empty). Returns `dest`.
pub fn checkout_source(
    ctx: &InstallContext,
    source: &Source,
    dest: &Path,
) -> Result<PathBuf, ExecuteError> {
    if dest.exists() {
        std::fs::remove_dir_all(dest)?;
    }
    if let Some(parent) = dest.parent() {
        std::fs::create_dir_all(parent)?;
    }

    match source {
        Source::Git { url, reference } => git_checkout(ctx, url, reference, dest)?,
        Source::Local { path } => {
            if !path.is_dir() {
                return Err(ExecuteError::Checkout {
                    cmd: format!("copy {}", path.display()),
                    stderr: "source directory does not exist".to_string(),
                });
            }
            output::detail(&format!("copying {}", path.display()));
            copy_tree(path, dest)?;
        }
    }

    Ok(dest.to_path_buf())
}

fn git_checkout(
    ctx: &InstallContext,
    url: &str,
    reference: &GitRef,
    dest: &Path,
) -> Result<(), ExecuteError> {
    validate_git_url(url)?;
    let dest_str = dest.to_string_lossy().into_owned();

    let clone_args: Vec<String> = match reference {
        GitRef::Branch(branch) => vec![
            "clone".into(),
            "--quiet".into(),
            "--depth".into(),
            "1".into(),
            "--branch".into(),
            branch.clone(),
            url.to_string(),
            dest_str,
        ],
        // A pinned commit may not be reachable from a shallow clone.
        GitRef::Revision(_) => vec![
            "clone".into(),
            "--quiet".into(),
            url.to_string(),
            dest_str,
        ],
    };
    run_git(ctx, None, &clone_args, &format!("cloning {}", url))?;

    if let GitRef::Revision(rev) = reference {
        let args = vec![
            "-c".to_string(),
            "advice.detachedHead=false".to_string(),
            "checkout".to_string(),
            "--quiet".to_string(),
            rev.clone(),
        ];
        run_git(ctx, Some(dest), &args, &format!("checking out {}", rev))?;
    }

    output::detail(&format!("checked out {}", dest.display()));
    Ok(())
}

fn run_git(
    ctx: &InstallContext,
    cwd: Option<&Path>,
    args: &[String],
    label: &str,
) -> Result<(), ExecuteError> {
    let rendered = display_command("git", args);
    let mut cmd = Command::new("git");
    cmd.args(args).env("GIT_TERMINAL_PROMPT", "0");
    if let Some(dir) = cwd {
        cmd.current_dir(dir);
    }

    let done = run_to_completion(ctx, cmd, &rendered, label).map_err(|e| {
        ExecuteError::Checkout {
            cmd: rendered.clone(),
            stderr: format!("failed to run git: {}", e),
        }
    })?;
    if !done.success {
        return Err(ExecuteError::Checkout {
            cmd: rendered,
            stderr: done.stderr,
        });
    }
    Ok(())
}
