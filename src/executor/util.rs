//! Utility functions for the executor.

use std::path::Path;
use std::process::{Command, Output, Stdio};

use crate::core::context::InstallContext;
use crate::core::output::{self, ProgressGuard};

/// Shell-quote a value for display. Commands are never run through a shell.
pub fn shell_quote(s: impl std::fmt::Display) -> String {
    let s = s.to_string();
    if !s.is_empty()
        && s.chars().all(|c| {
            c.is_alphanumeric() || matches!(c, '_' | '-' | '.' | '/' | '=' | ':' | ',' | '+' | '@')
        })
    {
        s
    } else {
        format!("'{}'", s.replace('\'', "'\"'\"'"))
    }
}

/// Render a program and its arguments as a copy-pasteable line.
pub fn display_command<S: AsRef<str>>(program: &str, args: &[S]) -> String {
    std::iter::once(shell_quote(program))
        .chain(args.iter().map(|a| shell_quote(a.as_ref())))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Result of running an external process to completion.
#[derive(Debug)]
pub struct Finished {
    pub code: Option<i32>,
    pub success: bool,
    /// Captured stderr; empty when output was streamed to the terminal.
    pub stderr: String,
}

/// Run `cmd` to completion.
///
/// In verbose mode the child inherits the terminal so its output streams
/// live; otherwise output is captured behind a spinner and stderr is kept for
/// error reporting.
pub fn run_to_completion(
    ctx: &InstallContext,
    mut cmd: Command,
    rendered: &str,
    label: &str,
) -> std::io::Result<Finished> {
    if ctx.verbose {
        output::command("exec", rendered);
        let status = cmd
            .stdin(Stdio::null())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .status()?;
        return Ok(Finished {
            code: status.code(),
            success: status.success(),
            stderr: String::new(),
        });
    }

    let _guard = ProgressGuard::new(output::spinner(label));
    let Output { status, stderr, .. } = cmd.stdin(Stdio::null()).output()?;
    Ok(Finished {
        code: status.code(),
        success: status.success(),
        stderr: String::from_utf8_lossy(&stderr).into_owned(),
    })
}

/// Recursively copy a directory tree, preserving symlinks as symlinks.
pub fn copy_tree(src: &Path, dest: &Path) -> std::io::Result<()> {
    for entry in walkdir::WalkDir::new(src).follow_links(false) {
        let entry = entry.map_err(std::io::Error::other)?;
        let rel = entry
            .path()
            .strip_prefix(src)
            .map_err(std::io::Error::other)?;
        let target = dest.join(rel);
        let file_type = entry.file_type();

        if file_type.is_dir() {
            std::fs::create_dir_all(&target)?;
        } else if file_type.is_symlink() {
            let link = std::fs::read_link(entry.path())?;
            #[cfg(unix)]
            std::os::unix::fs::symlink(&link, &target)?;
            #[cfg(not(unix))]
            std::fs::copy(entry.path().parent().unwrap_or(src).join(&link), &target)
                .map(|_| ())?;
        } else {
            std::fs::copy(entry.path(), &target)?;
        }
    }
    Ok(())
}
