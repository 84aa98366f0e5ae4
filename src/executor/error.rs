//! Executor error types.

use std::path::PathBuf;
use thiserror::Error;

/// Errors a single install step (or the self-test) can fail with.
#[derive(Error, Debug)]
pub enum ExecuteError {
    #[error("download of {url} failed: {message}")]
    Network { url: String, message: String },

    #[error("download of {url} failed: HTTP {status}")]
    HttpStatus { url: String, status: u16 },

    #[error("sha256 integrity check failed for {}\n  expected: {expected}\n  got:      {actual}", path.display())]
    Integrity {
        path: PathBuf,
        expected: String,
        actual: String,
    },

    #[error("resource '{0}' has no sha256 and checksums are required")]
    MissingChecksum(String),

    #[error("cannot extract {}: {message}", path.display())]
    Archive { path: PathBuf, message: String },

    #[error("unsupported archive format: {}", .0.display())]
    UnsupportedFormat(PathBuf),

    #[error("source checkout failed: {cmd}\n{stderr}")]
    Checkout { cmd: String, stderr: String },

    #[error("build command failed: {cmd} (exit code: {code:?})\n{stderr}")]
    Build {
        cmd: String,
        code: Option<i32>,
        stderr: String,
    },

    #[error("cannot link {} -> {}: {reason}", link.display(), target.display())]
    Filesystem {
        link: PathBuf,
        target: PathBuf,
        reason: String,
    },

    #[error("self-test {cmd} failed (exit code: {code:?})\n{stderr}")]
    Test {
        cmd: String,
        code: Option<i32>,
        stderr: String,
    },

    #[error("unknown placeholder {{{0}}}")]
    UnknownPlaceholder(String),

    #[error("unterminated placeholder in '{0}'")]
    UnterminatedPlaceholder(String),

    #[error("formula uses {{interpreter}} but no interpreter is configured")]
    NoInterpreter,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl ExecuteError {
    /// Exit code of the underlying tool, when there is one.
    pub fn tool_exit_code(&self) -> Option<i32> {
        match self {
            ExecuteError::Build { code, .. } | ExecuteError::Test { code, .. } => *code,
            _ => None,
        }
    }
}

/// The first failing step of an install, with its position in the plan.
#[derive(Error, Debug)]
#[error("step {index} ({step}) failed: {source}")]
pub struct InstallError {
    /// 1-based position in the plan
    pub index: usize,
    pub step: String,
    #[source]
    pub source: ExecuteError,
}

impl InstallError {
    /// Process exit code to report: the tool's own non-zero code, else 1.
    pub fn exit_code(&self) -> i32 {
        match self.source.tool_exit_code() {
            Some(code) if code != 0 => code,
            _ => 1,
        }
    }
}

/// Map a failure code onto a process exit status. Codes outside 1..=255 become 1.
pub fn failure_exit_status(code: i32) -> u8 {
    u8::try_from(code).ok().filter(|c| *c != 0).unwrap_or(1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failure_exit_status() {
        assert_eq!(failure_exit_status(3), 3);
        assert_eq!(failure_exit_status(255), 255);
        assert_eq!(failure_exit_status(0), 1);
        assert_eq!(failure_exit_status(256), 1);
        assert_eq!(failure_exit_status(-1), 1);
    }

    #[test]
    fn test_exit_code_propagates_build_code() {
        let err = InstallError {
            index: 3,
            step: "build make".into(),
            source: ExecuteError::Build {
                cmd: "make install".into(),
                code: Some(2),
                stderr: "boom".into(),
            },
        };
        assert_eq!(err.exit_code(), 2);
        let msg = err.to_string();
        assert!(msg.contains("step 3 (build make)"));
        assert!(msg.contains("boom"));
    }

    #[test]
    fn test_exit_code_defaults_to_one() {
        let err = InstallError {
            index: 1,
            step: "fetch x".into(),
            source: ExecuteError::HttpStatus {
                url: "http://x".into(),
                status: 404,
            },
        };
        assert_eq!(err.exit_code(), 1);
    }

    #[test]
    fn test_placeholder_message_shows_braces() {
        let err = ExecuteError::UnknownPlaceholder("nope".into());
        assert_eq!(err.to_string(), "unknown placeholder {nope}");
    }
}
