//! Install context - the per-invocation paths and switches an install runs with.

use std::path::{Path, PathBuf};
use std::time::Duration;
use tempfile::TempDir;

use crate::config::Config;
use crate::formula::Formula;

/// Resolved for one install invocation and discarded afterwards.
#[derive(Debug, Clone)]
pub struct InstallContext {
    /// Installation prefix for this package
    pub prefix: PathBuf,
    /// System interpreter (`<host_prefix>/bin/<interpreter>`), if the build names one
    pub interpreter: Option<PathBuf>,
    /// Scratch directory holding downloads, resources and the source checkout
    pub work_dir: PathBuf,
    /// Parallel jobs hint, exposed to build args as `{jobs}`
    pub jobs: usize,
    pub http_timeout: Duration,
    pub require_checksums: bool,
    /// If true, report steps without executing them
    pub dry_run: bool,
    /// If true, echo external commands as they run
    pub verbose: bool,
}

impl InstallContext {
    pub fn new(prefix: impl Into<PathBuf>, work_dir: impl Into<PathBuf>) -> Self {
        Self {
            prefix: prefix.into(),
            interpreter: None,
            work_dir: work_dir.into(),
            jobs: num_cpus::get(),
            http_timeout: Duration::from_secs(30),
            require_checksums: false,
            dry_run: false,
            verbose: false,
        }
    }

    /// Build a context for `formula` from resolved configuration.
    pub fn from_config(
        config: &Config,
        formula: &Formula,
        prefix: impl Into<PathBuf>,
        work_dir: impl Into<PathBuf>,
    ) -> Self {
        let mut ctx = Self::new(prefix, work_dir);
        ctx.interpreter = formula
            .build
            .interpreter
            .as_ref()
            .map(|name| config.host_prefix.join("bin").join(name));
        ctx.http_timeout = config.http_timeout();
        ctx.require_checksums = config.require_checksums;
        ctx
    }

    pub fn interpreter(mut self, path: impl Into<PathBuf>) -> Self {
        self.interpreter = Some(path.into());
        self
    }

    pub fn dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    pub fn verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    pub fn require_checksums(mut self, require: bool) -> Self {
        self.require_checksums = require;
        self
    }

    pub fn downloads_dir(&self) -> PathBuf {
        self.work_dir.join("downloads")
    }

    pub fn resources_dir(&self) -> PathBuf {
        self.work_dir.join("resources")
    }

    pub fn source_dir(&self) -> PathBuf {
        self.work_dir.join("src")
    }
}

/// Owner of the scratch directory. Temporary ones are removed on drop.
#[derive(Debug)]
pub enum WorkDir {
    Temp(TempDir),
    Kept(PathBuf),
}

impl WorkDir {
    /// Create a fresh scratch directory under `root` (system temp dir if `None`).
    pub fn create(root: Option<&Path>, keep: bool) -> std::io::Result<Self> {
        let mut builder = tempfile::Builder::new();
        builder.prefix("formula-");
        let dir = match root {
            Some(root) => {
                std::fs::create_dir_all(root)?;
                builder.tempdir_in(root)?
            }
            None => builder.tempdir()?,
        };
        if keep {
            Ok(WorkDir::Kept(dir.keep()))
        } else {
            Ok(WorkDir::Temp(dir))
        }
    }

    pub fn path(&self) -> &Path {
        match self {
            WorkDir::Temp(dir) => dir.path(),
            WorkDir::Kept(path) => path,
        }
    }
}
