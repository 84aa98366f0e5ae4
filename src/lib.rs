//! Declarative package formula executor
//!
//! A formula is a TOML file describing one package: its metadata, the pinned
//! dependency archives it needs at build time, the primary source (a git
//! revision or branch, or a local tree), the build invocation, the links to
//! create inside the prefix and an optional self-test.
//!
//! The [`Executor`] turns a formula into an ordered list of [`InstallStep`]s
//! and runs them against an explicit [`InstallContext`]:
//!
//! 1. download and extract each resource
//! 2. check out the primary source
//! 3. invoke the build tool with a structured argument list
//! 4. create the links
//!
//! The first failing step aborts the run and is reported as an
//! [`InstallError`]. The self-test is a separate operation whose failure
//! never changes the outcome of a completed install.
//!
//! # Example Formula
//!
//! ```toml
//! name = "foolscrate"
//! version = "1.2"
//! depends_on = ["python3"]
//!
//! [source]
//! url = "https://github.com/alanfranz/foolscrate.git"
//! revision = "c9ed0803a3b71df3caff7b10da19c45fb27df114"
//!
//! [[resource]]
//! name = "virtualenv"
//! url = "https://pypi.python.org/packages/source/v/virtualenv/virtualenv-15.0.3.tar.gz"
//!
//! [build]
//! interpreter = "python3"
//! tool = "make"
//! args = ["install", "VIRTUALENV={resource.virtualenv}/virtualenv.py -p {interpreter}", "PREFIX={prefix}/env"]
//!
//! [[link]]
//! target = "env/bin/foolscrate"
//! link = "bin/foolscrate"
//!
//! [test]
//! command = "{prefix}/env/bin/run_all_tests"
//! ```
//!
//! # Placeholders
//!
//! - `{prefix}` - Installation prefix
//! - `{interpreter}` - `<host_prefix>/bin/<build.interpreter>`
//! - `{resource.<name>}` - Extracted top-level directory of a resource
//! - `{source_dir}` - Checked out primary source
//! - `{work_dir}` - Scratch directory of the run
//! - `{jobs}` - Number of CPUs
//! - `{name}`, `{version}` - Formula metadata

pub mod config;
pub mod core;
pub mod executor;
pub mod formula;

pub use config::{Config, ConfigError};
pub use crate::core::context::{InstallContext, WorkDir};
pub use crate::core::output;
pub use executor::{
    ExecuteError, Executor, InstallError, InstallReport, InstallStep, TestPolicy,
    failure_exit_status,
};
pub use formula::{Formula, FormulaError};
