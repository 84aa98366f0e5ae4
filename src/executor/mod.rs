//! Formula executor - plans and runs the ordered install steps of a formula.
//!
//! A run is strictly linear: download and extract each resource, check out
//! the primary source, invoke the build, create links. The first failing
//! step aborts the run; nothing already done is rolled back.

mod build;
mod checkout;
mod error;
mod extract;
mod fetch;
mod link;
mod selftest;
mod template;
mod util;

pub use build::invoke_build;
pub use checkout::checkout_source;
pub use error::{ExecuteError, InstallError, failure_exit_status};
pub use extract::{ArchiveFormat, extract_archive};
pub use fetch::{fetch_dependency_archive, url_filename, verify_sha256};
pub use link::create_symlink;
pub use selftest::{TestPolicy, run_self_test};

use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

use crate::core::context::InstallContext;
use crate::core::{lock, output};
use crate::formula::{Formula, Source};

use template::Vars;

/// One action of an install plan. Build arguments are kept as templates and
/// expanded when the step runs, once resource directories are known.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InstallStep {
    Download {
        resource: String,
        url: String,
        sha256: Option<String>,
        dest_dir: PathBuf,
    },
    Extract {
        resource: String,
        archive: PathBuf,
        dest: PathBuf,
    },
    Checkout {
        source: Source,
        dest: PathBuf,
    },
    Build {
        tool: String,
        args: Vec<String>,
        env: BTreeMap<String, String>,
    },
    Symlink {
        target: PathBuf,
        link: PathBuf,
    },
}

impl fmt::Display for InstallStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InstallStep::Download { resource, .. } => write!(f, "download {}", resource),
            InstallStep::Extract { resource, .. } => write!(f, "extract {}", resource),
            InstallStep::Checkout { source, .. } => write!(f, "checkout {}", source.describe()),
            InstallStep::Build { tool, args, .. } => {
                write!(f, "build {}", util::display_command(tool, args))
            }
            InstallStep::Symlink { target, link } => {
                write!(f, "link {} -> {}", link.display(), target.display())
            }
        }
    }
}

/// Outcome of a successful install.
#[derive(Debug, Clone)]
pub struct InstallReport {
    pub prefix: PathBuf,
    pub links: Vec<PathBuf>,
    pub steps: usize,
}

/// Values produced by earlier steps and consumed by later ones.
struct RunState {
    vars: Vars,
    source_dir: Option<PathBuf>,
    links: Vec<PathBuf>,
}

/// Runs formulas against one [`InstallContext`].
pub struct Executor {
    ctx: InstallContext,
}

impl Executor {
    pub fn new(ctx: InstallContext) -> Self {
        Self { ctx }
    }

    pub fn context(&self) -> &InstallContext {
        &self.ctx
    }

    /// Build the ordered step list for `formula` without touching the filesystem.
    pub fn plan(&self, formula: &Formula) -> Result<Vec<InstallStep>, ExecuteError> {
        let resource_names: Vec<&str> = formula.resources.iter().map(|r| r.name.as_str()).collect();
        let build_templates = formula.build.args.iter().chain(formula.build.env.values());
        for value in build_templates.clone() {
            template::check(value, template::BUILD_KEYS, &resource_names)?;
        }
        let test_templates: Vec<&String> = formula
            .test
            .iter()
            .flat_map(|t| std::iter::once(&t.command).chain(t.args.iter()))
            .collect();
        for value in &test_templates {
            template::check(value, template::TEST_KEYS, &[])?;
        }

        if self.ctx.interpreter.is_none() {
            for value in build_templates.chain(test_templates.iter().copied()) {
                if template::uses(value, "interpreter")? {
                    return Err(ExecuteError::NoInterpreter);
                }
            }
        }

        let mut steps = Vec::new();
        let downloads = self.ctx.downloads_dir();
        for resource in &formula.resources {
            if resource.sha256.is_none() && self.ctx.require_checksums {
                return Err(ExecuteError::MissingChecksum(resource.name.clone()));
            }
            steps.push(InstallStep::Download {
                resource: resource.name.clone(),
                url: resource.url.clone(),
                sha256: resource.sha256.clone(),
                dest_dir: downloads.clone(),
            });
            steps.push(InstallStep::Extract {
                resource: resource.name.clone(),
                archive: downloads.join(url_filename(&resource.url)),
                dest: self.ctx.resources_dir().join(&resource.name),
            });
        }

        steps.push(InstallStep::Checkout {
            source: formula.source.clone(),
            dest: self.ctx.source_dir(),
        });
        steps.push(InstallStep::Build {
            tool: formula.build.tool.clone(),
            args: formula.build.args.clone(),
            env: formula.build.env.clone(),
        });
        for link in &formula.links {
            steps.push(InstallStep::Symlink {
                target: link.target.clone(),
                link: link.link.clone(),
            });
        }

        Ok(steps)
    }

    /// Run every step of the plan in order. The error names the first failing step.
    pub fn install(&self, formula: &Formula) -> Result<InstallReport, InstallError> {
        let steps = self.plan(formula).map_err(|source| InstallError {
            index: 0,
            step: "plan".to_string(),
            source,
        })?;

        output::action(&format!(
            "Installing {} {} into {}",
            formula.name,
            formula.version,
            self.ctx.prefix.display()
        ));
        self.warn_missing_host_deps(formula);

        let _lock = if self.ctx.dry_run {
            None
        } else {
            Some(lock::acquire_prefix_lock(&self.ctx.prefix).map_err(|e| InstallError {
                index: 0,
                step: "lock prefix".to_string(),
                source: e.into(),
            })?)
        };

        let mut state = RunState {
            vars: self.base_vars(formula),
            source_dir: None,
            links: Vec::new(),
        };

        let total = steps.len();
        for (i, step) in steps.iter().enumerate() {
            output::step(i + 1, total, &step.to_string());
            if self.ctx.dry_run {
                continue;
            }
            self.run_step(step, &mut state).map_err(|source| InstallError {
                index: i + 1,
                step: step.to_string(),
                source,
            })?;
        }

        if self.ctx.dry_run {
            output::skip("dry run, nothing was changed");
        } else {
            output::success(&format!("{} {} installed", formula.name, formula.version));
        }

        Ok(InstallReport {
            prefix: self.ctx.prefix.clone(),
            links: state.links,
            steps: total,
        })
    }

    /// Run the formula's self-test against the installed prefix.
    ///
    /// Returns `Ok(None)` when the formula defines no test.
    pub fn run_self_test(&self, formula: &Formula) -> Result<Option<i32>, ExecuteError> {
        let Some(test) = &formula.test else {
            return Ok(None);
        };
        let vars = self.base_vars(formula);
        let command = vars.expand(&test.command)?;
        let args = vars.expand_all(&test.args)?;

        output::action(&format!("Testing {}", formula.name));
        if self.ctx.dry_run {
            output::command("dry-run", &util::display_command(&command, &args));
            return Ok(Some(0));
        }
        let code = selftest::run_self_test(&self.ctx, &command, &args)?;
        output::success(&format!("{} self-test passed", formula.name));
        Ok(Some(code))
    }

    fn base_vars(&self, formula: &Formula) -> Vars {
        let mut vars = Vars::default();
        vars.set("prefix", self.ctx.prefix.to_string_lossy());
        vars.set("work_dir", self.ctx.work_dir.to_string_lossy());
        vars.set("jobs", self.ctx.jobs.to_string());
        vars.set("name", formula.name.as_str());
        vars.set("version", formula.version.as_str());
        if let Some(interpreter) = &self.ctx.interpreter {
            vars.set("interpreter", interpreter.to_string_lossy());
        }
        vars
    }

    fn warn_missing_host_deps(&self, formula: &Formula) {
        if let Some(interpreter) = &self.ctx.interpreter
            && !interpreter.exists()
        {
            output::warning(&format!(
                "interpreter {} not found; depends_on: {}",
                interpreter.display(),
                formula.depends_on.join(", ")
            ));
        }
    }

    fn run_step(&self, step: &InstallStep, state: &mut RunState) -> Result<(), ExecuteError> {
        match step {
            InstallStep::Download {
                resource,
                url,
                sha256,
                dest_dir,
            } => {
                let path = fetch_dependency_archive(url, dest_dir, self.ctx.http_timeout)?;
                match sha256 {
                    Some(expected) => verify_sha256(&path, expected)?,
                    None => output::warning(&format!(
                        "resource '{}' has no sha256; its contents are not verified",
                        resource
                    )),
                }
            }
            InstallStep::Extract {
                resource,
                archive,
                dest,
            } => {
                let root = extract_archive(archive, dest)?;
                state
                    .vars
                    .set(format!("resource.{}", resource), root.to_string_lossy());
            }
            InstallStep::Checkout { source, dest } => {
                let dir = checkout_source(&self.ctx, source, dest)?;
                state.vars.set("source_dir", dir.to_string_lossy());
                state.source_dir = Some(dir);
            }
            InstallStep::Build { tool, args, env } => {
                let args = state.vars.expand_all(args)?;
                let env = env
                    .iter()
                    .map(|(k, v)| Ok((k.clone(), state.vars.expand(v)?)))
                    .collect::<Result<BTreeMap<_, _>, ExecuteError>>()?;
                let cwd = state
                    .source_dir
                    .clone()
                    .unwrap_or_else(|| self.ctx.source_dir());
                invoke_build(&self.ctx, tool, &args, &env, &cwd)?;
            }
            InstallStep::Symlink { target, link } => {
                let path = create_symlink(&self.ctx.prefix, target, link)?;
                state.links.push(path);
            }
        }
        Ok(())
    }
}
