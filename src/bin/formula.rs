//! Formula CLI - run declarative package formulas
//!
//! Usage:
//!   formula install <formula>      Fetch, build and link a package
//!   formula test <formula>         Run the installed package's self-test
//!   formula info <formula>         Show metadata and the install plan
//!   formula hash <file>            Print digests for pinning a resource

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use formula_runner::core::hash;
use formula_runner::{
    failure_exit_status, output, Config, Executor, Formula, InstallContext, InstallError,
    TestPolicy, WorkDir,
};
use owo_colors::OwoColorize;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

/// Default formulae directory (XDG compliant)
fn default_formula_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("formula/formulae")
}

#[derive(Parser)]
#[command(name = "formula")]
#[command(about = "Run declarative package formulas: fetch, extract, build, link")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Config file (defaults to $XDG_CONFIG_HOME/formula/config.toml)
    #[arg(long, global = true, env = "FORMULA_CONFIG")]
    config: Option<PathBuf>,

    /// Directory searched for `<name>.toml` when a bare name is given
    #[arg(long, global = true, env = "FORMULA_PATH")]
    formula_dir: Option<PathBuf>,

    /// Host package manager prefix; interpreters are looked up in <host-prefix>/bin
    #[arg(long, global = true, env = "FORMULA_HOST_PREFIX")]
    host_prefix: Option<PathBuf>,

    /// Installation prefix (defaults to <cellar>/<name>/<version>)
    #[arg(short, long, global = true)]
    prefix: Option<PathBuf>,

    /// HTTP timeout in seconds
    #[arg(long, global = true, env = "FORMULA_HTTP_TIMEOUT")]
    http_timeout: Option<u64>,

    /// Echo external commands and stream their output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Install a package from its formula
    Install {
        /// Formula name or path to a formula file
        formula: String,

        /// Build the development head instead of the pinned revision
        #[arg(long)]
        head: bool,

        /// Parent directory for the scratch work dir
        #[arg(short, long)]
        work_dir: Option<PathBuf>,

        /// Do not delete the scratch work dir afterwards
        #[arg(long)]
        keep_work_dir: bool,

        /// Refuse resources without a sha256
        #[arg(long)]
        require_checksums: bool,

        /// Run the self-test after a successful install
        #[arg(long)]
        test: bool,

        /// Show the plan without executing it
        #[arg(short = 'n', long)]
        dry_run: bool,
    },

    /// Run the self-test of an installed package
    Test {
        /// Formula name or path to a formula file
        formula: String,

        /// Test the head install
        #[arg(long)]
        head: bool,
    },

    /// Show formula metadata and its install plan
    Info {
        /// Formula name or path to a formula file
        formula: String,

        /// Print the formula as JSON
        #[arg(long)]
        json: bool,
    },

    /// Print sha256, sha512 and blake3 of a file
    Hash {
        file: PathBuf,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(cli) {
        Ok(code) => code,
        Err(e) => {
            output::error(&format!("{:#}", e));
            match e.downcast_ref::<InstallError>() {
                Some(install) => ExitCode::from(failure_exit_status(install.exit_code())),
                None => ExitCode::FAILURE,
            }
        }
    }
}

fn run(cli: Cli) -> Result<ExitCode> {
    let config = load_config(&cli)?;
    let formula_dir = cli.formula_dir.clone().unwrap_or_else(default_formula_dir);

    match &cli.command {
        Commands::Install {
            formula,
            head,
            work_dir,
            keep_work_dir,
            require_checksums,
            test,
            dry_run,
        } => {
            let formula = load_formula(formula, &formula_dir, *head)?;
            let work = WorkDir::create(
                work_dir.as_deref().or(config.work_root.as_deref()),
                *keep_work_dir || config.keep_work_dir,
            )
            .context("Failed to create work directory")?;

            let ctx = context_for(&cli, &config, &formula, work.path())
                .require_checksums(*require_checksums || config.require_checksums)
                .dry_run(*dry_run);
            let executor = Executor::new(ctx);

            let report = executor.install(&formula)?;
            for link in &report.links {
                output::detail(&format!("linked {}", link.display()));
            }
            if let WorkDir::Kept(path) = &work {
                output::info(&format!("work dir kept at {}", path.display()));
            }

            if *test {
                let outcome = executor.run_self_test(&formula);
                if let Err(e) = &outcome {
                    output::warning(&format!("self-test failed: {}", e));
                }
                return Ok(ExitCode::from(TestPolicy::Advisory.exit_status(&outcome)));
            }
            Ok(ExitCode::SUCCESS)
        }

        Commands::Test { formula, head } => {
            let formula = load_formula(formula, &formula_dir, *head)?;
            let ctx = context_for(&cli, &config, &formula, &std::env::temp_dir());
            if !ctx.prefix.is_dir() {
                anyhow::bail!(
                    "{} is not installed at {}",
                    formula.name,
                    ctx.prefix.display()
                );
            }

            let outcome = Executor::new(ctx).run_self_test(&formula);
            match &outcome {
                Ok(None) => output::skip(&format!("{} defines no self-test", formula.name)),
                Ok(Some(_)) => {}
                Err(e) => output::error(&e.to_string()),
            }
            Ok(ExitCode::from(TestPolicy::Strict.exit_status(&outcome)))
        }

        Commands::Info { formula, json } => {
            let formula = load_formula(formula, &formula_dir, false)?;
            if *json {
                println!("{}", serde_json::to_string_pretty(&formula)?);
                return Ok(ExitCode::SUCCESS);
            }
            let ctx = context_for(&cli, &config, &formula, Path::new("<work>"));
            show_info(&formula, &Executor::new(ctx))?;
            Ok(ExitCode::SUCCESS)
        }

        Commands::Hash { file } => {
            let hashes = hash::compute_all_hashes(file)
                .with_context(|| format!("Failed to hash {}", file.display()))?;
            println!("sha256 = \"{}\"", hashes.sha256);
            println!("sha512 = \"{}\"", hashes.sha512);
            println!("blake3 = \"{}\"", hashes.blake3);
            Ok(ExitCode::SUCCESS)
        }
    }
}

/// Defaults, then the config file, then flags/environment.
fn load_config(cli: &Cli) -> Result<Config> {
    let mut config = match cli.config.clone().or_else(Config::default_path) {
        Some(path) => Config::load(&path)?,
        None => Config::default(),
    };
    if let Some(host_prefix) = &cli.host_prefix {
        config = config.with_host_prefix(host_prefix);
    }
    if let Some(secs) = cli.http_timeout {
        config.http_timeout_secs = secs;
    }
    Ok(config)
}

fn context_for(cli: &Cli, config: &Config, formula: &Formula, work_dir: &Path) -> InstallContext {
    let prefix = cli
        .prefix
        .clone()
        .unwrap_or_else(|| config.prefix_for(&formula.name, &formula.version));
    InstallContext::from_config(config, formula, prefix, work_dir).verbose(cli.verbose)
}

/// Validate a formula name to prevent path traversal
fn validate_formula_name(name: &str) -> Result<()> {
    if name.is_empty() {
        anyhow::bail!("Formula name cannot be empty");
    }
    if !name
        .chars()
        .all(|c| c.is_alphanumeric() || c == '_' || c == '-' || c == '.')
        || name.starts_with('.')
    {
        anyhow::bail!(
            "Invalid formula name '{}': only alphanumeric characters, '.', '_' and '-' are allowed",
            name
        );
    }
    Ok(())
}

/// Resolve a formula name or path and load it
fn load_formula(arg: &str, formula_dir: &Path, head: bool) -> Result<Formula> {
    let is_explicit_path = arg.contains('/') || arg.contains('\\') || arg.ends_with(".toml");

    let path = if is_explicit_path {
        PathBuf::from(arg)
    } else {
        validate_formula_name(arg)?;
        formula_dir.join(format!("{}.toml", arg))
    };
    if !path.exists() {
        anyhow::bail!("Formula not found: {}", path.display());
    }

    let formula = Formula::load(&path)
        .with_context(|| format!("Failed to load formula {}", path.display()))?;
    if head {
        return Ok(formula.into_head()?);
    }
    Ok(formula)
}

fn show_info(formula: &Formula, executor: &Executor) -> Result<()> {
    println!("{} {}", formula.name.bold(), formula.version);
    if let Some(desc) = &formula.desc {
        println!("{}", desc);
    }
    if let Some(homepage) = &formula.homepage {
        println!("{}", homepage.cyan());
    }
    println!("{} {}", "source:".dimmed(), formula.source.describe());
    if let Some(head) = &formula.head {
        println!("{} {}", "head:".dimmed(), head.describe());
    }
    if !formula.depends_on.is_empty() {
        println!("{} {}", "depends on:".dimmed(), formula.depends_on.join(", "));
    }
    println!(
        "{} {}",
        "prefix:".dimmed(),
        executor.context().prefix.display()
    );

    output::info("Install plan:");
    let steps = executor.plan(formula)?;
    for (i, step) in steps.iter().enumerate() {
        println!("  {}. {}", i + 1, step);
    }
    Ok(())
}
