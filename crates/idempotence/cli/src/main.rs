//! idem - idempotence checks from the command line
//!
//! Runs setup scripts, build targets and documentation checks repeatedly and
//! reports whether re-running them left any observable change:
//! - `idem run` executes a YAML suite file
//! - `idem script` / `idem make` verify a single script or build targets
//! - `idem docs` checks a document for required sections
//! - `idem self-check` exercises the built-in file-system and state probes

use clap::{Parser, Subcommand};
use idempotence::{
    ProbeOptions, ProbeSpec, SuiteConfig, SuiteReport, SuiteRunner, VerifierConfig,
};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod error;
mod output;

use error::{CliError, CliResult};
use output::OutputFormat;

/// Idempotence verifier CLI
#[derive(Parser)]
#[command(name = "idem")]
#[command(about = "Verify that scripts and build targets are idempotent", long_about = None)]
#[command(version)]
struct Cli {
    /// Number of sequential runs per probe (at least 2)
    #[arg(short, long, global = true, env = "IDEM_RUNS")]
    runs: Option<u32>,

    /// Treat combined stdout/stderr as significant
    #[arg(long, global = true)]
    compare_output: bool,

    /// Stop at the first failing probe
    #[arg(long, global = true)]
    fail_fast: bool,

    /// Output format (text, json, yaml)
    #[arg(short, long, global = true, default_value = "text")]
    output: OutputFormat,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Available commands
#[derive(Subcommand)]
enum Commands {
    /// Run every probe of a suite file
    Run {
        /// Suite file path
        #[arg(short, long, env = "IDEM_SUITE", default_value = "idempotence.yaml")]
        suite: PathBuf,
    },

    /// Verify a single script
    Script {
        /// Script path
        path: PathBuf,

        /// Probe name (defaults to the script file name)
        #[arg(long)]
        name: Option<String>,

        /// Path to snapshot after every run (repeatable)
        #[arg(short, long)]
        watch: Vec<PathBuf>,

        /// Interpreter used to run the script
        #[arg(long, default_value = "bash")]
        shell: String,

        /// Downgrade failing runs to warnings
        #[arg(long)]
        tolerate_failure: bool,
    },

    /// Verify build targets (defaults: clean, format, lint, help, doctor)
    Make {
        /// Targets to run
        targets: Vec<String>,

        /// Directory containing the makefile
        #[arg(short = 'C', long)]
        dir: Option<PathBuf>,

        /// Path to snapshot after every run (repeatable)
        #[arg(short, long)]
        watch: Vec<PathBuf>,

        /// Downgrade failing runs to warnings
        #[arg(long)]
        tolerate_failure: bool,
    },

    /// Check a document for required sections
    Docs {
        /// Document path
        path: PathBuf,

        /// Required section (repeatable; defaults to the standard guide sections)
        #[arg(short, long = "section")]
        sections: Vec<String>,
    },

    /// Verify the built-in directory, file and configuration probes
    SelfCheck,
}

fn main() -> CliResult<()> {
    let cli = Cli::parse();

    // Logs go to stderr so json/yaml reports stay parseable.
    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| filter.into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .without_time()
                .with_writer(std::io::stderr),
        )
        .init();

    let report = match &cli.command {
        Commands::Run { suite } => {
            let suite = SuiteConfig::load(suite)?;
            run_suite(&cli, &suite)?
        }
        Commands::Script {
            path,
            name,
            watch,
            shell,
            tolerate_failure,
        } => {
            let mut suite = single_probe_suite(
                "script",
                ProbeSpec::Script {
                    name: name.clone(),
                    path: path.clone(),
                    options: probe_options(watch, *tolerate_failure),
                },
            );
            suite.settings.shell = shell.clone();
            run_suite(&cli, &suite)?
        }
        Commands::Make {
            targets,
            dir,
            watch,
            tolerate_failure,
        } => {
            let suite = single_probe_suite(
                "make",
                ProbeSpec::Make {
                    targets: targets.clone(),
                    dir: dir.clone(),
                    options: probe_options(watch, *tolerate_failure),
                },
            );
            run_suite(&cli, &suite)?
        }
        Commands::Docs { path, sections } => {
            let suite = single_probe_suite(
                "docs",
                ProbeSpec::Document {
                    path: path.clone(),
                    sections: sections.clone(),
                },
            );
            run_suite(&cli, &suite)?
        }
        Commands::SelfCheck => run_suite(&cli, &single_probe_suite("self-check", ProbeSpec::SelfCheck))?,
    };

    output::print_report(&report, cli.output)?;

    if !report.is_idempotent() {
        std::process::exit(1);
    }
    Ok(())
}

/// Ad-hoc suite whose relative paths resolve against the working directory.
fn single_probe_suite(name: &str, spec: ProbeSpec) -> SuiteConfig {
    SuiteConfig::new(name, vec![spec])
}

fn probe_options(watch: &[PathBuf], tolerate_failure: bool) -> ProbeOptions {
    ProbeOptions {
        watch: watch.to_vec(),
        tolerate_failure,
        ..Default::default()
    }
}

/// Suite settings overridden by command-line flags.
fn verifier_config(cli: &Cli, base: &VerifierConfig) -> CliResult<VerifierConfig> {
    let mut config = base.clone();
    if let Some(runs) = cli.runs {
        config.runs = runs;
    }
    if config.runs < 2 {
        return Err(CliError::InvalidInput(format!(
            "--runs must be at least 2, got {}",
            config.runs
        )));
    }
    config.compare_output |= cli.compare_output;
    config.fail_fast |= cli.fail_fast;
    Ok(config)
}

fn run_suite(cli: &Cli, suite: &SuiteConfig) -> CliResult<SuiteReport> {
    let config = verifier_config(cli, &suite.settings)?;
    tracing::debug!(?config, suite = %suite.name, "resolved configuration");
    Ok(SuiteRunner::new(config).run(suite)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_runs_override() {
        let cli = Cli::parse_from(["idem", "--runs", "5", "self-check"]);
        let config = verifier_config(&cli, &VerifierConfig::default()).unwrap();
        assert_eq!(config.runs, 5);
    }

    #[test]
    fn test_single_run_rejected() {
        let cli = Cli::parse_from(["idem", "self-check", "--runs", "1"]);
        assert!(matches!(
            verifier_config(&cli, &VerifierConfig::default()),
            Err(CliError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_flags_only_tighten() {
        let cli = Cli::parse_from(["idem", "self-check"]);
        let base = VerifierConfig {
            fail_fast: true,
            ..Default::default()
        };
        let config = verifier_config(&cli, &base).unwrap();
        assert!(config.fail_fast);
        assert!(!config.compare_output);
    }
}
