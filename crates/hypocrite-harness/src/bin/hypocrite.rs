//! CLI entrypoint for the hypocrite runner.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use hypocrite_harness::{RunConfig, TestRunner, selftest, structured_log};

/// Unit-testing runtime for C-like code.
#[derive(Debug, Parser)]
#[command(name = "hypocrite")]
#[command(about = "Run hypocrite test suites and check their run logs")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run the built-in suite through the runner.
    Selftest {
        /// JSONL trace output path (overrides HYPOCRITE_LOG).
        #[arg(long)]
        log: Option<PathBuf>,
        /// Only run tests whose name contains this substring (overrides HYPOCRITE_FILTER).
        #[arg(long)]
        filter: Option<String>,
        /// Run identifier for trace ids (overrides HYPOCRITE_RUN_ID).
        #[arg(long)]
        run_id: Option<String>,
        /// Append tests that fail on purpose, including a FATAL one.
        #[arg(long, default_value_t = false)]
        demo_failures: bool,
    },
    /// Validate a JSONL run trace.
    ValidateLog {
        /// Trace path.
        #[arg(long)]
        log: PathBuf,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    match cli.command {
        Command::Selftest {
            log,
            filter,
            run_id,
            demo_failures,
        } => {
            let mut config = RunConfig::from_env();
            if let Some(path) = log {
                config = config.with_log_path(path);
            }
            if let Some(filter) = filter {
                config = config.with_filter(filter);
            }
            if let Some(run_id) = run_id {
                config = config.with_run_id(run_id);
            }

            let suite = selftest::suite(demo_failures)?;
            let mut runner = TestRunner::from_config(config)?;
            let summary = runner.run(&suite)?;
            eprintln!(
                "{}: {} passed, {} failed, {} skipped, {} not run",
                summary.file,
                summary.passed(),
                summary.failed(),
                summary.skipped,
                summary.declared - summary.skipped - summary.attempted(),
            );
            if summary.aborted {
                eprintln!("run aborted by FATAL");
            }
            let code = summary.exit_code();
            if code != 0 {
                std::process::exit(code);
            }
        }
        Command::ValidateLog { log } => {
            let (lines, errors) = structured_log::validate_log_file(&log)?;
            for err in &errors {
                eprintln!("{err}");
            }
            if !errors.is_empty() {
                return Err(format!(
                    "{} invalid field(s) in {} line(s) of {}",
                    errors.len(),
                    lines,
                    log.display()
                )
                .into());
            }
            eprintln!("{}: {lines} valid line(s)", log.display());
        }
    }

    Ok(())
}
