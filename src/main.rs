use anyhow::{Context, Result};
use clap::Parser;
use colored::Colorize;
use postgen::{ConfigModel, ConfigOverrides, MaterializeError, Orchestrator, RunOptions};
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "Materialize a generated project skeleton from its resolved template answers",
    long_about = None
)]
struct Args {
    /// Working tree produced by the template (defaults to current directory)
    #[arg(default_value = ".")]
    root: PathBuf,

    /// Resolved answers as a JSON template context or a TOML file
    #[arg(long, short)]
    config: Option<PathBuf>,

    #[command(flatten)]
    overrides: ConfigOverrides,

    /// Skip env file, dependency install, formatting and git steps
    #[arg(long)]
    no_external: bool,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(long, short, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Only print errors
    #[arg(long, short, conflicts_with = "verbose")]
    quiet: bool,
}

/// Process exit codes
#[repr(u8)]
enum Exit {
    Success = 0,
    GeneralError = 1,
    InvalidConfig = 2,
    IoError = 3,
}

impl From<Exit> for ExitCode {
    fn from(exit: Exit) -> Self {
        ExitCode::from(exit as u8)
    }
}

fn init_tracing(args: &Args) {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| match args.verbose {
        0 if args.quiet => EnvFilter::new("error"),
        0 => EnvFilter::new("warn"),
        1 => EnvFilter::new("info"),
        2 => EnvFilter::new("debug"),
        _ => EnvFilter::new("trace"),
    });

    tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(args.verbose >= 2),
        )
        .init();
}

fn run(args: &Args) -> Result<()> {
    let base = match &args.config {
        Some(path) => Some(ConfigModel::from_path(path)?),
        None => None,
    };
    let config = args.overrides.apply(base)?;

    let orchestrator = Orchestrator::new(&args.root, config)
        .context("Failed to load prune rules")?
        .with_options(RunOptions {
            external: !args.no_external,
            quiet: args.quiet,
        });
    orchestrator.run()?;

    Ok(())
}

fn exit_code(err: &anyhow::Error) -> Exit {
    match err.downcast_ref::<MaterializeError>() {
        Some(MaterializeError::InvalidConfig(_)) => Exit::InvalidConfig,
        Some(MaterializeError::Io { .. }) | Some(MaterializeError::Rollback { .. }) => {
            Exit::IoError
        }
        _ => Exit::GeneralError,
    }
}

fn main() -> ExitCode {
    let args = Args::parse();
    init_tracing(&args);

    match run(&args) {
        Ok(()) => Exit::Success.into(),
        Err(err) => {
            eprintln!("{} {:#}", "Error:".red().bold(), err);
            exit_code(&err).into()
        }
    }
}
