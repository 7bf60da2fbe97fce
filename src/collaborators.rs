//! External steps run after the tree is materialized.
//!
//! None of these feed anything back into the engine. Each returns a
//! [`StepOutcome`]; a failure is a warning for the user, never an error for the run.

use crate::config::{ConfigModel, ProjectType};
use crate::pruner::{PruneReport, RemovalReason};

use colored::Colorize;
use humansize::{format_size, BINARY};
use indicatif::{ProgressBar, ProgressStyle};
use std::fs;
use std::io;
use std::path::Path;
use std::process::{Command, Output};
use std::time::Duration;
use tracing::{debug, warn};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepStatus {
    Done,
    Skipped(String),
    Failed(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepOutcome {
    pub step: &'static str,
    pub status: StepStatus,
}

impl StepOutcome {
    fn done(step: &'static str) -> Self {
        StepOutcome {
            step,
            status: StepStatus::Done,
        }
    }

    fn skipped(step: &'static str, reason: impl Into<String>) -> Self {
        StepOutcome {
            step,
            status: StepStatus::Skipped(reason.into()),
        }
    }

    fn failed(step: &'static str, reason: impl Into<String>) -> Self {
        let reason = reason.into();
        warn!(step, "{}", reason);
        eprintln!("{}", format!("⚠ {}", reason).yellow());
        StepOutcome {
            step,
            status: StepStatus::Failed(reason),
        }
    }

    pub fn is_failure(&self) -> bool {
        matches!(self.status, StepStatus::Failed(_))
    }
}

enum ToolError {
    NotFound,
    Failed(String),
}

/// Run `program args...` inside `root`, capturing output.
fn run_tool(root: &Path, program: &str, args: &[&str]) -> Result<Output, ToolError> {
    debug!(cwd = %root.display(), "running {} {}", program, args.join(" "));
    let output = Command::new(program)
        .args(args)
        .current_dir(root)
        .output()
        .map_err(|err| {
            if err.kind() == io::ErrorKind::NotFound {
                ToolError::NotFound
            } else {
                ToolError::Failed(format!("{} {}: {}", program, args.join(" "), err))
            }
        })?;
    Ok(output)
}

/// Like [`run_tool`], but a non-zero exit status is a failure.
fn run_checked(root: &Path, program: &str, args: &[&str]) -> Result<Output, ToolError> {
    let output = run_tool(root, program, args)?;
    if output.status.success() {
        Ok(output)
    } else {
        let stderr = String::from_utf8_lossy(&output.stderr);
        Err(ToolError::Failed(format!(
            "{} {} exited with {}: {}",
            program,
            args.join(" "),
            output.status,
            stderr.trim()
        )))
    }
}

fn success(message: &str, quiet: bool) {
    if !quiet {
        println!("{}", message.green());
    }
}

fn spinner(message: &str, quiet: bool) -> ProgressBar {
    if quiet {
        return ProgressBar::hidden();
    }
    let progress = ProgressBar::new_spinner();
    if let Ok(style) =
        ProgressStyle::default_spinner().template("{spinner:.green} [{elapsed_precise}] {msg}")
    {
        progress.set_style(style);
    }
    progress.set_message(message.to_string());
    progress.enable_steady_tick(Duration::from_millis(100));
    progress
}

/// Copy `dist.env` to `.env`, replacing any existing `.env`.
pub fn create_env_file(root: &Path, quiet: bool) -> StepOutcome {
    const STEP: &str = "env file";
    let source = root.join("dist.env");
    if !source.is_file() {
        return StepOutcome::skipped(STEP, "no dist.env in project");
    }
    match fs::copy(&source, root.join(".env")) {
        Ok(_) => {
            success("✓ Created .env file from dist.env", quiet);
            StepOutcome::done(STEP)
        }
        Err(err) => {
            StepOutcome::failed(STEP, format!("Failed to create .env from dist.env: {}", err))
        }
    }
}

/// Lock and sync the project's dependencies with uv.
pub fn install_dependencies(root: &Path, quiet: bool) -> StepOutcome {
    const STEP: &str = "dependencies";
    match run_tool(root, "uv", &["--version"]) {
        Ok(_) => {}
        Err(ToolError::NotFound) => {
            return StepOutcome::failed(
                STEP,
                "uv not found. Please install uv and run 'uv lock && uv sync' \
                 to install dependencies",
            )
        }
        Err(ToolError::Failed(reason)) => return StepOutcome::failed(STEP, reason),
    }

    let progress = spinner("Installing dependencies...", quiet);
    let result = run_checked(root, "uv", &["lock"]).and_then(|_| {
        progress.set_message("Created uv.lock, syncing...");
        run_checked(root, "uv", &["sync"])
    });
    progress.finish_and_clear();

    match result {
        Ok(_) => {
            success("✓ Dependencies installed successfully!", quiet);
            StepOutcome::done(STEP)
        }
        Err(ToolError::NotFound) => StepOutcome::failed(STEP, "uv disappeared during install"),
        Err(ToolError::Failed(reason)) => {
            StepOutcome::failed(STEP, format!("Failed to install dependencies: {}", reason))
        }
    }
}

/// Format with ruff, then lint with autofix. Remaining lint findings are a warning.
pub fn format_and_lint(root: &Path, quiet: bool) -> StepOutcome {
    const STEP: &str = "format and lint";
    let progress = spinner("Running formatter and linter...", quiet);

    let formatted = run_checked(root, "uv", &["run", "ruff", "format", "."]);
    let linted = match formatted {
        Ok(_) => run_tool(root, "uv", &["run", "ruff", "check", ".", "--fix"]),
        Err(err) => Err(err),
    };
    progress.finish_and_clear();

    match linted {
        Ok(output) if output.status.success() => {
            success("✓ Code formatted and linted successfully", quiet);
            StepOutcome::done(STEP)
        }
        Ok(output) => StepOutcome::failed(
            STEP,
            format!(
                "Linting found some issues:\n{}{}",
                String::from_utf8_lossy(&output.stdout),
                String::from_utf8_lossy(&output.stderr)
            ),
        ),
        Err(ToolError::NotFound) => {
            StepOutcome::failed(STEP, "uv or ruff not found, skipping linting/formatting")
        }
        Err(ToolError::Failed(reason)) => {
            StepOutcome::failed(STEP, format!("Failed to run linter/formatter: {}", reason))
        }
    }
}

/// Create a repository holding everything materialized so far.
pub fn initialize_git(root: &Path, config: &ConfigModel, quiet: bool) -> StepOutcome {
    const STEP: &str = "git";
    if !config.initialize_git {
        return StepOutcome::skipped(STEP, "not requested");
    }

    let result = run_checked(root, "git", &["init"])
        .and_then(|_| run_checked(root, "git", &["add", "."]))
        .and_then(|_| {
            run_checked(
                root,
                "git",
                &["commit", "-m", "Initial commit from project template"],
            )
        });

    match result {
        Ok(_) => {
            success("✓ Initialized git repository with an initial commit", quiet);
            StepOutcome::done(STEP)
        }
        Err(ToolError::NotFound) => {
            StepOutcome::failed(STEP, "Git not found, skipping repository initialization")
        }
        Err(ToolError::Failed(reason)) => {
            StepOutcome::failed(STEP, format!("Failed to initialize git repository: {}", reason))
        }
    }
}

/// Install pre-commit hooks when requested and the project has a config and a repository.
pub fn install_pre_commit_hooks(root: &Path, config: &ConfigModel, quiet: bool) -> StepOutcome {
    const STEP: &str = "pre-commit hooks";
    if !config.use_pre_commit {
        return StepOutcome::skipped(STEP, "not requested");
    }
    if !root.join(".pre-commit-config.yaml").is_file() {
        return StepOutcome::skipped(STEP, "no .pre-commit-config.yaml");
    }
    if !root.join(".git").exists() {
        return StepOutcome::failed(
            STEP,
            "Skipping pre-commit hooks installation (git not initialized)",
        );
    }
    match run_checked(root, "uv", &["run", "pre-commit", "install"]) {
        Ok(_) => {
            success("✓ Pre-commit hooks installed", quiet);
            StepOutcome::done(STEP)
        }
        Err(ToolError::NotFound) => {
            StepOutcome::failed(STEP, "uv not found, skipping pre-commit hooks")
        }
        Err(ToolError::Failed(reason)) => {
            StepOutcome::failed(STEP, format!("Failed to install pre-commit hooks: {}", reason))
        }
    }
}

/// Everything the closing summary reports.
pub struct Summary<'a> {
    pub project_name: &'a str,
    pub config: &'a ConfigModel,
    pub root: &'a Path,
    pub prune: &'a PruneReport,
    pub normalized: usize,
    pub warnings: &'a [StepOutcome],
}

pub fn print_summary(summary: &Summary<'_>) {
    let config = summary.config;
    let name = summary.project_name;
    let image = name.to_lowercase();
    let rule = "=".repeat(60);

    println!("\n{}", rule);
    println!("{}", format!("🎉 Project {} created successfully!", name).bold());
    println!("{}", rule);

    println!("\n📁 Project type: {}", config.project_type);
    if config.extract_to_parent {
        println!("   Project files extracted to {}", summary.root.display());
    } else {
        println!("   cd {}", name);
    }

    let removed_by_rules = summary
        .prune
        .removed
        .iter()
        .filter(|e| matches!(e.reason, RemovalReason::Rule(_)))
        .count();
    println!(
        "   Pruned {} paths ({}), removed {} empty placeholders, tidied {} files",
        removed_by_rules,
        format_size(summary.prune.total_bytes(), BINARY),
        summary.prune.count(&RemovalReason::EmptyFile)
            + summary.prune.count(&RemovalReason::EmptyDir),
        summary.normalized
    );

    println!("\n🚀 Next steps:");
    println!("   1. Review and update the .env file with your configuration");
    if config.project_type.has_database() {
        println!("   2. Set up your database:");
        println!("      - Run: make up-dependencies  # Start PostgreSQL container");
        println!(
            "      - Or ensure PostgreSQL is running locally and update DATABASE_URL in .env"
        );
        println!("      - Run: uv run alembic upgrade head  # Apply migrations");
    }

    println!("\n📖 Available commands:");
    println!("   - make lint            # Run linter and formatter");
    println!("   - make lint-no-format  # Run linter only");
    println!("   - make test            # Run tests");
    println!("   - make test-coverage   # Run tests with coverage report");
    println!("   - make run             # Run the application");

    if config.project_type.has_database() {
        println!("\n🗄️  Database commands:");
        println!("   - make up-dependencies   # Start PostgreSQL container");
        println!("   - make migration MSG='description'  # Create new migration");
        println!("   - make migrate           # Apply all migrations");
        println!("   - make upgrade           # Apply next migration");
        println!("   - make downgrade         # Rollback last migration");
    }

    if config.project_type.is_service() {
        println!("\n🌐 Once running, visit:");
        println!("   - http://localhost:8000       # API root");
        println!("   - http://localhost:8000/docs  # Interactive API documentation");
        println!("   - http://localhost:8000/redoc # Alternative API documentation");
    }

    if config.generate_local_telemetry_stack {
        println!("\n📈 Local telemetry stack:");
        println!("   - docker compose -f docker-compose.otel.yaml up -d");
    }

    println!("\n🐳 Docker available:");
    println!("   - docker build -t {} .", image);
    match config.project_type {
        ProjectType::ServiceWithDb | ProjectType::ServiceSlim => {
            println!("   - docker run -p 8000:8000 {}", image)
        }
        ProjectType::CliWithDb | ProjectType::CliSlim => println!("   - docker run {}", image),
    }

    let failed: Vec<&StepOutcome> = summary.warnings.iter().filter(|o| o.is_failure()).collect();
    if !failed.is_empty() {
        println!("\n{}", "⚠ Some setup steps need attention:".yellow());
        for outcome in failed {
            println!("   - {}", outcome.step.yellow());
        }
    }

    println!("\n{}", rule);
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_env_file_copied_from_dist() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("dist.env"), "DEBUG=1\n").unwrap();
        fs::write(dir.path().join(".env"), "STALE=1\n").unwrap();

        let outcome = create_env_file(dir.path(), true);

        assert_eq!(outcome.status, StepStatus::Done);
        assert_eq!(
            fs::read_to_string(dir.path().join(".env")).unwrap(),
            "DEBUG=1\n"
        );
    }

    #[test]
    fn test_env_file_skipped_without_dist() {
        let dir = tempdir().unwrap();
        let outcome = create_env_file(dir.path(), true);
        assert!(matches!(outcome.status, StepStatus::Skipped(_)));
        assert!(!dir.path().join(".env").exists());
    }

    #[test]
    fn test_git_skipped_unless_requested() {
        let dir = tempdir().unwrap();
        let config = ConfigModel::new(ProjectType::CliSlim);
        let outcome = initialize_git(dir.path(), &config, true);
        assert!(matches!(outcome.status, StepStatus::Skipped(_)));
        assert!(!dir.path().join(".git").exists());
    }

    #[test]
    fn test_pre_commit_needs_config_then_repository() {
        let dir = tempdir().unwrap();
        let mut config = ConfigModel::new(ProjectType::CliSlim);
        config.use_pre_commit = true;
        assert!(matches!(
            install_pre_commit_hooks(dir.path(), &config, true).status,
            StepStatus::Skipped(_)
        ));

        fs::write(dir.path().join(".pre-commit-config.yaml"), "repos: []\n").unwrap();
        assert!(install_pre_commit_hooks(dir.path(), &config, true).is_failure());
    }

    #[test]
    fn test_pre_commit_skipped_unless_requested() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join(".pre-commit-config.yaml"), "repos: []\n").unwrap();
        let config = ConfigModel::new(ProjectType::CliSlim);

        let outcome = install_pre_commit_hooks(dir.path(), &config, true);

        assert_eq!(outcome.status, StepStatus::Skipped("not requested".to_string()));
    }

    #[test]
    fn test_missing_program_is_reported_as_not_found() {
        let dir = tempdir().unwrap();
        let result = run_tool(dir.path(), "postgen-no-such-program", &[]);
        assert!(matches!(result, Err(ToolError::NotFound)));
    }
}
