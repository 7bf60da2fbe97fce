//! Sequences one materialization run over a working tree.
//!
//! validate → relocate → prune → normalize → external steps → summary.
//! A validation failure deletes the working tree before returning. Relocation and
//! pruning mutate the tree in place and abort on the first I/O error; the
//! normalizer and the external steps only warn.

use crate::collaborators::{self, StepOutcome, Summary};
use crate::config::ConfigModel;
use crate::error::{MaterializeError, Result};
use crate::normalize::{normalize_leading_blank_lines, NormalizeReport};
use crate::pruner::{prune, PruneReport};
use crate::relocate::{relocate, RelocationReport};
use crate::rules::RuleSet;
use crate::validate::{rollback, validate};

use colored::Colorize;
use std::path::{Path, PathBuf};
use tracing::info;

/// Runtime switches that do not belong to the project configuration.
#[derive(Debug, Clone, Copy)]
pub struct RunOptions {
    /// Run dependency sync, formatting, git and the env file step
    pub external: bool,
    /// Suppress progress lines, spinners and the summary
    pub quiet: bool,
}

impl Default for RunOptions {
    fn default() -> Self {
        RunOptions {
            external: true,
            quiet: false,
        }
    }
}

#[derive(Debug, Clone)]
pub struct MaterializeReport {
    /// Final location of the project; the parent when the tree was extracted
    pub root: PathBuf,
    pub relocation: Option<RelocationReport>,
    pub prune: PruneReport,
    pub normalize: NormalizeReport,
    pub steps: Vec<StepOutcome>,
}

pub struct Orchestrator {
    root: PathBuf,
    config: ConfigModel,
    rules: RuleSet,
    options: RunOptions,
}

impl Orchestrator {
    /// Prepare a run over `root` using the embedded prune rules.
    pub fn new(root: impl Into<PathBuf>, config: ConfigModel) -> Result<Self> {
        Ok(Orchestrator {
            root: root.into(),
            config,
            rules: RuleSet::embedded()?,
            options: RunOptions::default(),
        })
    }

    pub fn with_rules(mut self, rules: RuleSet) -> Self {
        self.rules = rules;
        self
    }

    pub fn with_options(mut self, options: RunOptions) -> Self {
        self.options = options;
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn run(self) -> Result<MaterializeReport> {
        let Orchestrator {
            root,
            config,
            rules,
            options,
        } = self;

        let root = root
            .canonicalize()
            .map_err(|e| MaterializeError::io("resolve", &root, e))?;
        // Resolved before any mutation: the summary names the original directory
        let project_name = config.name_or_dir(&root);

        if !options.quiet {
            println!("\n🔧 Running post-generation tasks...");
        }

        if let Err(violation) = validate(&config) {
            eprintln!("{}", format!("✗ Invalid configuration: {}", violation).red().bold());
            eprintln!(
                "{}",
                format!("  Removing generated project at {}", root.display()).red()
            );
            rollback(&root)?;
            return Err(violation.into());
        }

        let mut relocation = None;
        let root = if config.extract_to_parent {
            let tree_name = root
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            let report = relocate(&root)?;
            if !options.quiet {
                println!(
                    "{}",
                    format!(
                        "✓ Content extracted to {}, removed empty {}/",
                        report.root.display(),
                        tree_name
                    )
                    .green()
                );
            }
            let new_root = report.root.clone();
            relocation = Some(report);
            new_root
        } else {
            root
        };

        info!(root = %root.display(), "pruning");
        let prune_report = prune(&root, &config, &rules)?;

        info!(root = %root.display(), "normalizing leading blank lines");
        let normalize_report = normalize_leading_blank_lines(&root)?;
        if normalize_report.processed > 0 && !options.quiet {
            println!(
                "{}",
                format!(
                    "✓ Processed {} files to remove leading empty lines",
                    normalize_report.processed
                )
                .green()
            );
        }

        let mut steps = Vec::new();
        if options.external {
            steps.push(collaborators::create_env_file(&root, options.quiet));
            steps.push(collaborators::install_dependencies(&root, options.quiet));
            steps.push(collaborators::format_and_lint(&root, options.quiet));
            steps.push(collaborators::initialize_git(&root, &config, options.quiet));
            steps.push(collaborators::install_pre_commit_hooks(
                &root,
                &config,
                options.quiet,
            ));
        }

        if !options.quiet {
            collaborators::print_summary(&Summary {
                project_name: &project_name,
                config: &config,
                root: &root,
                prune: &prune_report,
                normalized: normalize_report.processed,
                warnings: &steps,
            });
        }

        Ok(MaterializeReport {
            root,
            relocation,
            prune: prune_report,
            normalize: normalize_report,
            steps,
        })
    }
}
