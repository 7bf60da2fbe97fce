//! postgen - Project Skeleton Materializer
//!
//! postgen takes the over-inclusive tree a project template renders (every optional
//! subsystem present) plus the resolved answers, and turns it into exactly the layout
//! those answers imply. It runs once per generated project, in place.
//!
//! ## Pipeline
//!
//! 1. **Validate** cross-flag invariants; a violation deletes the whole tree
//! 2. **Relocate** the tree into its parent when extraction was requested, merging
//!    with whatever is already there
//! 3. **Prune** paths ruled out by the configuration (rules live in `rules.toml`),
//!    then zero-byte placeholders and the directories they leave empty
//! 4. **Normalize** leading blank lines left by conditional template blocks
//! 5. Hand off to external tools (env file, uv, ruff, git) and print a summary

pub mod collaborators;
pub mod config;
pub mod error;
pub mod normalize;
pub mod orchestrator;
pub mod pruner;
pub mod relocate;
pub mod rules;
pub mod validate;

// Re-export commonly used items
pub use config::{ConfigModel, ConfigOverrides, ProjectType};
pub use error::{ConfigInvariantViolation, MaterializeError, Result};
pub use normalize::{normalize_leading_blank_lines, NormalizeReport};
pub use orchestrator::{MaterializeReport, Orchestrator, RunOptions};
pub use pruner::{prune, PruneReport, RemovalReason, RemovedEntry};
pub use relocate::{relocate, RelocationReport};
pub use rules::{Condition, PruneRule, RuleKind, RuleSet};
pub use validate::{rollback, validate};
