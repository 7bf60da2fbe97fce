//! Error taxonomy for the materialization engine.

use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;

/// A cross-flag rule was broken by the resolved configuration.
///
/// Displayed text names both flags and tells the user how to regenerate.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{flag}=yes requires {requires}=yes; regenerate with {requires}=yes or {flag}=no")]
pub struct ConfigInvariantViolation {
    pub flag: &'static str,
    pub requires: &'static str,
}

#[derive(Debug, Error)]
pub enum MaterializeError {
    #[error(transparent)]
    InvalidConfig(#[from] ConfigInvariantViolation),

    #[error("failed to {action} {}: {source}", path.display())]
    Io {
        action: &'static str,
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to roll back working tree {}: {source}", path.display())]
    Rollback {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("prune rules are malformed: {0}")]
    Rules(String),

    #[error("prune rules '{first}' and '{second}' both target '{path}' for {config}")]
    RuleOverlap {
        first: String,
        second: String,
        path: String,
        config: String,
    },
}

impl MaterializeError {
    /// Wrap an I/O error with the action that failed and the path it failed on.
    pub fn io(action: &'static str, path: &Path, source: io::Error) -> Self {
        MaterializeError::Io {
            action,
            path: path.to_path_buf(),
            source,
        }
    }
}

pub type Result<T> = std::result::Result<T, MaterializeError>;
