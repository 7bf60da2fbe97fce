//! Conditional pruning of the working tree.
//!
//! Runs in three passes:
//! 1. every applicable rule from the [`RuleSet`], absent paths skipped
//! 2. zero-byte files from [`POSSIBLY_EMPTY_FILES`]
//! 3. empty directories from [`POSSIBLY_EMPTY_DIRS`], deepest first

use crate::config::ConfigModel;
use crate::error::{MaterializeError, Result};
use crate::rules::RuleSet;

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use walkdir::WalkDir;

/// Files the template renders empty when the feature behind them is disabled.
pub const POSSIBLY_EMPTY_FILES: &[&str] = &[".pre-commit-config.yaml", ".github/workflows/ci.yml"];

/// Directories that may be left empty once the passes above have run.
pub const POSSIBLY_EMPTY_DIRS: &[&str] = &[".github/workflows", ".github"];

/// Why a path was removed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemovalReason {
    Rule(String),
    EmptyFile,
    EmptyDir,
}

/// A path removed from the working tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemovedEntry {
    /// Relative to the working tree root
    pub path: String,
    pub size: u64,
    pub is_dir: bool,
    pub reason: RemovalReason,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PruneReport {
    pub removed: Vec<RemovedEntry>,
    /// Rule paths that were already absent
    pub absent: usize,
}

impl PruneReport {
    pub fn total_bytes(&self) -> u64 {
        self.removed.iter().map(|e| e.size).sum()
    }

    pub fn count(&self, reason: &RemovalReason) -> usize {
        self.removed.iter().filter(|e| &e.reason == reason).count()
    }
}

/// Remove everything the configuration rules out, then clean up leftovers.
pub fn prune(root: &Path, config: &ConfigModel, rules: &RuleSet) -> Result<PruneReport> {
    let mut report = PruneReport::default();

    for rule in rules.applicable(config) {
        debug!(rule = %rule.name, "applying prune rule");
        for rel in &rule.paths {
            match remove_path(&resolve(root, rel))? {
                Some((size, is_dir)) => {
                    info!(path = %rel, rule = %rule.name, "removed");
                    report.removed.push(RemovedEntry {
                        path: rel.clone(),
                        size,
                        is_dir,
                        reason: RemovalReason::Rule(rule.name.clone()),
                    });
                }
                None => {
                    debug!(path = %rel, rule = %rule.name, "not present, skipping");
                    report.absent += 1;
                }
            }
        }
    }

    remove_empty_files(root, POSSIBLY_EMPTY_FILES, &mut report)?;
    remove_empty_dirs(root, POSSIBLY_EMPTY_DIRS, &mut report)?;

    Ok(report)
}

/// Delete zero-byte files from `candidates`. Files with content are kept.
pub fn remove_empty_files(
    root: &Path,
    candidates: &[&str],
    report: &mut PruneReport,
) -> Result<()> {
    for rel in candidates {
        let path = resolve(root, rel);
        let metadata = match metadata_no_follow(&path)? {
            Some(meta) => meta,
            None => continue,
        };
        if metadata.is_file() && metadata.len() == 0 {
            fs::remove_file(&path).map_err(|e| MaterializeError::io("remove", &path, e))?;
            info!(path = %rel, "removed empty file");
            report.removed.push(RemovedEntry {
                path: rel.to_string(),
                size: 0,
                is_dir: false,
                reason: RemovalReason::EmptyFile,
            });
        }
    }
    Ok(())
}

/// Delete directories from `candidates` that exist and are empty, deepest first,
/// so removing a child can leave its parent empty in the same pass.
pub fn remove_empty_dirs(
    root: &Path,
    candidates: &[&str],
    report: &mut PruneReport,
) -> Result<()> {
    let mut ordered: Vec<&str> = candidates.to_vec();
    ordered.sort_by_key(|rel| {
        std::cmp::Reverse(rel.split('/').filter(|p| !p.is_empty()).count())
    });

    for rel in ordered {
        let path = resolve(root, rel);
        match metadata_no_follow(&path)? {
            Some(meta) if meta.is_dir() => {}
            _ => continue,
        }
        let mut entries =
            fs::read_dir(&path).map_err(|e| MaterializeError::io("read", &path, e))?;
        if entries.next().is_some() {
            continue;
        }
        fs::remove_dir(&path).map_err(|e| MaterializeError::io("remove", &path, e))?;
        info!(path = %rel, "removed empty directory");
        report.removed.push(RemovedEntry {
            path: rel.to_string(),
            size: 0,
            is_dir: true,
            reason: RemovalReason::EmptyDir,
        });
    }
    Ok(())
}

/// Join a `/`-separated relative path onto `root` component by component.
fn resolve(root: &Path, rel: &str) -> PathBuf {
    let mut path = root.to_path_buf();
    for part in rel.split('/').filter(|p| !p.is_empty()) {
        path.push(part);
    }
    path
}

fn metadata_no_follow(path: &Path) -> Result<Option<fs::Metadata>> {
    match fs::symlink_metadata(path) {
        Ok(meta) => Ok(Some(meta)),
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(err) => Err(MaterializeError::io("inspect", path, err)),
    }
}

/// Remove a file or directory tree. Returns its size and kind, or `None` if absent.
fn remove_path(path: &Path) -> Result<Option<(u64, bool)>> {
    let metadata = match metadata_no_follow(path)? {
        Some(meta) => meta,
        None => return Ok(None),
    };

    if metadata.is_dir() {
        let size = dir_size(path);
        fs::remove_dir_all(path).map_err(|e| MaterializeError::io("remove", path, e))?;
        Ok(Some((size, true)))
    } else {
        // Symlinks are removed as links, never followed
        fs::remove_file(path).map_err(|e| MaterializeError::io("remove", path, e))?;
        Ok(Some((metadata.len(), false)))
    }
}

/// Total size of regular files below `path`, without following symlinks.
fn dir_size(path: &Path) -> u64 {
    WalkDir::new(path)
        .follow_links(false)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .filter_map(|e| e.metadata().ok())
        .map(|m| m.len())
        .sum()
}
