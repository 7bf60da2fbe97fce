//! Flatten the working tree into its parent directory.
//!
//! Conflicts are resolved per entry, at every depth:
//! - destination missing: the entry is renamed into place
//! - both are directories: children are merged recursively, then the source is removed
//! - anything else: the destination is deleted and replaced by the source
//!
//! Symlinks are never followed; a symlink counts as a file on either side.

use crate::error::{MaterializeError, Result};

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Where the tree ended up and what the merge had to do to get it there.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RelocationReport {
    pub root: PathBuf,
    pub moved: usize,
    pub merged: usize,
    pub replaced: usize,
}

/// Move every entry of `root` into `root`'s parent and remove `root`.
///
/// Returns the parent, which is the working tree's root from here on.
pub fn relocate(root: &Path) -> Result<RelocationReport> {
    let root = root
        .canonicalize()
        .map_err(|e| MaterializeError::io("resolve", root, e))?;
    let (parent, name) = match (root.parent(), root.file_name()) {
        (Some(parent), Some(name)) => (parent.to_path_buf(), name.to_os_string()),
        _ => {
            return Err(MaterializeError::io(
                "relocate",
                &root,
                io::Error::new(io::ErrorKind::InvalidInput, "working tree has no parent"),
            ))
        }
    };

    info!(
        from = %root.display(),
        to = %parent.display(),
        "extracting working tree into parent"
    );

    // A child named like the tree itself would be merged into its own source.
    // Rename the tree out of the way first so every destination is distinct.
    let source = if exists_no_follow(&root.join(&name))? {
        let staging = parent.join(format!(".{}.relocating", name.to_string_lossy()));
        if exists_no_follow(&staging)? {
            return Err(MaterializeError::io(
                "stage",
                &staging,
                io::Error::new(io::ErrorKind::AlreadyExists, "staging directory already exists"),
            ));
        }
        debug!(staging = %staging.display(), "staging working tree before merge");
        fs::rename(&root, &staging).map_err(|e| MaterializeError::io("stage", &root, e))?;
        staging
    } else {
        root.clone()
    };

    let mut report = RelocationReport {
        root: parent.clone(),
        ..Default::default()
    };

    for entry in sorted_entries(&source)? {
        let dest = match entry.file_name() {
            Some(file_name) => parent.join(file_name),
            None => continue,
        };
        move_entry(&entry, &dest, &mut report)?;
    }

    fs::remove_dir(&source).map_err(|e| MaterializeError::io("remove", &source, e))?;

    info!(
        moved = report.moved,
        merged = report.merged,
        replaced = report.replaced,
        "extraction complete"
    );
    Ok(report)
}

fn move_entry(source: &Path, dest: &Path, report: &mut RelocationReport) -> Result<()> {
    let dest_meta = match fs::symlink_metadata(dest) {
        Ok(meta) => meta,
        Err(err) if err.kind() == io::ErrorKind::NotFound => {
            rename(source, dest)?;
            report.moved += 1;
            return Ok(());
        }
        Err(err) => return Err(MaterializeError::io("inspect", dest, err)),
    };
    let source_meta =
        fs::symlink_metadata(source).map_err(|e| MaterializeError::io("inspect", source, e))?;

    if source_meta.is_dir() && dest_meta.is_dir() {
        debug!(dest = %dest.display(), "merging directory");
        for child in sorted_entries(source)? {
            if let Some(file_name) = child.file_name() {
                move_entry(&child, &dest.join(file_name), report)?;
            }
        }
        fs::remove_dir(source).map_err(|e| MaterializeError::io("remove", source, e))?;
        report.merged += 1;
        return Ok(());
    }

    debug!(dest = %dest.display(), "replacing existing entry");
    if dest_meta.is_dir() {
        fs::remove_dir_all(dest).map_err(|e| MaterializeError::io("remove", dest, e))?;
    } else {
        fs::remove_file(dest).map_err(|e| MaterializeError::io("remove", dest, e))?;
    }
    rename(source, dest)?;
    report.replaced += 1;
    Ok(())
}

fn rename(source: &Path, dest: &Path) -> Result<()> {
    debug!(from = %source.display(), to = %dest.display(), "moving");
    fs::rename(source, dest).map_err(|e| MaterializeError::io("move", source, e))
}

fn exists_no_follow(path: &Path) -> Result<bool> {
    match fs::symlink_metadata(path) {
        Ok(_) => Ok(true),
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(err) => Err(MaterializeError::io("inspect", path, err)),
    }
}

/// Directory entries in name order, so merges are reproducible run to run.
fn sorted_entries(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut entries = Vec::new();
    for entry in fs::read_dir(dir).map_err(|e| MaterializeError::io("read", dir, e))? {
        let entry = entry.map_err(|e| MaterializeError::io("read", dir, e))?;
        entries.push(entry.path());
    }
    entries.sort();
    Ok(entries)
}
