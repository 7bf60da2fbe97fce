//! Strip leading blank lines left behind by conditional template blocks.

use crate::error::Result;

use ignore::WalkBuilder;
use std::fs;
use std::path::Path;
use tracing::{debug, info, warn};

/// Extensions treated as text. Files without an extension are text too.
pub const TEXT_EXTENSIONS: &[&str] = &[
    "py", "yml", "yaml", "toml", "md", "txt", "cfg", "ini", "env",
];

/// Directories owned by external tooling that are never rewritten.
pub const DEPENDENCY_DIRS: &[&str] = &[
    "__pycache__",
    "node_modules",
    ".venv",
    "venv",
    ".uv-cache",
    ".mypy_cache",
    ".pytest_cache",
    ".ruff_cache",
];

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NormalizeReport {
    /// Files rewritten
    pub processed: usize,
    /// Files that could not be read, decoded or rewritten
    pub skipped: usize,
}

/// Rewrite every text file under `root` that starts with blank lines.
///
/// Idempotent: a second run finds nothing to rewrite. A file that cannot be
/// read or written is counted as skipped and left as it was.
pub fn normalize_leading_blank_lines(root: &Path) -> Result<NormalizeReport> {
    let mut report = NormalizeReport::default();

    let walker = WalkBuilder::new(root)
        // Hidden entries belong to tooling (.git, .github, .env...)
        .hidden(true)
        .git_ignore(false)
        .ignore(false)
        .git_global(false)
        .git_exclude(false)
        .parents(false)
        .filter_entry(|entry| {
            entry
                .file_name()
                .to_str()
                .map(|name| !DEPENDENCY_DIRS.contains(&name))
                .unwrap_or(true)
        })
        .build();

    for result in walker {
        let entry = match result {
            Ok(entry) => entry,
            Err(err) => {
                warn!("Failed to access entry: {}", err);
                continue;
            }
        };
        if !entry.file_type().is_some_and(|ft| ft.is_file()) {
            continue;
        }
        let path = entry.path();
        if !is_text_candidate(path) {
            continue;
        }

        let bytes = match fs::read(path) {
            Ok(bytes) => bytes,
            Err(err) => {
                debug!(path = %path.display(), "unreadable, skipping: {}", err);
                report.skipped += 1;
                continue;
            }
        };
        let text = match String::from_utf8(bytes) {
            Ok(text) => text,
            Err(_) => {
                debug!(path = %path.display(), "not UTF-8, skipping");
                report.skipped += 1;
                continue;
            }
        };

        if let Some((stripped, lines)) = strip_leading_blank_lines(&text) {
            if let Err(err) = fs::write(path, stripped) {
                warn!(path = %path.display(), "could not rewrite, skipping: {}", err);
                report.skipped += 1;
                continue;
            }
            let rel = path.strip_prefix(root).unwrap_or(path);
            info!(path = %rel.display(), lines, "removed leading blank lines");
            report.processed += 1;
        }
    }

    Ok(report)
}

fn is_text_candidate(path: &Path) -> bool {
    match path.extension() {
        None => true,
        Some(ext) => {
            let ext = ext.to_string_lossy().to_ascii_lowercase();
            TEXT_EXTENSIONS.contains(&ext.as_str())
        }
    }
}

/// Drop every line before the first one with non-whitespace content.
///
/// Returns the remaining text and the number of lines dropped, or `None` when
/// there is nothing to drop (already clean, empty, or whitespace only).
pub fn strip_leading_blank_lines(text: &str) -> Option<(&str, usize)> {
    let mut offset = 0;
    let mut dropped = 0;
    for line in text.split_inclusive('\n') {
        if !line.trim().is_empty() {
            return if dropped == 0 {
                None
            } else {
                Some((&text[offset..], dropped))
            };
        }
        offset += line.len();
        dropped += 1;
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_strip_leading_blank_lines() {
        assert_eq!(
            strip_leading_blank_lines("\n\n\nhello"),
            Some(("hello", 3))
        );
        assert_eq!(
            strip_leading_blank_lines("  \r\n\t\nx = 1\n\ny = 2\n"),
            Some(("x = 1\n\ny = 2\n", 2))
        );
        assert_eq!(strip_leading_blank_lines("hello\n\n"), None);
        assert_eq!(strip_leading_blank_lines("\n \n\t"), None);
        assert_eq!(strip_leading_blank_lines(""), None);
    }

    #[test]
    fn test_indentation_of_first_line_is_kept() {
        assert_eq!(
            strip_leading_blank_lines("\n    indented\n"),
            Some(("    indented\n", 1))
        );
    }

    #[test]
    fn test_normalizes_and_is_idempotent() {
        let dir = tempdir().unwrap();
        let file = dir.path().join("notes.txt");
        fs::write(&file, "\n\n\nhello").unwrap();
        fs::write(dir.path().join("clean.py"), "import os\n").unwrap();

        let first = normalize_leading_blank_lines(dir.path()).unwrap();
        assert_eq!(first.processed, 1);
        assert_eq!(fs::read_to_string(&file).unwrap(), "hello");

        let second = normalize_leading_blank_lines(dir.path()).unwrap();
        assert_eq!(second.processed, 0);
        assert_eq!(fs::read_to_string(&file).unwrap(), "hello");
    }

    #[test]
    fn test_extensionless_files_are_text() {
        let dir = tempdir().unwrap();
        let file = dir.path().join("Makefile");
        fs::write(&file, "\nrun:\n\tpython -m app\n").unwrap();

        let report = normalize_leading_blank_lines(dir.path()).unwrap();
        assert_eq!(report.processed, 1);
        assert_eq!(fs::read_to_string(&file).unwrap(), "run:\n\tpython -m app\n");
    }

    #[test]
    fn test_other_extensions_are_ignored() {
        let dir = tempdir().unwrap();
        let file = dir.path().join("index.html");
        fs::write(&file, "\n<html></html>\n").unwrap();

        let report = normalize_leading_blank_lines(dir.path()).unwrap();
        assert_eq!(report.processed, 0);
        assert_eq!(fs::read_to_string(&file).unwrap(), "\n<html></html>\n");
    }

    #[test]
    fn test_hidden_and_dependency_dirs_are_untouched() {
        let dir = tempdir().unwrap();
        let root = dir.path();
        for rel in [".github/workflows/ci.yml", ".venv/lib/site.py", "node_modules/pkg/README.md"] {
            let path = root.join(rel);
            fs::create_dir_all(path.parent().unwrap()).unwrap();
            fs::write(&path, "\n\ncontent\n").unwrap();
        }
        fs::write(root.join(".env"), "\nKEY=value\n").unwrap();

        let report = normalize_leading_blank_lines(root).unwrap();

        assert_eq!(report.processed, 0);
        assert_eq!(
            fs::read_to_string(root.join(".github/workflows/ci.yml")).unwrap(),
            "\n\ncontent\n"
        );
        assert_eq!(fs::read_to_string(root.join(".env")).unwrap(), "\nKEY=value\n");
    }

    #[test]
    fn test_binary_files_are_skipped_and_not_counted() {
        let dir = tempdir().unwrap();
        let file = dir.path().join("blob");
        fs::write(&file, [b'\n', 0xff, 0xfe, 0x00]).unwrap();
        fs::write(dir.path().join("dist.env"), "\n\nDEBUG=1\n").unwrap();

        let report = normalize_leading_blank_lines(dir.path()).unwrap();

        assert_eq!(report.processed, 1);
        assert_eq!(report.skipped, 1);
        assert_eq!(fs::read(&file).unwrap(), vec![b'\n', 0xff, 0xfe, 0x00]);
        assert_eq!(
            fs::read_to_string(dir.path().join("dist.env")).unwrap(),
            "DEBUG=1\n"
        );
    }

    #[cfg(unix)]
    #[test]
    fn test_unwritable_file_is_skipped_and_others_still_normalized() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempdir().unwrap();
        let locked = dir.path().join("locked.py");
        let other = dir.path().join("other.py");
        fs::write(&locked, "\n\nx = 1\n").unwrap();
        fs::write(&other, "\ny = 2\n").unwrap();
        fs::set_permissions(&locked, fs::Permissions::from_mode(0o444)).unwrap();
        // Privileged users write through read-only permissions
        let lock_holds = fs::OpenOptions::new().write(true).open(&locked).is_err();

        let report = normalize_leading_blank_lines(dir.path()).unwrap();

        assert_eq!(fs::read_to_string(&other).unwrap(), "y = 2\n");
        if lock_holds {
            assert_eq!(report.processed, 1);
            assert_eq!(report.skipped, 1);
            assert_eq!(fs::read_to_string(&locked).unwrap(), "\n\nx = 1\n");
        } else {
            assert_eq!(report.processed, 2);
        }

        fs::set_permissions(&locked, fs::Permissions::from_mode(0o644)).unwrap();
    }
}
