//! Cross-flag invariants and the destructive rollback that follows a violation.

use crate::config::ConfigModel;
use crate::error::{ConfigInvariantViolation, MaterializeError, Result};

use std::fs;
use std::io;
use std::path::Path;
use tracing::{debug, info};

/// `flag` may only be enabled when `requires` is enabled too.
struct Requires {
    flag: &'static str,
    requires: &'static str,
    check: fn(&ConfigModel) -> bool,
}

const INVARIANTS: &[Requires] = &[Requires {
    flag: "generate_local_telemetry_stack",
    requires: "use_observability",
    check: telemetry_stack_has_observability,
}];

fn telemetry_stack_has_observability(config: &ConfigModel) -> bool {
    !config.generate_local_telemetry_stack || config.use_observability
}

/// Check every cross-flag invariant, reporting the first one that is broken.
pub fn validate(config: &ConfigModel) -> std::result::Result<(), ConfigInvariantViolation> {
    for invariant in INVARIANTS {
        if !(invariant.check)(config) {
            return Err(ConfigInvariantViolation {
                flag: invariant.flag,
                requires: invariant.requires,
            });
        }
    }
    debug!(config = %config.describe(), "configuration is valid");
    Ok(())
}

/// Delete the whole working tree. Only called after a failed validation.
///
/// A tree that is already gone counts as rolled back.
pub fn rollback(root: &Path) -> Result<()> {
    info!(root = %root.display(), "removing working tree");
    match fs::remove_dir_all(root) {
        Ok(()) => Ok(()),
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(source) => Err(MaterializeError::Rollback {
            path: root.to_path_buf(),
            source,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ProjectType;
    use tempfile::tempdir;

    #[test]
    fn test_every_combination_but_stack_without_observability_is_valid() {
        for config in ConfigModel::feature_space() {
            let broken = config.generate_local_telemetry_stack && !config.use_observability;
            assert_eq!(validate(&config).is_err(), broken, "{}", config.describe());
        }
    }

    #[test]
    fn test_violation_names_both_flags_and_remediation() {
        let mut config = ConfigModel::new(ProjectType::ServiceSlim);
        config.generate_local_telemetry_stack = true;

        let violation = validate(&config).unwrap_err();
        let message = violation.to_string();
        assert!(message.contains("generate_local_telemetry_stack"));
        assert!(message.contains("use_observability"));
        assert!(message.contains("regenerate with use_observability=yes"));
        assert!(message.contains("generate_local_telemetry_stack=no"));
    }

    #[test]
    fn test_rollback_removes_tree() {
        let dir = tempdir().unwrap();
        let root = dir.path().join("project");
        fs::create_dir_all(root.join("app/core")).unwrap();
        fs::write(root.join("app/core/config.py"), "x = 1\n").unwrap();

        rollback(&root).unwrap();
        assert!(!root.exists());

        // Already gone is fine.
        rollback(&root).unwrap();
    }
}
