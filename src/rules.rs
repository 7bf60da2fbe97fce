//! Prune rules loaded from rules.toml.
//!
//! Each rule pairs a condition over the configuration with the paths to delete
//! when it holds. Rules never reference each other, so adding a project type or
//! a feature flag means adding rules, not threading another branch through the
//! existing ones.

use crate::config::{ConfigModel, ProjectType};
use crate::error::{MaterializeError, Result};
use crate::validate::validate;

use serde::Deserialize;
use std::collections::HashMap;

// Embed the rule table in the binary at compile time
const RULES_TOML: &str = include_str!("../rules.toml");

/// Whether a rule removes part of something another rule may remove whole.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RuleKind {
    /// Applied before every full rule
    Partial,
    #[default]
    Full,
}

/// Conjunction of flag checks. Absent keys match anything.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Condition {
    #[serde(default)]
    pub project_type: Option<Vec<ProjectType>>,
    #[serde(default)]
    pub use_observability: Option<bool>,
    #[serde(default)]
    pub generate_local_telemetry_stack: Option<bool>,
}

impl Condition {
    pub fn matches(&self, config: &ConfigModel) -> bool {
        if let Some(types) = &self.project_type {
            if !types.contains(&config.project_type) {
                return false;
            }
        }
        if let Some(expected) = self.use_observability {
            if config.use_observability != expected {
                return false;
            }
        }
        if let Some(expected) = self.generate_local_telemetry_stack {
            if config.generate_local_telemetry_stack != expected {
                return false;
            }
        }
        true
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PruneRule {
    pub name: String,
    #[serde(default)]
    pub kind: RuleKind,
    #[serde(default)]
    pub when: Condition,
    /// Paths relative to the working tree root, `/`-separated
    pub paths: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct RuleFile {
    #[serde(default)]
    rule: Vec<PruneRule>,
}

/// An ordered, overlap-checked collection of prune rules.
#[derive(Debug, Clone)]
pub struct RuleSet {
    rules: Vec<PruneRule>,
}

impl RuleSet {
    /// The rule table shipped with the binary.
    pub fn embedded() -> Result<Self> {
        Self::from_toml(RULES_TOML)
    }

    pub fn from_toml(text: &str) -> Result<Self> {
        let file: RuleFile =
            toml::from_str(text).map_err(|e| MaterializeError::Rules(e.to_string()))?;
        Self::new(file.rule)
    }

    /// Build a rule set, rejecting malformed paths and same-path overlaps.
    pub fn new(rules: Vec<PruneRule>) -> Result<Self> {
        for rule in &rules {
            if rule.paths.is_empty() {
                return Err(MaterializeError::Rules(format!(
                    "rule '{}' lists no paths",
                    rule.name
                )));
            }
            if let Some(bad) = rule.paths.iter().find(|p| !is_relative_path(p)) {
                return Err(MaterializeError::Rules(format!(
                    "rule '{}' has path '{}' outside the working tree",
                    rule.name, bad
                )));
            }
        }

        let set = RuleSet { rules };
        set.check_disjoint()?;
        Ok(set)
    }

    pub fn rules(&self) -> &[PruneRule] {
        &self.rules
    }

    /// Rules whose condition holds, partial rules first, then declaration order.
    pub fn applicable(&self, config: &ConfigModel) -> Vec<&PruneRule> {
        let mut rules: Vec<&PruneRule> = self
            .rules
            .iter()
            .filter(|r| r.when.matches(config))
            .collect();
        // Stable sort keeps declaration order within a kind
        rules.sort_by_key(|r| r.kind);
        rules
    }

    /// No two rules applicable to the same valid configuration may list the same path.
    fn check_disjoint(&self) -> Result<()> {
        for config in ConfigModel::feature_space() {
            if validate(&config).is_err() {
                continue;
            }
            let mut owners: HashMap<String, &str> = HashMap::new();
            for rule in self.applicable(&config) {
                for path in &rule.paths {
                    let key = path_key(path);
                    if let Some(first) = owners.insert(key.clone(), rule.name.as_str()) {
                        return Err(MaterializeError::RuleOverlap {
                            first: first.to_string(),
                            second: rule.name.clone(),
                            path: key,
                            config: config.describe(),
                        });
                    }
                }
            }
        }
        Ok(())
    }
}

/// Collapse repeated and trailing separators so equivalent paths compare equal.
fn path_key(path: &str) -> String {
    path.split('/')
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join("/")
}

fn is_relative_path(path: &str) -> bool {
    !path.is_empty()
        && !path.starts_with('/')
        && !path.contains('\\')
        && path.split('/').all(|part| part != ".." && part != ".")
}
