//! Resolved template flags and the ways they can be supplied.
//!
//! The front end that collected the answers is out of scope; by the time a
//! [`ConfigModel`] exists every flag has a concrete value. Files may be the
//! rendered template context (JSON, optionally wrapped in a `cookiecutter` key)
//! or a hand-written TOML file, and command-line overrides win over both.

use anyhow::{bail, Context, Result};
use clap::ValueEnum;
use serde::de::{self, Deserializer};
use serde::Deserialize;
use std::fmt;
use std::fs;
use std::path::Path;

/// The four mutually exclusive project archetypes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum ProjectType {
    /// HTTP API backed by a database
    #[serde(alias = "fastapi_db")]
    #[value(alias = "fastapi_db")]
    ServiceWithDb,
    /// HTTP API with health checks only
    #[serde(alias = "fastapi_slim")]
    #[value(alias = "fastapi_slim")]
    ServiceSlim,
    /// Command-line application backed by a database
    #[serde(alias = "cli_db")]
    #[value(alias = "cli_db")]
    CliWithDb,
    /// Command-line application without persistence
    #[serde(alias = "cli_slim")]
    #[value(alias = "cli_slim")]
    CliSlim,
}

impl ProjectType {
    pub const ALL: [ProjectType; 4] = [
        ProjectType::ServiceWithDb,
        ProjectType::ServiceSlim,
        ProjectType::CliWithDb,
        ProjectType::CliSlim,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ProjectType::ServiceWithDb => "service-with-db",
            ProjectType::ServiceSlim => "service-slim",
            ProjectType::CliWithDb => "cli-with-db",
            ProjectType::CliSlim => "cli-slim",
        }
    }

    pub fn is_service(self) -> bool {
        matches!(self, ProjectType::ServiceWithDb | ProjectType::ServiceSlim)
    }

    pub fn has_database(self) -> bool {
        matches!(self, ProjectType::ServiceWithDb | ProjectType::CliWithDb)
    }
}

impl fmt::Display for ProjectType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Parse the yes/no spellings a template context uses for boolean answers.
pub fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "yes" | "y" | "true" | "on" | "1" => Some(true),
        "no" | "n" | "false" | "off" | "0" => Some(false),
        _ => None,
    }
}

fn parse_extract_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "extract here" => Some(true),
        "create new" => Some(false),
        _ => parse_flag(value),
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawFlag {
    Bool(bool),
    Text(String),
}

fn deserialize_with_parser<'de, D>(
    deserializer: D,
    parser: fn(&str) -> Option<bool>,
) -> std::result::Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    match RawFlag::deserialize(deserializer)? {
        RawFlag::Bool(value) => Ok(value),
        RawFlag::Text(text) => parser(&text)
            .ok_or_else(|| de::Error::custom(format!("expected yes or no, got '{}'", text))),
    }
}

fn deserialize_flag<'de, D>(deserializer: D) -> std::result::Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    deserialize_with_parser(deserializer, parse_flag)
}

fn deserialize_extract_flag<'de, D>(deserializer: D) -> std::result::Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    deserialize_with_parser(deserializer, parse_extract_flag)
}

/// The resolved set of feature flags for one materialization run.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ConfigModel {
    #[serde(default)]
    pub project_name: Option<String>,

    pub project_type: ProjectType,

    #[serde(
        default,
        alias = "use_otel_observability",
        deserialize_with = "deserialize_flag"
    )]
    pub use_observability: bool,

    #[serde(
        default,
        alias = "generate_local_otel_stack",
        deserialize_with = "deserialize_flag"
    )]
    pub generate_local_telemetry_stack: bool,

    #[serde(
        default,
        alias = "extract_to_current_dir",
        deserialize_with = "deserialize_extract_flag"
    )]
    pub extract_to_parent: bool,

    #[serde(default, deserialize_with = "deserialize_flag")]
    pub initialize_git: bool,

    /// Install pre-commit hooks once the repository exists
    #[serde(default, deserialize_with = "deserialize_flag")]
    pub use_pre_commit: bool,
}

impl ConfigModel {
    /// A configuration with every optional feature switched off.
    pub fn new(project_type: ProjectType) -> Self {
        ConfigModel {
            project_name: None,
            project_type,
            use_observability: false,
            generate_local_telemetry_stack: false,
            extract_to_parent: false,
            initialize_git: false,
            use_pre_commit: false,
        }
    }

    /// Load a configuration file, picking the format from its extension.
    pub fn from_path(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;

        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or_default()
            .to_ascii_lowercase();

        match ext.as_str() {
            "json" => Self::from_json_str(&text)
                .with_context(|| format!("Failed to parse {}", path.display())),
            "toml" => Self::from_toml_str(&text)
                .with_context(|| format!("Failed to parse {}", path.display())),
            _ => bail!(
                "Unsupported config file {}: expected a .json or .toml extension",
                path.display()
            ),
        }
    }

    /// Parse a rendered template context. A top-level `cookiecutter` object is unwrapped.
    pub fn from_json_str(text: &str) -> Result<Self> {
        let mut value: serde_json::Value =
            serde_json::from_str(text).context("Config is not valid JSON")?;
        if let Some(inner) = value.get_mut("cookiecutter") {
            if inner.is_object() {
                value = inner.take();
            }
        }
        serde_json::from_value(value).context("Config does not describe a project")
    }

    pub fn from_toml_str(text: &str) -> Result<Self> {
        toml::from_str(text).context("Config does not describe a project")
    }

    /// The project name, falling back to the working tree's directory name.
    pub fn name_or_dir(&self, root: &Path) -> String {
        self.project_name.clone().unwrap_or_else(|| {
            root.file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| String::from("project"))
        })
    }

    /// Every combination of the flags that select which paths survive pruning,
    /// including combinations the validator rejects.
    pub fn feature_space() -> Vec<ConfigModel> {
        let mut space = Vec::with_capacity(16);
        for project_type in ProjectType::ALL {
            for use_observability in [false, true] {
                for generate_local_telemetry_stack in [false, true] {
                    let mut config = ConfigModel::new(project_type);
                    config.use_observability = use_observability;
                    config.generate_local_telemetry_stack = generate_local_telemetry_stack;
                    space.push(config);
                }
            }
        }
        space
    }

    /// Short description of the pruning-relevant flags, used in diagnostics.
    pub fn describe(&self) -> String {
        format!(
            "{} (observability={}, local telemetry stack={})",
            self.project_type,
            yes_no(self.use_observability),
            yes_no(self.generate_local_telemetry_stack)
        )
    }
}

pub(crate) fn yes_no(value: bool) -> &'static str {
    if value {
        "yes"
    } else {
        "no"
    }
}

fn parse_flag_arg(value: &str) -> std::result::Result<bool, String> {
    parse_flag(value).ok_or_else(|| format!("expected yes or no, got '{}'", value))
}

/// Command-line overrides layered over a config file.
#[derive(clap::Args, Debug, Default, Clone)]
pub struct ConfigOverrides {
    /// Project name used in the summary (defaults to the working tree's name)
    #[arg(long)]
    pub project_name: Option<String>,

    /// Project archetype
    #[arg(long, short = 't', value_enum)]
    pub project_type: Option<ProjectType>,

    /// Keep the observability subsystem (yes/no)
    #[arg(long, value_parser = parse_flag_arg)]
    pub use_observability: Option<bool>,

    /// Keep the local telemetry stack; requires observability (yes/no)
    #[arg(long = "local-telemetry-stack", value_parser = parse_flag_arg)]
    pub generate_local_telemetry_stack: Option<bool>,

    /// Move the generated files into the parent directory (yes/no)
    #[arg(long, value_parser = parse_flag_arg)]
    pub extract_to_parent: Option<bool>,

    /// Create a git repository with an initial commit (yes/no)
    #[arg(long, value_parser = parse_flag_arg)]
    pub initialize_git: Option<bool>,

    /// Install pre-commit hooks after the repository is created (yes/no)
    #[arg(long, value_parser = parse_flag_arg)]
    pub use_pre_commit: Option<bool>,
}

impl ConfigOverrides {
    /// Merge the overrides onto `base`. Without a base, the project type must be given.
    pub fn apply(&self, base: Option<ConfigModel>) -> Result<ConfigModel> {
        let mut config = match (base, self.project_type) {
            (Some(mut config), Some(project_type)) => {
                config.project_type = project_type;
                config
            }
            (Some(config), None) => config,
            (None, Some(project_type)) => ConfigModel::new(project_type),
            (None, None) => bail!("No project type given: pass --config or --project-type"),
        };

        if let Some(name) = &self.project_name {
            config.project_name = Some(name.clone());
        }
        if let Some(value) = self.use_observability {
            config.use_observability = value;
        }
        if let Some(value) = self.generate_local_telemetry_stack {
            config.generate_local_telemetry_stack = value;
        }
        if let Some(value) = self.extract_to_parent {
            config.extract_to_parent = value;
        }
        if let Some(value) = self.initialize_git {
            config.initialize_git = value;
        }
        if let Some(value) = self.use_pre_commit {
            config.use_pre_commit = value;
        }

        Ok(config)
    }
}
