use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use std::path::Path;
use tempfile::tempdir;

fn setup_generated_project(root: &Path) {
    // A trimmed-down rendering with each optional subsystem represented
    for (rel, contents) in [
        ("app/main.py", "app = None\n"),
        ("app/api/examples/routes.py", "router = None\n"),
        ("app/api/health_checks/routes.py", "router = None\n"),
        ("app/core/database.py", "engine = None\n"),
        ("app/observability/bootstrap.py", "setup = None\n"),
        ("migrations/env.py", "run = None\n"),
        ("alembic.ini", "[alembic]\n"),
        ("otel/collector.yaml", "receivers: {}\n"),
        ("README.md", "\n\n# Demo\n"),
    ] {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, contents).unwrap();
    }
}

fn postgen() -> Command {
    let mut cmd = Command::cargo_bin("postgen").unwrap();
    cmd.env_remove("RUST_LOG");
    cmd
}

#[test]
fn test_invalid_flags_exit_nonzero_and_remove_tree() {
    let dir = tempdir().unwrap();
    let root = dir.path().join("demo");
    setup_generated_project(&root);

    postgen()
        .arg(&root)
        .args(["--project-type", "service-slim"])
        .args(["--use-observability", "no"])
        .args(["--local-telemetry-stack", "yes"])
        .arg("--no-external")
        .assert()
        .code(2)
        .stderr(predicate::str::contains("generate_local_telemetry_stack"))
        .stderr(predicate::str::contains("use_observability=yes"));

    assert!(!root.exists());
}

#[test]
fn test_materializes_from_template_context() {
    let dir = tempdir().unwrap();
    let root = dir.path().join("demo");
    setup_generated_project(&root);
    let context = dir.path().join("context.json");
    fs::write(
        &context,
        r#"{"cookiecutter": {
            "project_name": "Demo",
            "project_type": "cli_slim",
            "use_otel_observability": "no",
            "generate_local_otel_stack": "no",
            "extract_to_current_dir": "Create New"
        }}"#,
    )
    .unwrap();

    postgen()
        .arg(&root)
        .arg("--config")
        .arg(&context)
        .arg("--no-external")
        .assert()
        .success()
        .stdout(predicate::str::contains("Project Demo created successfully"))
        .stdout(predicate::str::contains("cli-slim"));

    assert!(root.join("app/main.py").exists());
    assert!(!root.join("app/api").exists());
    assert!(!root.join("migrations").exists());
    assert!(!root.join("app/observability").exists());
    assert!(!root.join("otel").exists());
    assert_eq!(fs::read_to_string(root.join("README.md")).unwrap(), "# Demo\n");
}

#[test]
fn test_command_line_overrides_config_file() {
    let dir = tempdir().unwrap();
    let root = dir.path().join("demo");
    setup_generated_project(&root);
    let config = dir.path().join("answers.toml");
    fs::write(&config, "project_type = \"cli-slim\"\n").unwrap();

    postgen()
        .arg(&root)
        .arg("--config")
        .arg(&config)
        .args(["--project-type", "fastapi_db"])
        .arg("--no-external")
        .arg("--quiet")
        .assert()
        .success()
        .stdout(predicate::str::is_empty());

    assert!(root.join("app/api/examples/routes.py").exists());
    assert!(root.join("migrations").exists());
}

#[test]
fn test_missing_project_type_is_a_usage_error() {
    let dir = tempdir().unwrap();
    let root = dir.path().join("demo");
    setup_generated_project(&root);

    postgen()
        .arg(&root)
        .arg("--no-external")
        .assert()
        .code(1)
        .stderr(predicate::str::contains("--project-type"));

    // Nothing was validated, so nothing was rolled back
    assert!(root.join("app/main.py").exists());
}

#[test]
fn test_missing_working_tree_is_an_io_error() {
    let dir = tempdir().unwrap();

    postgen()
        .arg(dir.path().join("missing"))
        .args(["--project-type", "cli-slim"])
        .arg("--no-external")
        .assert()
        .code(3);
}

#[test]
fn test_unsupported_config_format() {
    let dir = tempdir().unwrap();
    let config = dir.path().join("answers.yaml");
    fs::write(&config, "project_type: cli-slim\n").unwrap();

    postgen()
        .arg(dir.path())
        .arg("--config")
        .arg(&config)
        .arg("--no-external")
        .assert()
        .code(1)
        .stderr(predicate::str::contains(".json or .toml"));
}

#[test]
fn test_quiet_silences_external_steps() {
    let dir = tempdir().unwrap();
    let root = dir.path().join("demo");
    setup_generated_project(&root);
    fs::write(root.join("dist.env"), "DEBUG=1\n").unwrap();

    // No tools on PATH: env file succeeds, uv and ruff fail as warnings
    postgen()
        .arg(&root)
        .args(["--project-type", "cli-slim"])
        .arg("--quiet")
        .env("PATH", "/nonexistent")
        .assert()
        .success()
        .stdout(predicate::str::is_empty())
        .stderr(predicate::str::contains("uv not found"));

    assert_eq!(fs::read_to_string(root.join(".env")).unwrap(), "DEBUG=1\n");
}
