// tests/definition_loading.rs

use std::io::Write;

use tempfile::{Builder, NamedTempFile};

use batchflow::config;
use batchflow::definition::{load_and_validate, load_from_path};
use batchflow::errors::{BatchflowError, DefinitionError};

fn file_with(suffix: &str, contents: &str) -> NamedTempFile {
    let mut file = Builder::new().suffix(suffix).tempfile().unwrap();
    write!(file, "{contents}").unwrap();
    file
}

#[test]
fn loads_json_definition_with_groups() {
    let file = file_with(
        ".json",
        r#"{
            "etl":     { "desc": "nightly etl" },
            "extract": { "group": "etl" },
            "users":   { "group": "extract", "cmd": "./users.sh" },
            "orders":  { "group": "extract", "cmd": "./orders.sh" },
            "load":    { "group": "etl", "cmd": "./load.sh", "depends": ["extract"] }
        }"#,
    );

    let flow = load_and_validate(file.path()).unwrap();
    assert_eq!(flow.root_url(), "/etl");
    assert_eq!(flow.leaf_count(), 3);
    assert_eq!(flow.edge_count(), 1);
    assert_eq!(
        flow.task_by_url("/etl/extract/users").unwrap().kind.command(),
        Some("./users.sh")
    );
    assert!(flow.graph_for_url("/etl").is_some());
}

#[test]
fn loads_toml_definition_by_extension() {
    let file = file_with(
        ".toml",
        r#"
[flow]
desc = "toml flow"

[a]
group = "flow"
cmd = "echo a"

[b]
group = "flow"
cmd = "echo b"
depends = ["a"]
"#,
    );

    let definition = load_from_path(file.path()).unwrap();
    assert_eq!(definition.len(), 3);
    let flow = load_and_validate(file.path()).unwrap();
    assert_eq!(flow.edge_count(), 1);
}

#[test]
fn dependency_cycle_is_a_structured_error() {
    let file = file_with(
        ".json",
        r#"{
            "f": {},
            "a": { "group": "f", "cmd": "true", "depends": ["b"] },
            "b": { "group": "f", "cmd": "true", "depends": ["a"] }
        }"#,
    );

    match load_and_validate(file.path()) {
        Err(BatchflowError::Definition(DefinitionError::Cycle { from, to })) => {
            assert!(from == "a" || from == "b");
            assert!(to == "a" || to == "b");
            assert_ne!(from, to);
        }
        other => panic!("expected cycle error, got {other:?}"),
    }
}

#[test]
fn unresolved_predecessor_names_scope() {
    let file = file_with(
        ".json",
        r#"{
            "f": {},
            "g": { "group": "f" },
            "x": { "group": "g", "cmd": "true" },
            "y": { "group": "f", "cmd": "true", "depends": ["x"] }
        }"#,
    );

    let err = load_and_validate(file.path()).unwrap_err();
    let message = err.to_string();
    assert!(message.contains("'y'"), "{message}");
    assert!(message.contains("'x'"), "{message}");
    assert!(message.contains("/f"), "{message}");
}

#[test]
fn malformed_json_is_a_json_error() {
    let file = file_with(".json", "{ not json");
    assert!(matches!(
        load_from_path(file.path()),
        Err(BatchflowError::JsonError(_))
    ));
}

#[test]
fn repeated_task_id_in_json_is_rejected() {
    let file = file_with(
        ".json",
        r#"{
            "f": {},
            "a": { "group": "f", "cmd": "true" },
            "a": { "group": "f", "cmd": "false" }
        }"#,
    );
    match load_from_path(file.path()) {
        Err(BatchflowError::JsonError(err)) => {
            assert!(err.to_string().contains("duplicate task id"), "{err}")
        }
        other => panic!("expected a json error, got {other:?}"),
    }
}

#[test]
fn missing_file_is_an_io_error() {
    assert!(matches!(
        load_from_path("/definitely/not/here/flow.json"),
        Err(BatchflowError::IoError(_))
    ));
}

#[test]
fn runner_config_loads_and_validates() {
    let dir = tempfile::tempdir().unwrap();
    let file = file_with(
        ".toml",
        &format!(
            r#"
[executor]
workers = 3
working_dir = "{}"

[executor.env]
BATCH_ENV = "prod"

[runtime]
retire_finished = true
"#,
            dir.path().display()
        ),
    );

    let cfg = config::load_and_validate(file.path()).unwrap();
    assert_eq!(cfg.executor().workers, 3);
    assert_eq!(cfg.executor().env.get("BATCH_ENV").map(String::as_str), Some("prod"));
    let options = cfg.runtime_options();
    assert!(options.retire_finished);
    assert_eq!(options.workers, 3);

    // The command-line override wins; zero means "not given".
    assert_eq!(cfg.clone().with_workers(8).executor().workers, 8);
    assert_eq!(cfg.with_workers(0).executor().workers, 3);
}

#[test]
fn runner_config_rejects_bad_values() {
    let zero = file_with(".toml", "[executor]\nworkers = 0\n");
    assert!(matches!(
        config::load_and_validate(zero.path()),
        Err(BatchflowError::ConfigError(_))
    ));

    let unknown = file_with(".toml", "[executor]\nthreads = 2\n");
    assert!(matches!(
        config::load_and_validate(unknown.path()),
        Err(BatchflowError::TomlError(_))
    ));
}
