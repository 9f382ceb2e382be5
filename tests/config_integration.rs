//! `config` command resolution and validation.

mod common;

use common::{stdout_json, Workspace};
use std::fs;

#[test]
fn config_prints_file_values() {
    let workspace = Workspace::new();
    workspace.write_config("http://lm.test/v1/chat/completions", "http://embed.test");

    let config = Workspace::path_arg(&workspace.config_path());
    let value = stdout_json(&workspace.run(&["config", "--config", &config]));

    assert_eq!(value["generator"]["endpoint"], "http://lm.test/v1/chat/completions");
    assert_eq!(value["embedding"]["endpoint"], "http://embed.test");
    assert_eq!(value["checkpoint_every"], 2);
}

#[test]
fn environment_overrides_file_endpoints() {
    let workspace = Workspace::new();
    workspace.write_config("http://lm.test/v1/chat/completions", "http://embed.test");

    let config = Workspace::path_arg(&workspace.config_path());
    let output = workspace.run_with_env(
        &["config", "--config", &config],
        &[("CATALOG_ENRICH_LM_URL", "http://override.test/v1/chat/completions")],
    );
    let value = stdout_json(&output);

    assert_eq!(
        value["generator"]["endpoint"],
        "http://override.test/v1/chat/completions"
    );
    assert_eq!(value["embedding"]["endpoint"], "http://embed.test");
}

#[test]
fn invalid_config_is_rejected() {
    let workspace = Workspace::new();
    let text = fs::read_to_string(workspace.config_path()).expect("read config");
    fs::write(
        workspace.config_path(),
        text.replace("\"checkpoint_every\": 2", "\"checkpoint_every\": 0"),
    )
    .expect("write config");

    let config = Workspace::path_arg(&workspace.config_path());
    let output = workspace.run(&["config", "--config", &config]);

    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("checkpoint_every"));
}

#[test]
fn unknown_config_field_is_rejected() {
    let workspace = Workspace::new();
    fs::write(workspace.config_path(), r#"{"schema_version": 1, "bogus": true}"#)
        .expect("write config");

    let config = Workspace::path_arg(&workspace.config_path());
    let output = workspace.run(&["config", "--config", &config]);
    assert!(!output.status.success());
}
