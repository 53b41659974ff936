use std::fs;

use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;
use tempfile::tempdir;

#[test]
fn test_config_path_command() {
    let dir = tempdir().unwrap();

    cargo_bin_cmd!("huddle")
        .env("HUDDLE_HOME", dir.path())
        .args(["config", "path"])
        .assert()
        .success()
        .stdout(predicate::str::contains("config.toml"));
}

#[test]
fn test_config_init_creates_file() {
    let dir = tempdir().unwrap();
    let config_path = dir.path().join("config.toml");

    assert!(!config_path.exists());

    cargo_bin_cmd!("huddle")
        .env("HUDDLE_HOME", dir.path())
        .args(["config", "init"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Created config at"));

    assert!(config_path.exists());

    let contents = fs::read_to_string(&config_path).unwrap();
    assert!(contents.contains("base_url ="));
    assert!(contents.contains("# league_id ="));
}

#[test]
fn test_config_init_fails_if_exists() {
    let dir = tempdir().unwrap();
    let config_path = dir.path().join("config.toml");

    fs::write(&config_path, "# existing config").unwrap();

    cargo_bin_cmd!("huddle")
        .env("HUDDLE_HOME", dir.path())
        .args(["config", "init"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("already exists"));
}

#[test]
fn test_config_show_applies_env_override() {
    let dir = tempdir().unwrap();
    fs::write(dir.path().join("config.toml"), "transport = \"json\"\n").unwrap();

    cargo_bin_cmd!("huddle")
        .env("HUDDLE_HOME", dir.path())
        .env("HUDDLE_BASE_URL", "http://agent.local:9000/")
        .args(["config", "show"])
        .assert()
        .success()
        .stdout(predicate::str::contains(r#"base_url = "http://agent.local:9000""#))
        .stdout(predicate::str::contains(r#"transport = "json""#));
}

#[test]
fn test_invalid_config_is_reported() {
    let dir = tempdir().unwrap();
    fs::write(dir.path().join("config.toml"), "transport = 5\n").unwrap();

    cargo_bin_cmd!("huddle")
        .env("HUDDLE_HOME", dir.path())
        .args(["config", "show"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("Failed to parse config"));
}

#[test]
fn test_config_help_shows_subcommands() {
    cargo_bin_cmd!("huddle")
        .args(["config", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("path"))
        .stdout(predicate::str::contains("init"))
        .stdout(predicate::str::contains("show"));
}
