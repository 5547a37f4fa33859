//! Integration tests for the Tally CLI

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use tempfile::TempDir;

/// Get the tally binary, isolated from the caller's environment
#[allow(deprecated)]
fn tally_cmd(dir: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("tally").unwrap();
    cmd.current_dir(dir.path())
        .env_remove("POSTGRES_URI")
        .env_remove("TALLY_LOG_LEVEL")
        .env_remove("TALLY_DEBUG");
    cmd
}

fn migration_files(dir: &std::path::Path) -> Vec<String> {
    let mut names: Vec<String> = fs::read_dir(dir)
        .unwrap()
        .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    names
}

#[test]
fn test_help_command() {
    let dir = TempDir::new().unwrap();
    tally_cmd(&dir)
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Tally CLI"))
        .stdout(predicate::str::contains("create"))
        .stdout(predicate::str::contains("migrate"))
        .stdout(predicate::str::contains("rollback"))
        .stdout(predicate::str::contains("init"))
        .stdout(predicate::str::contains("status"));
}

#[test]
fn test_rollback_help() {
    let dir = TempDir::new().unwrap();
    tally_cmd(&dir)
        .args(["rollback", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("--force"))
        .stdout(predicate::str::contains("--ignore-rls"));
}

#[test]
fn test_create_writes_template() {
    let dir = TempDir::new().unwrap();

    tally_cmd(&dir)
        .args(["create", "add_users"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Created \""))
        .stdout(predicate::str::contains("-add_users.sql\""));

    let migrations = dir.path().join("migrations");
    let files = migration_files(&migrations);
    assert_eq!(files.len(), 1);

    let file = &files[0];
    let id = file.split('-').next().unwrap();
    assert!(u64::from_str_radix(id, 16).is_ok(), "id should be hex: {}", id);

    let contents = fs::read_to_string(migrations.join(file)).unwrap();
    assert!(contents.contains("-- migrate"));
    assert!(contents.contains("-- rollback"));
}

#[test]
fn test_create_twice_gets_distinct_ids() {
    let dir = TempDir::new().unwrap();

    for name in ["first", "second"] {
        tally_cmd(&dir).args(["create", name]).assert().success();
    }

    let files = migration_files(&dir.path().join("migrations"));
    assert_eq!(files.len(), 2);
    let ids: Vec<&str> = files.iter().map(|f| f.split('-').next().unwrap()).collect();
    assert_ne!(ids[0], ids[1]);
}

#[test]
fn test_create_uses_config_directory() {
    let dir = TempDir::new().unwrap();
    fs::write(
        dir.path().join("tally.toml"),
        "[migrations]\ndirectory = \"db/changes\"\nextension = \"pgsql\"\n",
    )
    .unwrap();

    tally_cmd(&dir)
        .args(["create", "seed_roles"])
        .assert()
        .success();

    let files = migration_files(&dir.path().join("db").join("changes"));
    assert_eq!(files.len(), 1);
    assert!(files[0].ends_with("-seed_roles.pgsql"));
}

#[test]
fn test_create_rejects_path_names() {
    let dir = TempDir::new().unwrap();
    tally_cmd(&dir)
        .args(["create", "../escape"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("An error occurred, rollback..."));
}

#[test]
fn test_migrate_without_database_url_fails() {
    let dir = TempDir::new().unwrap();
    tally_cmd(&dir)
        .arg("migrate")
        .assert()
        .code(1)
        .stderr(predicate::str::contains("POSTGRES_URI"))
        .stderr(predicate::str::contains("An error occurred, rollback..."));
}

#[test]
fn test_rollback_failure_message() {
    let dir = TempDir::new().unwrap();
    tally_cmd(&dir)
        .args(["rollback", "--force"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains(
            "An error occurred, all the queries executed during the rollback will be reverted...",
        ));
}

#[test]
fn test_invalid_database_url_fails() {
    let dir = TempDir::new().unwrap();
    tally_cmd(&dir)
        .args(["init", "--database-url", "mysql://localhost/app"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("invalid scheme"));
}

#[test]
fn test_malformed_config_fails() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("tally.toml"), "[migrations\n").unwrap();

    tally_cmd(&dir)
        .arg("status")
        .assert()
        .code(1)
        .stderr(predicate::str::contains("Failed to parse TOML"));
}

#[test]
fn test_missing_explicit_config_fails() {
    let dir = TempDir::new().unwrap();
    tally_cmd(&dir)
        .args(["create", "x", "--config", "nope.toml"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("nope.toml"));
}
