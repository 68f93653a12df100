//! CLI integration tests for the Tessera command-line interface.
//!
//! Every test pins configuration through `--config` or an empty
//! `TESSERA_CONFIG_DIR` so the developer's own files never leak in. Only the
//! in-process backend and an unreachable memcached address are exercised.

use std::fs;
use std::path::PathBuf;

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

/// A command for the tessera binary isolated from user config.
fn tessera(dir: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("tessera").unwrap();
    cmd.current_dir(dir.path())
        .env("TESSERA_CONFIG_DIR", dir.path().join("user"))
        .env_remove("TESSERA_CONFIG")
        .env_remove("RUST_LOG");
    cmd
}

fn write_config(dir: &TempDir, contents: &str) -> PathBuf {
    let path = dir.path().join("custom.toml");
    fs::write(&path, contents).unwrap();
    path
}

// ─────────────────────────────────────────────────────────────────────────────
// Help and Version Tests
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn test_help_lists_subcommands() {
    let dir = TempDir::new().unwrap();
    tessera(&dir)
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("list"))
        .stdout(predicate::str::contains("show"))
        .stdout(predicate::str::contains("delete"))
        .stdout(predicate::str::contains("ping"))
        .stdout(predicate::str::contains("config"));
}

#[test]
fn test_version_displays() {
    let dir = TempDir::new().unwrap();
    tessera(&dir)
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("tessera"));
}

#[test]
fn test_show_requires_id() {
    let dir = TempDir::new().unwrap();
    tessera(&dir).arg("show").assert().failure();
}

// ─────────────────────────────────────────────────────────────────────────────
// Config Tests
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn test_config_defaults_without_files() {
    let dir = TempDir::new().unwrap();
    tessera(&dir)
        .arg("config")
        .assert()
        .success()
        .stdout(predicate::str::contains("No config files loaded"))
        .stdout(predicate::str::contains("tessera_sid"))
        .stdout(predicate::str::contains("kind = \"memory\""));
}

#[test]
fn test_config_show_json_from_explicit_file() {
    let dir = TempDir::new().unwrap();
    let path = write_config(
        &dir,
        r#"
[session]
ttl_secs = 900

[backend]
kind = "memcache"
address = "10.0.0.5:11211"
"#,
    );

    tessera(&dir)
        .args(["--json", "config", "show", "--config"])
        .arg(&path)
        .assert()
        .success()
        .stdout(predicate::str::contains("\"ttl_secs\": 900"))
        .stdout(predicate::str::contains("10.0.0.5:11211"));
}

#[test]
fn test_project_file_is_discovered() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("tessera.toml"), "[session]\nkey_prefix = \"app:\"\n").unwrap();

    tessera(&dir)
        .args(["config", "which"])
        .assert()
        .success()
        .stdout(predicate::str::contains("tessera.toml"));

    tessera(&dir)
        .arg("config")
        .assert()
        .success()
        .stdout(predicate::str::contains("app:"));
}

#[test]
fn test_invalid_explicit_config_fails() {
    let dir = TempDir::new().unwrap();
    let path = write_config(&dir, "[session]\nttl_secs = 0\n");

    tessera(&dir)
        .arg("--config")
        .arg(&path)
        .arg("config")
        .assert()
        .failure()
        .stderr(predicate::str::contains("session.ttl_secs"));
}

#[test]
fn test_missing_explicit_config_fails() {
    let dir = TempDir::new().unwrap();
    tessera(&dir)
        .args(["--config", "does-not-exist.toml", "list"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("does-not-exist.toml"));
}

// ─────────────────────────────────────────────────────────────────────────────
// Session Commands (in-process backend)
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn test_list_memory_backend_is_empty() {
    let dir = TempDir::new().unwrap();
    tessera(&dir)
        .args(["--json", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"count\": 0"))
        .stdout(predicate::str::contains("in-process"));
}

#[test]
fn test_show_rejects_malformed_id() {
    let dir = TempDir::new().unwrap();
    tessera(&dir)
        .args(["show", "bad id!"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("not a valid session id"));
}

#[test]
fn test_show_unknown_id_fails() {
    let dir = TempDir::new().unwrap();
    tessera(&dir)
        .args(["show", "0123456789abcdef0123456789abcdef"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("not found"));
}

#[test]
fn test_delete_unknown_id_succeeds() {
    let dir = TempDir::new().unwrap();
    tessera(&dir)
        .args(["--json", "delete", "0123456789abcdef0123456789abcdef"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"existed\": false"));
}

#[test]
fn test_ping_memory_backend() {
    let dir = TempDir::new().unwrap();
    tessera(&dir)
        .args(["--json", "ping"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"ok\": true"));
}

#[test]
fn test_ping_unreachable_memcached_fails() {
    let dir = TempDir::new().unwrap();
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let address = listener.local_addr().unwrap().to_string();
    drop(listener);

    let path = write_config(
        &dir,
        &format!(
            "[backend]\nkind = \"memcache\"\naddress = \"{}\"\n\
             connect_timeout_ms = 200\noperation_timeout_ms = 300\n",
            address
        ),
    );

    tessera(&dir)
        .arg("--config")
        .arg(&path)
        .args(["--json", "ping"])
        .assert()
        .failure()
        .stdout(predicate::str::contains("\"ok\": false"))
        .stdout(predicate::str::contains(address.as_str()));
}
