//! CLI integration tests for the voxrelay command-line interface.
//!
//! These tests verify:
//! - Help text is displayed correctly
//! - Configuration problems are reported before anything is bound
//! - `config` never prints secret values
//!
//! Note: none of these contact the provider.

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

/// A voxrelay command isolated from the user's config and credentials.
fn voxrelay(dir: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("voxrelay").unwrap();
    cmd.current_dir(dir.path())
        .env("VOXRELAY_CONFIG_DIR", dir.path())
        .env_remove("HUME_API_KEY")
        .env_remove("HUME_SECRET_KEY")
        .env_remove("HUME_CONFIG_ID")
        .env_remove("WS_PORT")
        .env_remove("VOXRELAY_BIND");
    cmd
}

// ─────────────────────────────────────────────────────────────────────────────
// Help and Version Tests
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn test_help_lists_subcommands() {
    let dir = TempDir::new().unwrap();
    voxrelay(&dir)
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("start"))
        .stdout(predicate::str::contains("check"))
        .stdout(predicate::str::contains("config"));
}

#[test]
fn test_version_displays() {
    let dir = TempDir::new().unwrap();
    voxrelay(&dir)
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("voxrelay"));
}

#[test]
fn test_start_help() {
    let dir = TempDir::new().unwrap();
    voxrelay(&dir)
        .args(["start", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("--port"))
        .stdout(predicate::str::contains("--bind"))
        .stdout(predicate::str::contains("--config"));
}

#[test]
fn test_invalid_port_rejected() {
    let dir = TempDir::new().unwrap();
    voxrelay(&dir)
        .args(["start", "--port", "not-a-port"])
        .assert()
        .failure();
}

// ─────────────────────────────────────────────────────────────────────────────
// Configuration Errors
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn test_start_without_credentials_fails() {
    let dir = TempDir::new().unwrap();
    voxrelay(&dir)
        .args(["start", "--port", "0"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("HUME_API_KEY"));
}

#[test]
fn test_placeholder_credentials_rejected() {
    let dir = TempDir::new().unwrap();
    voxrelay(&dir)
        .env("HUME_API_KEY", "your_hume_api_key_here")
        .env("HUME_SECRET_KEY", "s")
        .args(["check", "--offline"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("placeholder"));
}

#[test]
fn test_check_offline_with_env_credentials() {
    let dir = TempDir::new().unwrap();
    voxrelay(&dir)
        .env("HUME_API_KEY", "k")
        .env("HUME_SECRET_KEY", "s")
        .args(["check", "--offline"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Configuration OK"))
        .stdout(predicate::str::contains("env var HUME_API_KEY"));
}

#[test]
fn test_explicit_config_must_exist() {
    let dir = TempDir::new().unwrap();
    voxrelay(&dir)
        .env("HUME_API_KEY", "k")
        .env("HUME_SECRET_KEY", "s")
        .args(["check", "--offline", "--config", "missing.toml"])
        .assert()
        .failure();
}

// ─────────────────────────────────────────────────────────────────────────────
// Config Display
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn test_config_show_redacts_file_secrets() {
    let dir = TempDir::new().unwrap();
    std::fs::write(
        dir.path().join("voxrelay.toml"),
        r#"
[provider]
api_key = "file-key-123"
secret_key = "file-secret-456"
config_id = "cfg-1"

[server]
port = 9100
"#,
    )
    .unwrap();

    voxrelay(&dir)
        .arg("config")
        .assert()
        .success()
        .stdout(predicate::str::contains("cfg-1"))
        .stdout(predicate::str::contains(":9100"))
        .stdout(predicate::str::contains("config file (plaintext)"))
        .stdout(predicate::str::contains("file-key-123").not())
        .stdout(predicate::str::contains("file-secret-456").not())
        .stderr(predicate::str::contains("plaintext"));
}

#[test]
fn test_env_port_overrides_file() {
    let dir = TempDir::new().unwrap();
    std::fs::write(dir.path().join("voxrelay.toml"), "[server]\nport = 9100\n").unwrap();

    voxrelay(&dir)
        .env("HUME_API_KEY", "k")
        .env("HUME_SECRET_KEY", "s")
        .env("WS_PORT", "9200")
        .args(["config", "show"])
        .assert()
        .success()
        .stdout(predicate::str::contains(":9200"));
}

#[test]
fn test_config_which_lists_sources() {
    let dir = TempDir::new().unwrap();
    voxrelay(&dir)
        .args(["config", "which"])
        .assert()
        .success()
        .stdout(predicate::str::contains("config.toml"))
        .stdout(predicate::str::contains("voxrelay.toml"));
}
