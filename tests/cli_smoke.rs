#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::path::Path;

use assert_cmd::Command;
use serde_json::Value;
use tempfile::tempdir;

fn clientdesk(appdata: &Path) -> Command {
    let mut cmd = Command::cargo_bin("clientdesk").expect("binary built");
    cmd.env_remove("CLIENTDESK_DB")
        .env_remove("CLIENTDESK_LOG_DIR")
        .env("CLIENTDESK_FAKE_APPDATA", appdata)
        .env("CLIENTDESK_LOG", "off");
    cmd
}

fn stdout_json(output: &std::process::Output) -> Value {
    serde_json::from_slice(&output.stdout).expect("stdout json")
}

#[test]
fn migrate_creates_database_in_fake_appdata() -> anyhow::Result<()> {
    let dir = tempdir()?;
    let output = clientdesk(dir.path()).arg("migrate").output()?;
    assert!(output.status.success());
    assert!(String::from_utf8_lossy(&output.stdout).contains("Schema up to date"));
    assert!(dir.path().join("clientdesk.sqlite3").exists());
    Ok(())
}

#[test]
fn create_list_assign_edit_round_trip() -> anyhow::Result<()> {
    let dir = tempdir()?;
    let app = dir.path();

    clientdesk(app)
        .args(["employees", "add", "--id", "emp-1", "--name", "Sam Carter", "--role", "employee"])
        .assert()
        .success();

    let output = clientdesk(app)
        .args([
            "clients", "create", "--user", "u-1", "--name", "Acme Corp Contact", "--company",
            "Acme Corp", "--address", "1 Main St", "--json",
        ])
        .output()?;
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));
    let created = stdout_json(&output);
    assert_eq!(created["status"], "ongoing");
    assert_eq!(created["created_by"], "u-1");
    let id = created["id"].as_i64().expect("numeric id");

    let output = clientdesk(app)
        .args([
            "clients", "assign", "--user", "u-1", "--role", "head", "--id", &id.to_string(),
            "--employee", "emp-1",
        ])
        .output()?;
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));
    assert!(String::from_utf8_lossy(&output.stdout).contains("Assigned 1 employee(s)"));

    let output = clientdesk(app)
        .args(["clients", "list", "--view", "all", "--role", "head", "--user", "u-1", "--json"])
        .output()?;
    assert!(output.status.success());
    let listed = stdout_json(&output);
    assert_eq!(listed["total"], 1);
    assert_eq!(listed["clients"][0]["assignments"][0], "emp-1");

    let output = clientdesk(app)
        .args([
            "clients", "edit", "--user", "u-1", "--id", &id.to_string(), "--name", "Acme Contact",
            "--company", "Acme Corp", "--address", "2 Main St", "--json",
        ])
        .output()?;
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));
    assert_eq!(stdout_json(&output)["address"], "2 Main St");

    let output = clientdesk(app)
        .args(["clients", "list", "--role", "employee", "--user", "u-1", "--query", "2 MAIN"])
        .output()?;
    assert!(output.status.success());
    let text = String::from_utf8_lossy(&output.stdout);
    assert_eq!(text.lines().count(), 1);
    assert!(text.contains("Acme Contact"));
    Ok(())
}

#[test]
fn finance_view_hides_ongoing_clients() -> anyhow::Result<()> {
    let dir = tempdir()?;
    let app = dir.path();

    clientdesk(app)
        .args([
            "clients", "create", "--user", "u-1", "--name", "Jo", "--company", "Acme",
            "--address", "1 Main St",
        ])
        .assert()
        .success();

    for role in ["finance.employee", "head"] {
        let output = clientdesk(app)
            .args(["clients", "list", "--view", "finance", "--role", role, "--user", "u-2", "--json"])
            .output()?;
        assert!(output.status.success());
        assert_eq!(stdout_json(&output)["clients"], Value::Array(Vec::new()));
    }
    Ok(())
}

#[test]
fn errors_exit_non_zero_with_code() -> anyhow::Result<()> {
    let dir = tempdir()?;
    let app = dir.path();

    let output = clientdesk(app)
        .args([
            "clients", "create", "--user", "u-1", "--name", "Jo", "--company", "", "--address",
            "1 Main St",
        ])
        .output()?;
    assert_eq!(output.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&output.stderr)
        .contains("Error: [VALIDATION/FIELD_REQUIRED] company is required."));

    clientdesk(app)
        .args([
            "clients", "create", "--user", "u-1", "--name", "Jo", "--company", "Acme",
            "--address", "1 Main St",
        ])
        .assert()
        .success();

    let output = clientdesk(app)
        .args([
            "clients", "assign", "--user", "u-1", "--role", "head", "--id", "1", "--employee",
            "ghost",
        ])
        .output()?;
    assert_eq!(output.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&output.stderr).contains("Error: [STORE/PERSIST]"));

    let output = clientdesk(app)
        .args([
            "clients", "assign", "--user", "u-1", "--role", "finance.employee", "--view",
            "finance", "--id", "1", "--employee", "emp-1",
        ])
        .output()?;
    assert_eq!(output.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&output.stderr).contains("Error: [VALIDATION/NOT_PERMITTED]"));
    Ok(())
}
