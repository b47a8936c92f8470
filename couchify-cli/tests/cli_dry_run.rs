use assert_cmd::Command;
use predicates::prelude::*;
use serde_json::Value;
use std::fs;
use tempfile::tempdir;

#[test]
fn dry_run_prints_design_document() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempdir()?;
    fs::create_dir_all(dir.path().join("shows"))?;
    fs::create_dir_all(dir.path().join("lib"))?;
    fs::write(dir.path().join("lib/util.js"), "module.exports = 1;\n")?;
    fs::write(
        dir.path().join("shows/simple.js"),
        "var util = require('../lib/util');\nmodule.exports = function(doc){ return 'ok' }",
    )?;

    let output = Command::cargo_bin("couchify")?
        .arg(dir.path())
        .arg("--dry")
        .output()?;
    assert!(output.status.success());

    let doc: Value = serde_json::from_slice(&output.stdout)?;
    assert_eq!(doc["_id"], "_design/default");
    assert_eq!(doc["language"], "javascript");
    assert_eq!(doc["commons"]["0"], "module.exports = 1;\n");
    assert_eq!(
        doc["shows"]["simple"],
        "(function(){\n\nvar util = require(\"commons/0\");\nreturn 'ok'\n\n}())"
    );

    Ok(())
}

#[test]
fn name_flag_sets_document_id() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempdir()?;

    let output = Command::cargo_bin("couchify")?
        .arg(dir.path())
        .args(["-n", "app", "-y"])
        .output()?;
    assert!(output.status.success());

    let doc: Value = serde_json::from_slice(&output.stdout)?;
    assert_eq!(doc["_id"], "_design/app");

    Ok(())
}

#[test]
fn config_file_supplies_directories() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempdir()?;
    fs::create_dir_all(dir.path().join("design/s"))?;
    fs::write(
        dir.path().join("design/s/a.js"),
        "module.exports = function () { return 1 }",
    )?;
    fs::write(
        dir.path().join("couchify.yml"),
        "id: configured\nbase_dir: design\nshows_dir: s\n",
    )?;

    let output = Command::cargo_bin("couchify")?
        .arg("--config")
        .arg(dir.path().join("couchify.yml"))
        .arg("--dry")
        .output()?;
    assert!(output.status.success());

    let doc: Value = serde_json::from_slice(&output.stdout)?;
    assert_eq!(doc["_id"], "_design/configured");
    assert!(doc["shows"]["a"].is_string());

    Ok(())
}

#[test]
fn missing_export_exits_nonzero() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempdir()?;
    fs::create_dir_all(dir.path().join("shows"))?;
    fs::write(dir.path().join("shows/bad.js"), "var x = 1;\n")?;

    Command::cargo_bin("couchify")?
        .arg(dir.path())
        .arg("--dry")
        .assert()
        .failure()
        .stderr(predicate::str::contains(
            "could not couchify: a design document did not export a default function: shows/bad.js",
        ));

    Ok(())
}

#[test]
fn missing_base_dir_exits_nonzero() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempdir()?;

    Command::cargo_bin("couchify")?
        .arg(dir.path().join("nope"))
        .arg("--dry")
        .assert()
        .failure()
        .stderr(predicate::str::contains("base directory does not exist"));

    Ok(())
}

#[test]
fn no_directory_is_a_configuration_error() -> Result<(), Box<dyn std::error::Error>> {
    Command::cargo_bin("couchify")?
        .arg("--dry")
        .assert()
        .failure()
        .stderr(predicate::str::contains("you must provide a directory"));

    Ok(())
}

#[test]
fn unreachable_remote_fails_deploy() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempdir()?;

    Command::cargo_bin("couchify")?
        .arg(dir.path())
        .args(["--remote", "127.0.0.1:1"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("could not deploy"));

    Ok(())
}

#[test]
fn user_without_pass_is_rejected() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempdir()?;

    Command::cargo_bin("couchify")?
        .env_remove("COUCHIFY_USER")
        .env_remove("COUCHIFY_PASS")
        .arg(dir.path())
        .args(["--user", "admin", "--dry"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("--pass"));

    Command::cargo_bin("couchify")?
        .env_remove("COUCHIFY_USER")
        .env_remove("COUCHIFY_PASS")
        .arg(dir.path())
        .args(["--pass", "secret", "--dry"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("--user"));

    Ok(())
}

#[test]
fn version_flag() -> Result<(), Box<dyn std::error::Error>> {
    Command::cargo_bin("couchify")?
        .arg("-V")
        .assert()
        .success()
        .stdout(predicate::str::contains(env!("CARGO_PKG_VERSION")));

    Ok(())
}
