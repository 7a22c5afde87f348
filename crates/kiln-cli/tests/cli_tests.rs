//! End-to-end tests of the `kiln` binary.

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use tempfile::TempDir;

fn kiln() -> Command {
    let mut cmd = Command::cargo_bin("kiln").unwrap();
    cmd.env_remove("KILN_LOG").env_remove("RUST_LOG").env("NO_COLOR", "1");
    cmd
}

fn project() -> TempDir {
    let temp = TempDir::new().unwrap();
    fs::create_dir_all(temp.path().join("src")).unwrap();
    fs::write(temp.path().join("src/main.ts"), "export const answer = 42;\n").unwrap();
    fs::write(
        temp.path().join("kiln.toml"),
        "[build]\nentries = [\"src/main.ts\"]\n\n[profiles.production.build]\nmode = \"production\"\n",
    )
    .unwrap();
    temp
}

#[test]
fn test_help_lists_commands() {
    kiln()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("build"))
        .stdout(predicate::str::contains("dev"));
}

#[test]
fn test_build_writes_manifest() {
    let temp = project();
    kiln()
        .current_dir(temp.path())
        .arg("build")
        .assert()
        .success();
    assert!(temp.path().join("dist/manifest.json").exists());
}

#[test]
fn test_build_json_prints_fingerprint() {
    let temp = project();
    kiln()
        .args(["build", "--json", "--no-cache", "--root"])
        .arg(temp.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("\"outputHash\""))
        .stdout(predicate::str::contains("\"engineVersion\""));
}

#[test]
fn test_missing_entry_fails() {
    let temp = project();
    kiln()
        .args(["build", "src/nope.ts", "--root"])
        .arg(temp.path())
        .assert()
        .failure();
}

#[test]
fn test_unknown_profile_fails() {
    let temp = project();
    kiln()
        .args(["build", "--profile", "staging", "--root"])
        .arg(temp.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("staging"));
}

#[test]
fn test_missing_root_fails() {
    let temp = TempDir::new().unwrap();
    kiln()
        .args(["build", "--root"])
        .arg(temp.path().join("absent"))
        .assert()
        .failure()
        .stderr(predicate::str::contains("Directory not found"));
}
