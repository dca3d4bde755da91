//! Command-line smoke tests against the built binary

use std::fs;
use std::path::Path;

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::tempdir;

fn nes(dir: &Path) -> Command {
    let mut cmd = Command::cargo_bin("nes").unwrap();
    cmd.current_dir(dir)
        .env_remove("NES_DB_PATH")
        .env_remove("NES_CONFIG")
        .env_remove("RUST_LOG");
    cmd
}

fn write_unit(dir: &Path) {
    let unit = dir.join("migrations/001-seed-people");
    fs::create_dir_all(&unit).unwrap();
    fs::write(
        unit.join("migration.toml"),
        "[metadata]\ndate = \"2025-01-15\"\ndescription = \"Seed people\"\n\n[data]\nentities = [\"people.json\"]\n",
    )
    .unwrap();
    fs::write(
        unit.join("people.json"),
        r#"[{"slug": "ram-example", "type": "person", "names": [{"kind": "PRIMARY", "en": {"full": "Ram Example"}}]}]"#,
    )
    .unwrap();
}

#[test]
fn init_migrate_show() {
    let dir = tempdir().unwrap();

    nes(dir.path())
        .arg("init")
        .assert()
        .success()
        .stdout(predicate::str::contains("Initialized registry"));
    write_unit(dir.path());

    nes(dir.path())
        .args(["migrate", "--dry-run"])
        .assert()
        .success()
        .stdout(predicate::str::contains("001-seed-people"));

    nes(dir.path())
        .arg("migrate")
        .assert()
        .success()
        .stdout(predicate::str::contains("applied"));

    nes(dir.path())
        .args(["show", "entity:person/ram-example", "--json"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"slug\": \"ram-example\""));

    let nested = dir.path().join("docs/notes");
    fs::create_dir_all(&nested).unwrap();
    nes(&nested)
        .args(["show", "entity:person/ram-example", "--json"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"slug\": \"ram-example\""));

    nes(dir.path())
        .args(["history", "entity:person/ram-example", "--json"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"total\": 1"))
        .stdout(predicate::str::contains("author:human:cli-user"));

    nes(dir.path())
        .args(["migrate"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Nothing to apply."));
}

#[test]
fn missing_record_fails() {
    let dir = tempdir().unwrap();
    nes(dir.path()).arg("init").assert().success();

    nes(dir.path())
        .args(["show", "entity:person/nobody-here"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("not found"));
}
