//! End-to-end tests of the `arbor` binary.

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

fn arbor(dir: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("arbor").unwrap();
    cmd.arg("--dir").arg(dir.path()).env_remove("RUST_LOG");
    cmd
}

/// A dataset with the actname/actdate schema and three datums.
fn acts() -> TempDir {
    let dir = TempDir::new().unwrap();
    arbor(&dir)
        .args(["init", "--schema", "datum:actname", "--schema", "datum:actdate"])
        .assert()
        .success();
    arbor(&dir)
        .args(["-q", "insert", "--query"])
        .arg(
            r#"[
                {"_": "datum", "datum": "k1", "actname": "name1", "actdate": "2001-01-01"},
                {"_": "datum", "datum": "k2", "actname": "name2", "actdate": "2002-06-01"},
                {"_": "datum", "datum": "k3", "actname": "name3", "actdate": "2003-01-01"}
            ]"#,
        )
        .assert()
        .success();
    dir
}

#[test]
fn help_lists_commands() {
    Command::cargo_bin("arbor")
        .unwrap()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("select"))
        .stdout(predicate::str::contains("insert"));
}

#[test]
fn init_writes_schema_tablet() {
    let dir = TempDir::new().unwrap();
    arbor(&dir)
        .args(["init", "-s", "datum:actname", "-s", "datum:actdate"])
        .assert()
        .success()
        .stderr(predicate::str::contains("Initialized dataset"));

    assert_eq!(
        std::fs::read_to_string(dir.path().join("_-_.csv")).unwrap(),
        "datum,actdate\ndatum,actname\n"
    );
    arbor(&dir)
        .arg("schema")
        .assert()
        .success()
        .stdout("datum:actdate\ndatum:actname\n");
}

#[test]
fn init_twice_fails() {
    let dir = acts();
    arbor(&dir)
        .args(["init", "-s", "datum:actname"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("already initialized"));
}

#[test]
fn select_prints_matching_records() {
    let dir = acts();
    arbor(&dir)
        .args(["select", "--query", r#"{"_": "datum", "actdate": ".*-01-01"}"#])
        .assert()
        .success()
        .stdout(predicate::str::contains(r#""datum":"k1""#))
        .stdout(predicate::str::contains(r#""datum":"k3""#))
        .stdout(predicate::str::contains("k2").not());
}

#[test]
fn select_reads_query_from_stdin() {
    let dir = acts();
    arbor(&dir)
        .arg("select")
        .write_stdin(r#"{"_": "datum", "actname": "name2"}"#)
        .assert()
        .success()
        .stdout(predicate::str::contains(r#""actdate":"2002-06-01""#));
}

#[test]
fn options_lists_values() {
    let dir = acts();
    arbor(&dir)
        .args(["options", "--query", r#"{"_": "actname"}"#])
        .assert()
        .success()
        .stdout(predicate::str::contains(r#""actname":"name1""#))
        .stdout(predicate::str::contains(r#""actname":"name3""#));
}

#[test]
fn insert_prints_generated_key() {
    let dir = acts();
    arbor(&dir)
        .args(["insert", "--query", r#"{"_": "datum", "actname": "fresh"}"#])
        .assert()
        .success()
        .stdout(predicate::str::is_match(r#""datum":"[0-9a-f]{32}""#).unwrap());
}

#[test]
fn update_then_delete() {
    let dir = acts();
    arbor(&dir)
        .args(["update", "--query", r#"{"_": "datum", "datum": "k2", "actname": "renamed"}"#])
        .assert()
        .success();
    assert_eq!(
        std::fs::read_to_string(dir.path().join("datum-actname.csv")).unwrap(),
        "k1,name1\nk2,renamed\nk3,name3\n"
    );

    arbor(&dir)
        .args(["delete", "--query", r#"{"_": "datum", "datum": "k2"}"#])
        .assert()
        .success()
        .stderr(predicate::str::contains("Deleted 1 record(s)"));
    arbor(&dir)
        .args(["select", "--query", r#"{"_": "datum", "datum": "k2"}"#])
        .assert()
        .success()
        .stdout("[]\n");
}

#[test]
fn unknown_branch_is_an_error() {
    let dir = acts();
    arbor(&dir)
        .args(["select", "--query", r#"{"_": "datum", "nope": "x"}"#])
        .assert()
        .failure()
        .stderr(predicate::str::contains("error:"))
        .stderr(predicate::str::contains("nope"));
}

#[test]
fn missing_dataset_is_an_error() {
    let dir = TempDir::new().unwrap();
    arbor(&dir)
        .args(["select", "--query", r#"{"_": "datum"}"#])
        .assert()
        .failure()
        .stderr(predicate::str::contains("not an arbor dataset"));
}

#[test]
fn invalid_json_is_an_error() {
    let dir = acts();
    arbor(&dir)
        .args(["select", "--query", "{not json"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("not valid JSON"));
}

#[test]
fn completion_generates_script() {
    Command::cargo_bin("arbor")
        .unwrap()
        .args(["completion", "bash"])
        .assert()
        .success()
        .stdout(predicate::str::contains("arbor"));
}
