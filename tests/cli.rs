use std::path::{Path, PathBuf};

use assert_cmd::Command;
use pyissues::archive::{Archive, TextMode};
use pyissues::model::{Issue, IssueId, ScalarField};
use pyissues::storage::ArchiveStore;
use tempfile::TempDir;

fn cli(home: &Path) -> Command {
    let mut cmd = Command::cargo_bin("pyissues").unwrap();
    cmd.env("PYISSUES_CONFIG", home.join("config.json"))
        .env_remove("PYISSUES_META")
        .env_remove("PYISSUES_DATA")
        .env_remove("RUST_LOG")
        .arg("--no-color")
        .arg("--base-url")
        .arg("http://127.0.0.1:9/");
    cmd
}

fn issue(id: IssueId, title: &str) -> Issue {
    Issue::builder(id)
        .scalar(ScalarField::Title, title)
        .build()
        .unwrap()
}

fn write_archive(path: &Path, issues: Vec<Issue>) {
    let archive = Archive::from_issues(issues);
    ArchiveStore::new(path, TextMode::Base64).save(&archive).unwrap();
}

fn stdout_json(output: &[u8]) -> serde_json::Value {
    serde_json::from_slice(output).expect("stdout is JSON")
}

#[test]
fn test_version_command() {
    let home = TempDir::new().unwrap();
    let assert = cli(home.path()).arg("version").assert().success();
    let stdout = String::from_utf8_lossy(&assert.get_output().stdout).into_owned();
    assert!(stdout.starts_with("pyissues version "));

    let assert = cli(home.path())
        .args(["--json", "version"])
        .assert()
        .success();
    let json = stdout_json(&assert.get_output().stdout);
    assert_eq!(json["version"], env!("CARGO_PKG_VERSION"));
    assert_eq!(json["container"], "json-v1");
}

#[test]
fn test_help_lists_operations() {
    let home = TempDir::new().unwrap();
    let assert = cli(home.path()).arg("--help").assert().success();
    let stdout = String::from_utf8_lossy(&assert.get_output().stdout).into_owned();
    for name in ["rebuild", "refetch", "check", "fix", "update", "load", "merge"] {
        assert!(stdout.contains(name), "missing {name} in help");
    }
}

#[test]
fn test_load_and_show() {
    let home = TempDir::new().unwrap();
    let data = home.path().join("issues.json.gz");
    write_archive(&data, vec![issue(1, "first"), issue(2, "ünïcode <b>")]);

    let assert = cli(home.path())
        .arg("--json")
        .arg("-d")
        .arg(&data)
        .arg("load")
        .assert()
        .success();
    let json = stdout_json(&assert.get_output().stdout);
    assert_eq!(json["issues"], 2);
    assert!(json["size_bytes"].as_u64().unwrap() > 0);

    let assert = cli(home.path())
        .arg("--json")
        .arg("-d")
        .arg(&data)
        .args(["show", "2"])
        .assert()
        .success();
    let json = stdout_json(&assert.get_output().stdout);
    assert_eq!(json["id"], 2);
    assert_eq!(json["title"], "ünïcode <b>");
}

#[test]
fn test_show_missing_issue_fails() {
    let home = TempDir::new().unwrap();
    let data = home.path().join("issues.json.gz");
    write_archive(&data, vec![issue(1, "first")]);

    cli(home.path())
        .arg("-d")
        .arg(&data)
        .args(["show", "99"])
        .assert()
        .code(3);
}

#[test]
fn test_load_missing_archive_fails() {
    let home = TempDir::new().unwrap();
    cli(home.path())
        .arg("-d")
        .arg(home.path().join("absent.json.gz"))
        .arg("load")
        .assert()
        .code(3);
}

#[test]
fn test_merge_archives() {
    let home = TempDir::new().unwrap();
    let a = home.path().join("a.json.gz");
    let b = home.path().join("b.json.gz");
    let broken = home.path().join("broken.json.gz");
    let out: PathBuf = home.path().join("merged.json");
    write_archive(&a, vec![issue(1, "one"), issue(2, "two")]);
    write_archive(&b, vec![issue(2, "two, edited"), issue(3, "three")]);
    std::fs::write(&broken, b"not a container").unwrap();

    let assert = cli(home.path())
        .arg("--json")
        .arg("merge")
        .arg(&a)
        .arg(&broken)
        .arg(&b)
        .arg("-o")
        .arg(&out)
        .assert()
        .success();
    let json = stdout_json(&assert.get_output().stdout);
    assert_eq!(json["written"], 3);
    assert_eq!(json["loaded"], 2);
    assert_eq!(json["failed"].as_array().unwrap().len(), 1);

    let merged = ArchiveStore::new(&out, TextMode::Base64).load().unwrap();
    assert_eq!(merged.len(), 3);
    assert_eq!(merged.get(2).unwrap().title, "two, edited");
}

#[test]
fn test_merge_with_nothing_loadable_fails() {
    let home = TempDir::new().unwrap();
    let broken = home.path().join("broken.json");
    std::fs::write(&broken, b"{").unwrap();

    cli(home.path())
        .arg("merge")
        .arg(&broken)
        .arg("-o")
        .arg(home.path().join("out.json"))
        .assert()
        .code(4);
}

#[test]
fn test_update_without_metadata_fails() {
    let home = TempDir::new().unwrap();
    let assert = cli(home.path())
        .arg("--json")
        .arg("-m")
        .arg(home.path().join("meta.json"))
        .arg("-d")
        .arg(home.path().join("issues.json.gz"))
        .arg("update")
        .assert()
        .code(2);

    let stderr: serde_json::Value = serde_json::from_slice(&assert.get_output().stderr).unwrap();
    assert_eq!(stderr["error"]["code"], "METADATA_NOT_FOUND");
    assert!(!home.path().join("issues.json.gz").exists());
}
