//! 命令行测试

use std::fs;

use assert_cmd::Command;
use tempfile::TempDir;

const DICTIONARY: &str = r#"{
  "sourceLanguage": "en",
  "targetLanguage": "es",
  "entries": [
    { "word": "house", "translation": "casa", "rank": 250, "pos": "noun" },
    { "word": "garden", "translation": "jardín", "rank": 1200, "pos": "noun" }
  ]
}"#;

fn workspace() -> TempDir {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("dict.json"), DICTIONARY).unwrap();
    fs::write(
        dir.path().join("page.html"),
        "<p>The house has a garden.</p>",
    )
    .unwrap();
    dir
}

fn wordweave(dir: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("wordweave").unwrap();
    cmd.current_dir(dir.path())
        .env_remove("WORDWEAVE_LOG_LEVEL")
        .args(["--offline", "--no-bundled", "--dictionary", "dict.json"])
        .args(["--density", "1.0", "--spacing", "0", "--seed", "1"]);
    cmd
}

#[test]
fn test_rewrites_file_to_stdout() {
    let dir = workspace();
    let output = wordweave(&dir).arg("page.html").output().unwrap();

    assert!(output.status.success());
    let stdout = String::from_utf8(output.stdout).unwrap();
    assert!(stdout.contains("data-original=\"house\""));
    assert!(stdout.contains(">casa</span>"));
    assert!(stdout.contains(">jardín</span>"));
    assert!(stdout.starts_with("<p>The <span"));
}

#[test]
fn test_reads_stdin_and_writes_metadata() {
    let dir = workspace();
    wordweave(&dir)
        .args(["-", "--output", "out.html", "--metadata", "meta.json"])
        .write_stdin("<p>a quiet house</p>")
        .assert()
        .success();

    let rewritten = fs::read_to_string(dir.path().join("out.html")).unwrap();
    assert!(rewritten.contains(">casa</span>"));

    let metadata: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(dir.path().join("meta.json")).unwrap()).unwrap();
    assert_eq!(metadata["stats"]["replacedWords"], 1);
    assert_eq!(metadata["stats"]["unresolvedWords"], 1);
    assert_eq!(metadata["foreignWords"][0]["original"], "house");
    assert_eq!(metadata["foreignWords"][0]["entry"]["targetWord"], "casa");
}

#[test]
fn test_max_level_limits_replacements() {
    let dir = workspace();
    let output = wordweave(&dir)
        .args(["page.html", "--max-level", "beginner"])
        .output()
        .unwrap();

    let stdout = String::from_utf8(output.stdout).unwrap();
    assert!(stdout.contains(">casa</span>"));
    assert!(stdout.contains("a garden."));
}

#[test]
fn test_invalid_density_fails() {
    let dir = workspace();
    let output = Command::cargo_bin("wordweave")
        .unwrap()
        .current_dir(dir.path())
        .args(["page.html", "--offline", "--density", "1.5"])
        .output()
        .unwrap();

    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("Error"));
}

#[test]
fn test_unknown_strategy_is_rejected() {
    let dir = workspace();
    Command::cargo_bin("wordweave")
        .unwrap()
        .current_dir(dir.path())
        .args(["page.html", "--strategy", "alphabetical"])
        .assert()
        .failure();
}

#[test]
fn test_env_docs() {
    let output = Command::cargo_bin("wordweave")
        .unwrap()
        .arg("--env-docs")
        .output()
        .unwrap();

    assert!(output.status.success());
    let stdout = String::from_utf8(output.stdout).unwrap();
    assert!(stdout.contains("WORDWEAVE_DENSITY"));
}

#[test]
fn test_write_config() {
    let dir = tempfile::tempdir().unwrap();
    Command::cargo_bin("wordweave")
        .unwrap()
        .current_dir(dir.path())
        .args(["--write-config", "wordweave.toml"])
        .assert()
        .success();

    let written = fs::read_to_string(dir.path().join("wordweave.toml")).unwrap();
    assert!(written.contains("source_lang"));
    assert!(written.contains("[learning]"));
}
