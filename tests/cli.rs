use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::TempDir;

fn dfx_binary() -> PathBuf {
    PathBuf::from(env!("CARGO_BIN_EXE_dfx-topics"))
}

fn setup_test_env() -> (TempDir, PathBuf) {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path().to_path_buf();

    fs::create_dir_all(root.join("articles")).unwrap();
    fs::create_dir_all(root.join("api")).unwrap();

    fs::write(
        root.join("articles/alpha.md"),
        "---\nuid: alpha\ntitle: Alpha Article\n---\n# Alpha\n",
    )
    .unwrap();
    fs::write(
        root.join("articles/beta.md"),
        "---\nuid: beta\n---\n# Beta\n",
    )
    .unwrap();
    fs::write(
        root.join("api/Lib.yml"),
        "### YamlMime:ManagedReference\nitems:\n- uid: Lib.Thing\n  type: Class\n  fullName: Lib.Thing\n- uid: Lib.Thing.Run\n  type: Method\n  fullName: Lib.Thing.Run()\n  nameWithType: Thing.Run()\n",
    )
    .unwrap();

    let project_path = root.join("docfx.json");
    fs::write(
        &project_path,
        r#"{ "build": { "content": [
            { "files": ["articles/**.md"] },
            { "src": "api", "files": ["*.yml"] }
        ] } }"#,
    )
    .unwrap();

    (tmp, project_path)
}

fn run_dfx(project_path: &Path, args: &[&str]) -> (String, String, i32) {
    let binary = dfx_binary();
    let output = Command::new(&binary)
        .arg("--project")
        .arg(project_path)
        .arg("--progress")
        .arg("off")
        .args(args)
        .env_remove("RUST_LOG")
        .output()
        .unwrap_or_else(|e| panic!("Failed to run dfx-topics binary at {:?}: {}", binary, e));

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    (stdout, stderr, output.status.code().unwrap_or(-1))
}

#[test]
fn test_scan_reports_counts() {
    let (_tmp, project_path) = setup_test_env();

    let (stdout, stderr, code) = run_dfx(&project_path, &["scan"]);
    assert_eq!(code, 0, "scan failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains("Indexed 4 topics from 3 content files."));
    assert!(stdout.contains("topic-cache.json"));
}

#[test]
fn test_list_is_ordered_by_uid() {
    let (_tmp, project_path) = setup_test_env();

    let (stdout, stderr, code) = run_dfx(&project_path, &["list"]);
    assert_eq!(code, 0, "list failed: {}", stderr);
    let uids: Vec<&str> = stdout
        .lines()
        .map(|l| l.split('\t').next().unwrap())
        .collect();
    assert_eq!(uids, vec!["Lib.Thing", "Lib.Thing.Run", "alpha", "beta"]);
}

#[test]
fn test_list_type_filter_json() {
    let (_tmp, project_path) = setup_test_env();

    let (stdout, stderr, code) = run_dfx(&project_path, &["list", "--type", "method", "--json"]);
    assert_eq!(code, 0, "list failed: {}", stderr);
    let topics: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    let topics = topics.as_array().unwrap();
    assert_eq!(topics.len(), 1);
    assert_eq!(topics[0]["uid"], "Lib.Thing.Run");
    assert_eq!(topics[0]["detailedType"], "Method");
    assert_eq!(topics[0]["sourceFile"], "api/Lib.yml");
    assert_eq!(topics[0]["title"], "Thing.Run()");
}

#[test]
fn test_list_rejects_unknown_type() {
    let (_tmp, project_path) = setup_test_env();

    let (_, stderr, code) = run_dfx(&project_path, &["list", "--type", "widget"]);
    assert_ne!(code, 0);
    assert!(stderr.contains("widget"));
}

#[test]
fn test_lookup_found_and_missing() {
    let (_tmp, project_path) = setup_test_env();

    let (stdout, stderr, code) = run_dfx(&project_path, &["lookup", "alpha"]);
    assert_eq!(code, 0, "lookup failed: {}", stderr);
    assert!(stdout.contains("articles/alpha.md"));
    assert!(stdout.contains("Alpha Article"));

    let (stdout, _, code) = run_dfx(&project_path, &["lookup", "nope"]);
    assert_eq!(code, 1);
    assert!(stdout.is_empty());
}

#[test]
fn test_lookup_json() {
    let (_tmp, project_path) = setup_test_env();

    let (stdout, _, code) = run_dfx(&project_path, &["lookup", "Lib.Thing", "--json"]);
    assert_eq!(code, 0);
    let topic: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    assert_eq!(topic["coarseType"], "ManagedReference");
    assert_eq!(topic["detailedType"], "Type");
    assert_eq!(topic["memberType"], "Class");
}

#[test]
fn test_snapshot_serves_second_run() {
    let (tmp, project_path) = setup_test_env();

    let (_, _, code) = run_dfx(&project_path, &["scan"]);
    assert_eq!(code, 0);

    // An edit made while nothing is watching is invisible until a rebuild.
    fs::write(
        tmp.path().join("articles/gamma.md"),
        "---\nuid: gamma\n---\n",
    )
    .unwrap();
    let (_, _, code) = run_dfx(&project_path, &["lookup", "gamma"]);
    assert_eq!(code, 1);

    let (stdout, _, code) = run_dfx(&project_path, &["scan", "--rebuild"]);
    assert_eq!(code, 0);
    assert!(stdout.contains("Indexed 5 topics"));
    let (_, _, code) = run_dfx(&project_path, &["lookup", "gamma"]);
    assert_eq!(code, 0);
}

#[test]
fn test_flush_deletes_snapshot() {
    let (tmp, project_path) = setup_test_env();
    let snapshot = tmp.path().join(".docfx-topics/topic-cache.json");

    run_dfx(&project_path, &["scan"]);
    assert!(snapshot.exists());

    let (stdout, stderr, code) = run_dfx(&project_path, &["flush"]);
    assert_eq!(code, 0, "flush failed: {}", stderr);
    assert!(stdout.contains("Deleted snapshot"));
    assert!(!snapshot.exists());

    // flushing again is fine
    let (_, _, code) = run_dfx(&project_path, &["flush"]);
    assert_eq!(code, 0);
}

#[test]
fn test_missing_project_fails() {
    let tmp = TempDir::new().unwrap();
    let (_, stderr, code) = run_dfx(&tmp.path().join("docfx.json"), &["scan"]);
    assert_ne!(code, 0);
    assert!(stderr.contains("project file not found"));
}

#[test]
fn test_invalid_project_config_fails() {
    let (_tmp, project_path) = setup_test_env();
    fs::write(&project_path, r#"{ "build": { "content": [ { "src": "api" } ] } }"#).unwrap();

    let (_, stderr, code) = run_dfx(&project_path, &["scan"]);
    assert_ne!(code, 0);
    assert!(stderr.contains("population failed"));
}
