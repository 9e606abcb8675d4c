use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use tempfile::TempDir;

fn odin_binary() -> PathBuf {
    let mut path = std::env::current_exe().unwrap();
    path.pop(); // remove test binary name
    path.pop(); // remove deps/
    path.push("odin");
    path
}

fn setup_test_env() -> (TempDir, PathBuf) {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path().to_path_buf();

    let config_dir = root.join("config");
    fs::create_dir_all(&config_dir).unwrap();

    // Nothing listens on port 9; commands that reach the backend fail fast.
    let config_content = format!(
        r#"[api]
url = "http://127.0.0.1:9"
timeout_secs = 5

[storage]
dir = "{}/state"

[search]
min_query_len = 5
"#,
        root.display()
    );

    let config_path = config_dir.join("odin.toml");
    fs::write(&config_path, config_content).unwrap();

    (tmp, config_path)
}

fn run_odin(config_path: &Path, args: &[&str]) -> (String, String, bool) {
    let binary = odin_binary();
    let output = Command::new(&binary)
        .arg("--config")
        .arg(config_path.to_str().unwrap())
        .args(args)
        .env_remove("ODIN_API_URL")
        .env_remove("RUST_LOG")
        .stdin(Stdio::null())
        .output()
        .unwrap_or_else(|e| panic!("Failed to run odin binary at {:?}: {}", binary, e));

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    let success = output.status.success();
    (stdout, stderr, success)
}

#[test]
fn test_chat_history_starts_empty() {
    let (_tmp, config_path) = setup_test_env();

    let (stdout, stderr, success) = run_odin(&config_path, &["chat", "history"]);
    assert!(success, "history failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains("No messages yet."));
}

#[test]
fn test_chat_ask_without_backend_keeps_question() {
    let (_tmp, config_path) = setup_test_env();

    let (stdout, stderr, success) =
        run_odin(&config_path, &["--json", "chat", "ask", "what is odin?"]);
    assert!(success, "ask failed: stdout={}, stderr={}", stdout, stderr);

    let parsed: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    assert_eq!(parsed["question"], "what is odin?");
    assert_eq!(parsed["status"], "failed");
    assert_eq!(parsed["answer"], "");

    // The question and an empty answer were persisted.
    let (stdout, _, _) = run_odin(&config_path, &["--json", "chat", "history"]);
    let turns: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    let turns = turns.as_array().unwrap();
    assert_eq!(turns.len(), 2);
    assert_eq!(turns[0]["role"], "you");
    assert_eq!(turns[0]["text"], "what is odin?");
    assert_eq!(turns[1]["role"], "odin");
    assert_eq!(turns[1]["text"], "");
}

#[test]
fn test_chat_ask_rejects_blank_question() {
    let (_tmp, config_path) = setup_test_env();

    let (_, stderr, success) = run_odin(&config_path, &["chat", "ask", "   "]);
    assert!(!success);
    assert!(stderr.contains("question must not be empty"), "stderr: {}", stderr);

    let (stdout, _, _) = run_odin(&config_path, &["chat", "history"]);
    assert!(stdout.contains("No messages yet."));
}

#[test]
fn test_chat_clear_empties_history() {
    let (_tmp, config_path) = setup_test_env();

    run_odin(&config_path, &["chat", "ask", "first question"]);
    let (stdout, _, _) = run_odin(&config_path, &["chat", "history"]);
    assert!(stdout.contains("first question"));

    let (stdout, _, success) = run_odin(&config_path, &["chat", "clear"]);
    assert!(success);
    assert!(stdout.contains("Chat cleared."));

    let (stdout, _, _) = run_odin(&config_path, &["chat", "history"]);
    assert!(stdout.contains("No messages yet."));
}

#[test]
fn test_chat_state_file_layout() {
    let (tmp, config_path) = setup_test_env();

    run_odin(&config_path, &["chat", "ask", "layout check"]);

    let raw = fs::read_to_string(tmp.path().join("state").join("chat-storage.json")).unwrap();
    let stored: serde_json::Value = serde_json::from_str(&raw).unwrap();
    assert_eq!(stored["version"], 0);
    assert_eq!(
        stored["state"]["transcript"],
        serde_json::json!(["layout check", ""])
    );
    assert_eq!(stored["state"]["partial"], "");
}

#[test]
fn test_short_search_does_not_reach_backend() {
    let (_tmp, config_path) = setup_test_env();

    let (stdout, stderr, success) = run_odin(&config_path, &["search", "odin"]);
    assert!(success, "search failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains("Query too short: type at least 5 characters."));
}

#[test]
fn test_search_without_backend_fails() {
    let (_tmp, config_path) = setup_test_env();

    let (_, _, success) = run_odin(&config_path, &["search", "huginn and muninn"]);
    assert!(!success);
}

#[test]
fn test_whoami_when_signed_out() {
    let (_tmp, config_path) = setup_test_env();

    let (stdout, _, success) = run_odin(&config_path, &["whoami"]);
    assert!(success);
    assert!(stdout.contains("Not signed in."));

    let (stdout, _, success) = run_odin(&config_path, &["logout"]);
    assert!(success);
    assert!(stdout.contains("Not signed in."));
}

#[test]
fn test_refresh_requires_session() {
    let (_tmp, config_path) = setup_test_env();

    let (_, stderr, success) = run_odin(&config_path, &["refresh"]);
    assert!(!success);
    assert!(stderr.contains("not signed in"), "stderr: {}", stderr);
}

#[test]
fn test_prefs_roundtrip() {
    let (_tmp, config_path) = setup_test_env();

    let (stdout, _, success) = run_odin(&config_path, &["prefs", "show"]);
    assert!(success);
    assert!(stdout.contains("Medium"));
    assert!(stdout.contains("collapsed"));

    let (_, _, success) = run_odin(&config_path, &["prefs", "font-size", "large"]);
    assert!(success);
    let (stdout, _, success) = run_odin(&config_path, &["prefs", "toggle-expanded"]);
    assert!(success);
    assert!(stdout.contains("expanded"));

    let (stdout, _, _) = run_odin(&config_path, &["--json", "prefs", "show"]);
    let prefs: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    assert_eq!(prefs["font_size"], "large");
    assert_eq!(prefs["expanded"], true);
}

#[test]
fn test_invalid_config_is_rejected() {
    let (tmp, _) = setup_test_env();
    let bad = tmp.path().join("config").join("bad.toml");
    fs::write(&bad, "[api]\nurl = \"ftp://example.com\"\n").unwrap();

    let (_, stderr, success) = run_odin(&bad, &["whoami"]);
    assert!(!success);
    assert!(stderr.contains("api.url"), "stderr: {}", stderr);
}

#[test]
fn test_missing_config_uses_defaults() {
    let tmp = TempDir::new().unwrap();
    let missing = tmp.path().join("nope.toml");

    let output = Command::new(odin_binary())
        .arg("--config")
        .arg(&missing)
        .args(["search", "odin"])
        .env_remove("ODIN_API_URL")
        .env("XDG_DATA_HOME", tmp.path())
        .env("HOME", tmp.path())
        .output()
        .unwrap();
    assert!(output.status.success());
    assert!(String::from_utf8_lossy(&output.stdout).contains("Query too short"));
}
