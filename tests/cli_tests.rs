//! Exercises the compiled binary directly via `CARGO_BIN_EXE_edgelord`
//! rather than calling `Cli::dispatch` in-process. Limited to
//! `config show`, which never touches the network, unlike `run`.

use std::fs;
use std::path::PathBuf;
use std::process::Command;
use std::time::{SystemTime, UNIX_EPOCH};

fn write_temp_config(contents: &str) -> PathBuf {
    let mut path = std::env::temp_dir();
    let nanos = SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_nanos();
    path.push(format!("edgelord-cli-test-{nanos}.toml"));
    fs::write(&path, contents).expect("write temp config");
    path
}

#[test]
fn config_show_prints_resolved_settings() {
    let path = write_temp_config("dry_run = true\n");
    let output = Command::new(env!("CARGO_BIN_EXE_edgelord"))
        .args(["config", "show", "--config"])
        .arg(&path)
        .env_remove("WALLET_PRIVATE_KEY")
        .output()
        .expect("run edgelord");
    let _ = fs::remove_file(&path);

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("dry_run = true"));
    assert!(!stdout.contains("private_key"));
}

#[test]
fn config_show_fails_for_live_trading_without_wallet_key() {
    let path = write_temp_config("dry_run = false\n");
    let output = Command::new(env!("CARGO_BIN_EXE_edgelord"))
        .args(["config", "show", "--config"])
        .arg(&path)
        .env_remove("WALLET_PRIVATE_KEY")
        .output()
        .expect("run edgelord");
    let _ = fs::remove_file(&path);

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("WALLET_PRIVATE_KEY"));
}

#[test]
fn missing_config_file_exits_nonzero() {
    let output = Command::new(env!("CARGO_BIN_EXE_edgelord"))
        .args(["config", "show", "--config", "/nonexistent/edgelord.toml"])
        .output()
        .expect("run edgelord");
    assert!(!output.status.success());
}
