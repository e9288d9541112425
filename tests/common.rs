use std::path::PathBuf;
use std::process::Command;

use assert_cmd::prelude::*;

/// Build a `prodvision` command pointed at a unique temp data directory.
/// Each test gets its own directory so runs never interfere.
pub fn pv(test_name: &str) -> (Command, PathBuf) {
    let dir = std::env::temp_dir().join(format!("prodvision_cli_{test_name}"));
    let _ = std::fs::remove_dir_all(&dir);
    std::fs::create_dir_all(&dir).unwrap();

    let mut cmd = Command::cargo_bin("prodvision").unwrap();
    cmd.arg("--data-dir").arg(&dir);
    (cmd, dir)
}

/// Another command against an existing data directory.
pub fn pv_at(dir: &PathBuf) -> Command {
    let mut cmd = Command::cargo_bin("prodvision").unwrap();
    cmd.arg("--data-dir").arg(dir);
    cmd
}

/// Write a JSON payload next to the data directory and return its path.
pub fn payload(dir: &PathBuf, name: &str, json: &serde_json::Value) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, serde_json::to_string_pretty(json).unwrap()).unwrap();
    path
}
