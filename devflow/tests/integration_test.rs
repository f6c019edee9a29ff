#![cfg(unix)]

use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Output, Stdio};
use std::thread;
use std::time::Duration;
use tempfile::TempDir;

fn create_test_project(dir: &Path, config: &str) {
    fs::write(dir.join("devflow.toml"), config).unwrap();
}

fn get_devflow_binary() -> PathBuf {
    PathBuf::from(env!("CARGO_BIN_EXE_devflow"))
}

fn devflow(dir: &Path, args: &[&str]) -> Output {
    Command::new(get_devflow_binary())
        .arg("--dir")
        .arg(dir)
        .args(args)
        .env_remove("RUST_LOG")
        .output()
        .expect("Failed to execute devflow")
}

#[test]
fn test_run_streams_command_output() {
    let temp_dir = TempDir::new().unwrap();

    let output = devflow(temp_dir.path(), &["run", "echo hello-from-run"]);

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("hello-from-run"));
}

#[test]
fn test_build_uses_configured_commands_in_order() {
    let temp_dir = TempDir::new().unwrap();
    create_test_project(
        temp_dir.path(),
        r#"
[commands]
build = ["mkdir dist", "touch dist/app.js"]
"#,
    );

    let output = devflow(temp_dir.path(), &["build"]);

    assert!(output.status.success());
    assert!(temp_dir.path().join("dist/app.js").exists());
}

#[test]
fn test_non_zero_exit_only_fails_with_strict() {
    let temp_dir = TempDir::new().unwrap();

    let lenient = devflow(temp_dir.path(), &["run", "false", "touch after.txt"]);
    assert!(lenient.status.success());
    assert!(temp_dir.path().join("after.txt").exists());

    fs::remove_file(temp_dir.path().join("after.txt")).unwrap();
    let strict = devflow(temp_dir.path(), &["--strict", "run", "false", "touch after.txt"]);
    assert_eq!(strict.status.code(), Some(1));
    assert!(!temp_dir.path().join("after.txt").exists());
}

#[test]
fn test_release_dry_run_lists_tag_first() {
    let temp_dir = TempDir::new().unwrap();

    let output = devflow(temp_dir.path(), &["release", "--tag", "v1.2.0", "--dry-run"]);

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    let tag = stdout.find("git tag v1.2.0").unwrap();
    let push = stdout.find("git push --follow-tags").unwrap();
    assert!(tag < push);
}

#[test]
fn test_clean_removes_configured_paths() {
    let temp_dir = TempDir::new().unwrap();
    create_test_project(
        temp_dir.path(),
        r#"
[clean]
paths = ["dist", "coverage"]
"#,
    );
    fs::create_dir_all(temp_dir.path().join("dist/js")).unwrap();
    fs::create_dir_all(temp_dir.path().join("coverage")).unwrap();
    fs::create_dir_all(temp_dir.path().join("src")).unwrap();

    let output = devflow(temp_dir.path(), &["clean"]);

    assert!(output.status.success());
    assert!(!temp_dir.path().join("dist").exists());
    assert!(!temp_dir.path().join("coverage").exists());
    assert!(temp_dir.path().join("src").exists());
}

#[test]
fn test_watch_without_command_fails_fast() {
    let temp_dir = TempDir::new().unwrap();

    let output = devflow(temp_dir.path(), &["watch"]);

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("No watch command"));
}

#[test]
fn test_interrupt_stops_the_running_command() {
    let temp_dir = TempDir::new().unwrap();
    let marker = temp_dir.path().join("finished.txt");

    let mut child = Command::new(get_devflow_binary())
        .arg("--dir")
        .arg(temp_dir.path())
        .args(["run", "sleep 3; touch finished.txt", "touch second.txt"])
        .env_remove("RUST_LOG")
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
        .expect("Failed to start devflow");

    thread::sleep(Duration::from_millis(1000));
    let status = Command::new("kill")
        .args(["-INT", &child.id().to_string()])
        .status()
        .unwrap();
    assert!(status.success());

    let status = child.wait().unwrap();
    assert_eq!(status.code(), Some(130));

    thread::sleep(Duration::from_secs(3));
    assert!(!marker.exists());
    assert!(!temp_dir.path().join("second.txt").exists());
}
