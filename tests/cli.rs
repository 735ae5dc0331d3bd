//! End-to-end tests that run the `seqspeak` binary as separate processes.

#![cfg(unix)]

use seqspeak::locks::{LockRecord, RECORD_FILE_NAME};
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Output, Stdio};
use std::time::{Duration, Instant};
use tempfile::TempDir;

fn seqspeak(lock_dir: &Path) -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_seqspeak"));
    cmd.env("SEQSPEAK_LOCK_DIR", lock_dir)
        .env_remove("SEQSPEAK_SEQUENTIAL")
        .env_remove("SEQSPEAK_CONFIG")
        .env_remove("RUST_LOG");
    cmd
}

fn setup() -> (TempDir, PathBuf) {
    let temp = TempDir::new().unwrap();
    let lock_dir = temp.path().join("x.lock.d");
    (temp, lock_dir)
}

fn wait_until(what: &str, deadline: Duration, mut ready: impl FnMut() -> bool) {
    let start = Instant::now();
    while !ready() {
        assert!(start.elapsed() < deadline, "timed out waiting for {what}");
        std::thread::sleep(Duration::from_millis(10));
    }
}

fn finish(child: Child) -> Output {
    child.wait_with_output().unwrap()
}

/// Shell snippet that logs its start and end around a pause.
fn logged_section(log: &Path, name: &str, pause: &str) -> Vec<String> {
    let script = format!(
        "echo start-{name} >> '{log}'; sleep {pause}; echo end-{name} >> '{log}'",
        log = log.display()
    );
    vec!["sh".into(), "-c".into(), script]
}

fn pid_of_exited_process() -> u32 {
    let mut child = Command::new("true").spawn().unwrap();
    let pid = child.id();
    child.wait().unwrap();
    pid
}

#[test]
fn two_processes_never_overlap() {
    let (temp, lock_dir) = setup();
    let log = temp.path().join("sections.log");

    let first = seqspeak(&lock_dir)
        .arg("run")
        .arg("--")
        .args(logged_section(&log, "a", "0.5"))
        .stderr(Stdio::piped())
        .spawn()
        .unwrap();

    wait_until("first run to take the lock", Duration::from_secs(10), || {
        log.exists()
    });
    assert!(lock_dir.is_dir());

    let second = seqspeak(&lock_dir)
        .arg("run")
        .arg("--")
        .args(logged_section(&log, "b", "0.1"))
        .stderr(Stdio::piped())
        .spawn()
        .unwrap();

    let first = finish(first);
    let second = finish(second);
    assert!(first.status.success(), "{}", String::from_utf8_lossy(&first.stderr));
    assert!(second.status.success(), "{}", String::from_utf8_lossy(&second.stderr));

    let sections = std::fs::read_to_string(&log).unwrap();
    let lines: Vec<&str> = sections.lines().collect();
    assert_eq!(lines, ["start-a", "end-a", "start-b", "end-b"]);
    assert!(!lock_dir.exists(), "lock released after both runs");
}

#[test]
fn dead_holder_is_reclaimed_without_waiting() {
    let (temp, lock_dir) = setup();
    std::fs::create_dir(&lock_dir).unwrap();
    LockRecord {
        pid: pid_of_exited_process(),
        ..LockRecord::current()
    }
    .write(lock_dir.join(RECORD_FILE_NAME))
    .unwrap();

    let marker = temp.path().join("ran");
    let start = Instant::now();
    let output = seqspeak(&lock_dir)
        .args(["run", "--", "touch"])
        .arg(&marker)
        .output()
        .unwrap();

    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));
    assert!(marker.exists());
    assert!(start.elapsed() < Duration::from_secs(10), "reclaim must not wait out the grace period");
    assert!(!lock_dir.exists());

    let leftovers: Vec<_> = std::fs::read_dir(temp.path())
        .unwrap()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_name().to_string_lossy().contains(".stale."))
        .collect();
    assert!(leftovers.is_empty(), "reclaimed directory left behind");
}

#[test]
fn timeout_cancels_and_kills_the_child() {
    let (temp, lock_dir) = setup();
    let marker = temp.path().join("finished");
    // The sleep must not hold the output pipes open after its shell is killed.
    let script = format!(
        "sleep 2 </dev/null >/dev/null 2>&1; touch '{}'",
        marker.display()
    );

    let start = Instant::now();
    let output = seqspeak(&lock_dir)
        .args(["run", "--timeout", "1", "--", "sh", "-c", &script])
        .output()
        .unwrap();

    assert_eq!(output.status.code(), Some(130));
    assert!(String::from_utf8_lossy(&output.stderr).contains("Cancelled"));
    assert!(start.elapsed() < Duration::from_secs(2));
    assert!(!lock_dir.exists(), "lock released on cancellation");

    std::thread::sleep(Duration::from_millis(1500));
    assert!(!marker.exists(), "child kept running after cancellation");
}

#[test]
fn cancelled_child_is_killed_and_reaped_before_exit() {
    let (_temp, lock_dir) = setup();

    let output = seqspeak(&lock_dir)
        .args(["-v", "run", "--timeout", "1", "--", "sh", "-c", "exec sleep 30"])
        .output()
        .unwrap();

    let stderr = String::from_utf8_lossy(&output.stderr);
    assert_eq!(output.status.code(), Some(130), "{stderr}");
    assert!(stderr.contains("child stopped after cancellation"), "{stderr}");
    assert!(!lock_dir.exists());
}

#[test]
fn timeout_applies_while_waiting_for_the_lock() {
    let (_temp, lock_dir) = setup();
    // Held by this (live) test process.
    std::fs::create_dir(&lock_dir).unwrap();
    LockRecord::current()
        .write(lock_dir.join(RECORD_FILE_NAME))
        .unwrap();

    let output = seqspeak(&lock_dir)
        .args(["run", "--timeout", "1", "--", "true"])
        .output()
        .unwrap();

    assert_eq!(output.status.code(), Some(130));
    assert!(lock_dir.is_dir(), "live holder's lock untouched");
}

#[test]
fn failing_child_reports_operation_failure() {
    let (_temp, lock_dir) = setup();
    let output = seqspeak(&lock_dir)
        .args(["run", "--", "false"])
        .output()
        .unwrap();

    assert_eq!(output.status.code(), Some(2));
    assert!(!lock_dir.exists());
}

#[test]
fn missing_program_is_a_user_error() {
    let (_temp, lock_dir) = setup();
    let output = seqspeak(&lock_dir)
        .args(["run", "--", "/nonexistent/seqspeak-test-program"])
        .output()
        .unwrap();

    assert_eq!(output.status.code(), Some(1));
    assert!(!lock_dir.exists());
}

#[test]
fn no_sequential_skips_the_lock() {
    let (temp, _lock_dir) = setup();
    let blocker = temp.path().join("file");
    std::fs::write(&blocker, "x").unwrap();
    let unusable = blocker.join("x.lock.d");

    let output = seqspeak(&unusable)
        .args(["--no-sequential", "run", "--", "true"])
        .output()
        .unwrap();

    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));
}

#[test]
fn unusable_lock_dir_is_a_lock_failure() {
    let (temp, _lock_dir) = setup();
    let blocker = temp.path().join("file");
    std::fs::write(&blocker, "x").unwrap();

    let output = seqspeak(&blocker.join("x.lock.d"))
        .args(["run", "--", "true"])
        .output()
        .unwrap();

    assert_eq!(output.status.code(), Some(4));
}

#[test]
fn lock_status_reports_holder() {
    let (_temp, lock_dir) = setup();

    let output = seqspeak(&lock_dir).args(["lock", "status"]).output().unwrap();
    assert!(output.status.success());
    assert!(String::from_utf8_lossy(&output.stdout).contains("Unlocked"));

    std::fs::create_dir(&lock_dir).unwrap();
    LockRecord::current()
        .write(lock_dir.join(RECORD_FILE_NAME))
        .unwrap();

    let output = seqspeak(&lock_dir).args(["lock", "status"]).output().unwrap();
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(output.status.success());
    assert!(stdout.contains(&std::process::id().to_string()), "{stdout}");
    assert!(stdout.contains("is alive"), "{stdout}");
    assert!(!stdout.contains("STALE"), "{stdout}");
}

#[test]
fn lock_clear_requires_force_for_live_holder() {
    let (_temp, lock_dir) = setup();
    std::fs::create_dir(&lock_dir).unwrap();
    LockRecord::current()
        .write(lock_dir.join(RECORD_FILE_NAME))
        .unwrap();

    let refused = seqspeak(&lock_dir).args(["lock", "clear"]).output().unwrap();
    assert_eq!(refused.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&refused.stderr).contains("--force"));
    assert!(lock_dir.is_dir());

    let forced = seqspeak(&lock_dir)
        .args(["lock", "clear", "--force"])
        .output()
        .unwrap();
    assert!(forced.status.success());
    assert!(!lock_dir.exists());
}

#[test]
fn lock_clear_removes_stale_lock() {
    let (_temp, lock_dir) = setup();
    std::fs::create_dir(&lock_dir).unwrap();
    LockRecord {
        pid: pid_of_exited_process(),
        ..LockRecord::current()
    }
    .write(lock_dir.join(RECORD_FILE_NAME))
    .unwrap();

    let output = seqspeak(&lock_dir).args(["lock", "clear"]).output().unwrap();

    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));
    assert!(String::from_utf8_lossy(&output.stdout).contains("Cleared lock"));
    assert!(!lock_dir.exists());
}

#[test]
fn lock_clear_without_lock_is_a_user_error() {
    let (_temp, lock_dir) = setup();
    let output = seqspeak(&lock_dir).args(["lock", "clear"]).output().unwrap();
    assert_eq!(output.status.code(), Some(1));
}
