//! Crash Safety Tests
//!
//! The test binary re-runs itself as a child process with a crash point set.
//! The child aborts in the middle of an atomic write; the parent then checks
//! what an observer sees at the target path:
//!
//! - crash before the rename: the prior content, plus an orphaned temp file
//! - crash after the rename: the complete new content

use pbcontainer::crash_point::{points, CRASH_POINT_ENV};
use pbcontainer::env::DiskEnv;
use pbcontainer::{read_pb_container_from_path, write_pb_container_to_path, SyncMode};
use std::fs;
use std::path::Path;
use std::process::Command;
use tempfile::TempDir;

const CHILD_TARGET_ENV: &str = "PBCONTAINER_CRASH_TEST_TARGET";
const MAGIC: &str = "CRASHTST";

#[derive(Clone, PartialEq, prost::Message)]
struct Generation {
    #[prost(uint64, tag = "1")]
    value: u64,
}

/// Child entry point. Does nothing unless spawned by `run_child`.
#[test]
fn crash_child_entry() {
    let target = match std::env::var(CHILD_TARGET_ENV) {
        Ok(target) => target,
        Err(_) => return,
    };
    write_pb_container_to_path(
        &DiskEnv,
        Path::new(&target),
        MAGIC,
        &Generation { value: 2 },
        SyncMode::Sync,
    )
    .unwrap();
}

fn run_child(crash_point: &str, target: &Path) -> std::process::Output {
    Command::new(std::env::current_exe().unwrap())
        .args(["crash_child_entry", "--exact", "--test-threads=1", "--nocapture"])
        .env(CRASH_POINT_ENV, crash_point)
        .env(CHILD_TARGET_ENV, target)
        .output()
        .expect("Failed to spawn child test process")
}

fn setup() -> (TempDir, std::path::PathBuf) {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let target = temp_dir.path().join("generation");
    write_pb_container_to_path(&DiskEnv, &target, MAGIC, &Generation { value: 1 }, SyncMode::Sync)
        .unwrap();
    (temp_dir, target)
}

fn read_generation(target: &Path) -> u64 {
    read_pb_container_from_path::<Generation>(&DiskEnv, target, MAGIC)
        .unwrap()
        .value
}

fn orphan_count(dir: &Path) -> usize {
    fs::read_dir(dir)
        .unwrap()
        .filter(|e| {
            e.as_ref()
                .unwrap()
                .file_name()
                .to_string_lossy()
                .contains(".tmp.")
        })
        .count()
}

#[test]
fn test_crash_before_rename_keeps_prior_content() {
    for point in [
        points::ATOMIC_AFTER_TEMP_CREATE,
        points::ATOMIC_AFTER_WRITE,
        points::ATOMIC_BEFORE_RENAME,
    ] {
        let (temp_dir, target) = setup();

        let output = run_child(point, &target);
        assert!(!output.status.success(), "child should have aborted at {}", point);

        assert_eq!(read_generation(&target), 1, "crash at {} changed the target", point);
        // The deleter never ran, so the temp file is an orphan.
        assert_eq!(orphan_count(temp_dir.path()), 1, "crash at {}", point);
    }
}

#[test]
fn test_crash_after_rename_has_new_content() {
    let (temp_dir, target) = setup();

    let output = run_child(points::ATOMIC_AFTER_RENAME, &target);
    assert!(!output.status.success());

    assert_eq!(read_generation(&target), 2);
    assert_eq!(orphan_count(temp_dir.path()), 0);
}

#[test]
fn test_child_without_crash_point_completes() {
    let (temp_dir, target) = setup();

    let output = Command::new(std::env::current_exe().unwrap())
        .args(["crash_child_entry", "--exact", "--test-threads=1"])
        .env(CHILD_TARGET_ENV, &target)
        .env_remove(CRASH_POINT_ENV)
        .output()
        .unwrap();
    assert!(output.status.success());

    assert_eq!(read_generation(&target), 2);
    assert_eq!(orphan_count(temp_dir.path()), 0);
}
