//! Crash-safety of the resume file's atomic-rename save.
//!
//! `resume_crash_helper` is not a real test: it's a subprocess entry point,
//! invoked by `test_crash_simulation_leaves_temp_and_preserves_previous_state`
//! via `cargo test`'s own `--ignored --exact` support, so the save happens in
//! a child process we can kill mid-write without taking our own test binary
//! down with it.

use std::env;
use std::fs;
use std::path::PathBuf;
use std::process::{Command, Stdio};
use std::time::{Duration, Instant};

use fastget::ResumeStore;

#[test]
fn save_then_delete_leaves_no_temp_file() {
    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("movie.mp4");
    let store = ResumeStore::new(&out);
    store.initialize(4096, 1024, 4);
    store.mark_completed(0);
    store.mark_completed(1);
    store.save().unwrap();

    assert!(store.path().exists());
    let tmp_path = out.with_extension("mp4.fastget.tmp");
    assert!(!tmp_path.exists());

    let on_disk = fs::read(store.path()).unwrap();
    let store2 = ResumeStore::new(&out);
    match store2.load(4096).unwrap() {
        fastget::core::resume::LoadOutcome::Loaded { chunk_count, .. } => {
            assert_eq!(chunk_count, 4);
        }
        _ => panic!("expected Loaded"),
    }
    assert_eq!(on_disk.len(), 32 + 4);
}

#[test]
fn test_crash_simulation_leaves_temp_and_preserves_previous_state() {
    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("movie.mp4");

    // Seed a valid resume file representing prior progress.
    let seed = ResumeStore::new(&out);
    seed.initialize(10 * 1024 * 1024, 1024 * 1024, 10);
    seed.mark_completed(0);
    seed.save().unwrap();
    let before = fs::read(seed.path()).unwrap();

    let tmp_path = out.with_extension("mp4.fastget.tmp");

    let mut child = Command::new(env::current_exe().unwrap())
        .arg("--ignored")
        .arg("--exact")
        .arg("resume_crash_helper")
        .env("FASTGET_RESUME_CRASH_HELPER", "1")
        .env("FASTGET_RESUME_DEST_PATH", &out)
        .env("FASTGET_RESUME_SLEEP_BEFORE_RENAME_MS", "3000")
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
        .expect("failed to spawn helper subprocess");

    let deadline = Instant::now() + Duration::from_secs(3);
    let mut saw_tmp = false;
    while Instant::now() < deadline {
        if tmp_path.exists() {
            saw_tmp = true;
            break;
        }
        std::thread::sleep(Duration::from_millis(20));
    }
    assert!(saw_tmp, "helper never got to writing the temp file before the deadline");

    child.kill().expect("failed to kill helper subprocess");
    child.wait().unwrap();

    let after = fs::read(&out.with_extension("mp4.fastget")).unwrap();
    assert_eq!(before, after, "crash during rename must not disturb the previous resume file");
    assert!(tmp_path.exists(), "the half-written temp file should remain on disk");
}

/// Not a real test - a subprocess entry point run only via
/// `--ignored --exact resume_crash_helper` with the right env vars set.
#[test]
#[ignore]
fn resume_crash_helper() {
    if env::var("FASTGET_RESUME_CRASH_HELPER").is_err() {
        return;
    }
    let dest: PathBuf = env::var("FASTGET_RESUME_DEST_PATH").unwrap().into();
    let store = ResumeStore::new(&dest);
    store.initialize(10 * 1024 * 1024, 1024 * 1024, 10);
    store.mark_completed(0);
    store.mark_completed(1);
    store.save().unwrap();
}
