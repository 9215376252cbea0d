//! Scenarios where the competing registry users are separate OS processes.
//!
//! The test binary re-runs itself with `--exact` on the child entry below; the
//! environment tells the child what to do. Without that environment the entry
//! is a no-op.

use crate::harness::TestProject;
use dual_core::{canonical_project_id, DualError, RegistryStore};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};

const CHILD_ROOT: &str = "DUAL_TEST_CHILD_ROOT";
const CHILD_MODE: &str = "DUAL_TEST_CHILD_MODE";
const CHILD_ENTRY: &str = "scenarios::processes::test_child_process_entry";
const HELD_MARKER: &str = "child-holds-lock";

const CHILDREN: usize = 10;
const ITERATIONS: usize = 5;
const PATIENT: Duration = Duration::from_secs(60);

#[test]
fn test_child_process_entry() {
    let Ok(root) = env::var(CHILD_ROOT) else {
        return;
    };
    let root = PathBuf::from(root);
    let project = canonical_project_id(&root).unwrap();

    match env::var(CHILD_MODE).as_deref() {
        Ok("hold") => {
            let mut store = RegistryStore::load_with_timeout(&root, PATIENT).unwrap();
            store.set_context(&project, "child", 4100, "/child");
            fs::write(root.join(HELD_MARKER), std::process::id().to_string()).unwrap();
            thread::sleep(Duration::from_millis(800));
            store.save().unwrap();
            store.close().unwrap();
        }
        Ok("increment") => {
            for _ in 0..ITERATIONS {
                let mut store = RegistryStore::load_with_timeout(&root, PATIENT).unwrap();
                let current = store.get_context(&project, "shared").unwrap().base_port;
                store.set_context(
                    &project,
                    "shared",
                    current + 1,
                    format!("/pid-{}", std::process::id()),
                );
                store.save().unwrap();
                store.close().unwrap();
            }
        }
        other => panic!("unknown child mode: {:?}", other),
    }
}

fn spawn_child(root: &Path, mode: &str) -> Child {
    Command::new(env::current_exe().unwrap())
        .args([CHILD_ENTRY, "--exact", "--nocapture", "--test-threads=1"])
        .env(CHILD_ROOT, root)
        .env(CHILD_MODE, mode)
        .stdout(Stdio::null())
        .spawn()
        .unwrap()
}

fn wait_for(path: &Path, limit: Duration) -> bool {
    let start = Instant::now();
    while start.elapsed() < limit {
        if path.exists() {
            return true;
        }
        thread::sleep(Duration::from_millis(20));
    }
    false
}

#[test]
fn test_lock_held_by_other_process_times_out_then_serializes() {
    let project = TestProject::new().unwrap();
    let mut child = spawn_child(project.root(), "hold");

    assert!(
        wait_for(&project.root().join(HELD_MARKER), Duration::from_secs(30)),
        "child never took the lock"
    );

    match project.open(Duration::from_millis(100)) {
        Err(e @ DualError::LockTimeout { .. }) => assert!(e.is_retryable()),
        other => panic!("expected lock timeout, got {:?}", other.map(|_| ())),
    }

    // Returns only after the child has saved and released.
    let mut store = project.open(PATIENT).unwrap();
    assert_eq!(store.get_context(project.id(), "child").unwrap().base_port, 4100);
    store.close().unwrap();

    assert!(child.wait().unwrap().success());
}

#[test]
fn test_processes_increment_shared_key_without_lost_updates() {
    let project = TestProject::new().unwrap();

    let mut store = project.open(PATIENT).unwrap();
    let created = store.set_context(project.id(), "shared", 4100, "/seed").created;
    store.save().unwrap();
    store.close().unwrap();

    let children: Vec<Child> = (0..CHILDREN)
        .map(|_| spawn_child(project.root(), "increment"))
        .collect();
    for mut child in children {
        assert!(child.wait().unwrap().success());
    }

    let registry = project.read_raw().unwrap();
    let shared = registry.get_context(project.id(), "shared").unwrap();
    assert_eq!(shared.base_port as usize, 4100 + CHILDREN * ITERATIONS);
    assert_eq!(shared.created, created);
    assert!(shared.path.starts_with("/pid-"));
}
