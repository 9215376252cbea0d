use crate::harness::TestProject;
use dual_core::{find_duplicate_base_ports, find_next_available_base_port, DualError};
use std::sync::mpsc;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

const WRITERS: usize = 10;
const ITERATIONS: usize = 5;
const PATIENT: Duration = Duration::from_secs(60);

#[test]
fn test_concurrent_increments_on_shared_key_lose_nothing() {
    let project = Arc::new(TestProject::new().unwrap());

    let mut store = project.open(PATIENT).unwrap();
    let created = store.set_context(project.id(), "shared", 4100, "/seed").created;
    store.save().unwrap();
    store.close().unwrap();

    let handles: Vec<_> = (0..WRITERS)
        .map(|writer| {
            let project = Arc::clone(&project);
            thread::spawn(move || {
                for iteration in 0..ITERATIONS {
                    let mut store = project.open(PATIENT).unwrap();
                    let current = store.get_context(project.id(), "shared").unwrap().base_port;
                    store.set_context(
                        project.id(),
                        "shared",
                        current + 1,
                        format!("/writer-{}/{}", writer, iteration),
                    );
                    store.save().unwrap();
                    store.close().unwrap();
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().unwrap();
    }

    let registry = project.read_raw().unwrap();
    let contexts = registry.list_contexts(project.id()).unwrap();
    assert_eq!(contexts.len(), 1);

    let shared = &contexts["shared"];
    assert_eq!(shared.base_port as usize, 4100 + WRITERS * ITERATIONS);
    assert_eq!(shared.created, created);
    assert!(shared.path.starts_with("/writer-"));
}

#[test]
fn test_concurrent_allocations_never_collide() {
    let project = Arc::new(TestProject::new().unwrap());
    let num_services = project.config().unwrap().num_services();

    let handles: Vec<_> = (0..WRITERS)
        .map(|writer| {
            let project = Arc::clone(&project);
            thread::spawn(move || {
                for iteration in 0..ITERATIONS {
                    let mut store = project.open(PATIENT).unwrap();
                    let base = find_next_available_base_port(store.registry(), num_services).unwrap();
                    store.set_context(
                        project.id(),
                        &format!("feature/{}-{}", writer, iteration),
                        base,
                        "/tmp",
                    );
                    store.save().unwrap();
                    store.close().unwrap();
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().unwrap();
    }

    let registry = project.read_raw().unwrap();
    assert_eq!(
        registry.list_contexts(project.id()).unwrap().len(),
        WRITERS * ITERATIONS
    );
    assert!(find_duplicate_base_ports(&registry).is_empty());
}

#[test]
fn test_held_lock_times_out_then_serializes() {
    let project = Arc::new(TestProject::new().unwrap());
    let (locked_tx, locked_rx) = mpsc::channel();

    let holder = {
        let project = Arc::clone(&project);
        thread::spawn(move || {
            let mut store = project.open(PATIENT).unwrap();
            store.set_context(project.id(), "holder", 4100, "/holder");
            locked_tx.send(()).unwrap();
            thread::sleep(Duration::from_millis(600));
            store.save().unwrap();
            store.close().unwrap();
        })
    };

    locked_rx.recv().unwrap();

    let impatient = project.open(Duration::from_millis(100));
    match impatient {
        Err(e @ DualError::LockTimeout { .. }) => assert!(e.is_retryable()),
        other => panic!("expected lock timeout, got {:?}", other.map(|_| ())),
    }

    // Blocks until the holder has saved and closed, then sees its write.
    let mut store = project.open(PATIENT).unwrap();
    assert_eq!(store.get_context(project.id(), "holder").unwrap().base_port, 4100);
    store.close().unwrap();

    holder.join().unwrap();
}

#[test]
fn test_double_close_is_harmless() {
    let project = TestProject::new().unwrap();
    let mut store = project.open(PATIENT).unwrap();

    store.close().unwrap();
    store.close().unwrap();
    drop(store);

    assert!(project.open(Duration::from_millis(100)).is_ok());
}
