use crate::harness::TestProject;
use dual_core::{
    check_context_port_conflict, check_health, find_next_available_base_port, ports_for_context,
    registry_path, validate_base_port, DualError,
};
use std::fs;
use std::time::Duration;

const WAIT: Duration = Duration::from_secs(5);

#[test]
fn test_create_query_delete() {
    let project = TestProject::new().unwrap();
    let config = project.config().unwrap();
    let main_tree = project.worktree("main").unwrap();
    let feature_tree = project.worktree("feature-auth").unwrap();

    let mut store = project.open(WAIT).unwrap();
    let main_port = find_next_available_base_port(store.registry(), config.num_services()).unwrap();
    store.set_context(project.id(), "main", main_port, main_tree.to_string_lossy());
    let feature_port = find_next_available_base_port(store.registry(), config.num_services()).unwrap();
    store.set_context(
        project.id(),
        "feature/auth",
        feature_port,
        feature_tree.to_string_lossy(),
    );
    store.save().unwrap();
    store.close().unwrap();

    assert_eq!(main_port, 4100);
    assert_eq!(feature_port, 4200);

    let mut store = project.open(WAIT).unwrap();
    let ports = ports_for_context(&config, store.registry(), project.id(), "feature/auth").unwrap();
    assert_eq!(ports["api"], 4201);
    assert_eq!(ports["web"], 4202);
    assert_eq!(ports["worker"], 4203);

    store.delete_context(project.id(), "main").unwrap();
    store.save().unwrap();
    store.close().unwrap();

    let on_disk = project.read_raw().unwrap();
    assert!(matches!(
        on_disk.get_context(project.id(), "main"),
        Err(DualError::ContextNotFound { .. })
    ));
    assert!(on_disk.get_context(project.id(), "feature/auth").is_ok());
}

#[test]
fn test_explicit_port_is_validated_and_conflict_checked() {
    let project = TestProject::new().unwrap();
    let config = project.config().unwrap();

    assert!(validate_base_port(80).is_err());
    assert!(validate_base_port(65536).is_err());
    let port = validate_base_port(4102).unwrap();

    let mut store = project.open(WAIT).unwrap();
    store.set_context(project.id(), "main", 4100, "/main");

    let err = check_context_port_conflict(store.registry(), &config, project.id(), port).unwrap_err();
    match err {
        DualError::PortRangeOverlap { context, start, end, .. } => {
            assert_eq!(context, "main");
            assert_eq!((start, end), (4101, 4103));
        }
        other => panic!("unexpected error: {other}"),
    }

    let err = check_context_port_conflict(store.registry(), &config, "/another/project", 4100)
        .unwrap_err();
    assert!(matches!(err, DualError::BasePortInUse { port: 4100, .. }));

    store.close().unwrap();
}

#[test]
fn test_removed_worktree_is_reported_orphaned() {
    let project = TestProject::new().unwrap();
    let config = project.config().unwrap();
    let kept = project.worktree("kept").unwrap();
    let doomed = project.worktree("doomed").unwrap();

    let mut store = project.open(WAIT).unwrap();
    store.set_context(project.id(), "kept", 4100, kept.to_string_lossy());
    store.set_context(project.id(), "doomed", 4200, doomed.to_string_lossy());
    store.save().unwrap();
    store.close().unwrap();

    fs::remove_dir_all(&doomed).unwrap();

    let registry = project.read_raw().unwrap();
    let report = check_health(&registry, &config, project.id());
    assert!(report.has_issues());
    assert_eq!(report.orphaned_contexts.len(), 1);
    assert_eq!(report.orphaned_contexts[0].context.context_name, "doomed");
}

#[test]
fn test_each_save_leaves_a_parseable_file() {
    let project = TestProject::new().unwrap();

    for i in 0..5u16 {
        let mut store = project.open(WAIT).unwrap();
        store.set_context(project.id(), &format!("ctx{}", i), 4100 + i * 100, "/tmp");
        store.save().unwrap();
        store.close().unwrap();

        let registry = project.read_raw().unwrap();
        assert_eq!(
            registry.list_contexts(project.id()).unwrap().len(),
            usize::from(i) + 1
        );
    }

    let dual_dir = registry_path(project.root()).parent().unwrap().to_path_buf();
    let leftovers: Vec<_> = fs::read_dir(dual_dir)
        .unwrap()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_name().to_string_lossy().ends_with(".tmp"))
        .collect();
    assert!(leftovers.is_empty());
}

#[test]
fn test_base_port_without_room_for_services_is_rejected_before_save() {
    let project = TestProject::new().unwrap();
    let config = project.config().unwrap();

    // In range on its own, but 3 services would need 65536..=65538.
    let port = validate_base_port(65535).unwrap();

    let mut store = project.open(WAIT).unwrap();
    let err = check_context_port_conflict(store.registry(), &config, project.id(), port).unwrap_err();
    assert!(matches!(err, DualError::PortOverflow { base_port: 65535, .. }));
    store.close().unwrap();

    assert!(!registry_path(project.root()).exists());
}
