mod common;

use common::{init_logging, manager_with, MemDriver};
use fedfs_kernel::{
    io, AccessOptions, Closable, Error, FsConfig, MountPoint, NodeName, NodeType, SyncOptions,
};
use std::io::Read;
use std::sync::Arc;

const NESTED: &str = "zip:mem:/a.zip!/b.zip!/";

#[test]
fn controllers_are_reused() {
    init_logging();
    let driver = Arc::new(MemDriver::new());
    let manager = manager_with(&["mem"], &driver, FsConfig::default());
    let mp = MountPoint::parse("mem:/").unwrap();
    let first = manager.controller(&mp).unwrap();
    let second = manager.controller(&mp).unwrap();
    assert!(Arc::ptr_eq(first.model(), second.model()));
    assert_eq!(manager.mount_points(), vec![mp]);
}

#[test]
fn nested_chain_links_parents() {
    init_logging();
    let driver = Arc::new(MemDriver::new());
    let manager = manager_with(&["mem", "zip"], &driver, FsConfig::default());
    let controller = manager.controller(&MountPoint::parse(NESTED).unwrap()).unwrap();

    let parent = controller.parent().unwrap();
    assert_eq!(parent.mount_point().to_string(), "zip:mem:/a.zip!/");
    let root = parent.parent().unwrap();
    assert_eq!(root.mount_point().to_string(), "mem:/");
    assert!(root.parent().is_none());
    assert!(Arc::ptr_eq(
        controller.model().parent().unwrap(),
        parent.model()
    ));
    assert_eq!(manager.mount_points().len(), 3);
}

#[test]
fn sync_runs_innermost_first() {
    init_logging();
    let driver = Arc::new(MemDriver::new());
    let manager = manager_with(&["mem", "zip"], &driver, FsConfig::default());
    manager.controller(&MountPoint::parse(NESTED).unwrap()).unwrap();

    manager.sync(SyncOptions::SYNC).unwrap();
    assert_eq!(
        driver.log.entries(),
        vec!["zip:mem:/a.zip!/b.zip!/", "zip:mem:/a.zip!/", "mem:/"]
    );
}

#[test]
fn sync_under_is_limited_to_prefix() {
    init_logging();
    let driver = Arc::new(MemDriver::new());
    let manager = manager_with(&["mem", "zip"], &driver, FsConfig::default());
    manager.controller(&MountPoint::parse(NESTED).unwrap()).unwrap();
    manager.controller(&MountPoint::parse("mem:/other/").unwrap()).unwrap();

    let prefix = MountPoint::parse("zip:mem:/a.zip!/").unwrap();
    manager.sync_under(&prefix, SyncOptions::SYNC).unwrap();
    assert_eq!(
        driver.log.entries(),
        vec!["zip:mem:/a.zip!/b.zip!/", "zip:mem:/a.zip!/"]
    );
}

#[test]
fn umount_releases_controllers() {
    init_logging();
    let driver = Arc::new(MemDriver::new());
    let manager = manager_with(&["mem", "zip"], &driver, FsConfig::default());
    let mp = MountPoint::parse(NESTED).unwrap();
    let before = {
        let controller = manager.controller(&mp).unwrap();
        controller
            .make(AccessOptions::empty(), &NodeName::parse("x").unwrap(), NodeType::File, None)
            .unwrap();
        Arc::clone(controller.model())
    };
    assert!(before.is_mounted());

    manager.sync(SyncOptions::UMOUNT).unwrap();
    assert!(!before.is_mounted());
    assert!(manager.mount_points().is_empty());
    let after = manager.controller(&mp).unwrap();
    assert!(!Arc::ptr_eq(&before, after.model()));
}

#[test]
fn held_controllers_stay_registered() {
    init_logging();
    let driver = Arc::new(MemDriver::new());
    let manager = manager_with(&["mem", "zip"], &driver, FsConfig::default());
    let mp = MountPoint::parse(NESTED).unwrap();
    let held = manager.controller(&mp).unwrap();
    let name = NodeName::parse("x").unwrap();

    held.make(AccessOptions::empty(), &name, NodeType::File, None).unwrap();
    manager.sync(SyncOptions::UMOUNT).unwrap();
    assert!(!held.model().is_mounted());
    assert_eq!(manager.mount_points().len(), 3);
    let again = manager.controller(&mp).unwrap();
    assert!(Arc::ptr_eq(held.model(), again.model()));
    drop(again);

    held.make(AccessOptions::empty(), &name, NodeType::File, None).unwrap();
    assert!(held.model().is_mounted());
    manager.sync(SyncOptions::UMOUNT).unwrap();
    assert!(!held.model().is_mounted());
    let synced = driver.log.entries();
    assert_eq!(synced.iter().filter(|mp| mp.as_str() == NESTED).count(), 2);

    drop(held);
    manager.sync(SyncOptions::UMOUNT).unwrap();
    assert!(manager.mount_points().is_empty());
}

#[test]
fn resolve_canonicalizes() {
    init_logging();
    let driver = Arc::new(MemDriver::new());
    let manager = manager_with(&["mem"], &driver, FsConfig::default());
    let (controller, name) = manager.resolve_str("mem:/dir//file").unwrap();
    assert_eq!(controller.mount_point().to_string(), "mem:/dir/");
    assert_eq!(name.to_string(), "file");
}

#[test]
fn unknown_scheme_is_reported() {
    init_logging();
    let driver = Arc::new(MemDriver::new());
    let manager = manager_with(&["mem"], &driver, FsConfig::default());
    let err = manager
        .controller(&MountPoint::parse("ftp:/").unwrap())
        .err()
        .unwrap();
    assert!(matches!(err, Error::UnknownScheme(scheme) if scheme.as_str() == "ftp"));
    assert!(manager.mount_points().is_empty());
}

#[test]
fn copy_between_entries() {
    init_logging();
    let driver = Arc::new(MemDriver::new());
    let manager = manager_with(&["mem"], &driver, FsConfig::default());
    let (controller, source) = manager.resolve_str("mem:/source").unwrap();
    let target = NodeName::parse("target").unwrap();
    let options = AccessOptions::empty();

    let mut stream = controller.output(options, &source, None).stream().unwrap();
    std::io::Write::write_all(&mut stream, b"hello").unwrap();
    stream.close().unwrap();

    let copied = io::copy(
        controller.input(options, &source).as_ref(),
        controller.output(options, &target, None).as_ref(),
    )
    .unwrap();
    assert_eq!(copied, 5);

    let mut content = String::new();
    let mut input = controller.input(options, &target).stream().unwrap();
    input.read_to_string(&mut content).unwrap();
    assert_eq!(content, "hello");

    let node = controller.node(options, &target).unwrap().unwrap();
    assert_eq!(node.size(), Some(5));
    assert!(controller.node(options, &NodeName::parse("missing").unwrap()).unwrap().is_none());
}
