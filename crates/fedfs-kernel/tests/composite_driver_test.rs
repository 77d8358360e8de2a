mod common;

use common::{composite, init_logging, MemDriver};
use fedfs_kernel::{
    CompositeDriver, Driver, DriverMap, DriverRegistry, Error, Manager, Model, MountPoint, Scheme,
};
use std::sync::Arc;

#[test]
fn unknown_scheme() {
    init_logging();
    let driver = composite(&["mem"], &Arc::new(MemDriver::new()));
    let scheme = Scheme::new("zip").unwrap();
    assert!(matches!(driver.driver(&scheme), Err(Error::UnknownScheme(s)) if s == scheme));

    let manager = Manager::new(driver.clone());
    let mp = MountPoint::parse("zip:mem:/a.zip!/").unwrap();
    let parent = Arc::new(Model::new(MountPoint::parse("mem:/").unwrap(), None).unwrap());
    let result = driver.new_model(&manager, mp, Some(parent));
    assert!(matches!(result, Err(Error::UnknownScheme(_))));
}

#[test]
fn model_parent_must_match_mount_point() {
    init_logging();
    let driver = composite(&["mem", "zip"], &Arc::new(MemDriver::new()));
    let manager = Manager::new(driver.clone());
    let mp = MountPoint::parse("zip:mem:/a.zip!/").unwrap();

    let missing = driver.new_model(&manager, mp.clone(), None);
    assert!(matches!(missing, Err(Error::InvalidArgument(_))));

    let wrong = Arc::new(Model::new(MountPoint::parse("mem:/b/").unwrap(), None).unwrap());
    let mismatched = driver.new_model(&manager, mp.clone(), Some(wrong));
    assert!(matches!(mismatched, Err(Error::InvalidArgument(_))));

    let unexpected = Arc::new(Model::new(MountPoint::parse("mem:/").unwrap(), None).unwrap());
    let root = MountPoint::parse("mem:/").unwrap();
    assert!(matches!(
        driver.new_model(&manager, root, Some(unexpected)),
        Err(Error::InvalidArgument(_))
    ));
}

#[test]
fn controller_parent_must_match_model() {
    init_logging();
    let driver = composite(&["mem", "zip"], &Arc::new(MemDriver::new()));
    let manager = Manager::new(driver.clone());

    let root_mp = MountPoint::parse("mem:/").unwrap();
    let root_model = driver.new_model(&manager, root_mp, None).unwrap();
    let root = driver.new_controller(&manager, Arc::clone(&root_model), None).unwrap();

    let other_mp = MountPoint::parse("mem:/other/").unwrap();
    let other_model = driver.new_model(&manager, other_mp, None).unwrap();
    let other = driver.new_controller(&manager, other_model, None).unwrap();

    let mp = MountPoint::parse("zip:mem:/a.zip!/").unwrap();
    let model = driver.new_model(&manager, mp, Some(root_model)).unwrap();
    assert!(matches!(
        driver.new_controller(&manager, Arc::clone(&model), None),
        Err(Error::InvalidArgument(_))
    ));
    assert!(matches!(
        driver.new_controller(&manager, Arc::clone(&model), Some(other)),
        Err(Error::InvalidArgument(_))
    ));
    let controller = driver.new_controller(&manager, model, Some(root)).unwrap();
    assert_eq!(controller.mount_point().to_string(), "zip:mem:/a.zip!/");
}

#[test]
fn registry_changes_are_visible() {
    init_logging();
    let registry = Arc::new(DriverRegistry::new(DriverMap::new()));
    let driver = CompositeDriver::new(registry.clone());
    let scheme = Scheme::new("mem").unwrap();
    assert!(driver.driver(&scheme).is_err());

    let mem: Arc<dyn Driver> = Arc::new(MemDriver::new());
    assert!(registry.register(scheme.clone(), mem).is_none());
    assert!(driver.driver(&scheme).is_ok());
    assert_eq!(driver.schemes(), vec![scheme.clone()]);

    registry.replace(DriverMap::new());
    assert!(driver.driver(&scheme).is_err());
}
