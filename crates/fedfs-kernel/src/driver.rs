use crate::controller::{self, Controller};
use crate::error::{Error, Result};
use crate::manager::Manager;
use crate::model::{self, Model};
use fedfs_address::{MountPoint, Scheme};
use log::trace;
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Creates the models and controllers of the file systems of one or more
/// schemes.
pub trait Driver: Send + Sync {
    /// Create the model of `mount_point`. Most drivers keep the default.
    fn new_model(
        &self,
        manager: &Manager,
        mount_point: MountPoint,
        parent: Option<Arc<Model>>,
    ) -> Result<Arc<Model>> {
        let _ = manager;
        Ok(Arc::new(Model::new(mount_point, parent)?))
    }

    /// Create the controller chain for `model`. `parent` is the controller
    /// of the file system containing the archive file.
    ///
    /// Implementations must not call back into the manager to look up
    /// controllers.
    fn new_controller(
        &self,
        manager: &Manager,
        model: Arc<Model>,
        parent: Option<Arc<dyn Controller>>,
    ) -> Result<Arc<dyn Controller>>;
}

/// Drivers keyed by the scheme they serve.
pub type DriverMap = BTreeMap<Scheme, Arc<dyn Driver>>;

/// Supplies the current driver map. The map itself is immutable; a
/// supplier may hand out a different map on every call.
pub trait DriverMapSupplier: Send + Sync {
    fn drivers(&self) -> Arc<DriverMap>;
}

/// A driver map that can be replaced at runtime.
#[derive(Default)]
pub struct DriverRegistry {
    map: RwLock<Arc<DriverMap>>,
}

impl DriverRegistry {
    pub fn new(map: DriverMap) -> Self {
        Self {
            map: RwLock::new(Arc::new(map)),
        }
    }

    /// Register `driver` for `scheme`, returning the driver it replaces.
    pub fn register(&self, scheme: Scheme, driver: Arc<dyn Driver>) -> Option<Arc<dyn Driver>> {
        let mut map = self.map.write();
        let mut next = DriverMap::clone(&map);
        let previous = next.insert(scheme, driver);
        *map = Arc::new(next);
        previous
    }

    pub fn replace(&self, map: DriverMap) {
        *self.map.write() = Arc::new(map);
    }
}

impl DriverMapSupplier for DriverRegistry {
    fn drivers(&self) -> Arc<DriverMap> {
        Arc::clone(&self.map.read())
    }
}

impl DriverMapSupplier for Arc<DriverMap> {
    fn drivers(&self) -> Arc<DriverMap> {
        Arc::clone(self)
    }
}

/// Dispatches to the driver registered for the scheme of a mount point.
#[derive(Clone)]
pub struct CompositeDriver {
    supplier: Arc<dyn DriverMapSupplier>,
}

impl CompositeDriver {
    pub fn new(supplier: Arc<dyn DriverMapSupplier>) -> Self {
        Self { supplier }
    }

    pub fn from_drivers<I>(drivers: I) -> Self
    where
        I: IntoIterator<Item = (Scheme, Arc<dyn Driver>)>,
    {
        let map: DriverMap = drivers.into_iter().collect();
        Self::new(Arc::new(Arc::new(map)))
    }

    /// The driver for `scheme`.
    pub fn driver(&self, scheme: &Scheme) -> Result<Arc<dyn Driver>> {
        self.supplier
            .drivers()
            .get(scheme)
            .cloned()
            .ok_or_else(|| Error::UnknownScheme(scheme.clone()))
    }

    /// The schemes with a registered driver.
    pub fn schemes(&self) -> Vec<Scheme> {
        self.supplier.drivers().keys().cloned().collect()
    }

    pub fn new_model(
        &self,
        manager: &Manager,
        mount_point: MountPoint,
        parent: Option<Arc<Model>>,
    ) -> Result<Arc<Model>> {
        model::check_parent(&mount_point, parent.as_deref())?;
        let driver = self.driver(mount_point.scheme())?;
        trace!("Creating model for {mount_point}");
        let model = driver.new_model(manager, mount_point.clone(), parent)?;
        if model.mount_point() != &mount_point {
            return Err(Error::InvalidArgument(format!(
                "driver for {} created a model for {}",
                mount_point,
                model.mount_point()
            )));
        }
        Ok(model)
    }

    pub fn new_controller(
        &self,
        manager: &Manager,
        model: Arc<Model>,
        parent: Option<Arc<dyn Controller>>,
    ) -> Result<Arc<dyn Controller>> {
        controller::check_parent(&model, parent.as_deref())?;
        let driver = self.driver(model.mount_point().scheme())?;
        trace!("Creating controller for {}", model.mount_point());
        driver.new_controller(manager, model, parent)
    }
}
