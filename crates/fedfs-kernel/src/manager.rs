use crate::config::FsConfig;
use crate::controller::Controller;
use crate::driver::CompositeDriver;
use crate::error::{Error, Result};
use crate::options::SyncOptions;
use crate::sync::{SyncError, SyncErrorBuilder};
use fedfs_address::{MountPoint, NodeName, NodePath};
use log::{debug, trace};
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Owns the controller chain of every file system in use and syncs them in
/// dependency order.
///
/// There is at most one controller per mount point at any time, and the
/// parent of every controller is the registered controller of the parent
/// mount point. A controller stays registered while anything outside the
/// manager holds it, so it is found and synced again.
pub struct Manager {
    driver: CompositeDriver,
    config: FsConfig,
    controllers: Mutex<BTreeMap<MountPoint, Arc<dyn Controller>>>,
}

impl Manager {
    pub fn new(driver: CompositeDriver) -> Self {
        Self::with_config(driver, FsConfig::default())
    }

    pub fn with_config(driver: CompositeDriver, config: FsConfig) -> Self {
        Self {
            driver,
            config,
            controllers: Mutex::new(BTreeMap::new()),
        }
    }

    pub fn config(&self) -> &FsConfig {
        &self.config
    }

    pub fn driver(&self) -> &CompositeDriver {
        &self.driver
    }

    /// The controller for `mount_point`, creating it and the controllers of
    /// its enclosing file systems as needed.
    pub fn controller(&self, mount_point: &MountPoint) -> Result<Arc<dyn Controller>> {
        let mut controllers = self.controllers.lock();
        let mut chain: Vec<&MountPoint> = mount_point.ancestors().collect();
        chain.reverse();

        let mut parent: Option<Arc<dyn Controller>> = None;
        for mp in chain {
            let controller = match controllers.get(mp) {
                Some(controller) => Arc::clone(controller),
                None => {
                    let parent_model = parent.as_ref().map(|p| Arc::clone(p.model()));
                    let model = self.driver.new_model(self, mp.clone(), parent_model)?;
                    let controller = self.driver.new_controller(self, model, parent.clone())?;
                    debug!("Created controller for {mp}");
                    controllers.insert(mp.clone(), Arc::clone(&controller));
                    controller
                }
            };
            parent = Some(controller);
        }
        parent.ok_or_else(|| {
            Error::InvalidArgument(format!("empty mount point chain for {mount_point}"))
        })
    }

    /// The controller for the file system of `path` and the name of the
    /// entry within it.
    pub fn resolve(&self, path: &NodePath) -> Result<(Arc<dyn Controller>, NodeName)> {
        let controller = self.controller(path.mount_point())?;
        Ok((controller, path.node_name().clone()))
    }

    /// Parse `uri` as a node path, canonicalizing it, and resolve it.
    pub fn resolve_str(&self, uri: &str) -> Result<(Arc<dyn Controller>, NodeName)> {
        self.resolve(&NodePath::canonicalize(uri)?)
    }

    /// The mount points with a registered controller.
    pub fn mount_points(&self) -> Vec<MountPoint> {
        self.controllers.lock().keys().cloned().collect()
    }

    /// Sync every file system.
    pub fn sync(&self, options: SyncOptions) -> std::result::Result<(), SyncError> {
        self.sync_where(options, |_| true)
    }

    /// Sync `prefix` and every file system nested inside it.
    pub fn sync_under(
        &self,
        prefix: &MountPoint,
        options: SyncOptions,
    ) -> std::result::Result<(), SyncError> {
        self.sync_where(options, |mp| prefix.contains(mp))
    }

    fn sync_where(
        &self,
        options: SyncOptions,
        filter: impl Fn(&MountPoint) -> bool,
    ) -> std::result::Result<(), SyncError> {
        let mut targets: Vec<(MountPoint, Arc<dyn Controller>)> = self
            .controllers
            .lock()
            .iter()
            .filter(|(mp, _)| filter(mp))
            .map(|(mp, c)| (mp.clone(), Arc::clone(c)))
            .collect();
        // Nested file systems first so that their changes land in their
        // parent before the parent commits.
        targets.sort_by(|(a, _), (b, _)| b.depth().cmp(&a.depth()).then_with(|| a.cmp(b)));

        let mut builder = SyncErrorBuilder::new();
        let mut synced = Vec::new();
        for (mount_point, controller) in targets {
            match controller.sync(options) {
                Ok(()) => synced.push(mount_point),
                Err(e) => {
                    let warning = !e.has_errors();
                    builder.warn(e);
                    if warning {
                        synced.push(mount_point);
                    }
                }
            }
        }

        if options.contains(SyncOptions::CLEAR_CACHE) {
            self.evict(&synced);
        }
        builder.check()
    }

    /// Unregister the controllers of `synced`, children before parents,
    /// keeping any controller a remaining controller still depends on and
    /// any controller a client still holds.
    fn evict(&self, synced: &[MountPoint]) {
        let mut controllers = self.controllers.lock();
        for mount_point in synced {
            let has_child = controllers
                .keys()
                .any(|mp| mp != mount_point && mount_point.contains(mp));
            if has_child {
                continue;
            }
            let retained = controllers
                .get(mount_point)
                .is_some_and(|c| c.model().is_mounted() || Arc::strong_count(c) > 1);
            if retained {
                trace!("Keeping controller for {mount_point}");
                continue;
            }
            if controllers.remove(mount_point).is_some() {
                debug!("Released controller for {mount_point}");
            }
        }
    }
}
