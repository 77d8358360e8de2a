//! Zip files mounted as file systems, e.g. `zip:file:/a.zip!/` or
//! `jar:file:/app.jar!/`.
//!
//! Entries are stored uncompressed. Reading requires stored entries as
//! well.

mod archive;
mod controller;

pub use controller::ZipController;

use fedfs_kernel::{
    AccountingController, Controller, Driver, Error, KeyController, KeyManager, KeyScope,
    LockController, Manager, Model, Result,
};
use std::sync::Arc;

/// Creates controller chains for zip file systems.
///
/// Every chain is a [`LockController`] around an optional
/// [`KeyController`] around an [`AccountingController`] around the
/// [`ZipController`]. The key controller is present only if a
/// [`KeyManager`] is configured.
#[derive(Default, Clone)]
pub struct ZipDriver {
    keys: Option<Arc<dyn KeyManager>>,
}

impl ZipDriver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ask `keys` for a key before any content of a zip file is accessed.
    pub fn with_key_manager(mut self, keys: Arc<dyn KeyManager>) -> Self {
        self.keys = Some(keys);
        self
    }
}

impl Driver for ZipDriver {
    fn new_controller(
        &self,
        manager: &Manager,
        model: Arc<Model>,
        parent: Option<Arc<dyn Controller>>,
    ) -> Result<Arc<dyn Controller>> {
        let Some(parent) = parent else {
            return Err(Error::InvalidArgument(format!(
                "zip file system {} needs a parent controller",
                model.mount_point()
            )));
        };
        let config = manager.config();
        let zip: Arc<dyn Controller> =
            Arc::new(ZipController::new(model, parent, config.read_only)?);
        let accounting: Arc<dyn Controller> =
            Arc::new(AccountingController::new(zip, config.wait_close_timeout()));
        let keyed = match &self.keys {
            Some(keys) => Arc::new(KeyController::new(
                accounting,
                Arc::clone(keys),
                KeyScope::Archive,
            )) as Arc<dyn Controller>,
            None => accounting,
        };
        Ok(Arc::new(LockController::new(keyed)))
    }
}
