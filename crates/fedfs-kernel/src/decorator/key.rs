use crate::controller::Controller;
use crate::error::Result;
use crate::io::{
    InputChannel, InputSocket, InputStream, OutputChannel, OutputSocket, OutputStream,
};
use crate::node::Node;
use crate::options::{AccessOptions, SyncOptions};
use crate::sync::SyncError;
use fedfs_address::{MountPoint, NodeName, Uri};
use std::sync::Arc;

/// What a key is needed for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyMode {
    Read,
    Write,
}

/// Provides the keys of encrypted resources, e.g. by prompting the user.
pub trait KeyManager: Send + Sync {
    /// Make a key for `resource` available for `mode`, failing with
    /// [`Error::Key`](crate::Error::Key) if none can be obtained.
    fn prepare(&self, resource: &Uri, mode: KeyMode) -> Result<()>;

    /// Forget the key of `resource`, e.g. after it has been deleted.
    fn release(&self, resource: &Uri);
}

/// Which resources a [`KeyController`] asks keys for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyScope {
    /// One key protects the whole archive file.
    Archive,
    /// Every entry has its own key.
    Entry,
}

/// Makes sure the [`KeyManager`] has a key ready before content of a
/// protected file system is read or written.
pub struct KeyController {
    inner: Arc<dyn Controller>,
    keys: Arc<dyn KeyManager>,
    scope: KeyScope,
}

impl KeyController {
    pub fn new(inner: Arc<dyn Controller>, keys: Arc<dyn KeyManager>, scope: KeyScope) -> Self {
        Self { inner, keys, scope }
    }

    fn resource(&self, name: &NodeName) -> Uri {
        resource_uri(self.mount_point(), self.scope, name)
    }
}

/// The hierarchical URI of the resource protected by a key.
fn resource_uri(mount_point: &MountPoint, scope: KeyScope, name: &NodeName) -> Uri {
    match (scope, mount_point.path()) {
        (KeyScope::Archive, Some(archive)) => archive.to_hierarchical_uri(),
        (KeyScope::Archive, None) => mount_point.uri().clone(),
        (KeyScope::Entry, _) => mount_point.resolve(name).to_hierarchical_uri(),
    }
}

impl Controller for KeyController {
    crate::forward_controller!(
        inner => model, parent, node, check_access, set_read_only, set_times, make
    );

    fn input(&self, options: AccessOptions, name: &NodeName) -> Box<dyn InputSocket> {
        Box::new(KeyInputSocket {
            inner: self.inner.input(options, name),
            keys: Arc::clone(&self.keys),
            resource: self.resource(name),
        })
    }

    fn output(
        &self,
        options: AccessOptions,
        name: &NodeName,
        template: Option<&Node>,
    ) -> Box<dyn OutputSocket> {
        Box::new(KeyOutputSocket {
            inner: self.inner.output(options, name, template),
            keys: Arc::clone(&self.keys),
            resource: self.resource(name),
        })
    }

    fn unlink(&self, options: AccessOptions, name: &NodeName) -> Result<()> {
        self.inner.unlink(options, name)?;
        if name.is_root() || self.scope == KeyScope::Entry {
            self.keys.release(&self.resource(name));
        }
        Ok(())
    }

    fn sync(&self, options: SyncOptions) -> std::result::Result<(), SyncError> {
        let committing =
            self.model().is_mounted() && !options.contains(SyncOptions::ABORT_CHANGES);
        if committing && self.scope == KeyScope::Archive {
            let resource = self.resource(&NodeName::ROOT);
            if let Err(e) = self.keys.prepare(&resource, KeyMode::Write) {
                return Err(SyncError::error(
                    Some(self.mount_point().clone()),
                    "no key available to commit changes",
                )
                .with_source(e));
            }
        }
        self.inner.sync(options)
    }
}

struct KeyInputSocket {
    inner: Box<dyn InputSocket>,
    keys: Arc<dyn KeyManager>,
    resource: Uri,
}

impl InputSocket for KeyInputSocket {
    fn target(&self) -> Result<Node> {
        self.inner.target()
    }

    fn stream(&self) -> Result<Box<dyn InputStream>> {
        self.keys.prepare(&self.resource, KeyMode::Read)?;
        self.inner.stream()
    }

    fn channel(&self) -> Result<Box<dyn InputChannel>> {
        self.keys.prepare(&self.resource, KeyMode::Read)?;
        self.inner.channel()
    }
}

struct KeyOutputSocket {
    inner: Box<dyn OutputSocket>,
    keys: Arc<dyn KeyManager>,
    resource: Uri,
}

impl OutputSocket for KeyOutputSocket {
    fn stream(&self) -> Result<Box<dyn OutputStream>> {
        self.keys.prepare(&self.resource, KeyMode::Write)?;
        self.inner.stream()
    }

    fn channel(&self) -> Result<Box<dyn OutputChannel>> {
        self.keys.prepare(&self.resource, KeyMode::Write)?;
        self.inner.channel()
    }
}
