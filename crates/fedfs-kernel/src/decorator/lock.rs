use crate::controller::Controller;
use crate::error::Result;
use crate::io::{
    Closable, InputChannel, InputSocket, InputStream, OutputChannel, OutputSocket, OutputStream,
};
use crate::model::Model;
use crate::node::Node;
use crate::options::{AccessOptions, AccessTypes, NodeType, SyncOptions, TimeType};
use crate::sync::SyncError;
use fedfs_address::NodeName;
use std::collections::BTreeMap;
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::sync::Arc;
use std::time::SystemTime;

/// Serializes all operations on a file system by holding its
/// [`ModelLock`](crate::ModelLock), including reads and writes on the
/// streams it opens.
pub struct LockController {
    inner: Arc<dyn Controller>,
}

impl LockController {
    pub fn new(inner: Arc<dyn Controller>) -> Self {
        Self { inner }
    }
}

impl Controller for LockController {
    crate::forward_controller!(inner => model, parent);

    fn node(&self, options: AccessOptions, name: &NodeName) -> Result<Option<Node>> {
        let _guard = self.model().lock().lock();
        self.inner.node(options, name)
    }

    fn check_access(
        &self,
        options: AccessOptions,
        name: &NodeName,
        types: AccessTypes,
    ) -> Result<()> {
        let _guard = self.model().lock().lock();
        self.inner.check_access(options, name, types)
    }

    fn set_read_only(&self, options: AccessOptions, name: &NodeName) -> Result<()> {
        let _guard = self.model().lock().lock();
        self.inner.set_read_only(options, name)
    }

    fn set_times(
        &self,
        options: AccessOptions,
        name: &NodeName,
        times: &BTreeMap<TimeType, SystemTime>,
    ) -> Result<bool> {
        let _guard = self.model().lock().lock();
        self.inner.set_times(options, name, times)
    }

    fn input(&self, options: AccessOptions, name: &NodeName) -> Box<dyn InputSocket> {
        Box::new(LockInputSocket {
            inner: self.inner.input(options, name),
            model: Arc::clone(self.model()),
        })
    }

    fn output(
        &self,
        options: AccessOptions,
        name: &NodeName,
        template: Option<&Node>,
    ) -> Box<dyn OutputSocket> {
        Box::new(LockOutputSocket {
            inner: self.inner.output(options, name, template),
            model: Arc::clone(self.model()),
        })
    }

    fn make(
        &self,
        options: AccessOptions,
        name: &NodeName,
        node_type: NodeType,
        template: Option<&Node>,
    ) -> Result<()> {
        let _guard = self.model().lock().lock();
        self.inner.make(options, name, node_type, template)
    }

    fn unlink(&self, options: AccessOptions, name: &NodeName) -> Result<()> {
        let _guard = self.model().lock().lock();
        self.inner.unlink(options, name)
    }

    fn sync(&self, options: SyncOptions) -> std::result::Result<(), SyncError> {
        let _guard = self.model().lock().lock();
        self.inner.sync(options)
    }
}

struct LockInputSocket {
    inner: Box<dyn InputSocket>,
    model: Arc<Model>,
}

impl InputSocket for LockInputSocket {
    fn target(&self) -> Result<Node> {
        let _guard = self.model.lock().lock();
        self.inner.target()
    }

    fn stream(&self) -> Result<Box<dyn InputStream>> {
        let _guard = self.model.lock().lock();
        let stream = self.inner.stream()?;
        Ok(Box::new(Locked::new(stream, Arc::clone(&self.model))))
    }

    fn channel(&self) -> Result<Box<dyn InputChannel>> {
        let _guard = self.model.lock().lock();
        let channel = self.inner.channel()?;
        Ok(Box::new(Locked::new(channel, Arc::clone(&self.model))))
    }
}

struct LockOutputSocket {
    inner: Box<dyn OutputSocket>,
    model: Arc<Model>,
}

impl OutputSocket for LockOutputSocket {
    fn stream(&self) -> Result<Box<dyn OutputStream>> {
        let _guard = self.model.lock().lock();
        let stream = self.inner.stream()?;
        Ok(Box::new(Locked::new(stream, Arc::clone(&self.model))))
    }

    fn channel(&self) -> Result<Box<dyn OutputChannel>> {
        let _guard = self.model.lock().lock();
        let channel = self.inner.channel()?;
        Ok(Box::new(Locked::new(channel, Arc::clone(&self.model))))
    }
}

/// A stream whose every operation holds the model lock.
pub struct Locked<S: Closable> {
    inner: S,
    model: Arc<Model>,
}

impl<S: Closable> Locked<S> {
    pub fn new(inner: S, model: Arc<Model>) -> Self {
        Self { inner, model }
    }
}

impl<S: Read + Closable> Read for Locked<S> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let _guard = self.model.lock().lock();
        self.inner.read(buf)
    }
}

impl<S: Write + Closable> Write for Locked<S> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let _guard = self.model.lock().lock();
        self.inner.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        let _guard = self.model.lock().lock();
        self.inner.flush()
    }
}

impl<S: Seek + Closable> Seek for Locked<S> {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        let _guard = self.model.lock().lock();
        self.inner.seek(pos)
    }
}

impl<S: Closable> Closable for Locked<S> {
    fn close(&mut self) -> io::Result<()> {
        let _guard = self.model.lock().lock();
        self.inner.close()
    }
}

impl<S: Closable> Drop for Locked<S> {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            log::warn!("Failed to close stream on {}: {e}", self.model.mount_point());
        }
    }
}
