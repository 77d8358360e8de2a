#![allow(dead_code)]

use fedfs_kernel::{
    AccessOptions, AccessTypes, AccountingController, Closable, CompositeDriver, Controller,
    Driver, Error, FsConfig, InputChannel, InputSocket, InputStream, LockController, Manager, MemoryStream,
    Model, Node, NodeName, NodeType, OutputChannel, OutputSocket, OutputStream, Result, Scheme,
    SyncError, SyncOptions, TimeType,
};
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::io::{self, Seek, SeekFrom, Write};
use std::sync::Arc;
use std::time::SystemTime;

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Records the mount points synced, in order.
#[derive(Default)]
pub struct SyncLog(Mutex<Vec<String>>);

impl SyncLog {
    pub fn entries(&self) -> Vec<String> {
        self.0.lock().clone()
    }
}

/// A driver keeping every file system in memory. Opaque mount points do
/// not read their archive file, so nesting only affects sync order.
pub struct MemDriver {
    pub log: Arc<SyncLog>,
}

impl MemDriver {
    pub fn new() -> Self {
        Self {
            log: Arc::new(SyncLog::default()),
        }
    }
}

impl Driver for MemDriver {
    fn new_controller(
        &self,
        manager: &Manager,
        model: Arc<Model>,
        parent: Option<Arc<dyn Controller>>,
    ) -> Result<Arc<dyn Controller>> {
        let mem: Arc<dyn Controller> = Arc::new(MemController {
            model,
            parent,
            files: Arc::new(Mutex::new(BTreeMap::new())),
            log: Arc::clone(&self.log),
        });
        let accounting: Arc<dyn Controller> = Arc::new(AccountingController::new(
            mem,
            manager.config().wait_close_timeout(),
        ));
        Ok(Arc::new(LockController::new(accounting)))
    }
}

pub fn composite(schemes: &[&str], driver: &Arc<MemDriver>) -> CompositeDriver {
    CompositeDriver::from_drivers(schemes.iter().map(|s| {
        let driver: Arc<dyn Driver> = driver.clone();
        (Scheme::new(s).unwrap(), driver)
    }))
}

pub fn manager_with(schemes: &[&str], driver: &Arc<MemDriver>, config: FsConfig) -> Manager {
    Manager::with_config(composite(schemes, driver), config)
}

type Files = Arc<Mutex<BTreeMap<String, Vec<u8>>>>;

pub struct MemController {
    model: Arc<Model>,
    parent: Option<Arc<dyn Controller>>,
    files: Files,
    log: Arc<SyncLog>,
}

impl Controller for MemController {
    fn model(&self) -> &Arc<Model> {
        &self.model
    }

    fn parent(&self) -> Option<&Arc<dyn Controller>> {
        self.parent.as_ref()
    }

    fn node(&self, _options: AccessOptions, name: &NodeName) -> Result<Option<Node>> {
        if name.is_root() {
            let files = self.files.lock();
            return Ok(Some(
                Node::new(NodeName::ROOT, NodeType::Directory).with_members(files.keys().cloned()),
            ));
        }
        Ok(self
            .files
            .lock()
            .get(name.path())
            .map(|content| Node::new(name.clone(), NodeType::File).with_size(content.len() as u64)))
    }

    fn check_access(&self, options: AccessOptions, name: &NodeName, _types: AccessTypes) -> Result<()> {
        match self.node(options, name)? {
            Some(_) => Ok(()),
            None => Err(Error::NotFound(self.mount_point().resolve(name))),
        }
    }

    fn set_read_only(&self, _options: AccessOptions, _name: &NodeName) -> Result<()> {
        Err(Error::Unsupported {
            operation: "set_read_only",
            mount_point: self.mount_point().clone(),
        })
    }

    fn set_times(
        &self,
        _options: AccessOptions,
        _name: &NodeName,
        times: &BTreeMap<TimeType, SystemTime>,
    ) -> Result<bool> {
        Ok(times.is_empty())
    }

    fn input(&self, _options: AccessOptions, name: &NodeName) -> Box<dyn InputSocket> {
        Box::new(MemInput {
            files: Arc::clone(&self.files),
            name: name.clone(),
        })
    }

    fn output(
        &self,
        _options: AccessOptions,
        name: &NodeName,
        _template: Option<&Node>,
    ) -> Box<dyn OutputSocket> {
        Box::new(MemOutput {
            files: Arc::clone(&self.files),
            model: Arc::clone(&self.model),
            name: name.path().to_string(),
        })
    }

    fn make(
        &self,
        _options: AccessOptions,
        name: &NodeName,
        _node_type: NodeType,
        _template: Option<&Node>,
    ) -> Result<()> {
        self.files.lock().entry(name.path().to_string()).or_default();
        self.model.set_mounted(true);
        Ok(())
    }

    fn unlink(&self, _options: AccessOptions, name: &NodeName) -> Result<()> {
        self.files
            .lock()
            .remove(name.path())
            .map(|_| ())
            .ok_or_else(|| Error::NotFound(self.mount_point().resolve(name)))
    }

    fn sync(&self, _options: SyncOptions) -> std::result::Result<(), SyncError> {
        self.log.0.lock().push(self.mount_point().to_string());
        self.model.set_mounted(false);
        Ok(())
    }
}

struct MemInput {
    files: Files,
    name: NodeName,
}

impl MemInput {
    fn open(&self) -> Result<MemoryStream> {
        match self.files.lock().get(self.name.path()) {
            Some(content) => Ok(MemoryStream::new(content.clone())),
            None => Err(Error::Io(io::Error::new(
                io::ErrorKind::NotFound,
                self.name.to_string(),
            ))),
        }
    }
}

impl InputSocket for MemInput {
    fn target(&self) -> Result<Node> {
        let stream = self.open()?;
        Ok(Node::new(self.name.clone(), NodeType::File).with_size(stream.into_inner().len() as u64))
    }

    fn stream(&self) -> Result<Box<dyn InputStream>> {
        Ok(Box::new(self.open()?))
    }

    fn channel(&self) -> Result<Box<dyn InputChannel>> {
        Ok(Box::new(self.open()?))
    }
}

struct MemOutput {
    files: Files,
    model: Arc<Model>,
    name: String,
}

impl MemOutput {
    fn open(&self) -> MemWriter {
        MemWriter {
            buffer: Some(MemoryStream::default()),
            files: Arc::clone(&self.files),
            model: Arc::clone(&self.model),
            name: self.name.clone(),
        }
    }
}

impl OutputSocket for MemOutput {
    fn stream(&self) -> Result<Box<dyn OutputStream>> {
        Ok(Box::new(self.open()))
    }

    fn channel(&self) -> Result<Box<dyn OutputChannel>> {
        Ok(Box::new(self.open()))
    }
}

/// Buffers written content and stores it on close.
struct MemWriter {
    buffer: Option<MemoryStream>,
    files: Files,
    model: Arc<Model>,
    name: String,
}

impl MemWriter {
    fn buffer(&mut self) -> io::Result<&mut MemoryStream> {
        self.buffer.as_mut().ok_or_else(fedfs_kernel::io::closed)
    }
}

impl Write for MemWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.buffer()?.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.buffer()?.flush()
    }
}

impl Seek for MemWriter {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        self.buffer()?.seek(pos)
    }
}

impl Closable for MemWriter {
    fn close(&mut self) -> io::Result<()> {
        if let Some(buffer) = self.buffer.take() {
            self.files.lock().insert(self.name.clone(), buffer.into_inner());
            self.model.set_mounted(true);
        }
        Ok(())
    }
}
