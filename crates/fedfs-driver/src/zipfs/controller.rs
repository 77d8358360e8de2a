use super::archive::{Archive, Entry};
use fedfs_kernel::{
    AccessOptions, AccessTypes, Closable, Controller, Error, InputChannel, InputSocket,
    InputStream, MemoryStream, Model, Node, NodeName, NodePath, NodeType, OutputChannel,
    OutputSocket, OutputStream, Result, SyncError, SyncOptions, TimeType,
};
use log::{debug, trace};
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::sync::Arc;
use std::time::SystemTime;

/// Controller for the file system inside a zip file.
///
/// The zip file is read from the parent controller when first accessed and
/// held in memory. Changes are written back to the parent by
/// [`sync`](Controller::sync).
pub struct ZipController {
    inner: Arc<Inner>,
}

struct Inner {
    model: Arc<Model>,
    parent: Arc<dyn Controller>,
    /// Location of the zip file in the parent file system.
    archive_path: NodePath,
    read_only: bool,
    archive: Mutex<Option<Archive>>,
}

impl ZipController {
    pub fn new(model: Arc<Model>, parent: Arc<dyn Controller>, read_only: bool) -> Result<Self> {
        let Some(archive_path) = model.mount_point().path().cloned() else {
            return Err(Error::InvalidArgument(format!(
                "zip file system needs an opaque mount point, got {}",
                model.mount_point()
            )));
        };
        Ok(Self {
            inner: Arc::new(Inner {
                model,
                parent,
                archive_path,
                read_only,
                archive: Mutex::new(None),
            }),
        })
    }
}

impl Inner {
    fn entry_path(&self, name: &NodeName) -> NodePath {
        self.model.mount_point().resolve(name)
    }

    fn archive_entry(&self) -> &NodeName {
        self.archive_path.node_name()
    }

    fn check_name(&self, name: &NodeName) -> Result<()> {
        if name.query().is_some() {
            return Err(Error::UnsupportedName {
                path: self.entry_path(name),
                reason: "zip entry names cannot have a query".to_string(),
            });
        }
        Ok(())
    }

    fn check_writable(&self) -> Result<()> {
        if self.read_only {
            return Err(Error::ReadOnly(self.model.mount_point().clone()));
        }
        Ok(())
    }

    /// Run `f` on the archive, reading it from the parent first if needed.
    /// The file system is mounted once `f` leaves changes to commit.
    fn with_archive<T>(&self, f: impl FnOnce(&mut Archive) -> Result<T>) -> Result<T> {
        let mut state = self.archive.lock();
        let archive = match state.take() {
            Some(archive) => archive,
            None => self.load()?,
        };
        let archive = state.insert(archive);
        let result = f(archive);
        if archive.is_dirty() {
            self.model.set_mounted(true);
        }
        result
    }

    fn load(&self) -> Result<Archive> {
        let options = AccessOptions::empty();
        let entry = self.archive_entry();
        match self.parent.node(options, entry)? {
            None => {
                debug!("No zip file at {}", self.archive_path);
                Ok(Archive::missing())
            }
            Some(node) if !node.is_file() => Err(Error::TypeMismatch {
                path: self.archive_path.clone(),
                expected: NodeType::File,
                actual: node.node_type(),
            }),
            Some(_) => {
                let mut stream = self.parent.input(options, entry).stream()?;
                let mut bytes = Vec::new();
                stream.read_to_end(&mut bytes)?;
                stream.close()?;
                let archive = Archive::read(bytes)?;
                debug!("Read zip file {}", self.archive_path);
                Ok(archive)
            }
        }
    }

    /// Check that `name` can be created in `archive`, creating the archive
    /// and missing parent directories if `options` ask for it.
    fn prepare_write(
        &self,
        archive: &mut Archive,
        options: AccessOptions,
        name: &NodeName,
    ) -> Result<()> {
        let create_parents = options.contains(AccessOptions::CREATE_PARENTS);
        if !archive.exists() {
            if !create_parents {
                return Err(Error::NotFound(self.archive_path.clone()));
            }
            archive.create();
        }
        let parent = name.parent().unwrap_or(NodeName::ROOT);
        if !archive.is_directory(&parent) {
            if archive.get(&parent).is_some() {
                return Err(Error::NotDirectory(self.entry_path(&parent)));
            }
            if !create_parents {
                return Err(Error::NotFound(self.entry_path(&parent)));
            }
            archive.create_parents(name);
        }
        Ok(())
    }

    fn commit_entry(&self, name: &NodeName, content: Vec<u8>, modified: SystemTime) -> Result<()> {
        self.with_archive(|archive| {
            archive.insert(
                name,
                Entry::File {
                    content,
                    modified: Some(modified),
                },
            );
            Ok(())
        })?;
        trace!("Committed entry {}", self.entry_path(name));
        Ok(())
    }

    /// Write `archive` to the parent file system.
    fn commit(&self, archive: &Archive) -> Result<()> {
        let options = AccessOptions::STORE | AccessOptions::CREATE_PARENTS;
        let output = self.parent.output(options, self.archive_entry(), None);
        let mut stream = output.stream()?;
        let written = archive.write_to(&mut stream)?;
        stream.close()?;
        debug!("Wrote {written} bytes to {}", self.archive_path);
        Ok(())
    }
}

impl Controller for ZipController {
    fn model(&self) -> &Arc<Model> {
        &self.inner.model
    }

    fn parent(&self) -> Option<&Arc<dyn Controller>> {
        Some(&self.inner.parent)
    }

    fn node(&self, _options: AccessOptions, name: &NodeName) -> Result<Option<Node>> {
        self.inner.check_name(name)?;
        self.inner.with_archive(|archive| Ok(archive.node(name)))
    }

    fn check_access(
        &self,
        options: AccessOptions,
        name: &NodeName,
        types: AccessTypes,
    ) -> Result<()> {
        let Some(node) = self.node(options, name)? else {
            return Err(Error::NotFound(self.inner.entry_path(name)));
        };
        if types.contains(AccessTypes::WRITE) {
            self.inner.check_writable()?;
        }
        if types.contains(AccessTypes::EXECUTE) && node.is_file() {
            return Err(Error::AccessDenied(self.inner.entry_path(name)));
        }
        Ok(())
    }

    fn set_read_only(&self, _options: AccessOptions, _name: &NodeName) -> Result<()> {
        Err(Error::Unsupported {
            operation: "set_read_only",
            mount_point: self.mount_point().clone(),
        })
    }

    fn set_times(
        &self,
        options: AccessOptions,
        name: &NodeName,
        times: &BTreeMap<TimeType, SystemTime>,
    ) -> Result<bool> {
        let inner = &self.inner;
        inner.check_name(name)?;
        inner.check_writable()?;
        if name.is_root() {
            return inner.parent.set_times(options, inner.archive_entry(), times);
        }
        inner.with_archive(|archive| {
            if archive.get(name).is_none() {
                if !archive.is_directory(name) {
                    return Err(Error::NotFound(inner.entry_path(name)));
                }
                archive.insert(name, Entry::Directory { modified: None });
            }
            if let Some(&time) = times.get(&TimeType::Write) {
                archive.set_modified(name, time);
            }
            Ok(times.keys().all(|&t| t == TimeType::Write))
        })
    }

    fn input(&self, _options: AccessOptions, name: &NodeName) -> Box<dyn InputSocket> {
        Box::new(ZipInputSocket {
            inner: Arc::clone(&self.inner),
            name: name.clone(),
        })
    }

    fn output(
        &self,
        options: AccessOptions,
        name: &NodeName,
        template: Option<&Node>,
    ) -> Box<dyn OutputSocket> {
        Box::new(ZipOutputSocket {
            inner: Arc::clone(&self.inner),
            options,
            name: name.clone(),
            modified: template.and_then(|t| t.time(TimeType::Write)),
        })
    }

    fn make(
        &self,
        options: AccessOptions,
        name: &NodeName,
        node_type: NodeType,
        template: Option<&Node>,
    ) -> Result<()> {
        let inner = &self.inner;
        inner.check_name(name)?;
        inner.check_writable()?;
        let modified = template
            .and_then(|t| t.time(TimeType::Write))
            .unwrap_or_else(SystemTime::now);
        inner.with_archive(|archive| {
            if name.is_root() {
                if node_type != NodeType::Directory {
                    return Err(Error::TypeMismatch {
                        path: inner.entry_path(name),
                        expected: NodeType::Directory,
                        actual: node_type,
                    });
                }
                if archive.exists() {
                    return Err(Error::AlreadyExists(inner.entry_path(name)));
                }
                archive.create();
                return Ok(());
            }
            inner.prepare_write(archive, options, name)?;
            let existing = archive.node(name);
            match node_type {
                NodeType::File => {
                    if let Some(node) = existing {
                        if options.contains(AccessOptions::EXCLUSIVE) {
                            return Err(Error::AlreadyExists(inner.entry_path(name)));
                        }
                        if !node.is_file() {
                            return Err(Error::TypeMismatch {
                                path: inner.entry_path(name),
                                expected: NodeType::File,
                                actual: node.node_type(),
                            });
                        }
                    }
                    archive.insert(
                        name,
                        Entry::File {
                            content: Vec::new(),
                            modified: Some(modified),
                        },
                    );
                }
                NodeType::Directory => {
                    if existing.is_some() {
                        return Err(Error::AlreadyExists(inner.entry_path(name)));
                    }
                    archive.insert(name, Entry::Directory { modified: Some(modified) });
                }
                NodeType::Symlink | NodeType::Special => {
                    return Err(Error::Unsupported {
                        operation: "make",
                        mount_point: inner.model.mount_point().clone(),
                    });
                }
            }
            Ok(())
        })
    }

    fn unlink(&self, options: AccessOptions, name: &NodeName) -> Result<()> {
        let inner = &self.inner;
        inner.check_name(name)?;
        inner.check_writable()?;
        if name.is_root() {
            let mut state = inner.archive.lock();
            let archive = match state.take() {
                Some(archive) => archive,
                None => inner.load()?,
            };
            if !archive.exists() {
                return Err(Error::NotFound(inner.archive_path.clone()));
            }
            if !archive.is_empty() {
                *state = Some(archive);
                return Err(Error::DirectoryNotEmpty(inner.entry_path(name)));
            }
            if inner.parent.node(options, inner.archive_entry())?.is_some() {
                inner.parent.unlink(options, inner.archive_entry())?;
            }
            inner.model.set_mounted(false);
            debug!("Deleted zip file {}", inner.archive_path);
            return Ok(());
        }
        inner.with_archive(|archive| {
            if archive.get(name).is_none() && !archive.is_directory(name) {
                return Err(Error::NotFound(inner.entry_path(name)));
            }
            if archive.has_children(name) {
                return Err(Error::DirectoryNotEmpty(inner.entry_path(name)));
            }
            archive.remove(name);
            Ok(())
        })
    }

    fn sync(&self, options: SyncOptions) -> std::result::Result<(), SyncError> {
        let inner = &self.inner;
        let mount_point = inner.model.mount_point();
        let mut state = inner.archive.lock();
        if options.contains(SyncOptions::ABORT_CHANGES) {
            if state.take().is_some_and(|archive| archive.is_dirty()) {
                debug!("Discarded changes to {mount_point}");
            }
            inner.model.set_mounted(false);
            return Ok(());
        }
        if let Some(archive) = state.as_mut().filter(|archive| archive.is_dirty()) {
            if let Err(e) = inner.commit(archive) {
                return Err(SyncError::error(
                    Some(mount_point.clone()),
                    "failed to write zip file",
                )
                .with_source(e));
            }
            archive.set_clean();
        }
        if options.contains(SyncOptions::CLEAR_CACHE) {
            *state = None;
        }
        inner.model.set_mounted(false);
        Ok(())
    }
}

struct ZipInputSocket {
    inner: Arc<Inner>,
    name: NodeName,
}

impl ZipInputSocket {
    fn open(&self) -> Result<MemoryStream> {
        let inner = &self.inner;
        inner.check_name(&self.name)?;
        inner.with_archive(|archive| match archive.get(&self.name) {
            Some(Entry::File { content, .. }) => Ok(MemoryStream::new(content.clone())),
            Some(Entry::Directory { .. }) => Err(Error::TypeMismatch {
                path: inner.entry_path(&self.name),
                expected: NodeType::File,
                actual: NodeType::Directory,
            }),
            None => Err(Error::NotFound(inner.entry_path(&self.name))),
        })
    }
}

impl InputSocket for ZipInputSocket {
    fn target(&self) -> Result<Node> {
        self.inner.check_name(&self.name)?;
        self.inner
            .with_archive(|archive| Ok(archive.node(&self.name)))?
            .ok_or_else(|| Error::NotFound(self.inner.entry_path(&self.name)))
    }

    fn stream(&self) -> Result<Box<dyn InputStream>> {
        Ok(Box::new(self.open()?))
    }

    fn channel(&self) -> Result<Box<dyn InputChannel>> {
        Ok(Box::new(self.open()?))
    }
}

struct ZipOutputSocket {
    inner: Arc<Inner>,
    options: AccessOptions,
    name: NodeName,
    modified: Option<SystemTime>,
}

impl ZipOutputSocket {
    fn open(&self) -> Result<EntryWriter> {
        let inner = &self.inner;
        let name = &self.name;
        inner.check_name(name)?;
        inner.check_writable()?;
        if name.is_root() {
            return Err(Error::TypeMismatch {
                path: inner.entry_path(name),
                expected: NodeType::File,
                actual: NodeType::Directory,
            });
        }
        let initial = inner.with_archive(|archive| {
            inner.prepare_write(archive, self.options, name)?;
            match archive.get(name) {
                Some(_) if self.options.contains(AccessOptions::EXCLUSIVE) => {
                    Err(Error::AlreadyExists(inner.entry_path(name)))
                }
                Some(Entry::Directory { .. }) => Err(Error::TypeMismatch {
                    path: inner.entry_path(name),
                    expected: NodeType::File,
                    actual: NodeType::Directory,
                }),
                Some(Entry::File { content, .. }) if self.options.contains(AccessOptions::APPEND) => {
                    Ok(content.clone())
                }
                _ if archive.is_directory(name) => Err(Error::TypeMismatch {
                    path: inner.entry_path(name),
                    expected: NodeType::File,
                    actual: NodeType::Directory,
                }),
                _ => Ok(Vec::new()),
            }
        })?;
        let mut buffer = MemoryStream::new(initial);
        buffer.seek(SeekFrom::End(0))?;
        // An open entry writer is a pending change.
        inner.model.set_mounted(true);
        Ok(EntryWriter {
            buffer: Some(buffer),
            inner: Arc::clone(inner),
            name: name.clone(),
            modified: self.modified,
        })
    }
}

impl OutputSocket for ZipOutputSocket {
    fn stream(&self) -> Result<Box<dyn OutputStream>> {
        Ok(Box::new(self.open()?))
    }

    fn channel(&self) -> Result<Box<dyn OutputChannel>> {
        Ok(Box::new(self.open()?))
    }
}

/// Buffers the content of an entry and stores it in the archive on close.
struct EntryWriter {
    buffer: Option<MemoryStream>,
    inner: Arc<Inner>,
    name: NodeName,
    modified: Option<SystemTime>,
}

impl EntryWriter {
    fn buffer(&mut self) -> io::Result<&mut MemoryStream> {
        self.buffer.as_mut().ok_or_else(fedfs_kernel::io::closed)
    }
}

impl Write for EntryWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.buffer()?.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.buffer()?.flush()
    }
}

impl Seek for EntryWriter {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        self.buffer()?.seek(pos)
    }
}

impl Closable for EntryWriter {
    fn close(&mut self) -> io::Result<()> {
        let Some(buffer) = self.buffer.take() else {
            return Ok(());
        };
        let modified = self.modified.unwrap_or_else(SystemTime::now);
        self.inner
            .commit_entry(&self.name, buffer.into_inner(), modified)
            .map_err(io::Error::from)
    }
}

impl Drop for EntryWriter {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            log::warn!("Failed to store entry {}: {e}", self.inner.entry_path(&self.name));
        }
    }
}
