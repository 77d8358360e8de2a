//! The platform file system, addressed by `file:` URIs.

use crate::error::DriverError;
use fedfs_kernel::io::closed;
use fedfs_kernel::{
    AccessOptions, AccessTypes, Closable, Controller, Driver, Error, InputChannel, InputSocket,
    InputStream, Manager, Model, Node, NodeName, NodePath, NodeType, OutputChannel, OutputSocket,
    OutputStream, Result, SyncError, SyncOptions, TimeType,
};
use log::{debug, trace};
use std::collections::BTreeMap;
use std::fs::{self, File, FileTimes, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::SystemTime;
use tempfile::NamedTempFile;
use url::Url;

/// Serves hierarchical `file:` mount points from the platform file system.
#[derive(Debug, Default, Clone)]
pub struct FileDriver;

impl Driver for FileDriver {
    fn new_controller(
        &self,
        manager: &Manager,
        model: Arc<Model>,
        parent: Option<Arc<dyn Controller>>,
    ) -> Result<Arc<dyn Controller>> {
        if model.mount_point().is_opaque() || parent.is_some() {
            return Err(Error::InvalidArgument(format!(
                "file driver cannot serve {}",
                model.mount_point()
            )));
        }
        Ok(Arc::new(FileController {
            model,
            read_only: manager.config().read_only,
        }))
    }
}

/// Controller for a directory of the platform file system.
pub struct FileController {
    model: Arc<Model>,
    read_only: bool,
}

/// Convert a `file:` URI to a platform path.
pub fn file_path(path: &NodePath) -> Result<PathBuf> {
    if path.node_name().query().is_some() {
        return Err(Error::UnsupportedName {
            path: path.clone(),
            reason: "file names cannot have a query".to_string(),
        });
    }
    let uri = path.uri().as_str();
    let url = Url::parse(uri).map_err(|_| DriverError::NotAFileUri(uri.to_string()))?;
    url.to_file_path()
        .map_err(|()| DriverError::NotAFileUri(uri.to_string()).into())
}

fn node_type_of(file_type: fs::FileType) -> NodeType {
    if file_type.is_dir() {
        NodeType::Directory
    } else if file_type.is_file() {
        NodeType::File
    } else if file_type.is_symlink() {
        NodeType::Symlink
    } else {
        NodeType::Special
    }
}

fn not_found(err: &io::Error) -> bool {
    err.kind() == io::ErrorKind::NotFound
}

impl FileController {
    fn path(&self, name: &NodeName) -> Result<PathBuf> {
        file_path(&self.node_path(name))
    }

    fn node_path(&self, name: &NodeName) -> NodePath {
        self.mount_point().resolve(name)
    }

    fn check_writable(&self) -> Result<()> {
        if self.read_only {
            return Err(Error::ReadOnly(self.mount_point().clone()));
        }
        Ok(())
    }

    fn create_parents(&self, options: AccessOptions, path: &Path) -> Result<()> {
        let Some(dir) = path.parent() else {
            return Ok(());
        };
        if options.contains(AccessOptions::CREATE_PARENTS) {
            fs::create_dir_all(dir)?;
        } else if !dir.is_dir() {
            return Err(DriverError::NotADirectory(dir.to_path_buf()).into());
        }
        Ok(())
    }
}

impl Controller for FileController {
    fn model(&self) -> &Arc<Model> {
        &self.model
    }

    fn parent(&self) -> Option<&Arc<dyn Controller>> {
        None
    }

    fn node(&self, _options: AccessOptions, name: &NodeName) -> Result<Option<Node>> {
        let path = self.path(name)?;
        let metadata = match fs::symlink_metadata(&path) {
            Ok(metadata) => metadata,
            Err(e) if not_found(&e) => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let node_type = node_type_of(metadata.file_type());
        let mut node = Node::new(name.clone(), node_type)
            .with_read_only(metadata.permissions().readonly());
        for (time_type, time) in [
            (TimeType::Access, metadata.accessed()),
            (TimeType::Write, metadata.modified()),
            (TimeType::Create, metadata.created()),
        ] {
            if let Ok(time) = time {
                node = node.with_time(time_type, time);
            }
        }
        node = match node_type {
            NodeType::File => node.with_size(metadata.len()),
            NodeType::Directory => {
                let mut members = Vec::new();
                for entry in fs::read_dir(&path)? {
                    members.push(entry?.file_name().to_string_lossy().into_owned());
                }
                node.with_members(members)
            }
            _ => node,
        };
        Ok(Some(node))
    }

    fn check_access(
        &self,
        options: AccessOptions,
        name: &NodeName,
        types: AccessTypes,
    ) -> Result<()> {
        let Some(node) = self.node(options, name)? else {
            return Err(Error::NotFound(self.node_path(name)));
        };
        if types.contains(AccessTypes::WRITE) {
            self.check_writable()?;
            if node.is_read_only() {
                return Err(Error::AccessDenied(self.node_path(name)));
            }
        }
        if types.contains(AccessTypes::EXECUTE) && !executable(&self.path(name)?)? {
            return Err(Error::AccessDenied(self.node_path(name)));
        }
        Ok(())
    }

    fn set_read_only(&self, _options: AccessOptions, name: &NodeName) -> Result<()> {
        self.check_writable()?;
        let path = self.path(name)?;
        let mut permissions = fs::metadata(&path)?.permissions();
        permissions.set_readonly(true);
        fs::set_permissions(&path, permissions)?;
        Ok(())
    }

    fn set_times(
        &self,
        _options: AccessOptions,
        name: &NodeName,
        times: &BTreeMap<TimeType, SystemTime>,
    ) -> Result<bool> {
        self.check_writable()?;
        let path = self.path(name)?;
        let mut file_times = FileTimes::new();
        let mut complete = true;
        let mut any = false;
        for (&time_type, &time) in times {
            match time_type {
                TimeType::Access => file_times = file_times.set_accessed(time),
                TimeType::Write => file_times = file_times.set_modified(time),
                TimeType::Create => {
                    complete = false;
                    continue;
                }
            }
            any = true;
        }
        if any {
            File::open(&path)?.set_times(file_times)?;
        }
        Ok(complete)
    }

    fn input(&self, _options: AccessOptions, name: &NodeName) -> Box<dyn InputSocket> {
        Box::new(FileInputSocket {
            node_path: self.node_path(name),
        })
    }

    fn output(
        &self,
        options: AccessOptions,
        name: &NodeName,
        template: Option<&Node>,
    ) -> Box<dyn OutputSocket> {
        Box::new(FileOutputSocket {
            controller: FileController {
                model: Arc::clone(&self.model),
                read_only: self.read_only,
            },
            options,
            name: name.clone(),
            template: template.cloned(),
        })
    }

    fn make(
        &self,
        options: AccessOptions,
        name: &NodeName,
        node_type: NodeType,
        template: Option<&Node>,
    ) -> Result<()> {
        self.check_writable()?;
        let path = self.path(name)?;
        self.create_parents(options, &path)?;
        if let Ok(metadata) = fs::symlink_metadata(&path) {
            let actual = node_type_of(metadata.file_type());
            if actual != node_type {
                return Err(Error::TypeMismatch {
                    path: self.node_path(name),
                    expected: node_type,
                    actual,
                });
            }
        }
        let exists = |e: io::Error| match e.kind() {
            io::ErrorKind::AlreadyExists => Error::AlreadyExists(self.node_path(name)),
            _ => Error::Io(e),
        };
        match node_type {
            NodeType::File => {
                let mut open = OpenOptions::new();
                open.write(true);
                if options.contains(AccessOptions::EXCLUSIVE) {
                    open.create_new(true);
                } else {
                    open.create(true).truncate(true);
                }
                open.open(&path).map_err(exists)?;
            }
            NodeType::Directory => fs::create_dir(&path).map_err(exists)?,
            NodeType::Symlink | NodeType::Special => {
                return Err(Error::Unsupported {
                    operation: "make",
                    mount_point: self.mount_point().clone(),
                })
            }
        }
        if let Some(template) = template {
            self.set_times(options, name, template.times())?;
        }
        debug!("Created {node_type} {}", path.display());
        Ok(())
    }

    fn unlink(&self, _options: AccessOptions, name: &NodeName) -> Result<()> {
        self.check_writable()?;
        let path = self.path(name)?;
        let metadata = match fs::symlink_metadata(&path) {
            Ok(metadata) => metadata,
            Err(e) if not_found(&e) => return Err(Error::NotFound(self.node_path(name))),
            Err(e) => return Err(e.into()),
        };
        if metadata.is_dir() {
            if fs::read_dir(&path)?.next().is_some() {
                return Err(Error::DirectoryNotEmpty(self.node_path(name)));
            }
            fs::remove_dir(&path)?;
        } else {
            fs::remove_file(&path)?;
        }
        debug!("Deleted {}", path.display());
        Ok(())
    }

    fn sync(&self, _options: SyncOptions) -> std::result::Result<(), SyncError> {
        trace!("Nothing to sync on {}", self.mount_point());
        Ok(())
    }
}

#[cfg(unix)]
fn executable(path: &Path) -> Result<bool> {
    use std::os::unix::fs::PermissionsExt;
    Ok(fs::metadata(path)?.permissions().mode() & 0o111 != 0)
}

#[cfg(not(unix))]
fn executable(path: &Path) -> Result<bool> {
    Ok(path.exists())
}

struct FileInputSocket {
    node_path: NodePath,
}

impl FileInputSocket {
    fn open(&self) -> Result<FileStream> {
        match File::open(file_path(&self.node_path)?) {
            Ok(file) => Ok(FileStream { file: Some(file) }),
            Err(e) if not_found(&e) => Err(Error::NotFound(self.node_path.clone())),
            Err(e) => Err(e.into()),
        }
    }
}

impl InputSocket for FileInputSocket {
    fn target(&self) -> Result<Node> {
        let stream = self.open()?;
        let size = stream.file.as_ref().map_or(Ok(0), |f| f.metadata().map(|m| m.len()))?;
        Ok(Node::new(self.node_path.node_name().clone(), NodeType::File).with_size(size))
    }

    fn stream(&self) -> Result<Box<dyn InputStream>> {
        Ok(Box::new(self.open()?))
    }

    fn channel(&self) -> Result<Box<dyn InputChannel>> {
        Ok(Box::new(self.open()?))
    }
}

/// A platform file opened for reading.
struct FileStream {
    file: Option<File>,
}

impl FileStream {
    fn file(&mut self) -> io::Result<&mut File> {
        self.file.as_mut().ok_or_else(closed)
    }
}

impl Read for FileStream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.file()?.read(buf)
    }
}

impl Seek for FileStream {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        self.file()?.seek(pos)
    }
}

impl Closable for FileStream {
    fn close(&mut self) -> io::Result<()> {
        self.file = None;
        Ok(())
    }
}

struct FileOutputSocket {
    controller: FileController,
    options: AccessOptions,
    name: NodeName,
    template: Option<Node>,
}

impl FileOutputSocket {
    fn open(&self) -> Result<FileWriter> {
        let controller = &self.controller;
        controller.check_writable()?;
        let path = controller.path(&self.name)?;
        controller.create_parents(self.options, &path)?;
        let exists = path.exists();
        if exists && self.options.contains(AccessOptions::EXCLUSIVE) {
            return Err(Error::AlreadyExists(controller.node_path(&self.name)));
        }
        if path.is_dir() {
            return Err(Error::TypeMismatch {
                path: controller.node_path(&self.name),
                expected: NodeType::File,
                actual: NodeType::Directory,
            });
        }
        let target = if self.options.contains(AccessOptions::APPEND) {
            let file = OpenOptions::new().create(true).append(true).open(&path)?;
            WriteTarget::Append(file)
        } else {
            let dir = path.parent().unwrap_or(Path::new("."));
            WriteTarget::Replace(NamedTempFile::new_in(dir)?)
        };
        let times = self.template.as_ref().map(|t| t.times().clone()).unwrap_or_default();
        Ok(FileWriter {
            target: Some(target),
            path,
            exclusive: self.options.contains(AccessOptions::EXCLUSIVE),
            times,
        })
    }
}

impl OutputSocket for FileOutputSocket {
    fn stream(&self) -> Result<Box<dyn OutputStream>> {
        Ok(Box::new(self.open()?))
    }

    fn channel(&self) -> Result<Box<dyn OutputChannel>> {
        Ok(Box::new(self.open()?))
    }
}

enum WriteTarget {
    /// Content goes to a temporary file that replaces the target on close.
    Replace(NamedTempFile),
    Append(File),
}

impl WriteTarget {
    fn file(&mut self) -> &mut File {
        match self {
            WriteTarget::Replace(temp) => temp.as_file_mut(),
            WriteTarget::Append(file) => file,
        }
    }
}

struct FileWriter {
    target: Option<WriteTarget>,
    path: PathBuf,
    exclusive: bool,
    times: BTreeMap<TimeType, SystemTime>,
}

impl FileWriter {
    fn file(&mut self) -> io::Result<&mut File> {
        self.target.as_mut().map(WriteTarget::file).ok_or_else(closed)
    }
}

impl Write for FileWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.file()?.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.file()?.flush()
    }
}

impl Seek for FileWriter {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        self.file()?.seek(pos)
    }
}

impl Closable for FileWriter {
    fn close(&mut self) -> io::Result<()> {
        let Some(target) = self.target.take() else {
            return Ok(());
        };
        let file = match target {
            WriteTarget::Append(file) => file,
            WriteTarget::Replace(temp) => {
                let persisted = if self.exclusive {
                    temp.persist_noclobber(&self.path)
                } else {
                    temp.persist(&self.path)
                };
                persisted.map_err(|e| e.error)?
            }
        };
        let mut file_times = FileTimes::new();
        if let Some(&time) = self.times.get(&TimeType::Access) {
            file_times = file_times.set_accessed(time);
        }
        if let Some(&time) = self.times.get(&TimeType::Write) {
            file_times = file_times.set_modified(time);
        }
        if !self.times.is_empty() {
            file.set_times(file_times)?;
        }
        trace!("Wrote {}", self.path.display());
        Ok(())
    }
}

impl Drop for FileWriter {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            log::warn!("Failed to close {}: {e}", self.path.display());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_path() {
        let path = NodePath::parse("file:/tmp/a%20b/c").unwrap();
        assert_eq!(file_path(&path).unwrap(), PathBuf::from("/tmp/a b/c"));

        let query = NodePath::parse("file:/tmp/c?x").unwrap();
        assert!(matches!(file_path(&query), Err(Error::UnsupportedName { .. })));
    }
}
