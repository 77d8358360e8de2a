use crate::options::NodeType;
use crate::sync::SyncError;
use fedfs_address::{MountPoint, NodePath, Scheme, Uri};
use std::io;
use thiserror::Error;

/// Errors raised by controllers, drivers and the manager.
#[derive(Debug, Error)]
pub enum Error {
    /// An address could not be parsed or validated.
    #[error(transparent)]
    InvalidAddress(#[from] fedfs_address::Error),

    /// No driver is registered for the scheme of a mount point.
    #[error("no driver registered for scheme {0:?}")]
    UnknownScheme(Scheme),

    /// The driver cannot implement the operation.
    #[error("{operation} is not supported by {mount_point}")]
    Unsupported {
        operation: &'static str,
        mount_point: MountPoint,
    },

    /// A precondition of an API call was violated.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("no such entry: {0}")]
    NotFound(NodePath),

    #[error("entry already exists: {0}")]
    AlreadyExists(NodePath),

    #[error("not a directory: {0}")]
    NotDirectory(NodePath),

    #[error("directory not empty: {0}")]
    DirectoryNotEmpty(NodePath),

    /// An entry exists with a different type than requested.
    #[error("{path} is a {actual}, not a {expected}")]
    TypeMismatch {
        path: NodePath,
        expected: NodeType,
        actual: NodeType,
    },

    /// The entry name cannot be represented by the file system.
    #[error("unsupported entry name {path}: {reason}")]
    UnsupportedName { path: NodePath, reason: String },

    #[error("access denied: {0}")]
    AccessDenied(NodePath),

    #[error("file system is read-only: {0}")]
    ReadOnly(MountPoint),

    /// The key manager refused to provide a key.
    #[error("no key available for {resource}: {reason}")]
    Key { resource: Uri, reason: String },

    /// I/O error from the underlying storage.
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// Configuration could not be parsed.
    #[error("config error: {0}")]
    Config(#[from] toml::de::Error),

    /// Synchronization failed.
    #[error(transparent)]
    Sync(#[from] SyncError),
}

impl Error {
    fn kind(&self) -> io::ErrorKind {
        match self {
            Error::NotFound(_) => io::ErrorKind::NotFound,
            Error::AlreadyExists(_) => io::ErrorKind::AlreadyExists,
            Error::AccessDenied(_) | Error::ReadOnly(_) | Error::Key { .. } => {
                io::ErrorKind::PermissionDenied
            }
            Error::InvalidAddress(_) | Error::InvalidArgument(_) | Error::UnsupportedName { .. } => {
                io::ErrorKind::InvalidInput
            }
            Error::Unsupported { .. } => io::ErrorKind::Unsupported,
            Error::Io(err) => err.kind(),
            _ => io::ErrorKind::Other,
        }
    }
}

impl From<Error> for io::Error {
    fn from(err: Error) -> Self {
        match err {
            Error::Io(err) => err,
            other => io::Error::new(other.kind(), other),
        }
    }
}

/// Result type for kernel operations.
pub type Result<T> = std::result::Result<T, Error>;
