use std::io;
use std::path::PathBuf;
use zip::result::ZipError;

/// Errors specific to the drivers in this crate.
///
/// Controllers report them as [`fedfs_kernel::Error::Io`].
#[derive(Debug, thiserror::Error)]
pub enum DriverError {
    #[error("invalid archive: {0}")]
    Zip(#[from] ZipError),

    #[error("archive entry {name:?} exceeds the supported size")]
    EntryTooLarge { name: String },

    #[error("{0} is not a file URI")]
    NotAFileUri(String),

    #[error("path {0} is not a directory")]
    NotADirectory(PathBuf),

    #[error("timestamp out of range for a zip entry")]
    TimeOutOfRange,

    #[error(transparent)]
    Io(#[from] io::Error),
}

impl From<DriverError> for fedfs_kernel::Error {
    fn from(err: DriverError) -> Self {
        match err {
            DriverError::Io(err) => fedfs_kernel::Error::Io(err),
            DriverError::Zip(ZipError::Io(err)) => fedfs_kernel::Error::Io(err),
            other => fedfs_kernel::Error::Io(io::Error::new(io::ErrorKind::InvalidData, other)),
        }
    }
}

pub type DriverResult<T> = Result<T, DriverError>;
