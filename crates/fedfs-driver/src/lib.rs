//! Drivers for the platform file system and zip files.
//!
//! ```no_run
//! use fedfs_driver::default_driver;
//! use fedfs_kernel::{AccessOptions, Closable, Manager, SyncOptions};
//! use std::io::Write;
//!
//! let manager = Manager::new(default_driver()?);
//! let (controller, name) = manager.resolve_str("zip:file:/tmp/demo.zip!/hello.txt")?;
//! let mut stream = controller
//!     .output(AccessOptions::CREATE_PARENTS, &name, None)
//!     .stream()?;
//! stream.write_all(b"Hello, world!")?;
//! stream.close()?;
//! manager.sync(SyncOptions::UMOUNT)?;
//! # Ok::<(), fedfs_kernel::Error>(())
//! ```

pub mod error;
pub mod file;
pub mod zipfs;

pub use error::{DriverError, DriverResult};
pub use file::{FileController, FileDriver};
pub use zipfs::{ZipController, ZipDriver};

use fedfs_kernel::{CompositeDriver, Driver, Result, Scheme};
use std::sync::Arc;

/// Schemes served by [`default_driver`] and whether they name archives.
pub const DEFAULT_SCHEMES: [(&str, bool); 3] = [("file", false), ("zip", true), ("jar", true)];

/// A composite driver serving `file`, `zip` and `jar` URIs.
pub fn default_driver() -> Result<CompositeDriver> {
    let file: Arc<dyn Driver> = Arc::new(FileDriver);
    let zip: Arc<dyn Driver> = Arc::new(ZipDriver::new());
    let drivers = DEFAULT_SCHEMES
        .into_iter()
        .map(|(scheme, archive)| -> Result<(Scheme, Arc<dyn Driver>)> {
            let driver = if archive { &zip } else { &file };
            Ok((Scheme::new(scheme)?, Arc::clone(driver)))
        })
        .collect::<Result<Vec<_>>>()?;
    Ok(CompositeDriver::from_drivers(drivers))
}
