//! Controller chains, the sync protocol and resource accounting for
//! federated file systems.
//!
//! A [`Manager`] maps every [`MountPoint`] in use to a chain of
//! [`Controller`]s created by the [`Driver`] registered for its scheme.
//! Controllers of archive file systems read and write their archive file
//! through the controller of the enclosing file system, so archives nest to
//! any depth. Changes are buffered until [`Manager::sync`] commits them,
//! innermost file systems first.

pub mod accountant;
pub mod config;
pub mod controller;
pub mod decorator;
pub mod driver;
pub mod error;
pub mod io;
pub mod manager;
pub mod model;
pub mod node;
pub mod options;
pub mod sync;

pub use accountant::{Accounted, Resource, ResourceAccountant};
pub use config::FsConfig;
pub use controller::Controller;
pub use decorator::{
    AccountingController, KeyController, KeyManager, KeyMode, KeyScope, LockController,
};
pub use driver::{CompositeDriver, Driver, DriverMap, DriverMapSupplier, DriverRegistry};
pub use error::{Error, Result};
pub use fedfs_address::{MountPoint, NodeName, NodePath, Scheme, Uri, UriModifier};
pub use io::{
    Closable, InputChannel, InputSocket, InputStream, MemoryStream, OutputChannel, OutputSocket,
    OutputStream,
};
pub use manager::Manager;
pub use model::{Model, ModelLock, ModelLockGuard};
pub use node::Node;
pub use options::{AccessOptions, AccessTypes, NodeType, SyncOptions, TimeType};
pub use sync::{SyncError, SyncErrorBuilder, SyncErrorKind};
