//! # fedfs-address
//!
//! Address algebra for federated file systems.
//!
//! A *federation* is the tree of file systems formed by archives nested in
//! archives nested in the platform file system. This crate provides the
//! immutable value types that name locations in it:
//!
//! - [`NodeName`]: relative address of an entry within one file system
//! - [`MountPoint`]: absolute address of a (possibly nested) file system
//! - [`NodePath`]: mount point plus node name
//! - [`UriModifier`]: normalization policy applied before validation
//!
//! ## Example
//!
//! ```
//! use fedfs_address::NodePath;
//!
//! let path: NodePath = "zip:file:/archive.zip!/META-INF/MANIFEST.MF".parse()?;
//! assert_eq!(path.mount_point().to_string(), "zip:file:/archive.zip!/");
//! assert_eq!(path.node_name().to_string(), "META-INF/MANIFEST.MF");
//!
//! let archive = path.mount_point().path().unwrap();
//! assert_eq!(archive.to_string(), "file:/archive.zip");
//! # Ok::<(), fedfs_address::Error>(())
//! ```

mod error;
mod modifier;
mod mount_point;
mod node_name;
mod node_path;
mod scheme;
mod uri;

pub use error::{Error, Result};
pub use modifier::{PostFix, UriModifier};
pub use mount_point::{MountPoint, MAX_NESTING_DEPTH, SEPARATOR as MOUNT_POINT_SEPARATOR};
pub use node_name::{NodeName, SEPARATOR as NODE_NAME_SEPARATOR};
pub use node_path::NodePath;
pub use scheme::Scheme;
pub use uri::Uri;
