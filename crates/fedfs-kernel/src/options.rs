//! Option sets and small enums shared by all controllers.

use bitflags::bitflags;
use std::fmt;

bitflags! {
    /// Options for accessing entries.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct AccessOptions: u32 {
        /// Prefer cached content over reading through to the parent.
        const CACHE = 1 << 0;
        /// Create missing parent directories.
        const CREATE_PARENTS = 1 << 1;
        /// Fail if the entry already exists.
        const EXCLUSIVE = 1 << 2;
        /// Append to existing content instead of replacing it.
        const APPEND = 1 << 3;
        /// Store entry content without compression.
        const STORE = 1 << 4;
        /// Compress entry content.
        const COMPRESS = 1 << 5;
        /// Encrypt entry content.
        const ENCRYPT = 1 << 6;
    }
}

bitflags! {
    /// Options for [`Controller::sync`](crate::Controller::sync).
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct SyncOptions: u32 {
        /// Wait for streams opened by other threads to be closed.
        const WAIT_CLOSE_IO = 1 << 0;
        /// Forcibly close streams that are still open after waiting.
        const FORCE_CLOSE_IO = 1 << 1;
        /// Release cached entries after committing.
        const CLEAR_CACHE = 1 << 2;
        /// Discard buffered changes instead of committing them.
        const ABORT_CHANGES = 1 << 3;

        /// Commit changes, failing if streams remain open.
        const SYNC = Self::WAIT_CLOSE_IO.bits();
        /// Commit changes, close stragglers and release all resources.
        const UMOUNT = Self::WAIT_CLOSE_IO.bits()
            | Self::FORCE_CLOSE_IO.bits()
            | Self::CLEAR_CACHE.bits();
        /// Discard changes and release all resources.
        const RESET = Self::ABORT_CHANGES.bits()
            | Self::FORCE_CLOSE_IO.bits()
            | Self::CLEAR_CACHE.bits();
    }
}

bitflags! {
    /// Access types for [`Controller::check_access`](crate::Controller::check_access).
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct AccessTypes: u8 {
        const READ = 1 << 0;
        const WRITE = 1 << 1;
        const EXECUTE = 1 << 2;
    }
}

/// The type of an entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum NodeType {
    File,
    Directory,
    Symlink,
    Special,
}

impl fmt::Display for NodeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            NodeType::File => "file",
            NodeType::Directory => "directory",
            NodeType::Symlink => "symbolic link",
            NodeType::Special => "special file",
        })
    }
}

/// The timestamps an entry may carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TimeType {
    Access,
    Write,
    Create,
}

impl TimeType {
    pub const ALL: [TimeType; 3] = [TimeType::Access, TimeType::Write, TimeType::Create];
}
