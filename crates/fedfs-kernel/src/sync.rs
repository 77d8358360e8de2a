//! Errors raised while synchronizing controllers and the builder that
//! aggregates them.

use fedfs_address::MountPoint;
use std::error::Error as StdError;
use std::fmt;

/// Severity of a [`SyncError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncErrorKind {
    /// The sync completed but something noteworthy happened, e.g. open
    /// streams were forcibly closed.
    Warning,
    /// The sync did not complete and data may be inconsistent.
    Error,
}

impl fmt::Display for SyncErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            SyncErrorKind::Warning => "warning",
            SyncErrorKind::Error => "error",
        })
    }
}

/// An error raised by [`Controller::sync`](crate::Controller::sync).
///
/// Every sync error carries a priority. When several errors are aggregated
/// by a [`SyncErrorBuilder`], the one with the highest priority becomes the
/// primary error and the others are attached as suppressed errors.
#[derive(Debug)]
pub struct SyncError {
    kind: SyncErrorKind,
    priority: i32,
    mount_point: Option<MountPoint>,
    message: String,
    source: Option<Box<dyn StdError + Send + Sync>>,
    suppressed: Vec<SyncError>,
}

impl SyncError {
    pub const WARNING_PRIORITY: i32 = -1;
    pub const ERROR_PRIORITY: i32 = 0;

    pub fn warning(mount_point: Option<MountPoint>, message: impl Into<String>) -> Self {
        Self::new(SyncErrorKind::Warning, Self::WARNING_PRIORITY, mount_point, message)
    }

    pub fn error(mount_point: Option<MountPoint>, message: impl Into<String>) -> Self {
        Self::new(SyncErrorKind::Error, Self::ERROR_PRIORITY, mount_point, message)
    }

    fn new(
        kind: SyncErrorKind,
        priority: i32,
        mount_point: Option<MountPoint>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            kind,
            priority,
            mount_point,
            message: message.into(),
            source: None,
            suppressed: Vec::new(),
        }
    }

    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_source(mut self, source: impl Into<Box<dyn StdError + Send + Sync>>) -> Self {
        self.source = Some(source.into());
        self
    }

    pub fn kind(&self) -> SyncErrorKind {
        self.kind
    }

    pub fn is_warning(&self) -> bool {
        self.kind == SyncErrorKind::Warning
    }

    pub fn priority(&self) -> i32 {
        self.priority
    }

    /// The mount point of the file system that failed to sync, if known.
    pub fn mount_point(&self) -> Option<&MountPoint> {
        self.mount_point.as_ref()
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn suppressed(&self) -> &[SyncError] {
        &self.suppressed
    }

    pub fn add_suppressed(&mut self, other: SyncError) {
        self.suppressed.push(other);
    }

    /// True if this error or any error it suppresses is not a warning.
    pub fn has_errors(&self) -> bool {
        !self.is_warning() || self.suppressed.iter().any(SyncError::has_errors)
    }
}

impl fmt::Display for SyncError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sync {}", self.kind)?;
        if let Some(mount_point) = &self.mount_point {
            write!(f, " on {mount_point}")?;
        }
        write!(f, ": {}", self.message)?;
        if !self.suppressed.is_empty() {
            write!(f, " ({} more suppressed)", self.suppressed.len())?;
        }
        Ok(())
    }
}

impl StdError for SyncError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.source.as_deref().map(|e| e as &(dyn StdError + 'static))
    }
}

/// Aggregates sync errors raised while syncing several controllers or
/// closing several resources.
#[derive(Debug, Default)]
pub struct SyncErrorBuilder {
    assembled: Option<SyncError>,
}

impl SyncErrorBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `error` and continue.
    pub fn warn(&mut self, error: SyncError) {
        let assembled = self.assemble(error);
        self.assembled = Some(assembled);
    }

    /// Record `error` and return the aggregate, resetting the builder.
    pub fn fail(&mut self, error: SyncError) -> SyncError {
        self.assemble(error)
    }

    /// Return the aggregate of all recorded errors, if any, resetting the
    /// builder.
    pub fn check(&mut self) -> Result<(), SyncError> {
        match self.assembled.take() {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.assembled.is_none()
    }

    fn assemble(&mut self, error: SyncError) -> SyncError {
        match self.assembled.take() {
            None => error,
            Some(mut previous) if previous.priority >= error.priority => {
                previous.add_suppressed(error);
                previous
            }
            Some(previous) => {
                let mut error = error;
                error.add_suppressed(previous);
                error
            }
        }
    }
}
