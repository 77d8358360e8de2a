use crate::error::Result;
use serde::Deserialize;
use std::time::Duration;

/// Settings shared by all controllers of a [`Manager`](crate::Manager).
///
/// ```
/// use fedfs_kernel::FsConfig;
///
/// let config = FsConfig::from_toml_str("wait_close_timeout_ms = 250")?;
/// assert_eq!(config.wait_close_timeout().as_millis(), 250);
/// assert!(!config.read_only);
/// # Ok::<(), fedfs_kernel::Error>(())
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct FsConfig {
    /// How long a sync waits for streams opened by other threads to be
    /// closed.
    pub wait_close_timeout_ms: u64,
    /// Reject every modification.
    pub read_only: bool,
}

impl Default for FsConfig {
    fn default() -> Self {
        Self {
            wait_close_timeout_ms: 1000,
            read_only: false,
        }
    }
}

impl FsConfig {
    pub fn from_toml_str(s: &str) -> Result<Self> {
        Ok(toml::from_str(s)?)
    }

    pub fn wait_close_timeout(&self) -> Duration {
        Duration::from_millis(self.wait_close_timeout_ms)
    }
}
