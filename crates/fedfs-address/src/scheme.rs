use crate::error::{Error, Result};
use crate::uri::is_valid_scheme;
use std::fmt;
use std::str::FromStr;

/// A URI scheme that selects the driver responsible for a mount point,
/// e.g. `file`, `zip` or `tar.gz`.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Scheme(String);

impl Scheme {
    /// Validate and wrap a scheme name.
    pub fn new(scheme: &str) -> Result<Self> {
        if !is_valid_scheme(scheme) {
            return Err(Error::invalid(scheme, "illegal scheme name"));
        }
        Ok(Self(scheme.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Scheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for Scheme {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::new(s)
    }
}
