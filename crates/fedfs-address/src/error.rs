use thiserror::Error;

/// Errors raised while parsing or validating an address.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    /// The input violates the syntax rules of the address kind.
    #[error("invalid address {input:?}: {reason}")]
    InvalidAddress {
        /// The offending input, as given by the caller.
        input: String,
        /// Why the input was rejected.
        reason: String,
    },
}

impl Error {
    pub(crate) fn invalid(input: impl Into<String>, reason: impl Into<String>) -> Self {
        Error::InvalidAddress {
            input: input.into(),
            reason: reason.into(),
        }
    }

    /// The rejected input.
    pub fn input(&self) -> &str {
        match self {
            Error::InvalidAddress { input, .. } => input,
        }
    }

    /// The reason for the rejection.
    pub fn reason(&self) -> &str {
        match self {
            Error::InvalidAddress { reason, .. } => reason,
        }
    }
}

/// Result type for address operations.
pub type Result<T> = std::result::Result<T, Error>;
