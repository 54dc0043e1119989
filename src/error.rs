//! Crate-level error taxonomy.
//!
//! Module errors convert into one of four kinds so callers can decide
//! between retrying, aborting and asking for fewer pixels.

use crate::capture::FrameSourceError;
use crate::config::ConfigError;
use crate::csprng::CsprngError;
use crate::sampling::SamplingError;
use thiserror::Error;

/// Coarse error classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Bad argument or configuration value.
    InvalidArgument,
    /// Not enough usable pixel coordinates.
    ResourceExhausted,
    /// The frame source could not be opened or configured.
    InitializationFailed,
    /// Operation not allowed in the current session state.
    InvalidState,
}

/// Errors surfaced by the public API.
#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("could only allocate {allocated} of {requested} pixels")]
    ResourceExhausted { requested: usize, allocated: usize },

    #[error("initialization failed: {context}")]
    InitializationFailed {
        context: String,
        #[source]
        source: FrameSourceError,
    },

    #[error("invalid state: {0}")]
    InvalidState(String),
}

impl Error {
    /// Returns the kind of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::InvalidArgument(_) => ErrorKind::InvalidArgument,
            Error::ResourceExhausted { .. } => ErrorKind::ResourceExhausted,
            Error::InitializationFailed { .. } => ErrorKind::InitializationFailed,
            Error::InvalidState(_) => ErrorKind::InvalidState,
        }
    }

    pub(crate) fn init(context: impl Into<String>, source: FrameSourceError) -> Self {
        Error::InitializationFailed {
            context: context.into(),
            source,
        }
    }

    pub(crate) fn state(message: impl Into<String>) -> Self {
        Error::InvalidState(message.into())
    }
}

impl From<ConfigError> for Error {
    fn from(e: ConfigError) -> Self {
        Error::InvalidArgument(e.to_string())
    }
}

impl From<SamplingError> for Error {
    fn from(e: SamplingError) -> Self {
        match e {
            SamplingError::InvalidBound(_) => Error::InvalidArgument(e.to_string()),
            SamplingError::Closed => Error::InvalidState("generator is no longer active".into()),
        }
    }
}

impl From<CsprngError> for Error {
    fn from(e: CsprngError) -> Self {
        Error::InvalidArgument(e.to_string())
    }
}

/// Result alias for the public API.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kinds_are_distinguishable() {
        let exhausted = Error::ResourceExhausted {
            requested: 10,
            allocated: 3,
        };
        assert_eq!(exhausted.kind(), ErrorKind::ResourceExhausted);
        assert_eq!(
            exhausted.to_string(),
            "could only allocate 3 of 10 pixels"
        );

        let init = Error::init("opening camera", FrameSourceError::NotInitialized);
        assert_eq!(init.kind(), ErrorKind::InitializationFailed);
        assert!(std::error::Error::source(&init).is_some());
    }

    #[test]
    fn test_sampling_conversions() {
        let bad: Error = SamplingError::InvalidBound(0).into();
        assert_eq!(bad.kind(), ErrorKind::InvalidArgument);
        let closed: Error = SamplingError::Closed.into();
        assert_eq!(closed.kind(), ErrorKind::InvalidState);
    }
}
