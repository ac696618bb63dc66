//! Configuration Error Types

use derive_more::{Display, Error};
use std::path::PathBuf;

/// A configuration error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for configuration operations.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Display, Error, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    /// An explicitly requested configuration file does not exist.
    #[display("configuration file not found: {}", _0.display())]
    NotFound(#[error(not(source))] PathBuf),
    /// The configuration file extension is not one of `toml`, `yaml`, `yml` or `json`.
    #[display("unsupported configuration file format: {_0}")]
    UnsupportedFormat(#[error(not(source))] String),
    /// The configuration could not be parsed or has the wrong shape.
    #[display("invalid configuration: {_0}")]
    Invalid(#[error(not(source))] String),
    /// A value parsed but is out of range.
    #[display("invalid value for `{field}`: {reason}")]
    InvalidValue { field: &'static str, reason: &'static str },
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        // Every configuration error needs the user to change something first.
        false
    }
}
