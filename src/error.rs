//! Command-line Error Types

use derive_more::{Display, Error};
use exn::ResultExt;
use std::io;

pub type Error = exn::Exn<ErrorKind>;
pub type Result<T> = std::result::Result<T, Error>;

/// What went wrong while processing one input.
///
/// The I/O variants carry the underlying message so it can be shown to the
/// user on a single line.
#[derive(Debug, Display, Error, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    #[display("filename has an unknown suffix, skipping")]
    UnknownSuffix,
    #[display("{_0}")]
    Open(#[error(not(source))] String),
    #[display("{_0}, skipping")]
    Create(#[error(not(source))] String),
    #[display("{_0}")]
    Decompress(#[error(not(source))] String),
    #[display("{_0}")]
    Remove(#[error(not(source))] String),
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, ErrorKind::Decompress(_))
    }
}

/// Raise an I/O failure as `kind`, keeping the I/O error underneath.
pub(crate) fn raise<T>(result: io::Result<T>, kind: impl FnOnce(String) -> ErrorKind) -> Result<T> {
    result.or_else(|e| {
        let message = e.to_string();
        Err::<T, _>(e).or_raise(|| kind(message))
    })
}
