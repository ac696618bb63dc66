//! Decompression Error Types
//!
//! This module provides structured errors using `exn` for automatic location
//! tracking and error tree construction.
//!
//! The [`Read`](std::io::Read) side of [`DecompressReader`](crate::DecompressReader)
//! can only speak [`std::io::Error`], so every [`ErrorKind`] also knows which
//! [`std::io::ErrorKind`] it maps to. The original kind is kept as the inner
//! error and can be recovered with [`std::io::Error::get_ref`].

use crate::Compression;
use derive_more::{Display, Error};
use std::io::{Error as IoError, ErrorKind as IoErrorKind};

/// A decompression error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for decompression operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Actionable error categories.
///
/// These describe what the caller should *do*, not what went wrong internally.
#[derive(Debug, Display, Error, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    /// The external decompressor could not be started (missing binary, permission denied).
    /// Recovered locally by falling back to the in-process decoder when permitted.
    #[display("unable to spawn external decompressor `{_0}`")]
    Spawn(#[error(not(source))] &'static str),
    /// The decoder rejected the start of the stream. Don't retry with the same input.
    #[display("{codec} decoder rejected the stream header: {detail}")]
    DecoderInit { codec: Compression, kind: IoErrorKind, detail: String },
    /// The external decompressor ran but did not exit successfully.
    #[display("external decompressor `{_0}` exited unsuccessfully")]
    ExternalDecoder(#[error(not(source))] &'static str),
    /// In-process decoding was forced for a format that has no in-process decoder.
    #[display("no in-process decoder available for {_0}")]
    ForcedNativeUnavailable(#[error(not(source))] Compression),
    /// The stream already failed; it will not recover.
    #[display("stream is in a failed state")]
    AlreadyFailed,
    /// A spawned decompressor could not be stopped cleanly.
    #[display("external decompressor `{_0}` did not terminate cleanly")]
    Termination(#[error(not(source))] &'static str),
    /// The requested format is not supported.
    #[display("unsupported format: {_0}")]
    UnsupportedFormat(#[error(not(source))] String),
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, ErrorKind::Spawn(_) | ErrorKind::Termination(_))
    }

    /// The closest [`std::io::ErrorKind`] for surfacing through [`std::io::Read`].
    pub fn io_kind(&self) -> IoErrorKind {
        match self {
            ErrorKind::Spawn(_) => IoErrorKind::NotFound,
            ErrorKind::DecoderInit { kind, .. } => *kind,
            ErrorKind::ExternalDecoder(_) => IoErrorKind::InvalidData,
            ErrorKind::ForcedNativeUnavailable(_) | ErrorKind::UnsupportedFormat(_) => IoErrorKind::Unsupported,
            ErrorKind::AlreadyFailed | ErrorKind::Termination(_) => IoErrorKind::Other,
        }
    }
}

impl From<ErrorKind> for IoError {
    fn from(kind: ErrorKind) -> Self {
        IoError::new(kind.io_kind(), kind)
    }
}

/// Flatten an error tree into an [`std::io::Error`], keeping the top-level kind.
pub(crate) fn into_io(err: Error) -> IoError {
    tracing::debug!(error = ?err, "Surfacing decompression failure as I/O error");
    (*err).clone().into()
}

/// Retrieve the [`ErrorKind`] wrapped inside an [`std::io::Error`] returned by this crate, if any.
pub fn kind_of(err: &IoError) -> Option<&ErrorKind> {
    err.get_ref().and_then(|inner| inner.downcast_ref::<ErrorKind>())
}
