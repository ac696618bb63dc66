//! Transparent decompression with automatic format detection.
//!
//! [`DecompressReader`] wraps any byte source whose compression format is not
//! known in advance. On the first read it sniffs just enough leading bytes to
//! recognise gzip, bzip2 or xz by their magic bytes, replays those bytes into
//! the chosen decompressor and from then on yields the decompressed stream.
//! Anything else is passed through unchanged.
//!
//! - **Detection** from magic bytes ([`sniff`], [`Lookahead`]) or file
//!   extensions ([`Compression::from_path`])
//! - **External decompressors** (`gzip -cd`, `bzip2 -cd`, `xz -cd`) are
//!   preferred, fed by a background thread
//! - **In-process decoders** are the fallback, or the only choice with
//!   [`Options::force_native`]
//!
//! Gzip and Bzip2 always have an in-process decoder. XZ only has one with the
//! `xz` feature enabled.
//!
//! ```
//! use decant_compress::{DecompressReader, Options};
//! use std::io::{Cursor, Read};
//!
//! let mut reader = DecompressReader::new(Cursor::new(b"Hello".to_vec()), Options::default());
//! let mut output = String::new();
//! reader.read_to_string(&mut output).unwrap();
//! assert_eq!(output, "Hello");
//! ```

mod construct;
pub mod error;
mod lookahead;
mod ops;
mod options;
mod pipeline;
mod process;
mod reader;
#[cfg(test)]
mod testing;
mod util;

pub use crate::lookahead::{Lookahead, MAX_MAGIC_LEN, SniffError, Verdict, sniff};
pub use crate::options::{DEFAULT_TERMINATION_TIMEOUT, Options};
pub use crate::pipeline::Backend;
pub use crate::reader::{DecompressReader, State};

/// A compression format this crate can detect.
///
/// Defaults to [`None`](Self::None) (uncompressed, passed through as-is).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum Compression {
    /// Uncompressed
    #[default]
    None,
    /// Bzip2 compression (.bz2)
    Bzip2,
    /// Gzip compression (.gz)
    Gzip,
    /// XZ/LZMA compression (.xz)
    Xz,
}
