//! Magic-byte sniffing over a stream that may deliver short reads.
//!
//! The [`Lookahead`] buffer holds at most [`MAX_MAGIC_LEN`] bytes, enough for
//! the longest signature (xz). Whatever it consumed from the source is handed
//! back exactly once through [`Lookahead::into_replay`], so detection never
//! loses data.

use crate::{Compression, Options};
use derive_more::{Display, Error};
use std::io::{self, Chain, Cursor, Read};

/// Length of the longest magic signature (xz: `FD 37 7A 58 5A 00`).
pub const MAX_MAGIC_LEN: usize = 6;

/// Outcome of inspecting the bytes buffered so far.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Verdict {
    /// The buffered bytes are a valid start of an enabled signature; keep reading.
    NeedMoreData,
    /// The stream definitely starts with this (enabled) format.
    Format(Compression),
    /// No enabled format matches; treat the stream as plain data.
    NoKnownFormat,
}

/// Decide the format of a stream from its first bytes.
///
/// The first byte selects the only signature that could match. Once enough
/// bytes are buffered for that signature the verdict is final: the format if it
/// matches and is enabled, otherwise [`Verdict::NoKnownFormat`]. A shorter
/// prefix only becomes [`Verdict::NoKnownFormat`] when the source is exhausted.
///
/// ```
/// use decant_compress::{Compression, Options, Verdict, sniff};
///
/// let options = Options::default();
/// assert_eq!(sniff(&[0x1F], false, &options), Verdict::NeedMoreData);
/// assert_eq!(sniff(&[0x1F, 0x8B], false, &options), Verdict::Format(Compression::Gzip));
/// assert_eq!(sniff(b"Hello", false, &options), Verdict::NoKnownFormat);
/// assert_eq!(sniff(b"BZ", true, &options), Verdict::NoKnownFormat);
/// ```
#[must_use]
pub fn sniff(prefix: &[u8], exhausted: bool, options: &Options) -> Verdict {
    let Some(&first) = prefix.first() else {
        return if exhausted { Verdict::NoKnownFormat } else { Verdict::NeedMoreData };
    };
    let Some(format) = Compression::COMPRESSED.into_iter().find(|format| format.magic_bytes()[0] == first) else {
        return Verdict::NoKnownFormat;
    };
    let magic = format.magic_bytes();
    if prefix.len() >= magic.len() {
        if prefix.starts_with(magic) && options.is_enabled(format) {
            Verdict::Format(format)
        } else {
            Verdict::NoKnownFormat
        }
    } else if exhausted || prefix.len() >= MAX_MAGIC_LEN {
        Verdict::NoKnownFormat
    } else {
        Verdict::NeedMoreData
    }
}

/// Reading the stream header failed before a verdict was reached.
///
/// Carries the bytes buffered up to that point so that nothing read from the
/// source is lost.
#[derive(Debug, Display, Error)]
#[display("failed to read stream header after {} byte(s): {source}", buffered.len())]
pub struct SniffError {
    pub source: io::Error,
    pub buffered: Vec<u8>,
}

impl From<SniffError> for io::Error {
    fn from(err: SniffError) -> Self {
        io::Error::new(err.source.kind(), err)
    }
}

/// A byte stream that replays the sniffed prefix before the rest of the source.
pub type Replay<R> = Chain<Cursor<Vec<u8>>, R>;

/// Fixed-capacity prefix buffer used during detection.
#[derive(Debug, Default)]
pub struct Lookahead {
    buffer: [u8; MAX_MAGIC_LEN],
    filled: usize,
    exhausted: bool,
}

impl Lookahead {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bytes buffered so far.
    pub fn filled(&self) -> &[u8] {
        &self.buffer[..self.filled]
    }

    /// Whether the source reported end-of-input while the buffer was filling.
    pub fn is_exhausted(&self) -> bool {
        self.exhausted
    }

    pub fn is_full(&self) -> bool {
        self.filled == MAX_MAGIC_LEN
    }

    /// Perform a single read from `input` into the unfilled tail of the buffer.
    ///
    /// Returns the number of bytes added; zero means either the buffer is full
    /// or the source is exhausted. Interrupted reads are retried.
    pub fn fill<R: Read + ?Sized>(&mut self, input: &mut R) -> io::Result<usize> {
        if self.is_full() || self.exhausted {
            return Ok(0);
        }
        loop {
            match input.read(&mut self.buffer[self.filled..]) {
                Ok(0) => {
                    self.exhausted = true;
                    return Ok(0);
                },
                Ok(bytes) => {
                    self.filled += bytes;
                    return Ok(bytes);
                },
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            }
        }
    }

    /// Verdict for the bytes buffered so far.
    pub fn verdict(&self, options: &Options) -> Verdict {
        sniff(self.filled(), self.exhausted, options)
    }

    /// Read from `input` until a verdict other than [`Verdict::NeedMoreData`] is reached.
    pub fn detect<R: Read + ?Sized>(&mut self, input: &mut R, options: &Options) -> Result<Verdict, SniffError> {
        loop {
            let verdict = self.verdict(options);
            if verdict != Verdict::NeedMoreData {
                tracing::debug!(?verdict, buffered = self.filled, "Stream header sniffed");
                return Ok(verdict);
            }
            if let Err(source) = self.fill(input) {
                return Err(SniffError { source, buffered: self.filled().to_vec() });
            }
        }
    }

    /// Consume the buffer, yielding a reader over the buffered prefix followed by `rest`.
    pub fn into_replay<R: Read>(self, rest: R) -> Replay<R> {
        Cursor::new(self.filled().to_vec()).chain(rest)
    }
}
