//! In-process Decoders

use crate::Compression;
use crate::error::{ErrorKind, Result};
use bzip2::read::MultiBzDecoder;
use exn::ResultExt;
use flate2::read::MultiGzDecoder;
use std::io::{self, BufRead, BufReader, Read};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::instrument;
#[cfg(feature = "xz")]
use xz2::read::XzDecoder;

// Enough for a gzip header plus the first deflate block, without holding much in memory.
const PRIME_BUFFER_SIZE: usize = 64 * 1024;

impl Compression {
    /// Wrap a reader with the in-process decoder for this format.
    ///
    /// Concatenated gzip members and bzip2 streams are decoded back-to-back,
    /// the same as `gzip -cd` and `bzip2 -cd` would. Fails with
    /// [`ForcedNativeUnavailable`](ErrorKind::ForcedNativeUnavailable) for XZ
    /// unless the `xz` feature is enabled.
    ///
    /// # Examples
    ///
    /// ```
    /// use std::io::{Cursor, Read, Write};
    /// use decant_compress::Compression;
    ///
    /// let mut encoder = flate2::write::GzEncoder::new(Vec::new(), flate2::Compression::default());
    /// encoder.write_all(b"Hello, world!").unwrap();
    /// let compressed = encoder.finish().unwrap();
    ///
    /// let mut reader = Compression::Gzip.wrap_reader(Cursor::new(compressed)).unwrap();
    /// let mut decompressed = Vec::new();
    /// reader.read_to_end(&mut decompressed).unwrap();
    /// assert_eq!(decompressed, b"Hello, world!");
    /// ```
    pub fn wrap_reader<'a, R: Read + Send + 'a>(&self, reader: R) -> Result<Box<dyn Read + Send + 'a>> {
        Ok(match self {
            Compression::None => Box::new(reader),
            Compression::Bzip2 => Box::new(MultiBzDecoder::new(reader)),
            Compression::Gzip => Box::new(MultiGzDecoder::new(reader)),
            #[cfg(feature = "xz")]
            Compression::Xz => Box::new(XzDecoder::new_multi_decoder(reader)),
            #[cfg(not(feature = "xz"))]
            Compression::Xz => exn::bail!(ErrorKind::ForcedNativeUnavailable(*self)),
        })
    }

    /// Wrap a reader with the in-process decoder and decode the first buffer
    /// straight away, so that a malformed header is reported now rather than
    /// on some later read.
    ///
    /// Only failures raised by the decoder itself become
    /// [`DecoderInit`](ErrorKind::DecoderInit). An error from `reader` is not
    /// the decoder's fault: it is held back and returned, untouched, by the
    /// first read. Interrupted reads are retried.
    #[instrument(skip(reader), fields(format = %self))]
    pub(crate) fn primed_reader<'a, R: Read + Send + 'a>(&self, reader: R) -> Result<PrimedReader<'a>> {
        let source_failed = Arc::new(AtomicBool::new(false));
        let tapped = SourceTap { inner: reader, failed: Arc::clone(&source_failed) };
        let mut decoder = BufReader::with_capacity(PRIME_BUFFER_SIZE, self.wrap_reader(tapped)?);
        let pending = loop {
            match decoder.fill_buf() {
                Ok(_) => break None,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) if source_failed.load(Ordering::Acquire) => {
                    tracing::debug!(error = %e, "Source failed while priming decoder");
                    break Some(e);
                },
                Err(e) => {
                    let kind = e.kind();
                    let detail = e.to_string();
                    return Err(e).or_raise(|| ErrorKind::DecoderInit { codec: *self, kind, detail });
                },
            }
        };
        tracing::trace!(buffered = decoder.buffer().len(), "In-process decoder primed");
        Ok(PrimedReader { decoder, pending })
    }
}

/// An in-process decoder whose first buffer has already been decoded.
pub(crate) struct PrimedReader<'a> {
    decoder: BufReader<Box<dyn Read + Send + 'a>>,
    pending: Option<io::Error>,
}

impl Read for PrimedReader<'_> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if let Some(e) = self.pending.take() {
            return Err(e);
        }
        self.decoder.read(buf)
    }
}

/// Remembers whether the wrapped source ever failed, so decoder errors can be
/// told apart from source errors the decoder merely passed on.
struct SourceTap<R> {
    inner: R,
    failed: Arc<AtomicBool>,
}

impl<R: Read> Read for SourceTap<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.inner.read(buf).inspect_err(|e| {
            if e.kind() != io::ErrorKind::Interrupted {
                self.failed.store(true, Ordering::Release);
            }
        })
    }
}
