//! The transparent decompressing reader.

use crate::error::{self, ErrorKind, Result};
use crate::lookahead::{Lookahead, Verdict};
use crate::pipeline::{Backend, Pipeline};
use crate::{Compression, Options};
use std::io::{self, Read};
use std::mem;
use tracing::instrument;

/// Lifecycle of a [`DecompressReader`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum State {
    /// Nothing has been read from the source yet.
    Uninitialized,
    /// The format is known and reads are served by the decompression pipeline.
    Ready,
    /// End of input was reached, or [`DecompressReader::close`] was called.
    Closed,
    /// A read failed; every further read fails too.
    Failed,
}

enum Inner<R> {
    Uninitialized(R),
    Ready(Pipeline),
    Closed,
    /// Keeps the pipeline around so that `close()` can still stop its process.
    Failed(Option<Pipeline>),
}

/// A [`Read`]er that yields the decompressed contents of `source`, whatever
/// (supported) format it turns out to be in, or the raw bytes if it's in none.
///
/// The format is detected on the first read. Gzip, bzip2 and xz are recognised
/// by their magic bytes; see [`Options`] for turning formats off and for
/// avoiding external processes.
///
/// Reading after the end of input keeps returning `Ok(0)`. Once a read has
/// failed every later read fails with [`ErrorKind::AlreadyFailed`]. Resources
/// (the source, any external process) are released on [`close`](Self::close),
/// at the end of input, or on drop, whichever comes first.
///
/// # Examples
///
/// ```
/// use decant_compress::{Compression, DecompressReader, Options, State};
/// use std::io::{Cursor, Read, Write};
///
/// let mut encoder = flate2::write::GzEncoder::new(Vec::new(), flate2::Compression::default());
/// encoder.write_all(b"Hello").unwrap();
/// let compressed = encoder.finish().unwrap();
///
/// let mut reader = DecompressReader::new(Cursor::new(compressed), Options::default());
/// let mut output = Vec::new();
/// reader.read_to_end(&mut output).unwrap();
/// assert_eq!(output, b"Hello");
/// assert_eq!(reader.compression(), Some(Compression::Gzip));
/// assert_eq!(reader.state(), State::Closed);
/// reader.close().unwrap();
/// ```
pub struct DecompressReader<R> {
    inner: Inner<R>,
    options: Options,
    codec: Option<Compression>,
    backend: Option<Backend>,
}

impl<R: Read + Send + 'static> DecompressReader<R> {
    pub fn new(source: R, options: Options) -> Self {
        Self { inner: Inner::Uninitialized(source), options, codec: None, backend: None }
    }

    /// Sniff the format and build the pipeline. Leaves the reader either
    /// `Ready` or `Failed`.
    #[instrument(skip_all)]
    fn initialize(&mut self) -> io::Result<()> {
        let Inner::Uninitialized(mut source) = mem::replace(&mut self.inner, Inner::Failed(None)) else {
            return Ok(());
        };
        let mut lookahead = Lookahead::new();
        let codec = match lookahead.detect(&mut source, &self.options)? {
            Verdict::Format(codec) => codec,
            Verdict::NoKnownFormat | Verdict::NeedMoreData => Compression::None,
        };
        let pipeline = Pipeline::select(codec, lookahead, source, &self.options).map_err(error::into_io)?;
        let backend = pipeline.backend();
        tracing::debug!(%codec, %backend, "Decompression pipeline ready");
        self.codec = Some(pipeline.codec());
        self.backend = Some(backend);
        self.inner = Inner::Ready(pipeline);
        Ok(())
    }

    fn settle(&mut self, result: io::Result<usize>, requested: usize) -> io::Result<usize> {
        match result {
            Ok(0) if requested > 0 => {
                if let Err(e) = self.close() {
                    tracing::warn!(error = ?e, "Failed to release stream at end of input");
                }
                Ok(0)
            },
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == io::ErrorKind::Interrupted => Err(e),
            Err(e) => {
                tracing::debug!(error = %e, "Decompression stream failed");
                self.inner = match mem::replace(&mut self.inner, Inner::Failed(None)) {
                    Inner::Ready(pipeline) => Inner::Failed(Some(pipeline)),
                    other => other,
                };
                Err(e)
            },
        }
    }
}

impl<R> DecompressReader<R> {
    pub fn state(&self) -> State {
        match self.inner {
            Inner::Uninitialized(_) => State::Uninitialized,
            Inner::Ready(_) => State::Ready,
            Inner::Closed => State::Closed,
            Inner::Failed(_) => State::Failed,
        }
    }

    /// The detected format, once the first read has happened.
    /// [`Compression::None`] means the stream is passed through.
    pub fn compression(&self) -> Option<Compression> {
        self.codec
    }

    /// The kind of pipeline serving reads, once the first read has happened.
    pub fn backend(&self) -> Option<Backend> {
        self.backend
    }

    /// Release the source and stop any external decompressor.
    ///
    /// Idempotent; closing an already closed reader does nothing. The reader
    /// ends up [`State::Closed`] even when stopping the external process fails,
    /// in which case the failure is returned.
    pub fn close(&mut self) -> Result<()> {
        match mem::replace(&mut self.inner, Inner::Closed) {
            Inner::Ready(pipeline) | Inner::Failed(Some(pipeline)) => pipeline.close(),
            Inner::Uninitialized(_) | Inner::Failed(None) | Inner::Closed => Ok(()),
        }
    }
}

impl<R: Read + Send + 'static> Read for DecompressReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        loop {
            match &mut self.inner {
                Inner::Closed => return Ok(0),
                Inner::Failed(_) => return Err(ErrorKind::AlreadyFailed.into()),
                Inner::Uninitialized(_) => self.initialize()?,
                Inner::Ready(pipeline) => {
                    let result = pipeline.read(buf);
                    return self.settle(result, buf.len());
                },
            }
        }
    }
}

impl<R> Drop for DecompressReader<R> {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            tracing::warn!(error = ?e, "Failed to close decompression stream");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::SniffError;
    use crate::error::kind_of;
    use crate::testing::{
        FailingReader, HELLO, InterruptingReader, OneByteReader, bzip2, gzip, has_program, noise, one_to_ten, xz,
    };
    use rstest::rstest;
    use std::io::{BufRead, BufReader, Cursor};

    fn reader(data: Vec<u8>, options: Options) -> DecompressReader<Cursor<Vec<u8>>> {
        DecompressReader::new(Cursor::new(data), options)
    }

    fn read_all<R: Read + Send + 'static>(reader: &mut DecompressReader<R>) -> io::Result<Vec<u8>> {
        let mut output = Vec::new();
        reader.read_to_end(&mut output)?;
        Ok(output)
    }

    fn external_available(format: Compression) -> bool {
        format.command().is_some_and(|(program, _)| has_program(program))
    }

    #[test]
    fn test_gzip_hello() {
        let mut reader = reader(gzip(HELLO), Options::default());
        assert_eq!(reader.state(), State::Uninitialized);
        assert_eq!(read_all(&mut reader).unwrap(), HELLO);
        assert_eq!(reader.compression(), Some(Compression::Gzip));
        assert_eq!(reader.state(), State::Closed);
    }

    #[test]
    fn test_plain_hello() {
        let mut reader = reader(HELLO.to_vec(), Options::default());
        assert_eq!(read_all(&mut reader).unwrap(), HELLO);
        assert_eq!(reader.compression(), Some(Compression::None));
        assert_eq!(reader.backend(), Some(Backend::Passthrough));
    }

    #[test]
    fn test_disabled_bzip2_passes_through() {
        let compressed = bzip2(HELLO);
        let mut reader = reader(compressed.clone(), Options::default().disable(Compression::Bzip2));
        assert_eq!(read_all(&mut reader).unwrap(), compressed);
        assert_eq!(reader.compression(), Some(Compression::None));
    }

    #[rstest]
    #[case(Compression::Gzip, gzip(&one_to_ten()))]
    #[case(Compression::Bzip2, bzip2(&one_to_ten()))]
    #[case(Compression::Xz, xz(&one_to_ten()))]
    fn test_disabled_format_passes_through(#[case] format: Compression, #[case] compressed: Vec<u8>) {
        let mut reader = reader(compressed.clone(), Options::default().disable(format));
        assert_eq!(read_all(&mut reader).unwrap(), compressed);
    }

    #[rstest]
    #[case(Compression::Gzip, gzip(&one_to_ten()))]
    #[case(Compression::Bzip2, bzip2(&one_to_ten()))]
    #[cfg_attr(feature = "xz", case(Compression::Xz, xz(&one_to_ten())))]
    fn test_native_roundtrip_with_short_reads(#[case] format: Compression, #[case] compressed: Vec<u8>) {
        let source = OneByteReader::new(compressed);
        let mut reader = DecompressReader::new(source, Options::default().force_native(true));
        // Line by line, like a consumer reading text.
        let lines: Vec<String> = BufReader::new(&mut reader).lines().map(|line| line.unwrap()).collect();
        assert_eq!(lines, ["One", "Two", "Three", "Four", "Five", "Six", "Seven", "Eight", "Nine", "Ten"]);
        assert_eq!(reader.compression(), Some(format));
        assert_eq!(reader.backend(), Some(Backend::Native));
    }

    #[rstest]
    #[case(Compression::Gzip, gzip(&one_to_ten()))]
    #[case(Compression::Bzip2, bzip2(&one_to_ten()))]
    #[case(Compression::Xz, xz(&one_to_ten()))]
    fn test_external_roundtrip_with_short_reads(#[case] format: Compression, #[case] compressed: Vec<u8>) {
        if !external_available(format) {
            return;
        }
        let mut reader = DecompressReader::new(OneByteReader::new(compressed), Options::default());
        assert_eq!(read_all(&mut reader).unwrap(), one_to_ten());
        assert_eq!(reader.backend(), Some(Backend::External));
        assert_eq!(reader.state(), State::Closed);
    }

    #[rstest]
    #[case(Compression::Gzip, Vec::new(), gzip(b""))]
    #[case(Compression::Bzip2, Vec::new(), bzip2(b""))]
    #[cfg_attr(feature = "xz", case(Compression::Xz, Vec::new(), xz(b"")))]
    #[case(Compression::Gzip, noise(4096), gzip(&noise(4096)))]
    #[case(Compression::Bzip2, noise(4096), bzip2(&noise(4096)))]
    #[cfg_attr(feature = "xz", case(Compression::Xz, noise(4096), xz(&noise(4096))))]
    // Larger than the buffer filled while priming the decoder.
    #[case(Compression::Gzip, noise(300_000), gzip(&noise(300_000)))]
    #[case(Compression::Bzip2, noise(300_000), bzip2(&noise(300_000)))]
    fn test_native_payloads(#[case] format: Compression, #[case] expected: Vec<u8>, #[case] compressed: Vec<u8>) {
        let mut reader = reader(compressed, Options::default().force_native(true));
        assert_eq!(read_all(&mut reader).unwrap(), expected);
        assert_eq!(reader.compression(), Some(format));
        assert_eq!(reader.backend(), Some(Backend::Native));
        assert_eq!(reader.state(), State::Closed);
    }

    #[rstest]
    #[case(Compression::Gzip, Vec::new(), gzip(b""))]
    #[case(Compression::Bzip2, Vec::new(), bzip2(b""))]
    #[case(Compression::Xz, Vec::new(), xz(b""))]
    #[case(Compression::Gzip, noise(300_000), gzip(&noise(300_000)))]
    #[case(Compression::Xz, noise(4096), xz(&noise(4096)))]
    fn test_external_payloads(#[case] format: Compression, #[case] expected: Vec<u8>, #[case] compressed: Vec<u8>) {
        if !external_available(format) {
            return;
        }
        let mut reader = reader(compressed, Options::default());
        assert_eq!(read_all(&mut reader).unwrap(), expected);
        assert_eq!(reader.backend(), Some(Backend::External));
        assert_eq!(reader.state(), State::Closed);
    }

    #[test]
    fn test_interrupted_source_while_priming() {
        let source = OneByteReader::wrap(InterruptingReader::new(gzip(&one_to_ten()), 10));
        let mut reader = DecompressReader::new(source, Options::default().force_native(true));
        assert_eq!(read_all(&mut reader).unwrap(), one_to_ten());
        assert_eq!(reader.backend(), Some(Backend::Native));
        assert_eq!(reader.state(), State::Closed);
    }

    #[cfg(not(feature = "xz"))]
    #[test]
    fn test_forced_native_xz_fails() {
        let mut reader = reader(xz(&one_to_ten()), Options::default().force_native(true));
        let err = read_all(&mut reader).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::Unsupported);
        assert_eq!(kind_of(&err), Some(&ErrorKind::ForcedNativeUnavailable(Compression::Xz)));
        assert_eq!(reader.state(), State::Failed);
    }

    #[rstest]
    #[case(HELLO.to_vec(), HELLO.to_vec())]
    #[case(gzip(HELLO), HELLO.to_vec())]
    #[case(bzip2(HELLO), HELLO.to_vec())]
    fn test_forced_native_never_fails_for_other_formats(#[case] input: Vec<u8>, #[case] expected: Vec<u8>) {
        let mut reader = reader(input, Options::default().force_native(true));
        assert_eq!(read_all(&mut reader).unwrap(), expected);
    }

    #[rstest]
    #[case(vec![])]
    #[case(vec![0x1F])]
    #[case(b"BZ".to_vec())]
    #[case(vec![0xFD, 0x37, 0x7A, 0x58, 0x5A])]
    #[case(b"Hi".to_vec())]
    fn test_truncated_input_passes_through(#[case] input: Vec<u8>) {
        let mut reader = DecompressReader::new(OneByteReader::new(input.clone()), Options::default());
        assert_eq!(read_all(&mut reader).unwrap(), input);
        assert_eq!(reader.compression(), Some(Compression::None));
    }

    #[test]
    fn test_close_is_idempotent() {
        let mut reader = reader(HELLO.to_vec(), Options::default());
        reader.close().unwrap();
        assert_eq!(reader.state(), State::Closed);
        reader.close().unwrap();
        // Closed before anything was read: nothing to read.
        assert_eq!(reader.read(&mut [0; 16]).unwrap(), 0);
    }

    #[test]
    fn test_read_after_end_of_input() {
        let mut reader = reader(gzip(HELLO), Options::default().force_native(true));
        assert_eq!(read_all(&mut reader).unwrap(), HELLO);
        let mut buf = [0; 16];
        assert_eq!(reader.read(&mut buf).unwrap(), 0);
        assert_eq!(reader.read(&mut buf).unwrap(), 0);
        reader.close().unwrap();
        reader.close().unwrap();
    }

    #[test]
    fn test_empty_buffer_does_not_close() {
        let mut reader = reader(HELLO.to_vec(), Options::default());
        assert_eq!(reader.read(&mut []).unwrap(), 0);
        assert_eq!(reader.state(), State::Ready);
        assert_eq!(read_all(&mut reader).unwrap(), HELLO);
    }

    #[test]
    fn test_sniff_failure_keeps_buffered_bytes() {
        let source = OneByteReader::wrap(FailingReader::new(b"BZ".to_vec(), io::ErrorKind::ConnectionReset));
        let mut reader = DecompressReader::new(source, Options::default());
        let err = reader.read(&mut [0; 16]).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::ConnectionReset);
        let sniff = err.get_ref().and_then(|e| e.downcast_ref::<SniffError>()).unwrap();
        assert_eq!(sniff.buffered, b"BZ");
        assert_eq!(reader.state(), State::Failed);
    }

    #[test]
    fn test_failure_is_permanent() {
        let source = FailingReader::new(b"plain text".to_vec(), io::ErrorKind::ConnectionAborted);
        let mut reader = DecompressReader::new(source, Options::default());
        let mut output = Vec::new();
        let err = reader.read_to_end(&mut output).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::ConnectionAborted);
        assert_eq!(output, b"plain text");
        assert_eq!(reader.state(), State::Failed);

        for _ in 0..3 {
            let err = reader.read(&mut [0; 16]).unwrap_err();
            assert_eq!(kind_of(&err), Some(&ErrorKind::AlreadyFailed));
        }
        reader.close().unwrap();
        assert_eq!(reader.state(), State::Closed);
    }

    #[rstest]
    #[case::mid_stream(gzip(&one_to_ten()).len() / 2)]
    // Inside the first buffer filled while priming the decoder.
    #[case::while_priming(12)]
    fn test_source_error_native(#[case] cut: usize) {
        let truncated = gzip(&one_to_ten())[..cut].to_vec();
        let source = FailingReader::new(truncated, io::ErrorKind::ConnectionReset);
        let mut reader = DecompressReader::new(source, Options::default().force_native(true));
        let err = read_all(&mut reader).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::ConnectionReset);
        assert_eq!(err.to_string(), "source failed");
        assert!(kind_of(&err).is_none());
        assert_eq!(reader.state(), State::Failed);
    }

    #[test]
    fn test_source_error_mid_stream_external() {
        if !external_available(Compression::Gzip) {
            return;
        }
        let compressed = gzip(&one_to_ten());
        let truncated = compressed[..compressed.len() / 2].to_vec();
        let source = FailingReader::new(truncated, io::ErrorKind::ConnectionReset);
        let mut reader = DecompressReader::new(source, Options::default());
        let err = read_all(&mut reader).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::ConnectionReset);
        assert_eq!(reader.state(), State::Failed);
        reader.close().unwrap();
    }

    #[test]
    fn test_malformed_header_fails_initialization() {
        let mut reader = reader(vec![0x1F, 0x8B, 0xFF, 0x00, 0x00, 0x00], Options::default().force_native(true));
        let err = reader.read(&mut [0; 16]).unwrap_err();
        assert!(matches!(kind_of(&err), Some(ErrorKind::DecoderInit { codec: Compression::Gzip, .. })));
        assert_eq!(reader.state(), State::Failed);
    }

    #[test]
    fn test_close_mid_stream_external() {
        if !external_available(Compression::Gzip) {
            return;
        }
        let payload: Vec<u8> = (0..4 * 1024 * 1024u32).map(|i| (i % 239) as u8).collect();
        let mut reader = reader(gzip(&payload), Options::default());
        let mut head = [0; 4096];
        reader.read_exact(&mut head).unwrap();
        assert_eq!(&head[..], &payload[..4096]);
        assert_eq!(reader.state(), State::Ready);
        reader.close().unwrap();
        reader.close().unwrap();
        assert_eq!(reader.read(&mut head).unwrap(), 0);
    }

    #[test]
    fn test_drop_mid_stream() {
        let payload: Vec<u8> = (0..1024 * 1024u32).map(|i| (i % 13) as u8).collect();
        let mut reader = reader(gzip(&payload), Options::default());
        let mut head = [0; 64];
        reader.read_exact(&mut head).unwrap();
        drop(reader);
    }
}
