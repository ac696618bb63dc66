//! Pipeline Selection
//!
//! Turns a sniffed [`Compression`] into the stream that actually produces
//! decompressed bytes: an external decompressor when one can be started, the
//! in-process decoder otherwise, or the raw bytes for plain data.

use crate::error::{ErrorKind, Result};
use crate::lookahead::Lookahead;
use crate::ops::PrimedReader;
use crate::process::ProcessReader;
use crate::{Compression, Options};
use std::fmt::{Display, Formatter, Result as FmtResult};
use std::io::{self, Read};
use std::time::Duration;
use tracing::{field, instrument};

/// Which kind of pipeline a stream ended up using.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Backend {
    /// An external decompressor process (`gzip -cd` and friends).
    External,
    /// An in-process decoder.
    Native,
    /// No decompression; bytes are forwarded unmodified.
    Passthrough,
}

impl Display for Backend {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.write_str(match self {
            Backend::External => "external",
            Backend::Native => "native",
            Backend::Passthrough => "passthrough",
        })
    }
}

enum Stream {
    Passthrough(Box<dyn Read + Send>),
    Native(PrimedReader<'static>),
    External(ProcessReader),
}

/// The single decompression stream materialised for a reader.
pub(crate) struct Pipeline {
    codec: Compression,
    stream: Stream,
}

impl Pipeline {
    /// Build the pipeline for `codec`, replaying the sniffed prefix ahead of `source`.
    ///
    /// External decompressors are tried first unless in-process decoding is
    /// forced. If one cannot be started the in-process decoder is used instead.
    /// There is no further fallback: a format without an in-process decoder,
    /// or a decoder rejecting the header, is an error.
    pub(crate) fn select<R: Read + Send + 'static>(
        codec: Compression,
        lookahead: Lookahead,
        source: R,
        options: &Options,
    ) -> Result<Self> {
        Self::select_with(codec, lookahead, source, options, ProcessReader::spawn)
    }

    /// [`select`](Self::select) with the way external decompressors are started supplied by the caller.
    #[instrument(skip(lookahead, source, options, spawn), fields(buffered = lookahead.filled().len(), backend))]
    fn select_with<R, S>(codec: Compression, lookahead: Lookahead, source: R, options: &Options, spawn: S) -> Result<Self>
    where
        R: Read + Send + 'static,
        S: FnOnce(Compression, Duration) -> Result<ProcessReader>,
    {
        let replay = lookahead.into_replay(source);
        if codec == Compression::None {
            tracing::Span::current().record("backend", field::display(Backend::Passthrough));
            return Ok(Self { codec, stream: Stream::Passthrough(Box::new(replay)) });
        }

        if !options.is_force_native() {
            match spawn(codec, options.termination_timeout()) {
                Ok(process) => {
                    let process = process.feed(replay)?;
                    tracing::debug!(program = process.program(), "Feeding external decompressor");
                    tracing::Span::current().record("backend", field::display(Backend::External));
                    return Ok(Self { codec, stream: Stream::External(process) });
                },
                Err(e) if codec.has_native_decoder() => {
                    tracing::info!(error = ?e, "External decompressor unavailable; falling back to in-process decoder");
                },
                Err(e) => return Err(e),
            }
        }

        if !codec.has_native_decoder() {
            exn::bail!(ErrorKind::ForcedNativeUnavailable(codec));
        }
        let decoder = codec.primed_reader(replay)?;
        tracing::Span::current().record("backend", field::display(Backend::Native));
        Ok(Self { codec, stream: Stream::Native(decoder) })
    }

    pub(crate) fn codec(&self) -> Compression {
        self.codec
    }

    pub(crate) fn backend(&self) -> Backend {
        match self.stream {
            Stream::Passthrough(_) => Backend::Passthrough,
            Stream::Native(_) => Backend::Native,
            Stream::External(_) => Backend::External,
        }
    }

    /// Release everything the pipeline holds, stopping an external process if there is one.
    pub(crate) fn close(self) -> Result<()> {
        match self.stream {
            Stream::External(mut process) => process.terminate(),
            Stream::Native(_) | Stream::Passthrough(_) => Ok(()),
        }
    }
}

impl Read for Pipeline {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match &mut self.stream {
            Stream::Passthrough(reader) => reader.read(buf),
            Stream::Native(decoder) => decoder.read(buf),
            Stream::External(process) => process.read(buf),
        }
    }
}
