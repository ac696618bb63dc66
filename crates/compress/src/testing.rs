//! Test fixtures shared between modules.

use std::io::{self, Cursor, Read, Write};

pub(crate) const HELLO: &[u8] = b"Hello";

pub(crate) fn one_to_ten() -> Vec<u8> {
    b"One\nTwo\nThree\nFour\nFive\nSix\nSeven\nEight\nNine\nTen\n".to_vec()
}

pub(crate) fn gzip(data: &[u8]) -> Vec<u8> {
    let mut encoder = flate2::write::GzEncoder::new(Vec::new(), flate2::Compression::default());
    encoder.write_all(data).unwrap();
    encoder.finish().unwrap()
}

pub(crate) fn bzip2(data: &[u8]) -> Vec<u8> {
    let mut encoder = bzip2::write::BzEncoder::new(Vec::new(), bzip2::Compression::default());
    encoder.write_all(data).unwrap();
    encoder.finish().unwrap()
}

pub(crate) fn xz(data: &[u8]) -> Vec<u8> {
    let mut encoder = xz2::write::XzEncoder::new(Vec::new(), 6);
    encoder.write_all(data).unwrap();
    encoder.finish().unwrap()
}

/// Whether an external program is available; tests that need one return early without it.
pub(crate) fn has_program(name: &str) -> bool {
    which::which(name).is_ok()
}

/// Delivers at most one byte per read call.
pub(crate) struct OneByteReader<R> {
    inner: R,
}
impl OneByteReader<Cursor<Vec<u8>>> {
    pub(crate) fn new(data: Vec<u8>) -> Self {
        Self { inner: Cursor::new(data) }
    }
}
impl<R: Read> OneByteReader<R> {
    pub(crate) fn wrap(inner: R) -> Self {
        Self { inner }
    }
}
impl<R: Read> Read for OneByteReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        self.inner.read(&mut buf[..1])
    }
}

/// Yields `data`, then fails every subsequent read with `kind`.
pub(crate) struct FailingReader {
    data: Cursor<Vec<u8>>,
    kind: io::ErrorKind,
}
impl FailingReader {
    pub(crate) fn new(data: Vec<u8>, kind: io::ErrorKind) -> Self {
        Self { data: Cursor::new(data), kind }
    }
}
impl Read for FailingReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self.data.read(buf)? {
            0 if !buf.is_empty() => Err(io::Error::new(self.kind, "source failed")),
            bytes => Ok(bytes),
        }
    }
}

/// Fails exactly one read with `Interrupted` once `at` bytes have been delivered.
pub(crate) struct InterruptingReader {
    data: Cursor<Vec<u8>>,
    at: u64,
    interrupted: bool,
}
impl InterruptingReader {
    pub(crate) fn new(data: Vec<u8>, at: u64) -> Self {
        Self { data: Cursor::new(data), at, interrupted: false }
    }
}
impl Read for InterruptingReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if !self.interrupted && self.data.position() >= self.at {
            self.interrupted = true;
            return Err(io::ErrorKind::Interrupted.into());
        }
        self.data.read(buf)
    }
}

/// Deterministic bytes covering the whole `u8` range, barely compressible.
pub(crate) fn noise(len: usize) -> Vec<u8> {
    let mut state: u32 = 0x9E37_79B9;
    (0..len)
        .map(|_| {
            state ^= state << 13;
            state ^= state >> 17;
            state ^= state << 5;
            (state >> 24) as u8
        })
        .collect()
}
