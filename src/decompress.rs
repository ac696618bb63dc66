//! Per-input decompression: standard input to standard output, or a file to
//! its sibling without the compression suffix.

use crate::error::{ErrorKind, Result, raise};
use decant_compress::{Compression, DecompressReader, Options};
use exn::ResultExt;
use std::fs::{self, File, OpenOptions};
use std::io::{self, BufWriter, Read, Write};
use std::path::{Path, PathBuf};
use tracing::instrument;

/// The output file for `input`: its name with a `.gz`, `.bz2` or `.xz`
/// suffix (any case) removed. Anything else has no output name.
pub fn output_path(input: &Path) -> Option<PathBuf> {
    match Compression::from_path(input) {
        Compression::None => None,
        _ => Some(input.with_extension("")),
    }
}

#[derive(Clone, Copy, Debug)]
pub struct Job {
    pub options: Options,
    pub to_stdout: bool,
    pub keep: bool,
}

impl Job {
    /// Filter standard input to standard output.
    #[instrument(skip(self))]
    pub fn stdin(&self) -> Result<u64> {
        let mut stdout = io::stdout().lock();
        copy(io::stdin(), &mut stdout, self.options)
    }

    /// Decompress one file, to standard output or next to it, removing the
    /// original afterwards unless asked to keep it.
    #[instrument(skip(self), fields(path = %path.display()))]
    pub fn file(&self, path: &Path) -> Result<u64> {
        let input = raise(File::open(path), ErrorKind::Open)?;
        let copied = if self.to_stdout {
            let mut stdout = io::stdout().lock();
            copy(input, &mut stdout, self.options)?
        } else {
            let Some(target) = output_path(path) else {
                exn::bail!(ErrorKind::UnknownSuffix);
            };
            let output = raise(OpenOptions::new().write(true).create_new(true).open(&target), |message| {
                ErrorKind::Create(format!("{}: {message}", target.display()))
            })?;
            let mut output = BufWriter::new(output);
            match copy(input, &mut output, self.options) {
                Ok(copied) => copied,
                Err(e) => {
                    // Don't leave a truncated file behind, it would block the next attempt.
                    drop(output);
                    if let Err(remove) = fs::remove_file(&target) {
                        tracing::warn!(error = %remove, target = %target.display(), "Failed to remove partial output");
                    }
                    return Err(e);
                },
            }
        };
        tracing::info!(bytes = copied, "Decompressed");
        if !self.keep {
            raise(fs::remove_file(path), ErrorKind::Remove)?;
        }
        Ok(copied)
    }
}

/// Copy the decompressed form of `source` into `output`.
fn copy<R: Read + Send + 'static, W: Write>(source: R, output: &mut W, options: Options) -> Result<u64> {
    let mut reader = DecompressReader::new(source, options);
    let copied = raise(io::copy(&mut reader, output), ErrorKind::Decompress)?;
    raise(output.flush(), ErrorKind::Decompress)?;
    tracing::debug!(compression = ?reader.compression(), backend = ?reader.backend(), "Input fully read");
    if let Err(e) = reader.close() {
        let message = (*e).to_string();
        return Err(e).or_raise(|| ErrorKind::Decompress(message));
    }
    Ok(copied)
}
