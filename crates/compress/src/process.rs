//! External decompressor processes.
//!
//! The child's standard input is fed from a dedicated thread while the caller
//! pulls from its standard output. Both ends are bounded OS pipes, so without
//! the feeder a child blocked on writing output and a caller blocked on reading
//! it would deadlock each other.

use crate::Compression;
use crate::error::{ErrorKind, Result};
use exn::ResultExt;
use std::io::{self, Read, Write};
use std::process::{Child, ChildStdin, ChildStdout, Command, ExitStatus, Stdio};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, SyncSender};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::instrument;

const FEED_BUFFER_SIZE: usize = 64 * 1024;
const POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Output side of a running external decompressor.
pub(crate) struct ProcessReader {
    program: &'static str,
    child: Child,
    stdin: Option<ChildStdin>,
    stdout: Option<ChildStdout>,
    feeder: Option<JoinHandle<()>>,
    outcome: Option<Receiver<io::Result<u64>>>,
    cancel: Arc<AtomicBool>,
    timeout: Duration,
    reaped: bool,
}

impl ProcessReader {
    /// Start the external decompressor for `codec`. Nothing has been consumed
    /// from any input yet, so a failure here leaves the caller free to fall
    /// back to something else.
    pub(crate) fn spawn(codec: Compression, timeout: Duration) -> Result<Self> {
        let Some((program, args)) = codec.command() else {
            exn::bail!(ErrorKind::UnsupportedFormat(codec.to_string()));
        };
        Self::spawn_program(program, args, timeout)
    }

    #[instrument(skip(args, timeout))]
    pub(crate) fn spawn_program(program: &'static str, args: &[&str], timeout: Duration) -> Result<Self> {
        let path = which::which(program).or_raise(|| ErrorKind::Spawn(program))?;
        let mut child = Command::new(&path)
            .args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()
            .or_raise(|| ErrorKind::Spawn(program))?;
        tracing::debug!(path = %path.display(), pid = child.id(), "External decompressor started");
        let stdin = child.stdin.take();
        let stdout = child.stdout.take();
        Ok(Self {
            program,
            child,
            stdin,
            stdout,
            feeder: None,
            outcome: None,
            cancel: Arc::new(AtomicBool::new(false)),
            timeout,
            reaped: false,
        })
    }

    /// Hand `input` to a background thread that copies it into the child's
    /// standard input, closing it once `input` is exhausted.
    pub(crate) fn feed<R: Read + Send + 'static>(mut self, input: R) -> Result<Self> {
        let program = self.program;
        let Some(stdin) = self.stdin.take() else {
            exn::bail!(ErrorKind::Spawn(program));
        };
        let (sender, outcome) = mpsc::sync_channel(1);
        let cancel = Arc::clone(&self.cancel);
        let feeder = thread::Builder::new()
            .name(format!("decant-feed-{program}"))
            .spawn(move || feed(input, stdin, &cancel, sender))
            .or_raise(|| ErrorKind::Spawn(program))?;
        self.feeder = Some(feeder);
        self.outcome = Some(outcome);
        Ok(self)
    }

    pub(crate) fn program(&self) -> &'static str {
        self.program
    }

    /// Stop the decompressor: close its output, tell the feeder to stop, kill
    /// the child if it is still running and wait (bounded) for it to exit.
    ///
    /// Safe to call more than once.
    #[instrument(skip(self), fields(program = self.program))]
    pub(crate) fn terminate(&mut self) -> Result<()> {
        let program = self.program;
        self.cancel.store(true, Ordering::Release);
        self.stdin = None;
        self.stdout = None;
        if !self.reaped {
            if self.child.try_wait().or_raise(|| ErrorKind::Termination(program))?.is_none() {
                // InvalidInput means the child exited in the meantime.
                if let Err(e) = self.child.kill()
                    && e.kind() != io::ErrorKind::InvalidInput
                {
                    return Err(e).or_raise(|| ErrorKind::Termination(program));
                }
            }
            match self.reap(self.timeout).or_raise(|| ErrorKind::Termination(program))? {
                Some(status) => tracing::debug!(%status, "External decompressor terminated"),
                None => {
                    tracing::warn!(timeout = ?self.timeout, "External decompressor did not exit in time");
                    exn::bail!(ErrorKind::Termination(program));
                },
            }
            self.reaped = true;
        }
        self.release_feeder();
        Ok(())
    }

    /// Called once the child's output reaches end-of-input.
    fn finish(&mut self) -> io::Result<()> {
        let status = match self.reap(self.timeout)? {
            Some(status) => status,
            None => {
                tracing::warn!(timeout = ?self.timeout, "External decompressor closed its output but did not exit");
                if let Err(e) = self.child.kill() {
                    tracing::warn!(error = %e, "Failed to kill external decompressor");
                }
                // Left unreaped, `Drop` gets another go at it.
                self.reaped = self.reap(self.timeout)?.is_some();
                return Err(ErrorKind::Termination(self.program).into());
            },
        };
        self.reaped = true;
        // The outcome is sent before the child's stdin is closed, so a source
        // failure that truncated the child's input is always visible here.
        if let Some(outcome) = self.outcome.take() {
            match outcome.try_recv() {
                Ok(Err(e)) => return Err(e),
                Ok(Ok(bytes)) => tracing::trace!(bytes, "Feeder delivered all input"),
                Err(_) => tracing::trace!("Decompressor finished before the feeder"),
            }
        }
        self.release_feeder();
        if status.success() || is_warning(self.program, &status) {
            tracing::debug!(%status, program = self.program, "External decompressor finished");
            Ok(())
        } else {
            tracing::debug!(%status, program = self.program, "External decompressor failed");
            Err(ErrorKind::ExternalDecoder(self.program).into())
        }
    }

    fn reap(&mut self, timeout: Duration) -> io::Result<Option<ExitStatus>> {
        let started = Instant::now();
        loop {
            if let Some(status) = self.child.try_wait()? {
                return Ok(Some(status));
            }
            if started.elapsed() >= timeout {
                return Ok(None);
            }
            thread::sleep(POLL_INTERVAL);
        }
    }

    fn release_feeder(&mut self) {
        let Some(feeder) = self.feeder.take() else {
            return;
        };
        if feeder.is_finished() {
            if feeder.join().is_err() {
                tracing::warn!(program = self.program, "Feeder thread panicked");
            }
        } else {
            // Blocked on the source; it stops at its next write to the closed pipe.
            tracing::trace!(program = self.program, "Detaching feeder thread");
        }
    }
}

impl Read for ProcessReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let Some(stdout) = self.stdout.as_mut() else {
            return Ok(0);
        };
        let bytes = stdout.read(buf)?;
        if bytes == 0 && !buf.is_empty() {
            self.stdout = None;
            self.finish()?;
        }
        Ok(bytes)
    }
}

impl Drop for ProcessReader {
    fn drop(&mut self) {
        // A raised cancel flag means `terminate` already ran (and reported its own failure).
        if !self.reaped
            && !self.cancel.load(Ordering::Acquire)
            && let Err(e) = self.terminate()
        {
            tracing::warn!(error = ?e, "Failed to stop external decompressor");
        }
    }
}

/// gzip and xz exit with 2 for warnings (e.g. trailing garbage) after writing all output.
fn is_warning(program: &str, status: &ExitStatus) -> bool {
    matches!((program, status.code()), ("gzip" | "xz", Some(2)))
}

fn feed<R: Read>(mut input: R, mut stdin: ChildStdin, cancel: &AtomicBool, outcome: SyncSender<io::Result<u64>>) {
    let result = pump(&mut input, &mut stdin, cancel);
    if let Err(e) = &result {
        tracing::debug!(error = %e, "Feeder stopped with an error");
    }
    // Report before closing stdin; see `ProcessReader::finish`.
    let _ = outcome.send(result);
    drop(stdin);
}

/// Copy `input` into `output` until the input ends, the reader goes away or
/// `cancel` is raised.
fn pump<R: Read, W: Write>(input: &mut R, output: &mut W, cancel: &AtomicBool) -> io::Result<u64> {
    let mut buffer = vec![0; FEED_BUFFER_SIZE];
    let mut copied: u64 = 0;
    while !cancel.load(Ordering::Acquire) {
        let bytes = match input.read(&mut buffer) {
            Ok(0) => break,
            Ok(bytes) => bytes,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        };
        match output.write_all(&buffer[..bytes]) {
            Ok(()) => copied += bytes as u64,
            Err(e) if e.kind() == io::ErrorKind::BrokenPipe => {
                tracing::trace!(copied, "Decompressor stopped reading input");
                return Ok(copied);
            },
            Err(e) => return Err(e),
        }
    }
    output.flush()?;
    Ok(copied)
}
