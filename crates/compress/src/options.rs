use crate::Compression;
use std::time::Duration;

/// How long [`DecompressReader::close`](crate::DecompressReader::close) waits
/// for a spawned decompressor to exit before giving up on it.
pub const DEFAULT_TERMINATION_TIMEOUT: Duration = Duration::from_secs(5);

/// Immutable decompression policy, read once when a
/// [`DecompressReader`](crate::DecompressReader) is constructed.
///
/// Disabling a format is policy, not capability: its magic bytes are simply
/// not recognised and the stream is passed through as plain data.
///
/// ```
/// use decant_compress::{Compression, Options};
///
/// let options = Options::default().disable(Compression::Bzip2).force_native(true);
/// assert!(!options.is_enabled(Compression::Bzip2));
/// assert!(options.is_enabled(Compression::Gzip));
/// assert!(options.is_force_native());
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Options {
    disable_gzip: bool,
    disable_bzip2: bool,
    disable_xz: bool,
    force_native: bool,
    termination_timeout: Duration,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            disable_gzip: false,
            disable_bzip2: false,
            disable_xz: false,
            force_native: false,
            termination_timeout: DEFAULT_TERMINATION_TIMEOUT,
        }
    }
}

impl Options {
    /// Treat the magic bytes of `format` as unrecognised.
    #[must_use]
    pub fn disable(mut self, format: Compression) -> Self {
        match format {
            // Plain data can't be "disabled".
            Compression::None => {},
            Compression::Bzip2 => self.disable_bzip2 = true,
            Compression::Gzip => self.disable_gzip = true,
            Compression::Xz => self.disable_xz = true,
        }
        self
    }

    /// Never spawn an external decompressor; only use in-process decoders.
    #[must_use]
    pub fn force_native(mut self, force: bool) -> Self {
        self.force_native = force;
        self
    }

    #[must_use]
    pub fn with_termination_timeout(mut self, timeout: Duration) -> Self {
        self.termination_timeout = timeout;
        self
    }

    #[inline]
    #[must_use]
    pub fn is_enabled(&self, format: Compression) -> bool {
        match format {
            Compression::None => true,
            Compression::Bzip2 => !self.disable_bzip2,
            Compression::Gzip => !self.disable_gzip,
            Compression::Xz => !self.disable_xz,
        }
    }

    #[inline]
    #[must_use]
    pub fn is_force_native(&self) -> bool {
        self.force_native
    }

    #[inline]
    #[must_use]
    pub fn termination_timeout(&self) -> Duration {
        self.termination_timeout
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn test_default_enables_everything() {
        let options = Options::default();
        for format in Compression::COMPRESSED {
            assert!(options.is_enabled(format));
        }
        assert!(!options.is_force_native());
        assert_eq!(options.termination_timeout(), DEFAULT_TERMINATION_TIMEOUT);
    }

    #[rstest]
    #[case(Compression::Gzip)]
    #[case(Compression::Bzip2)]
    #[case(Compression::Xz)]
    fn test_disable_only_affects_one_format(#[case] disabled: Compression) {
        let options = Options::default().disable(disabled);
        for format in Compression::COMPRESSED {
            assert_eq!(options.is_enabled(format), format != disabled);
        }
    }

    #[test]
    fn test_disable_plain_is_ignored() {
        assert_eq!(Options::default().disable(Compression::None), Options::default());
        assert!(Options::default().disable(Compression::None).is_enabled(Compression::None));
    }

    #[test]
    fn test_termination_timeout() {
        let options = Options::default().with_termination_timeout(Duration::from_millis(250));
        assert_eq!(options.termination_timeout(), Duration::from_millis(250));
    }
}
