use crate::Compression;
use std::fmt::{Display, Formatter, Result as FmtResult};

impl Display for Compression {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "{}", self.as_str())
    }
}

impl Compression {
    /// Every compressed format, in the order the sniffer considers them.
    pub const COMPRESSED: [Compression; 3] = [Compression::Gzip, Compression::Bzip2, Compression::Xz];

    /// Returns the file extension for this compression format.
    #[inline]
    #[must_use]
    pub fn extension(&self) -> &'static str {
        match self {
            Compression::None => "",
            Compression::Bzip2 => ".bz2",
            Compression::Gzip => ".gz",
            Compression::Xz => ".xz",
        }
    }

    /// Returns the short name for configuration (for displaying to user)
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Compression::None => "none",
            Compression::Bzip2 => "bzip2",
            Compression::Gzip => "gzip",
            Compression::Xz => "xz",
        }
    }

    /// The magic bytes every stream of this format starts with.
    #[inline]
    #[must_use]
    pub fn magic_bytes(&self) -> &'static [u8] {
        match self {
            Compression::None => &[],
            Compression::Bzip2 => &[b'B', b'Z', b'h'],
            Compression::Gzip => &[0x1F, 0x8B],
            Compression::Xz => &[0xFD, 0x37, 0x7A, 0x58, 0x5A, 0x00],
        }
    }

    /// External program and arguments that decompress standard input to standard output.
    #[must_use]
    pub fn command(&self) -> Option<(&'static str, &'static [&'static str])> {
        match self {
            Compression::None => None,
            Compression::Bzip2 => Some(("bzip2", &["-cd"])),
            Compression::Gzip => Some(("gzip", &["-cd"])),
            Compression::Xz => Some(("xz", &["-cd"])),
        }
    }

    /// Whether an in-process decoder for this format was compiled in.
    #[must_use]
    pub fn has_native_decoder(&self) -> bool {
        match self {
            Compression::None | Compression::Bzip2 | Compression::Gzip => true,
            Compression::Xz => cfg!(feature = "xz"),
        }
    }
}
