use crate::Compression;
use std::path::Path;

impl Compression {
    /// Detect compression from a file extension, ignoring case.
    ///
    /// This is naming only; streams are always identified by their magic
    /// bytes (see [`sniff`](crate::sniff)).
    #[must_use]
    pub fn from_path(path: impl AsRef<Path>) -> Self {
        path.as_ref()
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| match ext.to_ascii_lowercase().as_str() {
                "bz2" => Compression::Bzip2,
                "gz" => Compression::Gzip,
                "xz" => Compression::Xz,
                _ => Compression::None,
            })
            .unwrap_or(Compression::None)
    }
}
