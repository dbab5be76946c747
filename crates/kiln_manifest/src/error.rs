//! Error types for manifest operations.

use std::path::PathBuf;

/// Errors that can occur while reading, updating, or hashing for a manifest.
///
/// Lookup is fail-safe: every error below degrades to a cache miss with a
/// log line rather than failing the build. Append propagates errors to the
/// caller and leaves the backing file untouched whenever one occurs.
#[derive(Debug, thiserror::Error)]
pub enum ManifestError {
    /// An I/O error occurred while opening, locking, reading, or replacing
    /// a file.
    #[error("manifest I/O error at {path}: {source}")]
    Io {
        /// The path that caused the error.
        path: PathBuf,
        /// The underlying I/O error.
        source: std::io::Error,
    },

    /// The data does not begin with the manifest magic bytes.
    #[error("bad manifest magic {found:02x?}")]
    BadMagic {
        /// The four bytes found where the magic was expected.
        found: [u8; 4],
    },

    /// The manifest was written by an unknown format version.
    #[error("unsupported manifest version {found}")]
    UnsupportedVersion {
        /// The version number found in the header.
        found: u16,
    },

    /// The data ended in the middle of a field.
    #[error("manifest truncated at byte {offset}")]
    Truncated {
        /// Byte offset at which more data was expected.
        offset: usize,
    },

    /// A stored path ran past the length bound without a NUL terminator.
    #[error("unterminated path string at byte {offset}")]
    UnterminatedPath {
        /// Byte offset at which the path began.
        offset: usize,
    },

    /// A stored path is not valid UTF-8.
    #[error("malformed path string at byte {offset}")]
    MalformedPath {
        /// Byte offset at which the path began.
        offset: usize,
    },

    /// A stored index references an entry that does not exist.
    #[error("{what} index {index} out of bounds (limit {limit})")]
    InvalidIndex {
        /// Which table the reference points into.
        what: &'static str,
        /// The stored index value.
        index: usize,
        /// Number of entries actually present.
        limit: usize,
    },

    /// A sequence outgrew the 16-bit count field that stores its length.
    #[error("too many {what} entries: {count} exceeds format limit {limit}")]
    CapacityExceeded {
        /// Which sequence overflowed.
        what: &'static str,
        /// The entry count that was requested.
        count: usize,
        /// Largest representable count.
        limit: usize,
    },

    /// A path cannot be recorded: not valid UTF-8, contains a NUL byte, or
    /// does not fit the format's length bound.
    #[error("path {path} cannot be stored in a manifest")]
    UnencodablePath {
        /// The offending path.
        path: PathBuf,
    },

    /// A file's size does not fit the 32-bit size field.
    #[error("file {path} is too large to fingerprint ({size} bytes)")]
    FileTooLarge {
        /// The offending file.
        path: PathBuf,
        /// Its actual size in bytes.
        size: u64,
    },
}
