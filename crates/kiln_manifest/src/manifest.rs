//! In-memory representation of one manifest: the include paths, the
//! fingerprints recorded for them, and the object entries built from both.

use kiln_common::Digest;

/// Largest entry count each manifest section can hold, and the largest
/// number of file infos one object entry may reference. All four counts are
/// stored in 16-bit fields on disk.
pub const MAX_ENTRIES: usize = u16::MAX as usize;

/// Largest stored path length in bytes, NUL terminator included.
pub const MAX_PATH_BYTES: usize = 1024;

/// Content stamp of a file: its digest paired with its size in bytes.
///
/// Serves double duty. As part of a [`FileInfo`] it records the state an
/// include file had when an entry was written; as [`ObjectEntry::fingerprint`]
/// it names the cached compilation output itself. The size field rules out
/// digest collisions between files of different lengths.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Fingerprint {
    /// XXH3-128 digest of the file contents.
    pub digest: Digest,
    /// File size in bytes.
    pub size: u32,
}

/// Recorded state of one include file.
///
/// Equality covers the path index and the full fingerprint: the same path
/// recorded under two different contents yields two distinct `FileInfo`
/// entries that share one [`Manifest::files`] slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FileInfo {
    /// Index into [`Manifest::files`].
    pub path_index: u16,
    /// Content stamp the file had when this record was written.
    pub fingerprint: Fingerprint,
}

/// One cached compilation output together with the include-file state that
/// produced it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectEntry {
    /// Indexes into [`Manifest::file_infos`]. Every referenced fingerprint
    /// must match the file's current state for this entry to apply; the
    /// order of the list carries no meaning.
    pub file_info_indexes: Vec<u16>,
    /// Identity of the cached output.
    pub fingerprint: Fingerprint,
}

/// Everything recorded for one source file: unique include paths, unique
/// `(path, digest, size)` records, and the object entries referencing them.
///
/// A manifest is decoded, examined or extended, written back, and dropped.
/// It is never cached across operations. `files` holds no duplicate path and
/// `file_infos` no duplicate record; decoding enforces that every stored
/// index is in bounds and appends only create in-bounds ones.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Manifest {
    /// Unique include-file paths. Position is the identity that
    /// [`FileInfo::path_index`] refers to.
    pub files: Vec<String>,
    /// Unique include-file records referenced by object entries.
    pub file_infos: Vec<FileInfo>,
    /// Object entries in insertion order, oldest first.
    pub objects: Vec<ObjectEntry>,
}

impl Manifest {
    /// Creates an empty manifest, the state of a cache slot never written to.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` if nothing has been recorded yet.
    pub fn is_empty(&self) -> bool {
        self.files.is_empty() && self.file_infos.is_empty() && self.objects.is_empty()
    }
}
