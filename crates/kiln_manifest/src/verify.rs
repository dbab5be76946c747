//! Matching recorded object entries against the current filesystem state.

use std::collections::HashMap;
use std::path::Path;

use tracing::debug;

use crate::hasher;
use crate::manifest::{Fingerprint, Manifest, ObjectEntry};

/// Decides whether every include-file state recorded for `object` matches
/// the file's state on disk right now.
///
/// Current fingerprints are taken from `hashed` when present and computed
/// into it otherwise, so a file referenced by several candidate entries of
/// one lookup is read once. Only successful hashes are memoized; a file
/// that cannot be hashed is retried for the next candidate that needs it.
///
/// Failures are local to the candidate: an unreadable or vanished include
/// file, or a dangling index in a hand-built manifest, fails this entry and
/// lets the caller move on to older ones. An entry referencing no files at
/// all matches vacuously.
pub fn object_matches<'m>(
    manifest: &'m Manifest,
    object: &ObjectEntry,
    hashed: &mut HashMap<&'m str, Fingerprint>,
) -> bool {
    for &index in &object.file_info_indexes {
        let Some(info) = manifest.file_infos.get(index as usize) else {
            debug!(index, "object entry references a missing file info");
            return false;
        };
        let Some(path) = manifest.files.get(info.path_index as usize) else {
            debug!(path_index = info.path_index, "file info references a missing path");
            return false;
        };
        let current = match hashed.get(path.as_str()).copied() {
            Some(fingerprint) => fingerprint,
            None => match hasher::hash_file(Path::new(path)) {
                Ok(fingerprint) => {
                    hashed.insert(path.as_str(), fingerprint);
                    fingerprint
                }
                Err(err) => {
                    debug!(path = %path, error = %err, "could not hash include file");
                    return false;
                }
            },
        };
        if current != info.fingerprint {
            return false;
        }
    }
    true
}
