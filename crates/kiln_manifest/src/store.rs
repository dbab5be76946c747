//! Lookup and append over manifest files shared between processes.

use std::collections::HashMap;
use std::io::Write;
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;
use tracing::{debug, warn};

use crate::dedup::DedupIndex;
use crate::error::ManifestError;
use crate::format;
use crate::lock::LockedFile;
use crate::manifest::{Fingerprint, Manifest, ObjectEntry, MAX_ENTRIES};
use crate::verify;

/// Access to the manifest files of a cache, one operation at a time.
///
/// The store keeps no open handles and no decoded manifests between calls.
/// Writers publish updates by renaming a replacement over the backing path,
/// so a handle kept from an earlier call could silently point at a replaced
/// file; opening fresh for every operation is what keeps concurrent
/// processes coherent.
#[derive(Debug, Clone)]
pub struct ManifestStore {
    scratch_dir: Option<PathBuf>,
}

impl ManifestStore {
    /// Creates a store that stages replacement files next to each manifest.
    pub fn new() -> Self {
        Self { scratch_dir: None }
    }

    /// Creates a store that stages replacement files in `dir` instead of
    /// the manifest's own directory.
    ///
    /// `dir` must be on the same filesystem as the manifests it serves, or
    /// the final rename stops being atomic.
    pub fn with_scratch_dir(dir: impl Into<PathBuf>) -> Self {
        Self {
            scratch_dir: Some(dir.into()),
        }
    }

    /// Finds the cached output whose recorded include-file state matches
    /// the filesystem right now.
    ///
    /// Entries are tried newest first, the most recently recorded state
    /// being the likeliest to still hold. All candidates of one call share
    /// a fingerprint memo, so no include file is read twice.
    ///
    /// Any failure is a miss: a manifest that is absent, unreadable, or
    /// corrupt means the output gets rebuilt and re-recorded, never that
    /// the build aborts.
    pub fn lookup(&self, manifest_path: &Path) -> Option<Fingerprint> {
        let bytes = match read_under_shared_lock(manifest_path) {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return None,
            Err(err) => {
                warn!(path = %manifest_path.display(), error = %err, "manifest unreadable");
                return None;
            }
        };

        let manifest = match format::decode(&bytes) {
            Ok(manifest) => manifest,
            Err(err) => {
                warn!(path = %manifest_path.display(), error = %err, "corrupt manifest treated as miss");
                return None;
            }
        };

        let mut hashed = HashMap::new();
        for object in manifest.objects.iter().rev() {
            if verify::object_matches(&manifest, object, &mut hashed) {
                debug!(
                    path = %manifest_path.display(),
                    object = %object.fingerprint.digest,
                    "manifest hit"
                );
                return Some(object.fingerprint);
            }
        }
        debug!(path = %manifest_path.display(), "manifest miss");
        None
    }

    /// Records a cached output together with the include-file state that
    /// produced it.
    ///
    /// `included` maps each include file the compilation read to the
    /// fingerprint it was read at. Paths and `(path, fingerprint)` records
    /// already present in the manifest are referenced, not duplicated; the
    /// object entry itself is always appended, even when an identical
    /// include state is already recorded.
    ///
    /// An exclusive lock is held from open to publication, so concurrent
    /// appends serialize and none of them loses entries. The update lands
    /// as a fully written staging file renamed over the backing path; on
    /// any error the previous contents remain visible and the error is
    /// returned.
    pub fn append(
        &self,
        manifest_path: &Path,
        object: Fingerprint,
        included: &HashMap<PathBuf, Fingerprint>,
    ) -> Result<(), ManifestError> {
        let mut locked = LockedFile::open_exclusive(manifest_path).map_err(|e| ManifestError::Io {
            path: manifest_path.to_path_buf(),
            source: e,
        })?;
        let bytes = locked.read_all().map_err(|e| ManifestError::Io {
            path: manifest_path.to_path_buf(),
            source: e,
        })?;
        let mut manifest = format::decode(&bytes)?;

        add_object_entry(&mut manifest, object, included)?;

        let encoded = format::encode(&manifest)?;
        self.publish(manifest_path, &encoded)?;
        debug!(
            path = %manifest_path.display(),
            objects = manifest.objects.len(),
            "manifest entry appended"
        );
        // The lock is released here, on the handle it was taken on, after
        // the replacement is already in place.
        drop(locked);
        Ok(())
    }

    /// Writes `bytes` to a uniquely named staging file and renames it over
    /// the backing path.
    fn publish(&self, manifest_path: &Path, bytes: &[u8]) -> Result<(), ManifestError> {
        let scratch = match &self.scratch_dir {
            Some(dir) => dir.as_path(),
            None => manifest_path
                .parent()
                .filter(|p| !p.as_os_str().is_empty())
                .unwrap_or_else(|| Path::new(".")),
        };

        let mut staging = NamedTempFile::new_in(scratch).map_err(|e| ManifestError::Io {
            path: scratch.to_path_buf(),
            source: e,
        })?;
        staging.write_all(bytes).map_err(|e| ManifestError::Io {
            path: staging.path().to_path_buf(),
            source: e,
        })?;
        staging.as_file().sync_all().map_err(|e| ManifestError::Io {
            path: staging.path().to_path_buf(),
            source: e,
        })?;
        staging.persist(manifest_path).map_err(|e| ManifestError::Io {
            path: manifest_path.to_path_buf(),
            source: e.error,
        })?;
        Ok(())
    }
}

impl Default for ManifestStore {
    fn default() -> Self {
        Self::new()
    }
}

/// Reads the manifest bytes under a shared lock.
///
/// The lock covers only the read itself. Hashing include files happens
/// after the guard is gone, so a slow verification never holds writers up.
fn read_under_shared_lock(path: &Path) -> std::io::Result<Vec<u8>> {
    let mut locked = LockedFile::open_shared(path)?;
    locked.read_all()
}

/// Folds the include files into the manifest's tables and appends one
/// object entry referencing them.
fn add_object_entry(
    manifest: &mut Manifest,
    object: Fingerprint,
    included: &HashMap<PathBuf, Fingerprint>,
) -> Result<(), ManifestError> {
    if manifest.objects.len() >= MAX_ENTRIES {
        return Err(ManifestError::CapacityExceeded {
            what: "object",
            count: manifest.objects.len() + 1,
            limit: MAX_ENTRIES,
        });
    }
    if included.len() > MAX_ENTRIES {
        return Err(ManifestError::CapacityExceeded {
            what: "object index",
            count: included.len(),
            limit: MAX_ENTRIES,
        });
    }

    let mut index = DedupIndex::new(manifest);
    let mut file_info_indexes = Vec::with_capacity(included.len());
    for (path, &fingerprint) in included {
        let path = path
            .to_str()
            .ok_or_else(|| ManifestError::UnencodablePath { path: path.clone() })?;
        file_info_indexes.push(index.resolve_file_info(path, fingerprint)?);
    }

    manifest.objects.push(ObjectEntry {
        file_info_indexes,
        fingerprint: object,
    });
    Ok(())
}
