//! Transient lookup index used while appending entries to a manifest.

use std::collections::HashMap;

use crate::error::ManifestError;
use crate::manifest::{FileInfo, Fingerprint, Manifest, MAX_ENTRIES};

/// Content-keyed index over a manifest's paths and file infos, scoped to a
/// single append.
///
/// Built once from the manifest's current contents, then consulted for each
/// include file being folded in: a path or `(path, digest, size)` record
/// that already exists resolves to its existing position, anything new is
/// pushed onto the manifest and indexed. The maps are an acceleration
/// structure only; they are discarded when the append completes and never
/// written to disk.
pub struct DedupIndex<'m> {
    manifest: &'m mut Manifest,
    paths: HashMap<String, u16>,
    infos: HashMap<FileInfo, u16>,
}

impl<'m> DedupIndex<'m> {
    /// Builds the index over the manifest's current entries.
    pub fn new(manifest: &'m mut Manifest) -> Self {
        let paths = manifest
            .files
            .iter()
            .enumerate()
            .map(|(index, path)| (path.clone(), index as u16))
            .collect();
        let infos = manifest
            .file_infos
            .iter()
            .enumerate()
            .map(|(index, info)| (*info, index as u16))
            .collect();
        Self {
            manifest,
            paths,
            infos,
        }
    }

    /// Resolves a path to its position in the manifest's path table,
    /// appending it if it has never been recorded.
    pub fn resolve_path(&mut self, path: &str) -> Result<u16, ManifestError> {
        if let Some(&index) = self.paths.get(path) {
            return Ok(index);
        }
        let next = self.manifest.files.len();
        if next >= MAX_ENTRIES {
            return Err(ManifestError::CapacityExceeded {
                what: "file path",
                count: next + 1,
                limit: MAX_ENTRIES,
            });
        }
        self.manifest.files.push(path.to_string());
        self.paths.insert(path.to_string(), next as u16);
        Ok(next as u16)
    }

    /// Resolves a `(path, fingerprint)` pair to its position in the
    /// manifest's file info table, appending a new record if this exact
    /// combination has never been recorded.
    pub fn resolve_file_info(
        &mut self,
        path: &str,
        fingerprint: Fingerprint,
    ) -> Result<u16, ManifestError> {
        let info = FileInfo {
            path_index: self.resolve_path(path)?,
            fingerprint,
        };
        if let Some(&index) = self.infos.get(&info) {
            return Ok(index);
        }
        let next = self.manifest.file_infos.len();
        if next >= MAX_ENTRIES {
            return Err(ManifestError::CapacityExceeded {
                what: "file info",
                count: next + 1,
                limit: MAX_ENTRIES,
            });
        }
        self.manifest.file_infos.push(info);
        self.infos.insert(info, next as u16);
        Ok(next as u16)
    }
}
