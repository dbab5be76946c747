//! Fingerprinting of include files as they exist on disk.

use std::path::Path;

use kiln_common::Digest;

use crate::error::ManifestError;
use crate::manifest::Fingerprint;

/// Computes the current fingerprint of a file.
///
/// Reads the whole file and returns its XXH3-128 digest together with its
/// size. Sizes that do not fit the manifest's 32-bit size field are an
/// error; recording a wrapped size would make two very different files
/// compare equal.
pub fn hash_file(path: &Path) -> Result<Fingerprint, ManifestError> {
    let content = std::fs::read(path).map_err(|e| ManifestError::Io {
        path: path.to_path_buf(),
        source: e,
    })?;
    let size: u32 = content
        .len()
        .try_into()
        .map_err(|_| ManifestError::FileTooLarge {
            path: path.to_path_buf(),
            size: content.len() as u64,
        })?;
    Ok(Fingerprint {
        digest: Digest::from_bytes(&content),
        size,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn fingerprint_is_deterministic() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("defs.vh");
        fs::write(&path, b"`define WIDTH 8\n").unwrap();
        let a = hash_file(&path).unwrap();
        let b = hash_file(&path).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn size_is_recorded() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("five.vh");
        fs::write(&path, b"01234").unwrap();
        assert_eq!(hash_file(&path).unwrap().size, 5);
    }

    #[test]
    fn content_change_changes_fingerprint() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("defs.vh");
        fs::write(&path, b"`define WIDTH 8\n").unwrap();
        let before = hash_file(&path).unwrap();
        fs::write(&path, b"`define WIDTH 9\n").unwrap();
        let after = hash_file(&path).unwrap();
        assert_ne!(before, after);
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = hash_file(&dir.path().join("absent.vh")).unwrap_err();
        assert!(matches!(err, ManifestError::Io { .. }));
    }
}
