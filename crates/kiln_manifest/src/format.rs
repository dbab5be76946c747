//! On-disk binary encoding of a manifest.
//!
//! All integers are fixed-width big-endian. A manifest file contains:
//! 1. Magic identifier (`KILN`, 4 bytes)
//! 2. Format version (u16)
//! 3. Include path count (u16), then each path NUL-terminated,
//!    at most 1024 bytes including the terminator
//! 4. File info count (u16), then each record: path index (u16),
//!    digest (16 bytes), file size (u32)
//! 5. Object entry count (u16), then each entry: file info index count
//!    (u16), that many file info indexes (u16 each), output digest
//!    (16 bytes), output size (u32)
//!
//! A zero-length input decodes to the empty manifest. That is the state of a
//! backing file a writer has created but not yet published to, and it
//! deliberately bypasses the magic and version checks. Bytes after the last
//! object entry are ignored.

use kiln_common::Digest;

use crate::error::ManifestError;
use crate::manifest::{FileInfo, Fingerprint, Manifest, ObjectEntry, MAX_ENTRIES, MAX_PATH_BYTES};

/// Magic bytes identifying a manifest file.
pub const MAGIC: [u8; 4] = *b"KILN";

/// Current manifest format version.
pub const VERSION: u16 = 0;

/// Decodes a manifest from raw bytes.
///
/// Every stored index is checked against the section lengths already read,
/// so a corrupt file is rejected here rather than misread during
/// verification.
pub fn decode(bytes: &[u8]) -> Result<Manifest, ManifestError> {
    if bytes.is_empty() {
        return Ok(Manifest::new());
    }

    let mut reader = Reader { buf: bytes, pos: 0 };

    let magic = reader.array::<4>()?;
    if magic != MAGIC {
        return Err(ManifestError::BadMagic { found: magic });
    }
    let version = reader.u16()?;
    if version != VERSION {
        return Err(ManifestError::UnsupportedVersion { found: version });
    }

    let mut manifest = Manifest::new();

    let n_files = reader.u16()?;
    manifest.files.reserve(n_files as usize);
    for _ in 0..n_files {
        manifest.files.push(reader.path()?);
    }

    let n_infos = reader.u16()?;
    manifest.file_infos.reserve(n_infos as usize);
    for _ in 0..n_infos {
        let path_index = reader.u16()?;
        if path_index as usize >= manifest.files.len() {
            return Err(ManifestError::InvalidIndex {
                what: "file path",
                index: path_index as usize,
                limit: manifest.files.len(),
            });
        }
        let digest = Digest::from_raw(reader.array::<16>()?);
        let size = reader.u32()?;
        manifest.file_infos.push(FileInfo {
            path_index,
            fingerprint: Fingerprint { digest, size },
        });
    }

    let n_objects = reader.u16()?;
    manifest.objects.reserve(n_objects as usize);
    for _ in 0..n_objects {
        let n_indexes = reader.u16()?;
        let mut file_info_indexes = Vec::with_capacity(n_indexes as usize);
        for _ in 0..n_indexes {
            let index = reader.u16()?;
            if index as usize >= manifest.file_infos.len() {
                return Err(ManifestError::InvalidIndex {
                    what: "file info",
                    index: index as usize,
                    limit: manifest.file_infos.len(),
                });
            }
            file_info_indexes.push(index);
        }
        let digest = Digest::from_raw(reader.array::<16>()?);
        let size = reader.u32()?;
        manifest.objects.push(ObjectEntry {
            file_info_indexes,
            fingerprint: Fingerprint { digest, size },
        });
    }

    Ok(manifest)
}

/// Encodes a manifest to bytes.
///
/// Section counts and per-object index lists are validated against the
/// 16-bit count fields up front, and each path against the length and NUL
/// rules as it is written, so an unrepresentable manifest yields an error
/// instead of bytes that would fail to decode.
pub fn encode(manifest: &Manifest) -> Result<Vec<u8>, ManifestError> {
    check_count("file path", manifest.files.len())?;
    check_count("file info", manifest.file_infos.len())?;
    check_count("object", manifest.objects.len())?;
    for object in &manifest.objects {
        check_count("object index", object.file_info_indexes.len())?;
    }

    let mut data = Vec::new();

    // Header
    data.extend_from_slice(&MAGIC);
    data.extend_from_slice(&VERSION.to_be_bytes());

    // Include paths
    data.extend_from_slice(&(manifest.files.len() as u16).to_be_bytes());
    for path in &manifest.files {
        let bytes = path.as_bytes();
        if bytes.len() + 1 > MAX_PATH_BYTES || bytes.contains(&0) {
            return Err(ManifestError::UnencodablePath { path: path.into() });
        }
        data.extend_from_slice(bytes);
        data.push(0);
    }

    // File infos
    data.extend_from_slice(&(manifest.file_infos.len() as u16).to_be_bytes());
    for info in &manifest.file_infos {
        data.extend_from_slice(&info.path_index.to_be_bytes());
        data.extend_from_slice(info.fingerprint.digest.as_bytes());
        data.extend_from_slice(&info.fingerprint.size.to_be_bytes());
    }

    // Object entries
    data.extend_from_slice(&(manifest.objects.len() as u16).to_be_bytes());
    for object in &manifest.objects {
        data.extend_from_slice(&(object.file_info_indexes.len() as u16).to_be_bytes());
        for &index in &object.file_info_indexes {
            data.extend_from_slice(&index.to_be_bytes());
        }
        data.extend_from_slice(object.fingerprint.digest.as_bytes());
        data.extend_from_slice(&object.fingerprint.size.to_be_bytes());
    }

    Ok(data)
}

fn check_count(what: &'static str, count: usize) -> Result<(), ManifestError> {
    if count > MAX_ENTRIES {
        return Err(ManifestError::CapacityExceeded {
            what,
            count,
            limit: MAX_ENTRIES,
        });
    }
    Ok(())
}

/// Byte cursor over an encoded manifest.
struct Reader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl Reader<'_> {
    fn array<const N: usize>(&mut self) -> Result<[u8; N], ManifestError> {
        let end = self.pos + N;
        if end > self.buf.len() {
            return Err(ManifestError::Truncated {
                offset: self.buf.len(),
            });
        }
        let mut out = [0u8; N];
        out.copy_from_slice(&self.buf[self.pos..end]);
        self.pos = end;
        Ok(out)
    }

    fn u16(&mut self) -> Result<u16, ManifestError> {
        Ok(u16::from_be_bytes(self.array::<2>()?))
    }

    fn u32(&mut self) -> Result<u32, ManifestError> {
        Ok(u32::from_be_bytes(self.array::<4>()?))
    }

    /// Reads one NUL-terminated path of at most [`MAX_PATH_BYTES`] bytes
    /// including the terminator.
    fn path(&mut self) -> Result<String, ManifestError> {
        let start = self.pos;
        let window_end = self.buf.len().min(self.pos + MAX_PATH_BYTES);
        let window = &self.buf[self.pos..window_end];
        match window.iter().position(|&b| b == 0) {
            Some(nul) => {
                self.pos += nul + 1;
                String::from_utf8(window[..nul].to_vec())
                    .map_err(|_| ManifestError::MalformedPath { offset: start })
            }
            // No terminator in the window: either the data ended first or
            // the path overran the format bound.
            None if start + MAX_PATH_BYTES > self.buf.len() => Err(ManifestError::Truncated {
                offset: self.buf.len(),
            }),
            None => Err(ManifestError::UnterminatedPath { offset: start }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fingerprint(seed: &[u8], size: u32) -> Fingerprint {
        Fingerprint {
            digest: Digest::from_bytes(seed),
            size,
        }
    }

    /// A manifest exercising shared paths, shared infos, and an object with
    /// no includes at all.
    fn sample_manifest() -> Manifest {
        Manifest {
            files: vec!["src/top.v".to_string(), "include/defs.vh".to_string()],
            file_infos: vec![
                FileInfo {
                    path_index: 0,
                    fingerprint: fingerprint(b"top v1", 120),
                },
                FileInfo {
                    path_index: 1,
                    fingerprint: fingerprint(b"defs v1", 64),
                },
                FileInfo {
                    path_index: 1,
                    fingerprint: fingerprint(b"defs v2", 65),
                },
            ],
            objects: vec![
                ObjectEntry {
                    file_info_indexes: vec![0, 1],
                    fingerprint: fingerprint(b"object one", 4096),
                },
                ObjectEntry {
                    file_info_indexes: vec![0, 2],
                    fingerprint: fingerprint(b"object two", 4100),
                },
                ObjectEntry {
                    file_info_indexes: vec![],
                    fingerprint: fingerprint(b"constant object", 16),
                },
            ],
        }
    }

    fn header() -> Vec<u8> {
        let mut data = Vec::new();
        data.extend_from_slice(&MAGIC);
        data.extend_from_slice(&VERSION.to_be_bytes());
        data
    }

    #[test]
    fn empty_input_is_empty_manifest() {
        let manifest = decode(&[]).unwrap();
        assert!(manifest.is_empty());
    }

    #[test]
    fn empty_manifest_encodes_to_bare_header() {
        let data = encode(&Manifest::new()).unwrap();
        assert_eq!(&data[..4], b"KILN");
        assert_eq!(data.len(), 12, "magic + version + three zero counts");
        assert!(decode(&data).unwrap().is_empty());
    }

    #[test]
    fn round_trip_preserves_everything() {
        let manifest = sample_manifest();
        let data = encode(&manifest).unwrap();
        assert_eq!(decode(&data).unwrap(), manifest);
    }

    #[test]
    fn longest_path_round_trips() {
        let manifest = Manifest {
            files: vec!["h".repeat(MAX_PATH_BYTES - 1)],
            ..Manifest::new()
        };
        let data = encode(&manifest).unwrap();
        assert_eq!(decode(&data).unwrap(), manifest);
    }

    #[test]
    fn trailing_bytes_are_ignored() {
        let manifest = sample_manifest();
        let mut data = encode(&manifest).unwrap();
        data.extend_from_slice(b"junk after the last entry");
        assert_eq!(decode(&data).unwrap(), manifest);
    }

    #[test]
    fn bad_magic_is_rejected() {
        let mut data = encode(&sample_manifest()).unwrap();
        data[0] = b'X';
        let err = decode(&data).unwrap_err();
        assert!(matches!(err, ManifestError::BadMagic { .. }));
    }

    #[test]
    fn unknown_version_is_rejected() {
        let mut data = encode(&sample_manifest()).unwrap();
        data[5] = 9;
        let err = decode(&data).unwrap_err();
        assert!(matches!(
            err,
            ManifestError::UnsupportedVersion { found: 9 }
        ));
    }

    #[test]
    fn truncated_header_is_rejected() {
        let err = decode(b"KIL").unwrap_err();
        assert!(matches!(err, ManifestError::Truncated { .. }));
    }

    #[test]
    fn truncated_tail_is_rejected() {
        let data = encode(&sample_manifest()).unwrap();
        let err = decode(&data[..data.len() - 2]).unwrap_err();
        assert!(matches!(err, ManifestError::Truncated { .. }));
    }

    #[test]
    fn path_without_terminator_is_rejected() {
        let mut data = header();
        data.extend_from_slice(&1u16.to_be_bytes());
        data.extend_from_slice(&[b'a'; MAX_PATH_BYTES]);
        let err = decode(&data).unwrap_err();
        assert!(matches!(err, ManifestError::UnterminatedPath { offset: 8 }));
    }

    #[test]
    fn path_cut_off_by_end_of_data_is_truncation() {
        let mut data = header();
        data.extend_from_slice(&1u16.to_be_bytes());
        data.extend_from_slice(b"no terminator here");
        let err = decode(&data).unwrap_err();
        assert!(matches!(err, ManifestError::Truncated { .. }));
    }

    #[test]
    fn non_utf8_path_is_rejected() {
        let mut data = header();
        data.extend_from_slice(&1u16.to_be_bytes());
        data.extend_from_slice(&[0xff, 0xfe, 0x00]);
        let err = decode(&data).unwrap_err();
        assert!(matches!(err, ManifestError::MalformedPath { offset: 8 }));
    }

    #[test]
    fn file_info_with_dangling_path_index_is_rejected() {
        let mut data = header();
        data.extend_from_slice(&0u16.to_be_bytes()); // no paths
        data.extend_from_slice(&1u16.to_be_bytes()); // one file info
        data.extend_from_slice(&0u16.to_be_bytes()); // path index 0
        data.extend_from_slice(&[0u8; 20]); // digest + size
        let err = decode(&data).unwrap_err();
        assert!(matches!(
            err,
            ManifestError::InvalidIndex {
                what: "file path",
                index: 0,
                limit: 0,
            }
        ));
    }

    #[test]
    fn object_with_dangling_info_index_is_rejected() {
        let mut data = header();
        data.extend_from_slice(&0u16.to_be_bytes()); // no paths
        data.extend_from_slice(&0u16.to_be_bytes()); // no file infos
        data.extend_from_slice(&1u16.to_be_bytes()); // one object
        data.extend_from_slice(&1u16.to_be_bytes()); // referencing one info
        data.extend_from_slice(&3u16.to_be_bytes()); // index 3
        data.extend_from_slice(&[0u8; 20]); // digest + size
        let err = decode(&data).unwrap_err();
        assert!(matches!(
            err,
            ManifestError::InvalidIndex {
                what: "file info",
                index: 3,
                limit: 0,
            }
        ));
    }

    #[test]
    fn oversized_path_is_unencodable() {
        let manifest = Manifest {
            files: vec!["h".repeat(MAX_PATH_BYTES)],
            ..Manifest::new()
        };
        let err = encode(&manifest).unwrap_err();
        assert!(matches!(err, ManifestError::UnencodablePath { .. }));
    }

    #[test]
    fn path_with_embedded_nul_is_unencodable() {
        let manifest = Manifest {
            files: vec!["bad\0path.h".to_string()],
            ..Manifest::new()
        };
        let err = encode(&manifest).unwrap_err();
        assert!(matches!(err, ManifestError::UnencodablePath { .. }));
    }

    #[test]
    fn too_many_paths_exceed_capacity() {
        let manifest = Manifest {
            files: vec!["a.h".to_string(); MAX_ENTRIES + 1],
            ..Manifest::new()
        };
        let err = encode(&manifest).unwrap_err();
        assert!(matches!(
            err,
            ManifestError::CapacityExceeded {
                what: "file path",
                ..
            }
        ));
    }

    #[test]
    fn too_many_object_indexes_exceed_capacity() {
        let manifest = Manifest {
            files: vec!["a.h".to_string()],
            file_infos: vec![FileInfo {
                path_index: 0,
                fingerprint: fingerprint(b"a", 1),
            }],
            objects: vec![ObjectEntry {
                file_info_indexes: vec![0; MAX_ENTRIES + 1],
                fingerprint: fingerprint(b"o", 1),
            }],
        };
        let err = encode(&manifest).unwrap_err();
        assert!(matches!(
            err,
            ManifestError::CapacityExceeded {
                what: "object index",
                ..
            }
        ));
    }
}
