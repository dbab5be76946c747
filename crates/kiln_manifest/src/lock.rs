//! Advisory file locking for manifest access.

use std::fs::{File, OpenOptions};
use std::io::{self, Read};
use std::path::Path;

use fs4::FileExt;

/// An open file holding an advisory lock until dropped.
///
/// The lock lives on this handle and the inode behind it, not on the path.
/// A writer that publishes by renaming a replacement over the path keeps
/// its lock on the replaced inode until its guard drops, which is why every
/// operation opens the path fresh instead of reusing a handle from an
/// earlier call.
#[derive(Debug)]
pub(crate) struct LockedFile {
    file: File,
}

impl LockedFile {
    /// Opens `path` read-only and blocks until a shared lock is held.
    pub(crate) fn open_shared(path: &Path) -> io::Result<Self> {
        let file = File::open(path)?;
        file.lock_shared()?;
        Ok(Self { file })
    }

    /// Opens `path` read-write, creating it empty if absent, and blocks
    /// until an exclusive lock is held.
    ///
    /// A writer that was ahead of us may have renamed a replacement over
    /// the path while we waited, leaving our lock on an inode no longer
    /// reachable by name. The open is retried until the locked handle and
    /// the path agree.
    pub(crate) fn open_exclusive(path: &Path) -> io::Result<Self> {
        loop {
            let file = OpenOptions::new()
                .read(true)
                .write(true)
                .create(true)
                .open(path)?;
            file.lock_exclusive()?;
            if still_current(path, &file)? {
                return Ok(Self { file });
            }
            let _ = file.unlock();
        }
    }

    /// Reads the whole file.
    pub(crate) fn read_all(&mut self) -> io::Result<Vec<u8>> {
        let mut bytes = Vec::new();
        self.file.read_to_end(&mut bytes)?;
        Ok(bytes)
    }
}

impl Drop for LockedFile {
    fn drop(&mut self) {
        let _ = self.file.unlock();
    }
}

/// Returns `true` if `path` still names the file behind `handle`.
fn still_current(path: &Path, handle: &File) -> io::Result<bool> {
    let by_name = match std::fs::metadata(path) {
        Ok(metadata) => metadata,
        // Deleted out from under us; reopening recreates it.
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(false),
        Err(e) => return Err(e),
    };
    let by_handle = handle.metadata()?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::MetadataExt;
        Ok(by_name.dev() == by_handle.dev() && by_name.ino() == by_handle.ino())
    }
    #[cfg(not(unix))]
    {
        // Renaming over an open file is refused on these platforms, so the
        // handle cannot go stale between open and lock.
        let _ = (by_name, by_handle);
        Ok(true)
    }
}
