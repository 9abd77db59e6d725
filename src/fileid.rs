//! Stable, OS-independent file identity.
//!
//! Two paths that refer to the same underlying file (including across a
//! rename) must yield the same `FileId`. On POSIX this is the inode number;
//! on Windows it is the NTFS file index, assembled from its high and low
//! 32-bit halves the same way `GetFileInformationByHandle` reports it.

use std::path::Path;

use crate::error::FileIdError;

/// Opaque stable identifier for a file, derived from OS metadata rather
/// than path text. Never construct one from a bare `u64` outside this
/// module — route everything through [`FileId::for_path`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FileId(pub u64);

impl FileId {
    /// Sentinel for a path that could not be stat'd; such events are
    /// filtered out by the pipeline rather than tailed.
    pub const INVALID: FileId = FileId(0);

    pub fn is_valid(self) -> bool {
        self.0 != 0
    }

    pub fn for_path(path: &Path) -> Result<FileId, FileIdError> {
        imp::for_path(path)
    }
}

impl std::fmt::Display for FileId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:x}", self.0)
    }
}

#[cfg(unix)]
mod imp {
    use std::os::unix::fs::MetadataExt;
    use std::path::Path;

    use super::FileId;
    use crate::error::FileIdError;

    pub fn for_path(path: &Path) -> Result<FileId, FileIdError> {
        let meta = std::fs::metadata(path).map_err(|source| FileIdError::Stat {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(FileId(meta.ino()))
    }
}

#[cfg(windows)]
mod imp {
    use std::os::windows::io::AsRawHandle;
    use std::path::Path;

    use windows_sys::Win32::Foundation::HANDLE;
    use windows_sys::Win32::Storage::FileSystem::{
        GetFileInformationByHandle, BY_HANDLE_FILE_INFORMATION,
    };

    use super::FileId;
    use crate::error::FileIdError;

    pub fn for_path(path: &Path) -> Result<FileId, FileIdError> {
        let file = std::fs::File::open(path).map_err(|source| FileIdError::Stat {
            path: path.to_path_buf(),
            source,
        })?;
        let handle = file.as_raw_handle() as HANDLE;
        let mut info: BY_HANDLE_FILE_INFORMATION = unsafe { std::mem::zeroed() };
        let ok = unsafe { GetFileInformationByHandle(handle, &mut info) };
        if ok == 0 {
            return Err(FileIdError::Stat {
                path: path.to_path_buf(),
                source: std::io::Error::last_os_error(),
            });
        }
        let id = ((info.nFileIndexHigh as u64) << 32) | (info.nFileIndexLow as u64);
        Ok(FileId(id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_file_same_id() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.log");
        std::fs::write(&path, "hello").unwrap();
        let a = FileId::for_path(&path).unwrap();
        let b = FileId::for_path(&path).unwrap();
        assert_eq!(a, b);
        assert!(a.is_valid());
    }

    #[test]
    fn rename_preserves_id() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.log");
        std::fs::write(&path, "hello").unwrap();
        let before = FileId::for_path(&path).unwrap();
        let renamed = dir.path().join("b.log");
        std::fs::rename(&path, &renamed).unwrap();
        let after = FileId::for_path(&renamed).unwrap();
        assert_eq!(before, after);
    }

    #[test]
    fn missing_path_errors() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing.log");
        assert!(FileId::for_path(&path).is_err());
    }
}
