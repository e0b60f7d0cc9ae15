use std::io;
use std::path::PathBuf;

use crate::error::FaceError;

/// Blob storage for uploaded face images, decoupled from the gallery.
///
/// `put` replaces any previous content under the key and returns a URL for
/// the stored object. `delete` is idempotent: removing a missing key
/// succeeds.
pub trait MediaStore: Send + Sync {
    fn put(&self, key: &str, bytes: &[u8]) -> Result<String, FaceError>;
    fn delete(&self, key: &str) -> Result<(), FaceError>;
}

/// Filesystem-backed media store rooted at one directory.
pub struct FsMediaStore {
    root: PathBuf,
}

impl FsMediaStore {
    pub fn new(root: PathBuf) -> anyhow::Result<Self> {
        std::fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    fn path_for(&self, key: &str) -> Result<PathBuf, FaceError> {
        // Keys are flat file names; anything that could escape the root is
        // rejected before it touches the filesystem.
        if key.is_empty() || key.contains('/') || key.contains('\\') || key.contains("..") {
            return Err(FaceError::Validation(format!("invalid media key: {:?}", key)));
        }
        Ok(self.root.join(key))
    }
}

impl MediaStore for FsMediaStore {
    fn put(&self, key: &str, bytes: &[u8]) -> Result<String, FaceError> {
        let path = self.path_for(key)?;
        std::fs::write(&path, bytes).map_err(|e| FaceError::Storage(e.to_string()))?;
        Ok(format!("file://{}", path.display()))
    }

    fn delete(&self, key: &str) -> Result<(), FaceError> {
        let path = self.path_for(key)?;
        match std::fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(FaceError::Storage(e.to_string())),
        }
    }
}
