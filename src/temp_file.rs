use std::path::{Path, PathBuf};

use tokio::fs;

/// A file that is removed once it's no longer needed.
///
/// `cleanup` removes it explicitly; dropping the guard removes it as well,
/// so every exit path of a handler leaves the scratch directory clean.
/// Removal errors are logged and swallowed.
#[derive(Debug)]
pub struct TempFile {
    path: PathBuf,
    armed: bool,
}

impl TempFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            armed: true,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn size(&self) -> std::io::Result<u64> {
        Ok(fs::metadata(&self.path).await?.len())
    }

    pub async fn cleanup(mut self) {
        self.armed = false;
        if let Err(e) = fs::remove_file(&self.path).await {
            if e.kind() != std::io::ErrorKind::NotFound {
                log::warn!("Failed to remove file {:?}: {}", self.path, e);
            }
        }
    }
}

impl Drop for TempFile {
    fn drop(&mut self) {
        if self.armed && self.path.exists() {
            if let Err(e) = std::fs::remove_file(&self.path) {
                log::warn!("Failed to remove file {:?}: {}", self.path, e);
            }
        }
    }
}
