//! Local upload directory
//!
//! Every stored file is addressed by its generated name only; user supplied
//! names never reach a path built here.

use std::io;
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

/// Handle to the shared upload directory
#[derive(Debug, Clone)]
pub struct UploadStorage {
    root: PathBuf,
}

impl UploadStorage {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Create the upload directory (and parents) if missing
    pub async fn ensure_dir(&self) -> io::Result<()> {
        tokio::fs::create_dir_all(&self.root).await?;
        info!("Upload directory ready: {}", self.root.display());
        Ok(())
    }

    /// Absolute location of a stored file.
    ///
    /// Only the final path component of `stored_name` is used, so a name can
    /// never point outside the upload directory.
    pub fn path_for(&self, stored_name: &str) -> PathBuf {
        let file_name = Path::new(stored_name)
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        self.root.join(file_name)
    }

    /// Remove a stored file, logging instead of failing.
    ///
    /// Returns true when a file was actually removed.
    pub async fn remove_best_effort(&self, stored_name: &str) -> bool {
        let path = self.path_for(stored_name);
        match tokio::fs::remove_file(&path).await {
            Ok(()) => {
                debug!("Removed stored file {}", path.display());
                true
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!("Stored file already absent: {}", path.display());
                false
            }
            Err(e) => {
                warn!("Failed to remove stored file {}: {}", path.display(), e);
                false
            }
        }
    }
}
