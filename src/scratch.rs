use std::path::{Path, PathBuf};
use tempfile::{Builder, TempPath};
use tracing::{debug, info, warn};

use crate::error::Result;

/// An intermediate file that is deleted when dropped unless `keep()` is called.
pub type ScratchFile = TempPath;

/// Caller-configured directory that holds every intermediate file of a run.
#[derive(Debug, Clone)]
pub struct ScratchDir {
    root: PathBuf,
}

impl ScratchDir {
    pub fn new<P: AsRef<Path>>(root: P) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        std::fs::create_dir_all(&root)?;
        debug!("Scratch directory ready: {}", root.display());
        Ok(Self { root })
    }

    pub fn path(&self) -> &Path {
        &self.root
    }

    /// Create a uniquely named, empty file such as `tts_chunk_XXXXXX.wav`.
    pub fn file(&self, prefix: &str, suffix: &str) -> Result<ScratchFile> {
        let file = Builder::new()
            .prefix(prefix)
            .suffix(suffix)
            .tempfile_in(&self.root)?;
        Ok(file.into_temp_path())
    }

    /// Remove the scratch directory and everything left inside it.
    pub async fn remove(self) {
        match tokio::fs::remove_dir_all(&self.root).await {
            Ok(()) => info!("Removed scratch directory: {}", self.root.display()),
            Err(e) => warn!("Could not remove scratch directory {}: {}", self.root.display(), e),
        }
    }
}
