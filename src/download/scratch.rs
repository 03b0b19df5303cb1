use anyhow::{Context, Result};
use directories::ProjectDirs;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Scratch directory for downloads and extracted files.
///
/// The directory and everything in it is removed when the value is dropped,
/// whether the load succeeded or not.
pub struct ScratchDir {
    path: PathBuf,
}

impl ScratchDir {
    /// Create a fresh scratch directory under `base`, or under the per-user
    /// cache directory when no base is given
    pub fn new(base: Option<PathBuf>) -> Result<Self> {
        let base = match base {
            Some(dir) => dir,
            None => {
                let proj_dirs = ProjectDirs::from("", "", "edu-demographics")
                    .context("Could not determine cache directory")?;
                proj_dirs.cache_dir().to_path_buf()
            }
        };

        let path = base.join(format!("scratch-{}", std::process::id()));

        // Leftovers from a crashed run with the same pid
        if path.exists() {
            fs::remove_dir_all(&path).context("Failed to clear stale scratch directory")?;
        }
        fs::create_dir_all(&path).context("Failed to create scratch directory")?;

        Ok(Self { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn join(&self, name: &str) -> PathBuf {
        self.path.join(name)
    }
}

impl Drop for ScratchDir {
    fn drop(&mut self) {
        match fs::remove_dir_all(&self.path) {
            Ok(()) => info!(path = ?self.path, "cleaned up scratch directory"),
            Err(e) => warn!(path = ?self.path, error = %e, "failed to remove scratch directory"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scratch_dir_is_removed_on_drop() {
        let base = tempfile::tempdir().unwrap();
        let path = {
            let scratch = ScratchDir::new(Some(base.path().to_path_buf())).unwrap();
            fs::write(scratch.join("zcta.zip"), b"partial").unwrap();
            assert!(scratch.path().exists());
            scratch.path().to_path_buf()
        };
        assert!(!path.exists());
    }

    #[test]
    fn test_scratch_dir_is_removed_on_error_path() {
        let base = tempfile::tempdir().unwrap();
        let mut seen = None;

        let result: Result<()> = (|| {
            let scratch = ScratchDir::new(Some(base.path().to_path_buf()))?;
            seen = Some(scratch.path().to_path_buf());
            anyhow::bail!("download failed")
        })();

        assert!(result.is_err());
        assert!(!seen.unwrap().exists());
    }
}
