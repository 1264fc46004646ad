//! Writes artifacts under an output directory.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::debug;

/// Writes files relative to a root, creating parent directories as needed.
#[derive(Debug)]
pub struct ArtifactWriter {
    root: PathBuf,
    written: Vec<PathBuf>,
}

impl ArtifactWriter {
    /// Writer rooted at `root`; nothing is created yet.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            written: Vec::new(),
        }
    }

    /// Output root.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Paths written so far, in order.
    #[must_use]
    pub fn written(&self) -> &[PathBuf] {
        &self.written
    }

    /// Write `contents` to `relative`.
    ///
    /// # Errors
    /// Returns an error if the directory or file cannot be written.
    pub fn write(&mut self, relative: impl AsRef<Path>, contents: &str) -> Result<PathBuf> {
        let path = self.root.join(relative);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory {}", parent.display()))?;
        }
        fs::write(&path, contents)
            .with_context(|| format!("Failed to write {}", path.display()))?;

        debug!(path = %path.display(), bytes = contents.len(), "Wrote artifact");
        self.written.push(path.clone());
        Ok(path)
    }

    /// Write a script and mark it executable (0755).
    ///
    /// # Errors
    /// Returns an error if the file cannot be written or its mode set.
    pub fn write_executable(
        &mut self,
        relative: impl AsRef<Path>,
        contents: &str,
    ) -> Result<PathBuf> {
        let path = self.write(relative, contents)?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&path, fs::Permissions::from_mode(0o755))
                .with_context(|| format!("Failed to set permissions on {}", path.display()))?;
        }

        Ok(path)
    }
}
