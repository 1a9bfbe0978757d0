//! Ephemeral unpack directories with guaranteed cleanup.
//!
//! A [`Workspace`] owns one uniquely-named directory. It is removed either
//! by an explicit [`Workspace::release`] or when the value is dropped, so
//! every exit path of the code holding it cleans up exactly once.

use std::fs;
use std::path::{Path, PathBuf};

use tempfile::TempDir;
use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::artifact::filesystem::make_dirs_writable;
use crate::error::{IsoError, Result};

const WORKSPACE_PREFIX: &str = "iso-maker-";

#[derive(Debug)]
pub struct Workspace {
    path: PathBuf,
    dir: Option<TempDir>,
}

impl Workspace {
    /// Allocate a workspace under the system temp directory.
    pub fn create() -> Result<Self> {
        Self::create_in(std::env::temp_dir())
    }

    /// Allocate a workspace under `parent`.
    ///
    /// Name generation is retried by `tempfile` until an unused path is found.
    pub fn create_in(parent: impl AsRef<Path>) -> Result<Self> {
        let parent = parent.as_ref();
        fs::create_dir_all(parent).map_err(|e| {
            IsoError::io(
                format!("creating workspace parent '{}'", parent.display()),
                e,
            )
        })?;
        let dir = tempfile::Builder::new()
            .prefix(WORKSPACE_PREFIX)
            .tempdir_in(parent)
            .map_err(|e| {
                IsoError::io(
                    format!("allocating workspace under '{}'", parent.display()),
                    e,
                )
            })?;
        let path = dir.path().to_path_buf();
        debug!(path = %path.display(), "created workspace");
        Ok(Self {
            path,
            dir: Some(dir),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Resolve `relative` against the workspace root.
    pub fn join(&self, relative: impl AsRef<Path>) -> PathBuf {
        self.path.join(relative)
    }

    pub fn is_released(&self) -> bool {
        self.dir.is_none()
    }

    /// True when the directory has no entries (or no longer exists).
    pub fn is_empty(&self) -> Result<bool> {
        if self.is_released() {
            return Ok(true);
        }
        let mut entries = fs::read_dir(&self.path).map_err(|e| {
            IsoError::io(format!("reading workspace '{}'", self.path.display()), e)
        })?;
        Ok(entries.next().is_none())
    }

    /// Number of regular files below the workspace root.
    pub fn file_count(&self) -> usize {
        if self.is_released() {
            return 0;
        }
        WalkDir::new(&self.path)
            .into_iter()
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.file_type().is_file())
            .count()
    }

    /// Remove the directory tree. Safe to call more than once.
    pub fn release(&mut self) -> Result<()> {
        let Some(dir) = self.dir.take() else {
            return Ok(());
        };
        debug!(path = %self.path.display(), "releasing workspace");
        if self.path.exists() {
            if let Err(e) = make_dirs_writable(&self.path) {
                warn!(error = %e, "cannot open workspace directories for removal");
            }
        }
        match dir.close() {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(IsoError::io(
                format!("removing workspace '{}'", self.path.display()),
                e,
            )),
        }
    }
}

impl Drop for Workspace {
    fn drop(&mut self) {
        if let Err(e) = self.release() {
            warn!(error = %e, "workspace cleanup failed");
        }
    }
}
