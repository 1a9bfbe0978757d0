use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};

use fs2::FileExt;
use tracing::debug;

use crate::error::{IsoError, Result};

pub(crate) const LOCK_FILENAME: &str = ".iso-maker.lock";

/// Exclusive claim on an output directory, held until dropped.
#[derive(Debug)]
pub(crate) struct OutputLock {
    _file: File,
    path: PathBuf,
}

impl Drop for OutputLock {
    fn drop(&mut self) {
        debug!(lock = %self.path.display(), "released output lock");
    }
}

/// Claim `output_dir` so two runs cannot write images into it at once.
pub(crate) fn lock_output_dir(output_dir: &Path) -> Result<OutputLock> {
    let path = output_dir.join(LOCK_FILENAME);

    // The lock file is never unlinked: removing a file another process still
    // holds would let a third process lock a fresh inode at the same path.
    let file = OpenOptions::new()
        .create(true)
        .read(true)
        .write(true)
        .truncate(false)
        .open(&path)
        .map_err(|e| IsoError::io(format!("creating lock file '{}'", path.display()), e))?;

    if file.try_lock_exclusive().is_err() {
        return Err(IsoError::OutputLocked(output_dir.to_path_buf()));
    }

    debug!(lock = %path.display(), "acquired output lock");
    Ok(OutputLock { _file: file, path })
}
