//! Directory operation handlers: Op::Dir, Op::DirMode

use anyhow::{Context, Result};
use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::Path;

/// Handle Op::Dir: Create a directory
pub fn handle_dir(target: &Path) -> Result<()> {
    fs::create_dir_all(target)
        .with_context(|| format!("creating directory '{}'", target.display()))
}

/// Handle Op::DirMode: Create a directory with specific permissions
pub fn handle_dirmode(target: &Path, mode: u32) -> Result<()> {
    handle_dir(target)?;
    fs::set_permissions(target, fs::Permissions::from_mode(mode))
        .with_context(|| format!("setting mode {:o} on '{}'", mode, target.display()))
}
