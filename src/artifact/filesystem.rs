//! Filesystem helpers for preparing trees before they are packed.

use std::fs;
use std::path::{Component, Path, PathBuf};

use crate::error::{IsoError, Result};

/// Recursively copy a directory, preserving symlinks.
///
/// Unlike `fs::copy`, this handles nested directories and keeps symbolic
/// links as links instead of following them.
pub fn copy_dir_recursive(src: &Path, dst: &Path) -> Result<()> {
    fs::create_dir_all(dst)
        .map_err(|e| IsoError::io(format!("creating directory '{}'", dst.display()), e))?;

    let entries = fs::read_dir(src)
        .map_err(|e| IsoError::io(format!("reading directory '{}'", src.display()), e))?;
    for entry in entries {
        let entry =
            entry.map_err(|e| IsoError::io(format!("iterating '{}'", src.display()), e))?;
        let src_path = entry.path();
        let dst_path = dst.join(entry.file_name());
        let file_type = entry
            .file_type()
            .map_err(|e| IsoError::io(format!("inspecting '{}'", src_path.display()), e))?;

        if file_type.is_symlink() {
            copy_symlink(&src_path, &dst_path)?;
        } else if file_type.is_dir() {
            copy_dir_recursive(&src_path, &dst_path)?;
        } else {
            fs::copy(&src_path, &dst_path).map_err(|e| {
                IsoError::io(format!("copying file '{}'", src_path.display()), e)
            })?;
        }
    }

    Ok(())
}

#[cfg(unix)]
fn copy_symlink(src: &Path, dst: &Path) -> Result<()> {
    let target = fs::read_link(src)
        .map_err(|e| IsoError::io(format!("reading symlink '{}'", src.display()), e))?;
    if dst.exists() || dst.is_symlink() {
        fs::remove_file(dst)
            .map_err(|e| IsoError::io(format!("replacing '{}'", dst.display()), e))?;
    }
    std::os::unix::fs::symlink(&target, dst)
        .map_err(|e| IsoError::io(format!("creating symlink '{}'", dst.display()), e))
}

#[cfg(not(unix))]
fn copy_symlink(src: &Path, dst: &Path) -> Result<()> {
    fs::copy(src, dst)
        .map(|_| ())
        .map_err(|e| IsoError::io(format!("copying '{}'", src.display()), e))
}

/// Add owner write permission to every directory under (and including) `root`.
///
/// Trees extracted from ISO9660 media keep the read-only modes of the image,
/// and a read-only directory cannot have entries added or removed.
#[cfg(unix)]
pub fn make_dirs_writable(root: &Path) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;

    for entry in walkdir::WalkDir::new(root) {
        let entry = entry.map_err(|e| {
            let message = format!("walking '{}'", root.display());
            IsoError::io(message, e.into())
        })?;
        if !entry.file_type().is_dir() {
            continue;
        }
        let path = entry.path();
        let mut perms = fs::metadata(path)
            .map_err(|e| IsoError::io(format!("inspecting '{}'", path.display()), e))?
            .permissions();
        if perms.mode() & 0o200 == 0 {
            perms.set_mode(perms.mode() | 0o200);
            fs::set_permissions(path, perms)
                .map_err(|e| IsoError::io(format!("making '{}' writable", path.display()), e))?;
        }
    }
    Ok(())
}

#[cfg(not(unix))]
pub fn make_dirs_writable(_root: &Path) -> Result<()> {
    Ok(())
}

/// Resolve `relative` under `root`, refusing anything that could escape it.
///
/// Absolute paths, `..` and root/prefix components are rejected so that
/// customization ops and artifact sources stay inside the workspace.
pub fn resolve_within(root: &Path, relative: &Path) -> Result<PathBuf> {
    for component in relative.components() {
        match component {
            Component::Normal(_) | Component::CurDir => {}
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => {
                return Err(IsoError::InvalidInput(format!(
                    "path '{}' must stay inside '{}'",
                    relative.display(),
                    root.display()
                )))
            }
        }
    }
    Ok(root.join(relative))
}
