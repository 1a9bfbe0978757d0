//! File operation handlers: Op::WriteFile, Op::WriteFileMode, Op::CopyFile,
//! Op::CopyTree, Op::Remove, Op::Replace
//!
//! Files and directories extracted from read-only ISO9660 media come out
//! read-only, so handlers that change them make them writable first.

use anyhow::{bail, Context, Result};
use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::Path;

use crate::artifact::filesystem::{copy_dir_recursive, make_dirs_writable};

/// Handle Op::WriteFile: Write a file with content
pub fn handle_writefile(target: &Path, content: &str) -> Result<()> {
    ensure_parent(target)?;
    make_writable(target)?;
    fs::write(target, content).with_context(|| format!("writing '{}'", target.display()))
}

/// Handle Op::WriteFileMode: Write a file with specific permissions
pub fn handle_writefilemode(target: &Path, content: &str, mode: u32) -> Result<()> {
    handle_writefile(target, content)?;
    fs::set_permissions(target, fs::Permissions::from_mode(mode))
        .with_context(|| format!("setting mode {:o} on '{}'", mode, target.display()))
}

/// Handle Op::CopyFile: Copy a host file into the workspace
pub fn handle_copyfile(source: &Path, target: &Path) -> Result<()> {
    if !source.is_file() {
        bail!("file not found: {}", source.display());
    }
    ensure_parent(target)?;
    make_writable(target)?;
    fs::copy(source, target).with_context(|| {
        format!("copying '{}' -> '{}'", source.display(), target.display())
    })?;
    Ok(())
}

/// Handle Op::CopyTree: Copy a host directory tree into the workspace
pub fn handle_copytree(source: &Path, target: &Path) -> Result<()> {
    if !source.is_dir() {
        bail!("directory not found: {}", source.display());
    }
    copy_dir_recursive(source, target)?;
    Ok(())
}

/// Handle Op::Remove: Delete a file, symlink or directory tree
pub fn handle_remove(target: &Path) -> Result<()> {
    let meta = fs::symlink_metadata(target)
        .with_context(|| format!("cannot remove missing path '{}'", target.display()))?;
    if let Some(parent) = target.parent() {
        make_writable(parent)?;
    }
    let removed = if meta.is_dir() {
        make_dirs_writable(target)?;
        fs::remove_dir_all(target)
    } else {
        fs::remove_file(target)
    };
    removed.with_context(|| format!("removing '{}'", target.display()))
}

/// Handle Op::Replace: Substitute text in a file
pub fn handle_replace(target: &Path, from: &str, to: &str) -> Result<()> {
    if from.is_empty() {
        bail!("replacement pattern for '{}' is empty", target.display());
    }
    let content = fs::read_to_string(target)
        .with_context(|| format!("reading '{}'", target.display()))?;
    if !content.contains(from) {
        bail!("'{}' does not contain {:?}", target.display(), from);
    }
    handle_writefile(target, &content.replace(from, to))
}

fn ensure_parent(target: &Path) -> Result<()> {
    if let Some(parent) = target.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("creating directory '{}'", parent.display()))?;
        make_writable(parent)?;
    }
    Ok(())
}

fn make_writable(target: &Path) -> Result<()> {
    let Ok(meta) = fs::metadata(target) else {
        return Ok(());
    };
    let mut perms = meta.permissions();
    if perms.mode() & 0o200 == 0 {
        perms.set_mode(perms.mode() | 0o200);
        fs::set_permissions(target, perms)
            .with_context(|| format!("making '{}' writable", target.display()))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_handle_writefile_creates_content() {
        let temp = TempDir::new().unwrap();
        let target = temp.path().join("preseed/preseed.cfg");

        handle_writefile(&target, "d-i passwd/root-login boolean true\n").unwrap();

        assert_eq!(
            fs::read_to_string(&target).unwrap(),
            "d-i passwd/root-login boolean true\n"
        );
    }

    #[test]
    fn test_handle_writefile_overwrites_read_only_file() {
        let temp = TempDir::new().unwrap();
        let target = temp.path().join("isolinux.cfg");
        fs::write(&target, "old").unwrap();
        fs::set_permissions(&target, fs::Permissions::from_mode(0o444)).unwrap();

        handle_writefile(&target, "new").unwrap();

        assert_eq!(fs::read_to_string(&target).unwrap(), "new");
    }

    #[test]
    fn test_handle_writefilemode_sets_permissions() {
        let temp = TempDir::new().unwrap();
        let target = temp.path().join("post-install.sh");

        handle_writefilemode(&target, "#!/bin/sh\n", 0o755).unwrap();

        let permissions = fs::metadata(&target).unwrap().permissions().mode();
        assert_eq!(permissions & 0o777, 0o755);
    }

    #[test]
    fn test_handle_copyfile_copies_file() {
        let temp = TempDir::new().unwrap();
        let source = temp.path().join("autounattend.xml");
        fs::write(&source, "<unattend/>").unwrap();
        let target = temp.path().join("ws/autounattend.xml");

        handle_copyfile(&source, &target).unwrap();

        assert_eq!(fs::read_to_string(&target).unwrap(), "<unattend/>");
    }

    #[test]
    fn test_handle_copyfile_missing_file() {
        let temp = TempDir::new().unwrap();

        let result = handle_copyfile(&temp.path().join("nope"), &temp.path().join("x"));
        assert!(result.is_err(), "Should fail for missing file");
    }

    #[test]
    fn test_handle_copytree_copies_directory() {
        let temp = TempDir::new().unwrap();
        let source = temp.path().join("drivers");
        fs::create_dir_all(source.join("virtio")).unwrap();
        fs::write(source.join("virtio/viostor.inf"), "inf").unwrap();

        handle_copytree(&source, &temp.path().join("ws/drivers")).unwrap();

        assert!(temp.path().join("ws/drivers/virtio/viostor.inf").is_file());
    }

    #[test]
    fn test_handle_remove_file_and_tree() {
        let temp = TempDir::new().unwrap();
        fs::create_dir_all(temp.path().join("tree/sub")).unwrap();
        fs::write(temp.path().join("file"), "x").unwrap();

        handle_remove(&temp.path().join("file")).unwrap();
        handle_remove(&temp.path().join("tree")).unwrap();

        assert!(!temp.path().join("file").exists());
        assert!(!temp.path().join("tree").exists());
        assert!(handle_remove(&temp.path().join("file")).is_err());
    }

    #[test]
    fn test_write_and_remove_inside_read_only_directories() {
        let temp = TempDir::new().unwrap();
        let isolinux = temp.path().join("isolinux");
        fs::create_dir_all(isolinux.join("old")).unwrap();
        fs::write(isolinux.join("old/menu.c32"), "c32").unwrap();
        fs::set_permissions(isolinux.join("old"), fs::Permissions::from_mode(0o555)).unwrap();
        fs::set_permissions(&isolinux, fs::Permissions::from_mode(0o555)).unwrap();

        handle_writefile(&isolinux.join("ks.cfg"), "reboot\n").unwrap();
        handle_remove(&isolinux.join("old")).unwrap();

        assert_eq!(fs::read_to_string(isolinux.join("ks.cfg")).unwrap(), "reboot\n");
        assert!(!isolinux.join("old").exists());
    }

    #[test]
    fn test_handle_replace_requires_match() {
        let temp = TempDir::new().unwrap();
        let target = temp.path().join("grub.cfg");
        fs::write(&target, "set timeout=60\nset timeout=60\n").unwrap();

        handle_replace(&target, "timeout=60", "timeout=1").unwrap();
        assert_eq!(
            fs::read_to_string(&target).unwrap(),
            "set timeout=1\nset timeout=1\n"
        );

        assert!(handle_replace(&target, "timeout=60", "timeout=1").is_err());
    }
}
