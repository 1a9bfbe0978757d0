//! Op executor - interprets [`Op`] values against a workspace root.
//!
//! # Usage
//!
//! ```rust,ignore
//! use iso_maker::component::write_file;
//! use iso_maker::executor;
//!
//! executor::execute_op(workspace.path(), &write_file("ks.cfg", "reboot\n"))?;
//! ```

pub mod directories;
pub mod files;

use std::path::Path;

use anyhow::{Context, Result};
use tracing::debug;

use crate::artifact::filesystem::resolve_within;
use crate::component::Op;

/// Execute one op with `root` as the tree being customized.
pub fn execute_op(root: &Path, op: &Op) -> Result<()> {
    let target = resolve_within(root, Path::new(op.target()))?;
    debug!(op = %op, "applying");

    match op {
        // Directory operations
        Op::Dir { .. } => directories::handle_dir(&target)?,
        Op::DirMode { mode, .. } => directories::handle_dirmode(&target, *mode)?,

        // File operations
        Op::WriteFile { content, .. } => files::handle_writefile(&target, content)?,
        Op::WriteFileMode { content, mode, .. } => {
            files::handle_writefilemode(&target, content, *mode)?
        }
        Op::CopyFile { from, .. } => files::handle_copyfile(from, &target)?,
        Op::CopyTree { from, .. } => files::handle_copytree(from, &target)?,
        Op::Remove { .. } => files::handle_remove(&target)?,
        Op::Replace { from, to, .. } => files::handle_replace(&target, from, to)?,
    }

    Ok(())
}

/// Execute ops in order, stopping at the first failure.
pub fn execute_ops(root: &Path, ops: &[Op]) -> Result<()> {
    for (index, op) in ops.iter().enumerate() {
        execute_op(root, op).with_context(|| format!("op #{} ({op}) failed", index + 1))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::component::{dir, remove, replace, write_file};
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_execute_op_dir() {
        let temp = TempDir::new().unwrap();

        execute_op(temp.path(), &dir("etc/test")).unwrap();

        assert!(temp.path().join("etc/test").is_dir());
    }

    #[test]
    fn test_execute_op_writefile() {
        let temp = TempDir::new().unwrap();

        execute_op(temp.path(), &write_file("config.txt", "hello world")).unwrap();

        assert_eq!(
            fs::read_to_string(temp.path().join("config.txt")).unwrap(),
            "hello world"
        );
    }

    #[test]
    fn test_execute_op_rejects_escape() {
        let temp = TempDir::new().unwrap();

        let result = execute_op(&temp.path().join("ws"), &write_file("../evil", "x"));

        assert!(result.is_err());
        assert!(!temp.path().join("evil").exists());
    }

    #[test]
    fn test_execute_ops_reports_failing_index() {
        let temp = TempDir::new().unwrap();
        let ops = vec![
            write_file("isolinux/isolinux.cfg", "timeout 600\n"),
            replace("isolinux/isolinux.cfg", "timeout 600", "timeout 10"),
            remove("does/not/exist"),
        ];

        let err = execute_ops(temp.path(), &ops).unwrap_err();

        assert!(err.to_string().contains("op #3"));
        assert_eq!(
            fs::read_to_string(temp.path().join("isolinux/isolinux.cfg")).unwrap(),
            "timeout 10\n"
        );
    }
}
