//! Declarative file operations applied to an unpacked ISO tree.
//!
//! Ops describe WHAT to change in the workspace; the [`executor`](crate::executor)
//! performs them. Answer files (kickstart, preseed, `autounattend.xml`) and
//! boot menu edits are expressed as ops so the CLI can customize images
//! without any Rust code.
//!
//! # Example
//!
//! ```rust
//! use iso_maker::component::{replace, write_file, Op};
//!
//! let ops: Vec<Op> = vec![
//!     write_file("ks.cfg", "text\nreboot\n"),
//!     replace("isolinux/isolinux.cfg", "timeout 600", "timeout 10"),
//! ];
//! assert_eq!(ops.len(), 2);
//! ```
//!
//! Workspace paths are always relative; the executor rejects anything that
//! would leave the workspace.

use std::fmt;
use std::path::PathBuf;

use serde::Deserialize;

/// A single change to the workspace tree.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case", deny_unknown_fields)]
pub enum Op {
    // ─────────────────────────────────────────────────────────────────────
    // Directory operations
    // ─────────────────────────────────────────────────────────────────────
    /// Create a directory (uses create_dir_all).
    Dir { path: String },

    /// Create a directory with specific permissions (mode as octal, e.g., 0o755).
    DirMode { path: String, mode: u32 },

    // ─────────────────────────────────────────────────────────────────────
    // File operations
    // ─────────────────────────────────────────────────────────────────────
    /// Write a file with given content, replacing any existing file.
    WriteFile { path: String, content: String },

    /// Write a file with specific permissions (mode as octal).
    WriteFileMode {
        path: String,
        content: String,
        mode: u32,
    },

    /// Copy a host file into the workspace.
    CopyFile { from: PathBuf, to: String },

    /// Copy a host directory tree into the workspace.
    CopyTree { from: PathBuf, to: String },

    /// Delete a file or directory tree. Missing paths are an error.
    Remove { path: String },

    /// Replace every occurrence of `from` with `to` in a text file.
    ///
    /// Fails when `from` does not occur, so a changed upstream boot menu is
    /// noticed instead of silently producing an unmodified image.
    Replace {
        path: String,
        from: String,
        to: String,
    },
}

impl Op {
    /// Workspace path the op writes to.
    pub fn target(&self) -> &str {
        match self {
            Op::Dir { path }
            | Op::DirMode { path, .. }
            | Op::WriteFile { path, .. }
            | Op::WriteFileMode { path, .. }
            | Op::Remove { path }
            | Op::Replace { path, .. } => path,
            Op::CopyFile { to, .. } | Op::CopyTree { to, .. } => to,
        }
    }
}

impl fmt::Display for Op {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Op::Dir { path } => write!(f, "dir {path}"),
            Op::DirMode { path, mode } => write!(f, "dir {path} ({mode:o})"),
            Op::WriteFile { path, .. } => write!(f, "write {path}"),
            Op::WriteFileMode { path, mode, .. } => write!(f, "write {path} ({mode:o})"),
            Op::CopyFile { from, to } => write!(f, "copy {} -> {to}", from.display()),
            Op::CopyTree { from, to } => write!(f, "copy tree {} -> {to}", from.display()),
            Op::Remove { path } => write!(f, "remove {path}"),
            Op::Replace { path, .. } => write!(f, "edit {path}"),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Helper functions for readable op lists
// ─────────────────────────────────────────────────────────────────────────────

/// Create a directory.
pub fn dir(path: impl Into<String>) -> Op {
    Op::Dir { path: path.into() }
}

/// Create a directory with specific mode.
pub fn dir_mode(path: impl Into<String>, mode: u32) -> Op {
    Op::DirMode {
        path: path.into(),
        mode,
    }
}

/// Write a file.
pub fn write_file(path: impl Into<String>, content: impl Into<String>) -> Op {
    Op::WriteFile {
        path: path.into(),
        content: content.into(),
    }
}

/// Write a file with permissions.
pub fn write_file_mode(path: impl Into<String>, content: impl Into<String>, mode: u32) -> Op {
    Op::WriteFileMode {
        path: path.into(),
        content: content.into(),
        mode,
    }
}

/// Copy a host file into the workspace.
pub fn copy_file(from: impl Into<PathBuf>, to: impl Into<String>) -> Op {
    Op::CopyFile {
        from: from.into(),
        to: to.into(),
    }
}

/// Copy a host directory into the workspace.
pub fn copy_tree(from: impl Into<PathBuf>, to: impl Into<String>) -> Op {
    Op::CopyTree {
        from: from.into(),
        to: to.into(),
    }
}

/// Remove a path.
pub fn remove(path: impl Into<String>) -> Op {
    Op::Remove { path: path.into() }
}

/// Edit a text file in place.
pub fn replace(path: impl Into<String>, from: impl Into<String>, to: impl Into<String>) -> Op {
    Op::Replace {
        path: path.into(),
        from: from.into(),
        to: to.into(),
    }
}
