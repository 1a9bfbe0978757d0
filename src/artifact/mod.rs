//! ISO-level operations.
//!
//! - [`iso_utils`] - unpack, label, checksum implant/verify (shared by all OS families)
//! - [`iso`] - the [`IsoPacker`](iso::IsoPacker) variant point and the xorriso packer
//! - [`filesystem`] - tree copying and path containment helpers

pub mod filesystem;
pub mod iso;
pub mod iso_utils;
