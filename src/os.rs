//! Operating system descriptor targeted by a pipeline run.

use std::fmt;
use std::path::{Path, PathBuf};

use serde::Deserialize;

/// Word size of the installed system.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
pub enum Bitness {
    #[serde(alias = "32", alias = "x86", alias = "i386")]
    X86,
    #[serde(alias = "64", alias = "x64", alias = "amd64", alias = "x86_64")]
    X64,
}

impl Bitness {
    pub fn bits(self) -> u8 {
        match self {
            Bitness::X86 => 32,
            Bitness::X64 => 64,
        }
    }
}

impl fmt::Display for Bitness {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}bit", self.bits())
    }
}

/// Which base image and word size a run targets. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OperatingSystem {
    name: String,
    bitness: Bitness,
    source_iso: Option<PathBuf>,
}

impl OperatingSystem {
    pub fn new(name: impl Into<String>, bitness: Bitness, source_iso: Option<PathBuf>) -> Self {
        Self {
            name: name.into(),
            bitness,
            source_iso,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn bitness(&self) -> Bitness {
        self.bitness
    }

    pub fn source_iso(&self) -> Option<&Path> {
        self.source_iso.as_deref()
    }
}
