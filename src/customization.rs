//! The customization seam between the pipeline and OS-specific logic.
//!
//! A [`CustomizationStrategy`] receives the unpacked [`Workspace`] and the
//! target [`OperatingSystem`], mutates the tree, and says which images to
//! build from it. [`FileOpsCustomization`] is a declarative strategy built
//! from [`Op`] lists; closures work too:
//!
//! ```rust
//! use iso_maker::customization::{CustomizationStrategy, OutputArtifact};
//! use iso_maker::{OperatingSystem, Workspace};
//!
//! let strategy = |ws: &Workspace, _os: &OperatingSystem| -> anyhow::Result<Vec<OutputArtifact>> {
//!     std::fs::write(ws.join("ks.cfg"), "reboot\n")?;
//!     Ok(vec![OutputArtifact::tree("centos7-ks", ".")])
//! };
//! # fn takes(_: &dyn CustomizationStrategy) {}
//! # takes(&strategy);
//! ```

use std::path::PathBuf;

use anyhow::Result;
use tracing::info;

use crate::component::Op;
use crate::executor;
use crate::os::OperatingSystem;
use crate::workspace::Workspace;

/// What to pack for one output image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArtifactSource {
    /// A directory, packed as the image root.
    Tree(PathBuf),
    /// A single file, packed alone at the image root.
    File(PathBuf),
}

/// One image the pipeline must produce, named `<name>.iso`.
///
/// Relative source paths resolve against the workspace root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputArtifact {
    pub name: String,
    pub source: ArtifactSource,
}

impl OutputArtifact {
    pub fn tree(name: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            source: ArtifactSource::Tree(path.into()),
        }
    }

    pub fn file(name: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            source: ArtifactSource::File(path.into()),
        }
    }
}

/// OS-specific mutation of an unpacked image.
pub trait CustomizationStrategy {
    /// Mutate `workspace` and return the images to build, in order.
    fn apply(&self, workspace: &Workspace, os: &OperatingSystem) -> Result<Vec<OutputArtifact>>;
}

impl<F> CustomizationStrategy for F
where
    F: Fn(&Workspace, &OperatingSystem) -> Result<Vec<OutputArtifact>>,
{
    fn apply(&self, workspace: &Workspace, os: &OperatingSystem) -> Result<Vec<OutputArtifact>> {
        self(workspace, os)
    }
}

/// Applies a fixed list of ops, then emits a fixed list of artifacts.
#[derive(Debug, Clone, Default)]
pub struct FileOpsCustomization {
    ops: Vec<Op>,
    artifacts: Vec<OutputArtifact>,
}

impl FileOpsCustomization {
    pub fn new(ops: Vec<Op>, artifacts: Vec<OutputArtifact>) -> Self {
        Self { ops, artifacts }
    }

    pub fn ops(&self) -> &[Op] {
        &self.ops
    }

    pub fn artifacts(&self) -> &[OutputArtifact] {
        &self.artifacts
    }
}

impl CustomizationStrategy for FileOpsCustomization {
    fn apply(&self, workspace: &Workspace, os: &OperatingSystem) -> Result<Vec<OutputArtifact>> {
        executor::execute_ops(workspace.path(), &self.ops)?;
        info!(os = os.name(), ops = self.ops.len(), "applied customization ops");
        Ok(self.artifacts.clone())
    }
}
