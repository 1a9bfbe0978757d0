//! The unpack → customize → pack orchestrator.
//!
//! A [`Pipeline`] is bound to one [`OperatingSystem`], one [`CommandRunner`]
//! and one [`IsoPacker`]. Each [`Pipeline::customize`] call walks
//!
//! ```text
//! Idle → Unpacking → Customizing → Packing{1..N} → Done
//!          └────────────┴──────────────┴──────────→ Failed
//! ```
//!
//! strictly in sequence. The workspace created by the unpack step is
//! released before `customize` returns, whichever way it returns. Packing
//! is fail-fast: the first artifact that cannot be packed aborts the rest,
//! and images already written by earlier artifacts stay on disk.

mod lock;
mod stage;

pub use stage::Stage;

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, info, info_span, warn};

use crate::artifact::filesystem::resolve_within;
use crate::artifact::iso::IsoPacker;
use crate::artifact::iso_utils::{implant_iso_md5, read_iso_label, unpack_iso_in};
use crate::customization::{ArtifactSource, CustomizationStrategy, OutputArtifact};
use crate::error::{IsoError, Result};
use crate::manifest::RunManifest;
use crate::os::OperatingSystem;
use crate::process::CommandRunner;
use crate::workspace::Workspace;

/// Knobs for a [`Pipeline`].
#[derive(Debug, Clone)]
pub struct PipelineOptions {
    /// Directory receiving `<artifact>.iso` files. Created if missing.
    pub output_dir: PathBuf,

    /// Parent for workspaces; the system temp directory when `None`.
    pub work_dir: Option<PathBuf>,

    /// Stamp an MD5 checksum into each image right after packing it.
    pub implant_md5: bool,

    /// Write a JSON run manifest into `output_dir` after success.
    pub write_manifest: bool,
}

impl PipelineOptions {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
            work_dir: None,
            implant_md5: false,
            write_manifest: false,
        }
    }
}

pub struct Pipeline {
    os: OperatingSystem,
    runner: CommandRunner,
    packer: Box<dyn IsoPacker>,
    options: PipelineOptions,
}

impl Pipeline {
    pub fn new(
        os: OperatingSystem,
        runner: CommandRunner,
        packer: Box<dyn IsoPacker>,
        options: PipelineOptions,
    ) -> Self {
        Self {
            os,
            runner,
            packer,
            options,
        }
    }

    pub fn os(&self) -> &OperatingSystem {
        &self.os
    }

    pub fn runner(&self) -> &CommandRunner {
        &self.runner
    }

    pub fn options(&self) -> &PipelineOptions {
        &self.options
    }

    /// Volume label of the descriptor's source image.
    pub fn source_label(&self) -> Result<String> {
        read_iso_label(&self.runner, self.source_iso()?)
    }

    /// Unpack the source image, hand it to `strategy`, and pack every
    /// artifact it returns.
    ///
    /// Returns the produced image paths in the order the strategy listed
    /// the artifacts. There is no partial success: either every artifact is
    /// packed or an error is returned.
    pub fn customize(&self, strategy: &dyn CustomizationStrategy) -> Result<Vec<PathBuf>> {
        let span = info_span!("customize", os = self.os.name(), backend = self.runner.backend().name());
        let _guard = span.enter();
        debug!(stage = %Stage::Idle, output = %self.options.output_dir.display(), "starting customization");

        let result = self.run(strategy);
        match &result {
            Ok(produced) => info!(stage = %Stage::Done, images = produced.len(), "customization finished"),
            Err(err) => warn!(stage = %Stage::Failed, error = %err, "customization failed"),
        }
        result
    }

    fn run(&self, strategy: &dyn CustomizationStrategy) -> Result<Vec<PathBuf>> {
        let source = self.source_iso()?;
        let work_parent = self.work_parent();

        info!(stage = %Stage::Unpacking, iso = %source.display());
        // Dropping `workspace` on any early return below removes it.
        let mut workspace = unpack_iso_in(&self.runner, source, &work_parent)?;

        info!(stage = %Stage::Customizing, workspace = %workspace.path().display());
        let artifacts = strategy
            .apply(&workspace, &self.os)
            .map_err(IsoError::CustomizationFailed)?;
        validate_artifact_names(&artifacts)?;

        let _output_lock = if artifacts.is_empty() {
            None
        } else {
            fs::create_dir_all(&self.options.output_dir).map_err(|e| {
                IsoError::io(
                    format!(
                        "creating output directory '{}'",
                        self.options.output_dir.display()
                    ),
                    e,
                )
            })?;
            Some(lock::lock_output_dir(&self.options.output_dir)?)
        };

        let total = artifacts.len();
        let mut produced = Vec::with_capacity(total);
        for (index, artifact) in artifacts.iter().enumerate() {
            let stage = Stage::Packing {
                index: index + 1,
                total,
            };
            let target = self.options.output_dir.join(format!("{}.iso", artifact.name));
            info!(stage = %stage, artifact = %artifact.name, target = %target.display());

            self.pack_artifact(&workspace, &work_parent, artifact, &target)?;
            if self.options.implant_md5 {
                implant_iso_md5(&self.runner, &target).map_err(|e| as_packing(&target, e))?;
            }
            produced.push((artifact.name.clone(), target));
        }

        if self.options.write_manifest && !produced.is_empty() {
            let manifest = RunManifest::collect(&self.os, &produced)?;
            let path = manifest.write(&self.options.output_dir)?;
            info!(manifest = %path.display(), "wrote run manifest");
        }

        workspace.release()?;
        Ok(produced.into_iter().map(|(_, path)| path).collect())
    }

    fn pack_artifact(
        &self,
        workspace: &Workspace,
        work_parent: &Path,
        artifact: &OutputArtifact,
        target: &Path,
    ) -> Result<()> {
        match &artifact.source {
            ArtifactSource::Tree(tree) => {
                let tree = resolve_source(workspace, tree).map_err(|e| as_packing(target, e))?;
                if !tree.is_dir() {
                    return Err(IsoError::packing(
                        target,
                        IsoError::InvalidInput(format!("'{}' is not a directory", tree.display())),
                    ));
                }
                self.packer
                    .pack(&self.runner, &tree, target)
                    .map_err(|e| as_packing(target, e))
            }
            ArtifactSource::File(file) => {
                let file = resolve_source(workspace, file).map_err(|e| as_packing(target, e))?;
                let staging = stage_single_file(work_parent, &file).map_err(|e| as_packing(target, e))?;
                self.packer
                    .pack(&self.runner, staging.path(), target)
                    .map_err(|e| as_packing(target, e))
            }
        }
    }

    fn source_iso(&self) -> Result<&Path> {
        self.os.source_iso().ok_or_else(|| {
            IsoError::InvalidInput(format!(
                "operating system '{}' has no source ISO",
                self.os.name()
            ))
        })
    }

    fn work_parent(&self) -> PathBuf {
        self.options
            .work_dir
            .clone()
            .unwrap_or_else(std::env::temp_dir)
    }
}

/// Copy `file` alone into a fresh scratch workspace.
fn stage_single_file(work_parent: &Path, file: &Path) -> Result<Workspace> {
    if !file.is_file() {
        return Err(IsoError::InvalidInput(format!(
            "'{}' is not a file",
            file.display()
        )));
    }
    let name = file
        .file_name()
        .ok_or_else(|| IsoError::InvalidInput(format!("'{}' has no filename", file.display())))?;
    let staging = Workspace::create_in(work_parent)?;
    fs::copy(file, staging.join(name))
        .map_err(|e| IsoError::io(format!("staging '{}'", file.display()), e))?;
    Ok(staging)
}

fn resolve_source(workspace: &Workspace, source: &Path) -> Result<PathBuf> {
    if source.is_absolute() {
        Ok(source.to_path_buf())
    } else {
        resolve_within(workspace.path(), source)
    }
}

fn validate_artifact_names(artifacts: &[OutputArtifact]) -> Result<()> {
    let mut seen = HashSet::new();
    for artifact in artifacts {
        let name = artifact.name.as_str();
        if name.trim().is_empty()
            || name.contains('/')
            || name.contains('\\')
            || name.contains("..")
        {
            return Err(IsoError::InvalidInput(format!(
                "artifact name '{name}' must be a plain file stem"
            )));
        }
        if !seen.insert(name) {
            return Err(IsoError::InvalidInput(format!(
                "artifact name '{name}' is used twice"
            )));
        }
    }
    Ok(())
}

fn as_packing(target: &Path, err: IsoError) -> IsoError {
    match err {
        err @ IsoError::PackingFailed { .. } => err,
        other => IsoError::packing(target, other),
    }
}
