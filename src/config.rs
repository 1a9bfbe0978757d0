//! TOML run configuration for the `iso-maker` CLI.
//!
//! One file describes one run: which image to start from, where commands
//! execute, which ops to apply and which images to pack. Relative paths in
//! the file resolve against the directory containing it.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;

use crate::artifact::iso::{IsoOptions, XorrisoPacker};
use crate::component::Op;
use crate::customization::{FileOpsCustomization, OutputArtifact};
use crate::error::{IsoError, Result};
use crate::os::{Bitness, OperatingSystem};
use crate::pipeline::PipelineOptions;
use crate::process::{CommandRunner, RemoteExecutor};

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ConfigToml {
    os: OsToml,
    #[serde(default)]
    execution: ExecutionToml,
    output: OutputToml,
    pack: PackToml,
    #[serde(default)]
    ops: Vec<Op>,
    #[serde(default)]
    artifacts: Vec<ArtifactToml>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct OsToml {
    name: String,
    bitness: Bitness,
    source_iso: PathBuf,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct ExecutionToml {
    backend: Option<String>,
    ssh_destination: Option<String>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct OutputToml {
    dir: PathBuf,
    work_dir: Option<PathBuf>,
    #[serde(default)]
    implant_md5: bool,
    #[serde(default)]
    write_manifest: bool,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct PackToml {
    label: String,
    bios_boot_image: Option<PathBuf>,
    boot_catalog: Option<PathBuf>,
    efi_boot_image: Option<PathBuf>,
    #[serde(default)]
    hybrid_gpt: bool,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ArtifactToml {
    name: String,
    tree: Option<PathBuf>,
    file: Option<PathBuf>,
}

/// Where a configured run executes its tools.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendConfig {
    Local,
    /// Over SSH to `destination` (`user@host`).
    Remote { destination: String },
}

/// A validated run configuration.
#[derive(Debug, Clone)]
pub struct IsoMakerConfig {
    path: PathBuf,
    os: OperatingSystem,
    backend: BackendConfig,
    timeout: Option<Duration>,
    pipeline: PipelineOptions,
    pack: IsoOptions,
    ops: Vec<Op>,
    artifacts: Vec<OutputArtifact>,
}

impl IsoMakerConfig {
    /// Read and validate the config file at `path`.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path)
            .map_err(|e| IsoError::io(format!("reading config '{}'", path.display()), e))?;
        let base_dir = path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        Self::parse(&text, path, base_dir)
    }

    /// Parse `text` as if it were read from `path`; relative paths resolve
    /// against `base_dir`.
    pub fn parse(text: &str, path: &Path, base_dir: &Path) -> Result<Self> {
        let invalid = |message: String| IsoError::Config {
            path: path.to_path_buf(),
            message,
        };

        let parsed: ConfigToml = toml::from_str(text).map_err(|e| invalid(e.to_string()))?;

        let name = parsed.os.name.trim();
        if name.is_empty() {
            return Err(invalid("os.name must not be empty".into()));
        }
        let os = OperatingSystem::new(
            name,
            parsed.os.bitness,
            Some(resolve(base_dir, &parsed.os.source_iso)),
        );

        let execution = parsed.execution;
        let backend_kind = execution
            .backend
            .as_deref()
            .map(|b| b.trim().to_ascii_lowercase())
            .unwrap_or_else(|| "local".to_string());
        let destination = execution
            .ssh_destination
            .map(|d| d.trim().to_string())
            .filter(|d| !d.is_empty());
        let backend = match (backend_kind.as_str(), destination) {
            ("local", None) => BackendConfig::Local,
            ("local", Some(_)) => {
                return Err(invalid(
                    "execution.ssh_destination is only valid with backend = \"remote\"".into(),
                ))
            }
            ("remote", Some(destination)) => BackendConfig::Remote { destination },
            ("remote", None) => {
                return Err(invalid(
                    "execution.ssh_destination is required with backend = \"remote\"".into(),
                ))
            }
            (other, _) => {
                return Err(invalid(format!(
                    "unsupported execution.backend '{other}' (expected 'local' or 'remote')"
                )))
            }
        };
        let timeout = match execution.timeout_secs {
            Some(0) => return Err(invalid("execution.timeout_secs must be positive".into())),
            Some(secs) => Some(Duration::from_secs(secs)),
            None => None,
        };

        let pipeline = PipelineOptions {
            output_dir: resolve(base_dir, &parsed.output.dir),
            work_dir: parsed.output.work_dir.map(|w| resolve(base_dir, &w)),
            implant_md5: parsed.output.implant_md5,
            write_manifest: parsed.output.write_manifest,
        };

        let mut pack = IsoOptions::data(parsed.pack.label);
        pack.bios_boot_image = parsed.pack.bios_boot_image;
        pack.efi_boot_image = parsed.pack.efi_boot_image;
        pack.hybrid_gpt = parsed.pack.hybrid_gpt;
        if let Some(catalog) = parsed.pack.boot_catalog {
            pack.boot_catalog = catalog;
        }
        pack.validate().map_err(|e| invalid(e.to_string()))?;

        let ops = parsed
            .ops
            .into_iter()
            .map(|op| match op {
                Op::CopyFile { from, to } => Op::CopyFile {
                    from: resolve(base_dir, &from),
                    to,
                },
                Op::CopyTree { from, to } => Op::CopyTree {
                    from: resolve(base_dir, &from),
                    to,
                },
                other => other,
            })
            .collect();

        let artifacts = parsed
            .artifacts
            .into_iter()
            .map(|artifact| match (artifact.tree, artifact.file) {
                (Some(tree), None) => Ok(OutputArtifact::tree(artifact.name, tree)),
                (None, Some(file)) => Ok(OutputArtifact::file(artifact.name, file)),
                _ => Err(invalid(format!(
                    "artifact '{}' must set exactly one of 'tree' or 'file'",
                    artifact.name
                ))),
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            path: path.to_path_buf(),
            os,
            backend,
            timeout,
            pipeline,
            pack,
            ops,
            artifacts,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn os(&self) -> &OperatingSystem {
        &self.os
    }

    pub fn backend(&self) -> &BackendConfig {
        &self.backend
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    pub fn pipeline_options(&self) -> &PipelineOptions {
        &self.pipeline
    }

    pub fn pack_options(&self) -> &IsoOptions {
        &self.pack
    }

    /// Build the runner; `connect` turns an SSH destination into an executor.
    pub fn runner<F>(&self, connect: F) -> CommandRunner
    where
        F: FnOnce(&str) -> Arc<dyn RemoteExecutor>,
    {
        let runner = match &self.backend {
            BackendConfig::Local => CommandRunner::local(),
            BackendConfig::Remote { destination } => CommandRunner::remote(connect(destination)),
        };
        match self.timeout {
            Some(timeout) => runner.with_timeout(timeout),
            None => runner,
        }
    }

    pub fn packer(&self) -> Result<XorrisoPacker> {
        XorrisoPacker::new(self.pack.clone())
    }

    pub fn strategy(&self) -> FileOpsCustomization {
        FileOpsCustomization::new(self.ops.clone(), self.artifacts.clone())
    }

    /// Tools a `customize` run with this config calls, with package hints.
    pub fn required_tools(&self) -> Vec<(&'static str, &'static str)> {
        let mut tools = vec![("7z", "p7zip-full"), ("xorriso", "xorriso")];
        if self.pipeline.implant_md5 {
            tools.push(("implantisomd5", "isomd5sum"));
        }
        tools
    }
}

fn resolve(base_dir: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base_dir.join(path)
    }
}
