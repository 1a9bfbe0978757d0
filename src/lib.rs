//! Unpack, customize and repack operating system installation ISOs.
//!
//! The crate turns a stock installation image into one or more customized
//! bootable images (unattended installs, injected answer files, edited boot
//! menus). Every external tool runs through a [`CommandRunner`], which is
//! bound either to the local host or to a caller-supplied remote channel, so
//! the same pipeline drives a workstation build and a build box over SSH.
//!
//! - **Process execution** - [`CommandRunner`], tool lookup, deadlines
//! - **Artifacts** - unpacking, volume labels, MD5 implanting, packing
//! - **Customization** - the [`CustomizationStrategy`] seam and declarative ops
//! - **Pipeline** - the unpack → customize → pack orchestrator
//! - **Preflight checks** - tool validation before a run
//!
//! # Architecture
//!
//! ```text
//! Pipeline::customize
//!     │
//!     ├── unpack_iso_in ──────► Workspace (temp dir, released on every path)
//!     ├── CustomizationStrategy::apply ──► Vec<OutputArtifact>
//!     └── for each artifact (sequential, fail-fast)
//!             ├── IsoPacker::pack ──► <output_dir>/<name>.iso
//!             └── implant_iso_md5 (optional)
//!
//! all tools ──► CommandRunner ──► Local | Remote(Arc<dyn RemoteExecutor>)
//! ```
//!
//! # Example
//!
//! ```rust,no_run
//! use iso_maker::artifact::iso::{IsoOptions, XorrisoPacker};
//! use iso_maker::component::write_file;
//! use iso_maker::customization::{FileOpsCustomization, OutputArtifact};
//! use iso_maker::{Bitness, CommandRunner, OperatingSystem, Pipeline, PipelineOptions};
//!
//! let os = OperatingSystem::new("centos7", Bitness::X64, Some("CentOS-7.iso".into()));
//! let packer = XorrisoPacker::new(IsoOptions::hybrid(
//!     "CENTOS7",
//!     "isolinux/isolinux.bin",
//!     "images/efiboot.img",
//! ))?;
//! let pipeline = Pipeline::new(os, CommandRunner::local(), Box::new(packer), PipelineOptions::new("out"));
//!
//! let strategy = FileOpsCustomization::new(
//!     vec![write_file("ks.cfg", "text\nreboot\n")],
//!     vec![OutputArtifact::tree("centos7-unattended", ".")],
//! );
//! let images = pipeline.customize(&strategy)?;
//! # Ok::<(), iso_maker::IsoError>(())
//! ```

pub mod artifact;
pub mod component;
pub mod config;
pub mod customization;
pub mod error;
pub mod executor;
pub mod manifest;
pub mod os;
pub mod pipeline;
pub mod preflight;
pub mod process;
pub mod workspace;

pub use artifact::iso::{IsoOptions, IsoPacker, XorrisoPacker};
pub use config::IsoMakerConfig;
pub use customization::{ArtifactSource, CustomizationStrategy, OutputArtifact};
pub use error::{IsoError, Result};
pub use os::{Bitness, OperatingSystem};
pub use pipeline::{Pipeline, PipelineOptions};
pub use process::{CommandRunner, ExecutionBackend, RemoteExecutor};
pub use workspace::Workspace;
