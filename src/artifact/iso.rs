//! Bootable ISO packing.
//!
//! Packing rules differ per operating system family (isolinux vs. GRUB vs.
//! Windows `etfsboot.com`), so they sit behind the [`IsoPacker`] trait.
//! [`XorrisoPacker`] covers the common El Torito layouts through
//! [`IsoOptions`]; families with stranger needs implement the trait.

use std::path::{Path, PathBuf};

use tracing::info;

use crate::error::{IsoError, Result};
use crate::process::{Cmd, CommandRunner};

/// ISO9660 volume identifiers are at most 32 characters.
pub const MAX_LABEL_LEN: usize = 32;

/// Builds exactly one bootable image from a directory tree.
pub trait IsoPacker: Send + Sync {
    /// Pack `source_tree` into a new image at `target`.
    ///
    /// Implementations fail with [`IsoError::PackingFailed`].
    fn pack(&self, runner: &CommandRunner, source_tree: &Path, target: &Path) -> Result<()>;
}

/// Options for [`XorrisoPacker`].
///
/// Boot image paths are relative to the tree being packed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IsoOptions {
    /// Volume label; installers often locate their media by it.
    pub label: String,

    /// BIOS El Torito boot image (e.g. `isolinux/isolinux.bin`).
    pub bios_boot_image: Option<PathBuf>,

    /// Boot catalog written alongside the BIOS image.
    ///
    /// Default: `boot.cat`
    pub boot_catalog: PathBuf,

    /// UEFI El Torito image (e.g. `images/efiboot.img`).
    pub efi_boot_image: Option<PathBuf>,

    /// Add a GPT so the image also boots when written to a USB stick.
    pub hybrid_gpt: bool,
}

impl IsoOptions {
    /// Options for a data-only image (no boot records), e.g. an answer-file disc.
    pub fn data(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            bios_boot_image: None,
            boot_catalog: PathBuf::from("boot.cat"),
            efi_boot_image: None,
            hybrid_gpt: false,
        }
    }

    /// Options for a BIOS + UEFI bootable image.
    pub fn hybrid(
        label: impl Into<String>,
        bios_boot_image: impl Into<PathBuf>,
        efi_boot_image: impl Into<PathBuf>,
    ) -> Self {
        Self {
            bios_boot_image: Some(bios_boot_image.into()),
            efi_boot_image: Some(efi_boot_image.into()),
            ..Self::data(label)
        }
    }

    pub fn validate(&self) -> Result<()> {
        let label = self.label.trim();
        if label.is_empty() {
            return Err(IsoError::InvalidInput("ISO label must not be empty".into()));
        }
        if label.chars().count() > MAX_LABEL_LEN {
            return Err(IsoError::InvalidInput(format!(
                "ISO label '{}' is longer than {} characters",
                label, MAX_LABEL_LEN
            )));
        }
        for image in [&self.bios_boot_image, &self.efi_boot_image]
            .into_iter()
            .flatten()
            .chain(std::iter::once(&self.boot_catalog))
        {
            if image.is_absolute() {
                return Err(IsoError::InvalidInput(format!(
                    "boot image path '{}' must be relative to the packed tree",
                    image.display()
                )));
            }
        }
        Ok(())
    }
}

/// Packs trees with `xorriso -as mkisofs`.
#[derive(Debug, Clone)]
pub struct XorrisoPacker {
    options: IsoOptions,
}

impl XorrisoPacker {
    pub fn new(options: IsoOptions) -> Result<Self> {
        options.validate()?;
        Ok(Self { options })
    }

    pub fn options(&self) -> &IsoOptions {
        &self.options
    }

    /// The full command line for packing `source_tree` into `target`.
    pub fn command(&self, source_tree: &Path, target: &Path) -> Cmd {
        let opts = &self.options;
        let mut cmd = Cmd::new("xorriso")
            .args(["-as", "mkisofs", "-o"])
            .arg_path(target)
            .args(["-V", opts.label.trim()])
            .args(["-J", "-joliet-long", "-R"]);

        if let Some(bios) = &opts.bios_boot_image {
            cmd = cmd
                .arg("-b")
                .arg_path(bios)
                .arg("-c")
                .arg_path(&opts.boot_catalog)
                .args(["-no-emul-boot", "-boot-load-size", "4", "-boot-info-table"]);
        }

        if let Some(efi) = &opts.efi_boot_image {
            if opts.bios_boot_image.is_some() {
                cmd = cmd.arg("-eltorito-alt-boot");
            }
            cmd = cmd.arg("-e").arg_path(efi).arg("-no-emul-boot");
        }

        if opts.hybrid_gpt {
            cmd = cmd.arg("-isohybrid-gpt-basdat");
        }

        cmd.arg_path(source_tree)
    }
}

impl IsoPacker for XorrisoPacker {
    fn pack(&self, runner: &CommandRunner, source_tree: &Path, target: &Path) -> Result<()> {
        let fail = |source| IsoError::packing(target, source);

        if !source_tree.is_dir() {
            return Err(fail(IsoError::InvalidInput(format!(
                "source tree '{}' is not a directory",
                source_tree.display()
            ))));
        }
        for image in [&self.options.bios_boot_image, &self.options.efi_boot_image]
            .into_iter()
            .flatten()
        {
            if !source_tree.join(image).is_file() {
                return Err(fail(IsoError::InvalidInput(format!(
                    "boot image '{}' is missing from '{}'",
                    image.display(),
                    source_tree.display()
                ))));
            }
        }

        runner.ensure_available("xorriso").map_err(fail)?;

        // A stale image at the target would satisfy the existence check below.
        if target.exists() {
            std::fs::remove_file(target)
                .map_err(|e| fail(IsoError::io(format!("removing stale '{}'", target.display()), e)))?;
        }
        self.command(source_tree, target).run(runner).map_err(fail)?;

        if !target.is_file() {
            return Err(fail(IsoError::InvalidInput(format!(
                "xorriso reported success but '{}' was not written",
                target.display()
            ))));
        }

        info!(label = %self.options.label, target = %target.display(), "packed ISO");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_data_image_command() {
        let packer = XorrisoPacker::new(IsoOptions::data("OEMDRV")).unwrap();
        let cmd = packer.command(Path::new("/w/tree"), Path::new("/out/ks.iso"));
        assert_eq!(
            cmd.argv().join(" "),
            "xorriso -as mkisofs -o /out/ks.iso -V OEMDRV -J -joliet-long -R /w/tree"
        );
    }

    #[test]
    fn test_hybrid_image_command() {
        let mut options = IsoOptions::hybrid("CENTOS7", "isolinux/isolinux.bin", "images/efiboot.img");
        options.boot_catalog = PathBuf::from("isolinux/boot.cat");
        options.hybrid_gpt = true;
        let packer = XorrisoPacker::new(options).unwrap();

        let argv = packer
            .command(Path::new("/w"), Path::new("/out/c7.iso"))
            .argv()
            .join(" ");

        assert!(argv.contains(
            "-b isolinux/isolinux.bin -c isolinux/boot.cat -no-emul-boot -boot-load-size 4 -boot-info-table"
        ));
        assert!(argv.contains("-eltorito-alt-boot -e images/efiboot.img -no-emul-boot"));
        assert!(argv.ends_with("-isohybrid-gpt-basdat /w"));
    }

    #[test]
    fn test_efi_only_image_has_no_alt_boot() {
        let mut options = IsoOptions::data("WIN10");
        options.efi_boot_image = Some(PathBuf::from("efi/microsoft/boot/efisys.bin"));
        let packer = XorrisoPacker::new(options).unwrap();

        let argv = packer.command(Path::new("/w"), Path::new("/o.iso")).argv().join(" ");
        assert!(!argv.contains("-eltorito-alt-boot"));
        assert!(argv.contains("-e efi/microsoft/boot/efisys.bin -no-emul-boot"));
    }

    #[test]
    fn test_label_validation() {
        assert!(IsoOptions::data("  ").validate().is_err());
        assert!(IsoOptions::data("A".repeat(33)).validate().is_err());
        assert!(IsoOptions::data("A".repeat(32)).validate().is_ok());

        let mut options = IsoOptions::data("X");
        options.bios_boot_image = Some(PathBuf::from("/abs/isolinux.bin"));
        assert!(matches!(options.validate(), Err(IsoError::InvalidInput(_))));
    }

    #[test]
    fn test_missing_boot_image_is_packing_failed() {
        let temp = TempDir::new().unwrap();
        let tree = temp.path().join("tree");
        fs::create_dir_all(&tree).unwrap();
        let packer =
            XorrisoPacker::new(IsoOptions::hybrid("X", "isolinux/isolinux.bin", "efi.img")).unwrap();
        let target = temp.path().join("out.iso");

        let result = packer.pack(&CommandRunner::local(), &tree, &target);

        assert!(matches!(result, Err(IsoError::PackingFailed { target: t, .. }) if t == target));
    }
}
