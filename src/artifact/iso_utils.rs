//! ISO tool wrappers shared by every operating system family.
//!
//! These functions never parse ISO9660 themselves; they invoke the external
//! tools through a [`CommandRunner`] and validate what comes back:
//!
//! - [`unpack_iso`] - `7z` extraction into a fresh [`Workspace`]
//! - [`read_iso_label`] - `isoinfo` volume id lookup
//! - [`implant_iso_md5`] / [`check_iso_md5`] - embedded MD5 stamp and check
//! - [`write_sha256_sidecar`] - `<iso>.sha256` for download verification

use std::fs::{self, File};
use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};
use tracing::{debug, info};

use crate::error::{IsoError, Result};
use crate::process::{Cmd, CommandRunner};
use crate::workspace::Workspace;

/// Separator between hash and filename, as `sha256sum -c` expects.
const CHECKSUM_SEPARATOR: &str = "  ";

/// Extract an ISO into a new workspace under the system temp directory.
///
/// Fails with [`IsoError::ExtractionFailed`] when `7z` exits successfully
/// but leaves the workspace empty. The workspace is released before any
/// error is returned.
pub fn unpack_iso(runner: &CommandRunner, iso: &Path) -> Result<Workspace> {
    unpack_iso_in(runner, iso, &std::env::temp_dir())
}

/// [`unpack_iso`] with an explicit parent directory for the workspace.
pub fn unpack_iso_in(runner: &CommandRunner, iso: &Path, parent: &Path) -> Result<Workspace> {
    require_file(iso)?;
    runner.ensure_available("7z")?;

    let workspace = Workspace::create_in(parent)?;

    // 7z takes the output directory glued to -o, no space.
    Cmd::new("7z")
        .args(["x", "-y"])
        .arg_path(iso)
        .arg_prefixed_path("-o", workspace.path())
        .run(runner)?;

    if workspace.is_empty()? {
        return Err(IsoError::ExtractionFailed(iso.to_path_buf()));
    }

    info!(
        iso = %iso.display(),
        workspace = %workspace.path().display(),
        files = workspace.file_count(),
        "unpacked ISO"
    );
    Ok(workspace)
}

/// Read the volume label of an ISO image with `isoinfo -d`.
pub fn read_iso_label(runner: &CommandRunner, iso: &Path) -> Result<String> {
    require_file(iso)?;
    runner.ensure_available("isoinfo")?;

    let output = Cmd::new("isoinfo")
        .args(["-d", "-i"])
        .arg_path(iso)
        .run(runner)?;

    let label =
        parse_volume_id(&output.stdout).ok_or_else(|| IsoError::LabelNotFound(iso.to_path_buf()))?;
    debug!(iso = %iso.display(), label = %label, "read ISO label");
    Ok(label)
}

/// Extract the volume label from `isoinfo -d` output.
///
/// Grammar: the first line of the form `Volume id: <label>`, where the key
/// is matched case-insensitively, any whitespace may surround the key, the
/// colon and the label, and the trimmed label is non-empty. Lines such as
/// `Volume set id:` do not match. Returns `None` when no line qualifies.
pub fn parse_volume_id(output: &str) -> Option<String> {
    output.lines().find_map(|line| {
        let (key, value) = line.split_once(':')?;
        let mut words = key.split_whitespace();
        let is_volume_id = matches!(
            (words.next(), words.next(), words.next()),
            (Some(first), Some(second), None)
                if first.eq_ignore_ascii_case("volume") && second.eq_ignore_ascii_case("id")
        );
        let label = value.trim();
        (is_volume_id && !label.is_empty()).then(|| label.to_string())
    })
}

/// Stamp an MD5 checksum into the image with `implantisomd5 --force`.
///
/// `--force` lets an already-stamped image be stamped again.
pub fn implant_iso_md5(runner: &CommandRunner, iso: &Path) -> Result<()> {
    runner.ensure_available("implantisomd5")?;
    Cmd::new("implantisomd5")
        .arg("--force")
        .arg_path(iso)
        .run(runner)?;
    info!(iso = %iso.display(), "implanted MD5 checksum");
    Ok(())
}

/// Verify the embedded MD5 checksum with `checkisomd5`.
pub fn check_iso_md5(runner: &CommandRunner, iso: &Path) -> Result<()> {
    runner.ensure_available("checkisomd5")?;
    Cmd::new("checkisomd5").arg_path(iso).run(runner)?;
    info!(iso = %iso.display(), "embedded MD5 checksum verified");
    Ok(())
}

/// Write `<iso>.sha256` next to a local image.
///
/// Uses just the filename (not the full path) so the file can be checked
/// with `cd <dir> && sha256sum -c <iso>.sha256`.
pub fn write_sha256_sidecar(iso: &Path) -> Result<PathBuf> {
    require_file(iso)?;
    let (hash, _size) = sha256_file(iso)?;

    let filename = iso
        .file_name()
        .ok_or_else(|| IsoError::InvalidInput(format!("'{}' has no filename", iso.display())))?
        .to_string_lossy();

    let mut sidecar = iso.as_os_str().to_owned();
    sidecar.push(".sha256");
    let sidecar = PathBuf::from(sidecar);

    fs::write(&sidecar, format!("{hash}{CHECKSUM_SEPARATOR}{filename}\n"))
        .map_err(|e| IsoError::io(format!("writing '{}'", sidecar.display()), e))?;

    info!(sha256 = %format!("{}...{}", &hash[..8], &hash[hash.len() - 8..]), path = %sidecar.display(), "wrote checksum");
    Ok(sidecar)
}

/// Hex SHA-256 and byte length of a file.
pub(crate) fn sha256_file(path: &Path) -> Result<(String, u64)> {
    let file = File::open(path)
        .map_err(|e| IsoError::io(format!("opening '{}'", path.display()), e))?;
    let mut reader = BufReader::new(file);
    let mut hasher = Sha256::new();
    let mut buf = vec![0u8; 1024 * 1024];
    let mut size = 0u64;
    loop {
        let n = reader
            .read(&mut buf)
            .map_err(|e| IsoError::io(format!("reading '{}'", path.display()), e))?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
        size += n as u64;
    }
    Ok((format!("{:x}", hasher.finalize()), size))
}

fn require_file(path: &Path) -> Result<()> {
    if path.is_file() {
        Ok(())
    } else {
        Err(IsoError::InvalidInput(format!(
            "'{}' is not an existing file",
            path.display()
        )))
    }
}
