//! The local and remote backends must agree on what a tool run produces.
//!
//! Both sides run the same stand-in `isoinfo` and `7z` scripts: the local
//! backend spawns them directly, the remote one hands its quoted command line
//! to a loopback `sh -c`.

#![cfg(unix)]

use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::Arc;

use anyhow::bail;
use iso_maker::artifact::iso_utils::{read_iso_label, unpack_iso_in};
use iso_maker::{CommandRunner, IsoError, RemoteExecutor, Workspace};
use tempfile::TempDir;
use walkdir::WalkDir;

const ISOINFO: &str = r#"#!/bin/sh
echo "CD-ROM is in ISO 9660 format"
echo "System id: LINUX"
if [ -s "$3" ]; then
    echo "Volume id: Debian 12 amd64"
fi
echo "Volume set id: "
"#;

const SEVEN_Z: &str = r#"#!/bin/sh
iso="$3"
out="${4#-o}"
if [ -s "$iso" ]; then
    mkdir -p "$out/isolinux" "$out/install.amd"
    echo "default install" > "$out/isolinux/isolinux.cfg"
    echo "kernel" > "$out/install.amd/vmlinuz"
fi
echo "Everything is Ok"
"#;

/// Runs command lines through the local shell, as an SSH host would.
struct Loopback;

impl RemoteExecutor for Loopback {
    fn execute(&self, command_line: &str) -> anyhow::Result<String> {
        let output = Command::new("sh").arg("-c").arg(command_line).output()?;
        if !output.status.success() {
            bail!(
                "{}: {}",
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            );
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    fn name(&self) -> &str {
        "loopback"
    }
}

fn install_script(bin: &Path, name: &str, body: &str) {
    let path = bin.join(name);
    fs::write(&path, body).unwrap();
    fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
}

fn relative_files(workspace: &Workspace) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = WalkDir::new(workspace.path())
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_file())
        .map(|entry| {
            entry
                .path()
                .strip_prefix(workspace.path())
                .unwrap()
                .to_path_buf()
        })
        .collect();
    files.sort();
    files
}

// One test function: it rewrites PATH for the whole process.
#[test]
fn test_local_and_remote_backends_agree() {
    let temp = TempDir::new().unwrap();
    let bin = temp.path().join("bin");
    fs::create_dir_all(&bin).unwrap();
    install_script(&bin, "isoinfo", ISOINFO);
    install_script(&bin, "7z", SEVEN_Z);

    let path = std::env::var("PATH").unwrap_or_default();
    std::env::set_var("PATH", format!("{}:{path}", bin.display()));

    let media = temp.path().join("install media");
    fs::create_dir_all(&media).unwrap();
    let iso = media.join("debian 12.iso");
    fs::write(&iso, "not really iso9660").unwrap();
    let blank = media.join("blank.iso");
    fs::write(&blank, "").unwrap();
    let work = temp.path().join("work");
    fs::create_dir_all(&work).unwrap();

    let local = CommandRunner::local();
    let remote = CommandRunner::remote(Arc::new(Loopback));

    let local_label = read_iso_label(&local, &iso).unwrap();
    let remote_label = read_iso_label(&remote, &iso).unwrap();
    assert_eq!(local_label, "Debian 12 amd64");
    assert_eq!(local_label, remote_label);

    assert!(matches!(
        read_iso_label(&local, &blank),
        Err(IsoError::LabelNotFound(_))
    ));
    assert!(matches!(
        read_iso_label(&remote, &blank),
        Err(IsoError::LabelNotFound(_))
    ));

    let mut local_ws = unpack_iso_in(&local, &iso, &work).unwrap();
    let mut remote_ws = unpack_iso_in(&remote, &iso, &work).unwrap();
    assert_ne!(local_ws.path(), remote_ws.path());
    assert_eq!(local_ws.file_count(), 2);
    assert_eq!(relative_files(&local_ws), relative_files(&remote_ws));
    assert_eq!(
        fs::read_to_string(local_ws.join("isolinux/isolinux.cfg")).unwrap(),
        fs::read_to_string(remote_ws.join("isolinux/isolinux.cfg")).unwrap()
    );
    local_ws.release().unwrap();
    remote_ws.release().unwrap();

    for runner in [&local, &remote] {
        match unpack_iso_in(runner, &blank, &work) {
            Err(IsoError::ExtractionFailed(path)) => assert_eq!(path, blank),
            other => panic!("{}: expected ExtractionFailed, got {other:?}", runner.backend().name()),
        }
    }
    assert_eq!(fs::read_dir(&work).unwrap().count(), 0);
}
