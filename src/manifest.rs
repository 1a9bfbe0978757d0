//! JSON record of a finished customization run.

use std::fs;
use std::path::{Path, PathBuf};

use serde::Serialize;
use time::OffsetDateTime;

use crate::artifact::iso_utils::sha256_file;
use crate::error::{IsoError, Result};
use crate::os::OperatingSystem;

pub const MANIFEST_FILENAME: &str = "iso-maker-manifest.json";

#[derive(Debug, Clone, Serialize)]
pub struct RunManifest {
    pub os_name: String,
    pub bitness: u8,
    pub source_iso: Option<PathBuf>,
    pub created_at_utc: String,
    pub artifacts: Vec<ManifestEntry>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ManifestEntry {
    pub name: String,
    pub path: PathBuf,
    pub size_bytes: u64,
    pub sha256: String,
}

impl RunManifest {
    /// Describe `produced` images, hashing each one.
    pub fn collect(os: &OperatingSystem, produced: &[(String, PathBuf)]) -> Result<Self> {
        let artifacts = produced
            .iter()
            .map(|(name, path)| {
                let (sha256, size_bytes) = sha256_file(path)?;
                Ok(ManifestEntry {
                    name: name.clone(),
                    path: path.clone(),
                    size_bytes,
                    sha256,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            os_name: os.name().to_string(),
            bitness: os.bitness().bits(),
            source_iso: os.source_iso().map(Path::to_path_buf),
            created_at_utc: now_utc_rfc3339(),
            artifacts,
        })
    }

    /// Write the manifest into `output_dir` and return its path.
    pub fn write(&self, output_dir: &Path) -> Result<PathBuf> {
        let path = output_dir.join(MANIFEST_FILENAME);
        let bytes = serde_json::to_vec_pretty(self).map_err(|e| {
            IsoError::io(
                format!("serializing manifest '{}'", path.display()),
                e.into(),
            )
        })?;
        fs::write(&path, bytes)
            .map_err(|e| IsoError::io(format!("writing manifest '{}'", path.display()), e))?;
        Ok(path)
    }
}

fn now_utc_rfc3339() -> String {
    let now = OffsetDateTime::now_utc();
    format!(
        "{:04}-{:02}-{:02}T{:02}:{:02}:{:02}Z",
        now.year(),
        now.month() as u8,
        now.day(),
        now.hour(),
        now.minute(),
        now.second()
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::os::Bitness;
    use tempfile::TempDir;

    #[test]
    fn test_manifest_records_hash_and_size() {
        let temp = TempDir::new().unwrap();
        let iso = temp.path().join("a.iso");
        fs::write(&iso, b"abc").unwrap();
        let os = OperatingSystem::new("debian", Bitness::X64, Some(PathBuf::from("/srv/d.iso")));

        let manifest = RunManifest::collect(&os, &[("a".to_string(), iso.clone())]).unwrap();
        let path = manifest.write(temp.path()).unwrap();

        let parsed: serde_json::Value =
            serde_json::from_slice(&fs::read(&path).unwrap()).unwrap();
        assert_eq!(parsed["os_name"], "debian");
        assert_eq!(parsed["bitness"], 64);
        assert_eq!(parsed["artifacts"][0]["size_bytes"], 3);
        assert_eq!(
            parsed["artifacts"][0]["sha256"],
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
        assert!(parsed["created_at_utc"].as_str().unwrap().ends_with('Z'));
    }
}
