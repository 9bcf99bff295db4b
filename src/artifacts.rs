//! Local artifact area for uploaded and rendered images.
//!
//! Artifacts are written once under a flat directory and referenced from
//! reports by name only. Names are restricted so a reference can never
//! escape the directory.

use anyhow::{anyhow, Context, Result};
use rand::RngCore;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

pub const DEFAULT_ARTIFACT_DIR: &str = "uploads";

/// Prefix of the annotated copy of an upload.
pub const DETECTED_PREFIX: &str = "detected_";

#[derive(Clone, Debug)]
pub struct ArtifactConfig {
    pub local_path: PathBuf,
}

impl Default for ArtifactConfig {
    fn default() -> Self {
        Self {
            local_path: PathBuf::from(DEFAULT_ARTIFACT_DIR),
        }
    }
}

/// Handle to a written artifact.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ArtifactRef {
    /// Name recorded in reports.
    pub name: String,
    /// Where the bytes live, for collaborators that read files.
    pub path: PathBuf,
}

pub trait ArtifactStore: Send + Sync {
    /// Write `bytes` under `name`. Existing artifacts are never overwritten.
    fn put(&self, name: &str, bytes: &[u8]) -> Result<ArtifactRef>;
}

/// Fresh upload name: 32 random hex chars plus the given extension.
pub fn unique_name(extension: &str) -> String {
    let mut bytes = [0u8; 16];
    rand::thread_rng().fill_bytes(&mut bytes);
    format!("{}.{}", hex::encode(bytes), extension)
}

pub fn detected_name(original: &str) -> String {
    format!("{}{}", DETECTED_PREFIX, original)
}

pub fn validate_artifact_name(name: &str) -> Result<()> {
    static NAME_RE: OnceLock<regex::Regex> = OnceLock::new();
    let re = NAME_RE.get_or_init(|| {
        regex::Regex::new(r"^[A-Za-z0-9_][A-Za-z0-9_.-]{0,127}$").expect("artifact name regex")
    });
    if !re.is_match(name) || name.contains("..") {
        return Err(anyhow!(
            "artifact name must match ^[A-Za-z0-9_][A-Za-z0-9_.-]{{0,127}}$ without '..'"
        ));
    }
    Ok(())
}

pub struct FilesystemArtifactStore {
    root: PathBuf,
}

impl FilesystemArtifactStore {
    pub fn new(cfg: ArtifactConfig) -> Result<Self> {
        fs::create_dir_all(&cfg.local_path)
            .with_context(|| format!("create artifact dir {}", cfg.local_path.display()))?;
        Ok(Self {
            root: cfg.local_path,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl ArtifactStore for FilesystemArtifactStore {
    fn put(&self, name: &str, bytes: &[u8]) -> Result<ArtifactRef> {
        validate_artifact_name(name)?;
        let path = self.root.join(name);
        if path.exists() {
            return Err(anyhow!("artifact {} already exists", name));
        }
        write_atomic(&path, bytes).with_context(|| format!("write artifact {}", name))?;
        Ok(ArtifactRef {
            name: name.to_string(),
            path,
        })
    }
}

fn write_atomic(path: &Path, data: &[u8]) -> Result<()> {
    let mut tmp_name = path.as_os_str().to_owned();
    tmp_name.push(".tmp");
    let tmp_path = PathBuf::from(tmp_name);
    {
        let mut file = File::create(&tmp_path)?;
        file.write_all(data)?;
        file.sync_all()?;
    }
    fs::rename(tmp_path, path)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn put_writes_bytes_and_refuses_overwrite() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let store = FilesystemArtifactStore::new(ArtifactConfig {
            local_path: dir.path().join("uploads"),
        })?;

        let artifact = store.put("a1.jpg", b"jpeg bytes")?;
        assert_eq!(artifact.name, "a1.jpg");
        assert_eq!(fs::read(&artifact.path)?, b"jpeg bytes");
        assert!(!store.root().join("a1.jpg.tmp").exists());
        assert!(store.put("a1.jpg", b"other").is_err());
        Ok(())
    }

    #[test]
    fn names_cannot_escape_the_directory() {
        for bad in ["", "../x.jpg", "a/b.jpg", ".hidden", "a..jpg", "x y.png"] {
            assert!(validate_artifact_name(bad).is_err(), "{bad:?} accepted");
        }
        assert!(validate_artifact_name("detected_0f3a.png").is_ok());
    }

    #[test]
    fn generated_names_are_unique_and_valid() {
        let a = unique_name("jpg");
        let b = unique_name("jpg");
        assert_ne!(a, b);
        assert!(a.ends_with(".jpg"));
        assert!(validate_artifact_name(&detected_name(&a)).is_ok());
    }
}
