//! Batch manifest (spec section 6): a YAML list of download jobs, each run
//! through the same pipeline as a single `download --url` invocation.

use std::path::Path;

use modfetch_fs::PlaceMode;
use serde::Deserialize;

#[derive(Debug, thiserror::Error)]
pub enum ManifestError {
    #[error("failed to read batch manifest {path}: {source}")]
    Read { path: std::path::PathBuf, source: std::io::Error },

    #[error("failed to parse batch manifest {path}: {source}")]
    Parse { path: std::path::PathBuf, source: serde_yaml::Error },

    #[error("unsupported manifest version {0}, expected 1")]
    UnsupportedVersion(u32),
}

pub type Result<T> = std::result::Result<T, ManifestError>;

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Manifest {
    pub version: u32,
    pub jobs: Vec<Job>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Job {
    pub uri: String,
    #[serde(default)]
    pub dest: Option<String>,
    #[serde(default)]
    pub sha256: Option<String>,
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
    #[serde(default)]
    pub place: bool,
    #[serde(default)]
    pub mode: Option<PlaceMode>,
}

impl Manifest {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ManifestError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let manifest: Manifest =
            serde_yaml::from_str(&text).map_err(|source| ManifestError::Parse {
                path: path.to_path_buf(),
                source,
            })?;
        if manifest.version != 1 {
            return Err(ManifestError::UnsupportedVersion(manifest.version));
        }
        Ok(manifest)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_minimal_job() {
        let yaml = "version: 1\njobs:\n  - uri: hf://org/repo/file.bin\n";
        let manifest: Manifest = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(manifest.jobs.len(), 1);
        assert_eq!(manifest.jobs[0].uri, "hf://org/repo/file.bin");
        assert!(manifest.jobs[0].dest.is_none());
    }

    #[test]
    fn parses_full_job() {
        let yaml = r#"
version: 1
jobs:
  - uri: civitai://model/1?version=2
    dest: /models/x.safetensors
    sha256: deadbeef
    type: safetensors
    place: true
    mode: hardlink
"#;
        let manifest: Manifest = serde_yaml::from_str(yaml).unwrap();
        let job = &manifest.jobs[0];
        assert_eq!(job.dest.as_deref(), Some("/models/x.safetensors"));
        assert_eq!(job.mode, Some(PlaceMode::Hardlink));
        assert!(job.place);
    }

    #[test]
    fn rejects_unknown_fields() {
        let yaml = "version: 1\njobs:\n  - uri: https://x\n    bogus: true\n";
        assert!(serde_yaml::from_str::<Manifest>(yaml).is_err());
    }

    #[test]
    fn rejects_unsupported_version() {
        let yaml = "version: 2\njobs: []\n";
        let err = Manifest::load_from_str(yaml).unwrap_err();
        assert!(matches!(err, ManifestError::UnsupportedVersion(2)));
    }
}

#[cfg(test)]
impl Manifest {
    fn load_from_str(yaml: &str) -> Result<Self> {
        let manifest: Manifest = serde_yaml::from_str(yaml).map_err(|source| ManifestError::Parse {
            path: std::path::PathBuf::from("<test>"),
            source,
        })?;
        if manifest.version != 1 {
            return Err(ManifestError::UnsupportedVersion(manifest.version));
        }
        Ok(manifest)
    }
}
