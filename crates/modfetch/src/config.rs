//! Typed settings record loaded from TOML, with environment overrides for
//! the two documented token variables (spec section 6: "Configuration
//! surface (recognized options)").
//!
//! Library crates never read configuration themselves; the binary loads
//! [`Settings`] once and threads the pieces each component needs down
//! through its own narrow argument list.

use std::path::{Path, PathBuf};
use std::time::Duration;

use modfetch_fs::PlaceMode;
use serde::{Deserialize, Serialize};

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read { path: PathBuf, source: std::io::Error },

    #[error("failed to parse config file {path}: {source}")]
    Parse { path: PathBuf, source: toml::de::Error },

    #[error("general.data_root and general.download_root are required")]
    MissingRequired,
}

pub type Result<T> = std::result::Result<T, ConfigError>;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    pub general: GeneralSettings,
    #[serde(default)]
    pub network: NetworkSettings,
    #[serde(default)]
    pub concurrency: ConcurrencySettings,
    #[serde(default)]
    pub sources: SourcesSettings,
    #[serde(default)]
    pub resolver: ResolverSettings,
    #[serde(default)]
    pub metrics: MetricsSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneralSettings {
    pub data_root: PathBuf,
    pub download_root: PathBuf,
    #[serde(default)]
    pub partials_root: Option<PathBuf>,
    #[serde(default)]
    pub placement_mode: PlaceMode,
    #[serde(default)]
    pub allow_overwrite: bool,
    #[serde(default = "default_true")]
    pub stage_partials: bool,
    #[serde(default)]
    pub always_no_resume: bool,
    /// Artifact kind -> target directories for `place`/`download --place`
    /// (see [`crate::targets`]); unlisted kinds fall back to a
    /// `<download_root>/<kind>/` convention.
    #[serde(default)]
    pub app_dirs: crate::targets::AppDirs,
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkSettings {
    pub timeout_seconds: u64,
    pub max_redirects: usize,
    pub tls_verify: bool,
    pub user_agent: String,
}

impl Default for NetworkSettings {
    fn default() -> Self {
        Self {
            timeout_seconds: 30,
            max_redirects: 10,
            tls_verify: true,
            user_agent: concat!("modfetch/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

impl NetworkSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BackoffSettings {
    pub min_ms: u64,
    pub max_ms: u64,
    pub jitter: bool,
}

impl Default for BackoffSettings {
    fn default() -> Self {
        Self {
            min_ms: 200,
            max_ms: 4_000,
            jitter: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ConcurrencySettings {
    pub global_files: usize,
    pub per_file_chunks: u32,
    pub per_host_requests: usize,
    pub chunk_size_mb: u64,
    pub max_retries: u32,
    pub backoff: BackoffSettings,
}

impl Default for ConcurrencySettings {
    fn default() -> Self {
        Self {
            global_files: 4,
            per_file_chunks: 8,
            per_host_requests: 4,
            chunk_size_mb: 8,
            max_retries: 5,
            backoff: BackoffSettings::default(),
        }
    }
}

impl ConcurrencySettings {
    pub fn chunk_size_bytes(&self) -> u64 {
        self.chunk_size_mb.max(1) * 1024 * 1024
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceSettings {
    pub enabled: bool,
    pub token_env: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SourcesSettings {
    pub huggingface: SourceSettings,
    pub civitai: SourceSettings,
}

impl Default for SourcesSettings {
    fn default() -> Self {
        Self {
            huggingface: SourceSettings {
                enabled: true,
                token_env: "HF_TOKEN".to_string(),
            },
            civitai: SourceSettings {
                enabled: true,
                token_env: "CIVITAI_TOKEN".to_string(),
            },
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ResolverSettings {
    pub cache_ttl_hours: u64,
}

impl Default for ResolverSettings {
    fn default() -> Self {
        Self { cache_ttl_hours: 24 }
    }
}

impl ResolverSettings {
    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_hours * 3600)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PrometheusTextfileSettings {
    pub enabled: bool,
    pub path: Option<PathBuf>,
}

impl Default for PrometheusTextfileSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            path: None,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricsSettings {
    pub prometheus_textfile: PrometheusTextfileSettings,
}

impl Settings {
    /// Load from a TOML file at `path`. Unlike the batch manifest loader,
    /// unknown top-level keys are accepted (forward-compatible config);
    /// spec section 6 only mandates strictness for the batch manifest.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// The huggingface token, read from the environment variable named by
    /// `sources.huggingface.token_env`.
    pub fn hf_token_env(&self) -> &str {
        &self.sources.huggingface.token_env
    }

    pub fn civitai_token_env(&self) -> &str {
        &self.sources.civitai.token_env
    }

    /// `general.data_root/state.db`, per spec section 6's state store
    /// location.
    pub fn state_db_path(&self) -> PathBuf {
        self.general.data_root.join("state.db")
    }
}
