use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use starcloud::{DEFAULT_CHUNK_SIZE, RunOptions, ValidateOptions};
use starcloud_client::{ClientConfig, RetryPolicy};
use tracing::warn;

/// Sentinel-2 MGRS tiles covering Germany.
pub const GERMAN_TILES: &[&str] = &[
    "31UFS", "31UFT", "31UGR", "31UGS", "31UGT", "31UGU", "31UGV", "32ULB", "32ULC", "32ULD",
    "32ULE", "32UME", "32UMF", "32TMT", "32TNT", "32TPT", "32TQT", "32UMA", "32UMU", "32UMV",
    "32UNA", "32UNB", "32UNC", "32UND", "32UNE", "32UNU", "32UNV", "32UPA", "32UPB", "32UPC",
    "32UPD", "32UPE", "32UPF", "32UPU", "32UPV", "32UQA", "32UQB", "32UQC", "32UQD", "32UQE",
    "32UQU", "32UQV", "33UUA", "33UUP", "33UUQ", "33UUR", "33UUS", "33UUT", "33UUU", "33UUV",
    "33UVA", "33UVS", "33UVT", "33UVU", "33UVV", "31UGQ", "32ULA", "32ULV", "32ULU", "32TLT",
    "32UMB", "32UMC", "32UMD", "32UNF", "33TUN", "33UVP", "33UVQ",
];

/// Top-level application configuration.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct AppConfig {
    /// API root; the production service when unset.
    pub base_url: Option<String>,
    /// Tile catalogue used by `validate` and `refill`.
    pub tiles: Vec<String>,
    pub chunk_size: usize,
    pub read_timeout_secs: u64,
    pub login_timeout_secs: u64,
    pub max_retries: u32,
    pub backoff_factor_ms: u64,
    /// Only files with this extension count as downloaded payload.
    pub payload_extension: String,
    pub manifest_cache: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            tiles: GERMAN_TILES.iter().map(|t| (*t).to_owned()).collect(),
            chunk_size: DEFAULT_CHUNK_SIZE,
            read_timeout_secs: 60,
            login_timeout_secs: 10,
            max_retries: 5,
            backoff_factor_ms: 1000,
            payload_extension: "tif".into(),
            manifest_cache: false,
        }
    }
}

impl AppConfig {
    pub fn client_config(&self) -> ClientConfig {
        ClientConfig {
            base_url: self.base_url.clone(),
            login_timeout: Duration::from_secs(self.login_timeout_secs),
            read_timeout: Duration::from_secs(self.read_timeout_secs),
            retry: RetryPolicy {
                max_retries: self.max_retries,
                backoff_factor: Duration::from_millis(self.backoff_factor_ms),
            },
        }
    }

    pub fn extension(&self) -> Option<&str> {
        let ext = self.payload_extension.trim();
        (!ext.is_empty()).then_some(ext)
    }

    pub fn run_options(&self, chunk_size: usize, strict: bool) -> RunOptions {
        RunOptions {
            chunk_size,
            manifest_cache: self.manifest_cache,
            strict,
        }
    }

    pub fn validate_options(&self) -> ValidateOptions {
        ValidateOptions {
            extension: self.extension().map(str::to_owned),
            manifest_cache: self.manifest_cache,
        }
    }
}

/// Config file path: `~/.config/starcloud/config.toml`
pub fn config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("starcloud").join("config.toml"))
}

/// Load config from `explicit` or the default path, falling back to defaults
/// if missing or unparsable.
pub fn load_config(explicit: Option<&Path>) -> AppConfig {
    let path = explicit.map(Path::to_path_buf).or_else(config_path);

    if let Some(path) = path
        && let Ok(contents) = std::fs::read_to_string(&path)
    {
        match toml::from_str::<AppConfig>(&contents) {
            Ok(config) => return config,
            Err(e) => warn!(
                path = %path.display(),
                error = %e,
                "failed to parse config, using defaults"
            ),
        }
    }

    AppConfig::default()
}
