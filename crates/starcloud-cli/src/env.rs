//! Process environment: `.env` credentials and the cluster task contract.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use starcloud::{PartitionSlice, TileYear};
use starcloud_client::Credentials;
use tracing::warn;

/// Merge `env_file` into the process environment. Variables that are
/// already set keep their value.
pub fn load_env_file(env_file: &Path) {
    if let Err(e) = dotenv::from_path(env_file) {
        warn!(path = %env_file.display(), error = %e, "could not read env file");
    }
}

/// Load `STAR_EMAIL` and `STAR_PASSWORD`, reading `env_file` first.
pub fn load_credentials(env_file: &Path) -> Result<Credentials> {
    load_env_file(env_file);
    credentials_from(|name| std::env::var(name).ok())
}

fn credentials_from(lookup: impl Fn(&str) -> Option<String>) -> Result<Credentials> {
    let email = required(&lookup, "STAR_EMAIL")?;
    let password = required(&lookup, "STAR_PASSWORD")?;
    Ok(Credentials::new(email, password))
}

fn required(lookup: &impl Fn(&str) -> Option<String>, name: &str) -> Result<String> {
    match lookup(name) {
        Some(value) if !value.is_empty() => Ok(value),
        _ => bail!("environment variable {name} must be set"),
    }
}

/// What one cluster array task has to do.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskEnv {
    pub root: PathBuf,
    pub pair: TileYear,
    pub slice: PartitionSlice,
    pub create_index: bool,
}

impl TaskEnv {
    pub fn from_env() -> Result<Self> {
        Self::parse(|name| std::env::var(name).ok())
    }

    /// Resolve the task's (tile, year) and file slice.
    ///
    /// Task `t` handles pair `t / split` of the row-major `tiles x years`
    /// product and slice `t % split` of that pair's pending files.
    pub fn parse(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let root = PathBuf::from(required(&lookup, "S_ROOT_DIR")?);

        let task: usize = required(&lookup, "SLURM_ARRAY_TASK_ID")?
            .trim()
            .parse()
            .context("SLURM_ARRAY_TASK_ID must be a non-negative integer")?;

        let tiles: Vec<String> = serde_json::from_str(&required(&lookup, "S_TILES")?)
            .context("S_TILES must be a JSON array of tile ids")?;
        let years: Vec<i32> = serde_json::from_str(&required(&lookup, "S_YEARS")?)
            .context("S_YEARS must be a JSON array of years")?;

        let split: usize = match lookup("S_SPLIT_FILES") {
            Some(raw) if !raw.trim().is_empty() => raw
                .trim()
                .parse()
                .context("S_SPLIT_FILES must be a positive integer")?,
            _ => 1,
        };
        if split == 0 {
            bail!("S_SPLIT_FILES must be a positive integer");
        }

        let pairs = TileYear::product(&tiles, &years);
        let Some(pair) = pairs.get(task / split).cloned() else {
            bail!(
                "task {task} is out of range: {} tiles x {} years x {split} slices = {} tasks",
                tiles.len(),
                years.len(),
                pairs.len() * split
            );
        };
        let slice = PartitionSlice::new(task % split, split)?;

        Ok(Self {
            root,
            pair,
            slice,
            create_index: is_enabled(lookup("S_CREATE_INDEX").as_deref()),
        })
    }
}

fn is_enabled(value: Option<&str>) -> bool {
    match value.map(str::trim) {
        None | Some("") => false,
        Some(v) => !(v == "0" || v.eq_ignore_ascii_case("false")),
    }
}
