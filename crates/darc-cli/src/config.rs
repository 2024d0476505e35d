use std::path::{Path, PathBuf};

use anyhow::Context;
use darc_store::FsStoreConfig;
use serde::{Deserialize, Serialize};

/// Name of the config file picked up from the working directory.
pub const DEFAULT_CONFIG_FILE: &str = "darc.toml";

/// Store directory used when neither flag nor config names one.
pub const DEFAULT_STORE_DIR: &str = ".darc";

/// Settings read from `darc.toml`.
///
/// ```toml
/// store = "/var/lib/darc"
/// session = "nightly-import"
///
/// [fs]
/// sync_on_write = true
/// ```
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CliConfig {
    pub store: Option<PathBuf>,
    pub session: Option<String>,
    pub fs: FsStoreConfig,
}

impl CliConfig {
    pub fn from_toml(text: &str) -> anyhow::Result<Self> {
        toml::from_str(text).context("invalid configuration")
    }

    /// Load `path`, or `./darc.toml` if it exists, or defaults.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let path = match path {
            Some(path) => path.to_path_buf(),
            None => {
                let default = PathBuf::from(DEFAULT_CONFIG_FILE);
                if !default.is_file() {
                    return Ok(Self::default());
                }
                default
            }
        };
        let text = std::fs::read_to_string(&path)
            .with_context(|| format!("cannot read config {}", path.display()))?;
        Self::from_toml(&text).with_context(|| format!("in {}", path.display()))
    }

    /// Apply command-line overrides.
    pub fn merge(mut self, store: Option<PathBuf>, session: Option<String>) -> Self {
        if store.is_some() {
            self.store = store;
        }
        if session.is_some() {
            self.session = session;
        }
        self
    }

    pub fn store_dir(&self) -> PathBuf {
        self.store
            .clone()
            .unwrap_or_else(|| PathBuf::from(DEFAULT_STORE_DIR))
    }
}
