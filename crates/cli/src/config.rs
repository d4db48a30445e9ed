//! Layered configuration: optional TOML file, then `FILELEDGER_*` variables.

use anyhow::{bail, Result};
use config::{Config, File as ConfigFile};
use fileledger_files::{LedgerConfig, DEFAULT_MAX_FIELD_LEN};
use std::path::{Path, PathBuf};

pub const DEFAULT_CONFIG_PATH: &str = "config/fileledger.toml";
pub const DEFAULT_DATA_DIR: &str = "./data/ledger";
const ENV_PREFIX: &str = "FILELEDGER";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    pub data_dir: PathBuf,
    pub log_level: String,
    pub log_format: String,
    pub max_field_len: usize,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from(DEFAULT_DATA_DIR),
            log_level: "info".to_string(),
            log_format: "pretty".to_string(),
            max_field_len: DEFAULT_MAX_FIELD_LEN,
        }
    }
}

impl AppConfig {
    /// Load from `config_path_override`, or from the default path when it
    /// exists, with environment variables applied on top.
    pub fn load(config_path_override: Option<&Path>) -> Result<Self> {
        let resolved_path = match config_path_override {
            Some(path) => {
                if !path.exists() {
                    bail!(
                        "Configuration file {} not found (specified via --config)",
                        path.display()
                    );
                }
                Some(path.to_path_buf())
            }
            None => {
                let path = PathBuf::from(DEFAULT_CONFIG_PATH);
                path.exists().then_some(path)
            }
        };

        let mut builder = Config::builder();
        if let Some(path) = &resolved_path {
            builder = builder.add_source(ConfigFile::from(path.as_path()));
        }
        builder = builder.add_source(config::Environment::with_prefix(ENV_PREFIX));
        let config = builder.build()?;

        Self::from_config(&config)
    }

    fn from_config(config: &Config) -> Result<Self> {
        let defaults = Self::default();

        let log_format = get_string_value(config, &["log_format"])
            .map(|value| value.to_ascii_lowercase())
            .unwrap_or(defaults.log_format);
        if log_format != "pretty" && log_format != "json" {
            bail!("Unsupported log_format {log_format:?} (expected \"pretty\" or \"json\")");
        }

        let max_field_len = match get_string_value(config, &["max_field_len"]) {
            Some(raw) => raw
                .parse::<usize>()
                .map_err(|e| anyhow::anyhow!("Invalid max_field_len {raw:?}: {e}"))?,
            None => defaults.max_field_len,
        };
        if max_field_len == 0 {
            bail!("max_field_len must be greater than zero");
        }

        Ok(Self {
            data_dir: get_string_value(config, &["data_dir"])
                .map(PathBuf::from)
                .unwrap_or(defaults.data_dir),
            log_level: get_string_value(config, &["log_level"]).unwrap_or(defaults.log_level),
            log_format,
            max_field_len,
        })
    }

    pub fn ledger_config(&self) -> LedgerConfig {
        LedgerConfig {
            max_field_len: self.max_field_len,
        }
    }
}

fn get_string_value(config: &Config, keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|key| {
        config
            .get_string(key)
            .ok()
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
    })
}
