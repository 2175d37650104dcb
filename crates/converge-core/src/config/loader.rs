//! Layered configuration loader

use camino::{Utf8Path, Utf8PathBuf};
use serde::de::DeserializeOwned;
use std::env;
use std::fs;
use std::str::FromStr;

use super::HarnessConfig;
use crate::error::{Error, Result};

/// File name looked up in the config directory
pub const CONFIG_FILE_NAME: &str = "converge.yaml";

/// Loads [`HarnessConfig`] from defaults, a YAML file and the environment
pub struct ConfigLoader {
    /// Directory searched for `converge.yaml`
    config_dir: Utf8PathBuf,
    /// Explicit file that must exist, overriding the directory lookup
    explicit_file: Option<Utf8PathBuf>,
}

impl ConfigLoader {
    /// Create a loader for `CONVERGE_CONFIG_DIR`, or the working directory
    pub fn new() -> Result<Self> {
        let config_dir = match env::var("CONVERGE_CONFIG_DIR") {
            Ok(dir) => Utf8PathBuf::from(dir),
            Err(_) => {
                let cwd = env::current_dir()?;
                Utf8PathBuf::from_path_buf(cwd).map_err(|path| {
                    Error::invalid_config(format!(
                        "Working directory is not valid UTF-8: {}",
                        path.display()
                    ))
                })?
            }
        };
        Ok(Self::with_dir(config_dir))
    }

    /// Create a loader with a custom config directory
    pub fn with_dir(config_dir: impl Into<Utf8PathBuf>) -> Self {
        Self {
            config_dir: config_dir.into(),
            explicit_file: None,
        }
    }

    /// Create a loader for an explicit file; a missing file is an error
    pub fn with_file(path: impl Into<Utf8PathBuf>) -> Self {
        let path = path.into();
        let config_dir = path
            .parent()
            .map(Utf8Path::to_path_buf)
            .unwrap_or_default();
        Self {
            config_dir,
            explicit_file: Some(path),
        }
    }

    /// Load the configuration with layered precedence
    pub fn load(&self) -> Result<HarnessConfig> {
        let mut config = match &self.explicit_file {
            Some(path) => {
                if !path.exists() {
                    return Err(Error::config_not_found(path.as_str()));
                }
                Self::load_yaml_file(path)?
            }
            None => {
                let path = self.config_dir.join(CONFIG_FILE_NAME);
                if path.exists() {
                    Self::load_yaml_file(&path)?
                } else {
                    HarnessConfig::default()
                }
            }
        };

        Self::apply_env_overrides(&mut config)?;
        Self::validate(&config)?;
        tracing::debug!(config_dir = %self.config_dir, "loaded harness configuration");
        Ok(config)
    }

    /// Get the config directory path
    pub fn config_dir(&self) -> &Utf8Path {
        &self.config_dir
    }

    fn load_yaml_file<T: DeserializeOwned>(path: &Utf8Path) -> Result<T> {
        let content = fs::read_to_string(path)?;
        serde_yaml_ng::from_str(&content)
            .map_err(|e| Error::invalid_config(format!("Failed to parse {}: {}", path, e)))
    }

    fn validate(config: &HarnessConfig) -> Result<()> {
        if config.retry.max_attempts == 0 {
            return Err(Error::invalid_config("retry.max-attempts must be at least 1"));
        }
        Ok(())
    }

    fn apply_env_overrides(config: &mut HarnessConfig) -> Result<()> {
        if let Some(val) = parse_env::<u32>("CONVERGE_MAX_ATTEMPTS")? {
            config.retry.max_attempts = val;
        }

        if let Some(val) = parse_env::<u64>("CONVERGE_INITIAL_DELAY_MS")? {
            config.retry.initial_delay_ms = val;
        }

        if let Some(val) = parse_env::<u64>("CONVERGE_MAX_DELAY_MS")? {
            config.retry.max_delay_ms = val;
        }

        if let Some(val) = parse_env::<f64>("CONVERGE_BACKOFF_MULTIPLIER")? {
            config.retry.backoff_multiplier = val;
        }

        if let Ok(val) = env::var("CONVERGE_BASE_ORIGIN") {
            config.dispatch.base_origin = val;
        }

        if let Ok(val) = env::var("CONVERGE_DEFAULT_PASSWORD") {
            config.dispatch.default_password = val;
        }

        if let Some(val) = parse_env::<bool>("CONVERGE_GUEST_ACCESS")? {
            config.store.guest_access = val;
        }

        if let Ok(val) = env::var("CONVERGE_STORE_PREFIX") {
            config.store.name_prefix = val;
        }

        Ok(())
    }
}

fn parse_env<T: FromStr>(name: &str) -> Result<Option<T>> {
    match env::var(name) {
        Ok(val) => val
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| Error::invalid_config(format!("{} has an invalid value: {}", name, val))),
        Err(_) => Ok(None),
    }
}
