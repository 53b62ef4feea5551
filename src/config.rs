use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{anyhow, Context};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::retry::RetryPolicy;
use crate::Result;

pub const CONFIG_FOLDER: &str = "avatar-picker";
pub const CONFIG_FILE: &str = "config.toml";
pub const SESSION_FILE: &str = "session.json";

const DEFAULT_GENERATOR_URL: &str = "https://api.multiavatar.com";
const DEFAULT_GENERATOR_SEED: &str = "45678945";
const DEFAULT_SET_AVATAR_URL: &str = "http://localhost:5000/api/auth/setavatar";
pub const DEFAULT_CANDIDATE_COUNT: usize = 4;
const DEFAULT_MAX_RETRIES: u32 = 3;
const DEFAULT_INITIAL_BACKOFF_MS: u64 = 300;

/// Settings of the avatar page.
///
/// Persisted as TOML. Every field is optional in the file, missing ones
/// fall back to [`Config::default`].
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    /// Base of the avatar generator, the seed and a random number are
    /// appended as path segments.
    pub generator_url: Url,
    pub generator_seed: String,
    /// Base of the backend endpoint, the user id is appended.
    pub set_avatar_url: Url,
    /// How many candidates are offered on one page.
    pub candidate_count: usize,
    pub max_retries: u32,
    pub initial_backoff_ms: u64,
    /// Where the session user lives. Defaults to a file next to the config.
    pub session_file: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            generator_url: Url::parse(DEFAULT_GENERATOR_URL)
                .expect("default generator url is valid"),
            generator_seed: DEFAULT_GENERATOR_SEED.to_owned(),
            set_avatar_url: Url::parse(DEFAULT_SET_AVATAR_URL)
                .expect("default backend url is valid"),
            candidate_count: DEFAULT_CANDIDATE_COUNT,
            max_retries: DEFAULT_MAX_RETRIES,
            initial_backoff_ms: DEFAULT_INITIAL_BACKOFF_MS,
            session_file: None,
        }
    }
}

impl Config {
    /// Platform config directory, e.g. `$XDG_CONFIG_HOME/avatar-picker`
    /// on Linux.
    pub fn config_dir() -> Result<PathBuf> {
        let base = dirs::config_dir()
            .ok_or_else(|| anyhow!("Unable to determine config directory"))?;
        Ok(base.join(CONFIG_FOLDER))
    }

    pub fn default_path() -> Result<PathBuf> {
        Ok(Self::config_dir()?.join(CONFIG_FILE))
    }

    /// Loads the configuration from `path`. If the file does not exist,
    /// returns a default configuration.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            log::debug!(
                "no config at {}, using defaults",
                path.display()
            );
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path).with_context(|| {
            format!("Failed to read config file: {}", path.display())
        })?;
        let config: Config = toml::from_str(&content)?;
        config.validate()?;

        Ok(config)
    }

    /// Saves the configuration, creating the parent directory if needed.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir).with_context(|| {
                format!("Failed to create config directory: {}", dir.display())
            })?;
        }

        let content = toml::to_string_pretty(self)
            .with_context(|| "Failed to serialize config")?;
        fs::write(path, content).with_context(|| {
            format!("Failed to write config file: {}", path.display())
        })?;

        Ok(())
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(
            self.max_retries,
            Duration::from_millis(self.initial_backoff_ms),
        )
    }

    /// Session file location, falling back to the config directory.
    pub fn session_path(&self) -> Result<PathBuf> {
        match &self.session_file {
            Some(path) => Ok(path.clone()),
            None => Ok(Self::config_dir()?.join(SESSION_FILE)),
        }
    }

    fn validate(&self) -> Result<()> {
        if self.candidate_count == 0 {
            return Err(anyhow!("candidate_count must be at least 1").into());
        }
        if self.generator_seed.is_empty() {
            return Err(anyhow!("generator_seed must not be empty").into());
        }
        Ok(())
    }
}
