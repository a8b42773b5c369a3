mod file_config;

pub use file_config::{FileConfig, GenerationConfig};

use anyhow::{bail, Result};
use std::path::PathBuf;
use std::time::Duration;

use crate::generation::{DEFAULT_MAX_POLL_DURATION, DEFAULT_POLL_INTERVAL};

/// CLI arguments that can be used for config resolution.
/// This struct mirrors the CLI arguments that can be overridden by TOML config.
#[derive(Debug, Clone, Default)]
pub struct CliConfig {
    pub backend_url: Option<String>,
    pub data_dir: Option<PathBuf>,
    pub timeout_sec: u64,
    pub language: Option<String>,
    pub poll_interval_sec: Option<u64>,
    pub max_poll_minutes: Option<u64>,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    // Core settings
    pub backend_url: String,
    pub data_dir: PathBuf,
    pub timeout_sec: u64,
    pub language: String,

    // Generation timing (with defaults)
    pub generation: GenerationSettings,
}

#[derive(Debug, Clone)]
pub struct GenerationSettings {
    pub poll_interval: Duration,
    pub max_poll_duration: Duration,
}

impl Default for GenerationSettings {
    fn default() -> Self {
        Self {
            poll_interval: DEFAULT_POLL_INTERVAL,
            max_poll_duration: DEFAULT_MAX_POLL_DURATION,
        }
    }
}

impl AppConfig {
    /// Resolve configuration from CLI arguments and optional TOML file config.
    /// TOML values override CLI values where present.
    pub fn resolve(cli: &CliConfig, file_config: Option<FileConfig>) -> Result<Self> {
        let file = file_config.unwrap_or_default();

        // TOML overrides CLI for each field
        let backend_url = file
            .backend_url
            .or_else(|| cli.backend_url.clone())
            .ok_or_else(|| {
                anyhow::anyhow!("backend_url must be specified via --backend-url or in config file")
            })?;

        if !backend_url.starts_with("http://") && !backend_url.starts_with("https://") {
            bail!("backend_url must start with http:// or https://: {}", backend_url);
        }

        let data_dir = file
            .data_dir
            .map(PathBuf::from)
            .or_else(|| cli.data_dir.clone())
            .ok_or_else(|| {
                anyhow::anyhow!("data_dir must be specified via --data-dir or in config file")
            })?;

        if data_dir.exists() && !data_dir.is_dir() {
            bail!("data_dir is not a directory: {:?}", data_dir);
        }
        std::fs::create_dir_all(&data_dir)?;

        let timeout_sec = file.timeout_sec.unwrap_or(cli.timeout_sec);
        let language = file
            .language
            .or_else(|| cli.language.clone())
            .unwrap_or_else(|| "en".to_string());

        // Generation timing - merge file config with defaults
        let gen_file = file.generation.unwrap_or_default();
        let poll_interval_sec = gen_file
            .poll_interval_sec
            .or(cli.poll_interval_sec)
            .unwrap_or(DEFAULT_POLL_INTERVAL.as_secs());
        let max_poll_minutes = gen_file
            .max_poll_minutes
            .or(cli.max_poll_minutes)
            .unwrap_or(DEFAULT_MAX_POLL_DURATION.as_secs() / 60);

        if poll_interval_sec == 0 {
            bail!("generation poll_interval_sec must be at least 1");
        }

        let generation = GenerationSettings {
            poll_interval: Duration::from_secs(poll_interval_sec),
            max_poll_duration: Duration::from_secs(max_poll_minutes * 60),
        };

        Ok(Self {
            backend_url,
            data_dir,
            timeout_sec,
            language,
            generation,
        })
    }

    pub fn state_db_path(&self) -> PathBuf {
        self.data_dir.join("state.db")
    }

    pub fn cache_db_path(&self) -> PathBuf {
        self.data_dir.join("media_cache.db")
    }
}
