use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use url::Url;

/// Main configuration structure
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub propmedia: PropmediaConfig,
    pub storage: StorageConfig,
    #[serde(default)]
    pub upload: UploadConfig,
    #[serde(default)]
    pub storage_server: StorageServerConfig,
}

/// Core settings
#[derive(Debug, Clone, Deserialize)]
pub struct PropmediaConfig {
    pub db_path: PathBuf,
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

/// Remote storage function that receives uploads
#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    /// Absolute URL of the upload function; `?path=` is appended per file.
    pub function_url: String,
    /// Name of the environment variable holding a bearer token, if the
    /// function requires one.
    #[serde(default)]
    pub api_key_env: Option<String>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

/// Upload batching
#[derive(Debug, Clone, Deserialize)]
pub struct UploadConfig {
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            batch_size: default_batch_size(),
        }
    }
}

/// Local storage endpoint (development stand-in for the storage function)
#[derive(Debug, Clone, Deserialize)]
pub struct StorageServerConfig {
    #[serde(default = "default_server_port")]
    pub port: u16,
    #[serde(default = "default_storage_root")]
    pub root: PathBuf,
    #[serde(default = "default_public_base_url")]
    pub public_base_url: String,
    #[serde(default)]
    pub allowed_origins: Vec<String>,
}

impl Default for StorageServerConfig {
    fn default() -> Self {
        Self {
            port: default_server_port(),
            root: default_storage_root(),
            public_base_url: default_public_base_url(),
            allowed_origins: Vec::new(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_timeout_secs() -> u64 {
    60
}

fn default_batch_size() -> usize {
    3
}

fn default_server_port() -> u16 {
    8787
}

fn default_storage_root() -> PathBuf {
    PathBuf::from("./storage")
}

fn default_public_base_url() -> String {
    "http://127.0.0.1:8787/media".to_string()
}

impl Config {
    /// Load configuration from file
    ///
    /// Loads environment variables from .env file (if present) before loading config.
    /// Looks for config file in this order:
    /// 1. Path specified in PROPMEDIA_CONFIG environment variable
    /// 2. ./config.toml in current directory
    pub fn load() -> Result<Self> {
        // .env is optional
        let _ = dotenv::dotenv();

        let config_path = std::env::var("PROPMEDIA_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("config.toml"));

        Self::load_from(&config_path)
    }

    /// Load and validate a specific config file
    pub fn load_from(config_path: &Path) -> Result<Self> {
        let config_str = std::fs::read_to_string(config_path)
            .with_context(|| format!("Failed to read config file: {}", config_path.display()))?;

        let config: Config = toml::from_str(&config_str)
            .with_context(|| format!("Failed to parse {}", config_path.display()))?;

        config.validate()?;

        Ok(config)
    }

    /// Validate configuration values
    fn validate(&self) -> Result<()> {
        let url = Url::parse(&self.storage.function_url).with_context(|| {
            format!(
                "storage.function_url is not a valid URL: {}",
                self.storage.function_url
            )
        })?;
        if !matches!(url.scheme(), "http" | "https") {
            anyhow::bail!(
                "storage.function_url must be http or https, got '{}'",
                url.scheme()
            );
        }

        if let Some(var) = &self.storage.api_key_env {
            std::env::var(var).with_context(|| {
                format!(
                    "Environment variable {} not set. Set it in your .env file or remove storage.api_key_env.",
                    var
                )
            })?;
        }

        if self.storage.timeout_secs == 0 {
            anyhow::bail!("storage.timeout_secs must be greater than 0");
        }

        if self.upload.batch_size == 0 {
            anyhow::bail!("upload.batch_size must be greater than 0");
        }

        Url::parse(&self.storage_server.public_base_url).with_context(|| {
            format!(
                "storage_server.public_base_url is not a valid URL: {}",
                self.storage_server.public_base_url
            )
        })?;

        Ok(())
    }

    /// Get database path
    pub fn db_path(&self) -> &Path {
        &self.propmedia.db_path
    }

    /// Default `env_logger` filter when `RUST_LOG` is unset
    pub fn log_level(&self) -> &str {
        match self.propmedia.log_level.trim() {
            "" => "info",
            level => level,
        }
    }

    /// Bearer token for the storage function, if configured
    pub fn storage_api_key(&self) -> Option<String> {
        self.storage
            .api_key_env
            .as_ref()
            .and_then(|var| std::env::var(var).ok())
    }
}
