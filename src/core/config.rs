use crate::core::normalize::ThresholdNormalizer;
use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use std::{fs, path::PathBuf};
use tracing::debug;

pub const DEFAULT_NOBITEX_URL: &str = "https://api.nobitex.ir";
pub const DEFAULT_BRSAPI_URL: &str = "https://brsapi.ir";

/// Environment variable consulted when the config carries no BrsApi key.
pub const BRSAPI_KEY_ENV: &str = "BRS_API_KEY";

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct NobitexProviderConfig {
    pub base_url: String,
}

#[derive(Deserialize, Serialize, Clone)]
pub struct BrsApiProviderConfig {
    pub base_url: String,
    #[serde(default)]
    pub api_key: Option<String>,
}

impl std::fmt::Debug for BrsApiProviderConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BrsApiProviderConfig")
            .field("base_url", &self.base_url)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ProvidersConfig {
    pub nobitex: Option<NobitexProviderConfig>,
    pub brsapi: Option<BrsApiProviderConfig>,
}

impl Default for ProvidersConfig {
    fn default() -> Self {
        ProvidersConfig {
            nobitex: Some(NobitexProviderConfig {
                base_url: DEFAULT_NOBITEX_URL.to_string(),
            }),
            brsapi: Some(BrsApiProviderConfig {
                base_url: DEFAULT_BRSAPI_URL.to_string(),
                api_key: None,
            }),
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct RefreshConfig {
    /// How long a stored snapshot may be reused.
    pub cache_ttl_secs: u64,
    /// Cadence of the background refresh in `watch` mode.
    pub poll_interval_secs: u64,
    pub request_timeout_secs: u64,
    /// Extra attempts on transport errors.
    pub retries: usize,
}

impl Default for RefreshConfig {
    fn default() -> Self {
        Self {
            cache_ttl_secs: 120,
            poll_interval_secs: 60,
            request_timeout_secs: 10,
            retries: 2,
        }
    }
}

impl RefreshConfig {
    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs.max(1))
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs.max(1))
    }
}

#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub providers: ProvidersConfig,
    #[serde(default)]
    pub refresh: RefreshConfig,
    #[serde(default)]
    pub normalizer: ThresholdNormalizer,
    pub data_path: Option<String>,
}

impl AppConfig {
    /// Loads the config from the default location, or defaults when absent.
    pub fn load() -> Result<Self> {
        debug!("Loading default config");
        let config_path = Self::default_config_path()?;
        if !config_path.exists() {
            debug!(
                "No config file at {}, using defaults",
                config_path.display()
            );
            return Ok(Self::default());
        }
        Self::load_from_path(&config_path)
    }

    pub fn default_config_path() -> Result<PathBuf> {
        let proj_dirs = ProjectDirs::from("ir", "nerkh", "nerkh")
            .context("Could not determine project directories")?;
        Ok(proj_dirs.config_dir().join("config.yaml"))
    }

    pub fn data_path(&self) -> Result<PathBuf> {
        if let Some(custom_path) = &self.data_path {
            return Ok(PathBuf::from(custom_path));
        }
        let proj_dirs = ProjectDirs::from("ir", "nerkh", "nerkh")
            .context("Could not determine project directories")?;
        Ok(proj_dirs.data_dir().to_path_buf())
    }

    pub fn load_from_path<P: AsRef<std::path::Path>>(path: P) -> Result<Self> {
        let config_str = fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read config file: {}", path.as_ref().display()))?;

        let config: Self = serde_yaml::from_str(&config_str)
            .with_context(|| format!("Failed to parse config file: {}", path.as_ref().display()))?;
        debug!("Successfully loaded config");
        Ok(config)
    }

    pub fn nobitex_url(&self) -> &str {
        self.providers
            .nobitex
            .as_ref()
            .map_or(DEFAULT_NOBITEX_URL, |p| &p.base_url)
    }

    pub fn brsapi_url(&self) -> &str {
        self.providers
            .brsapi
            .as_ref()
            .map_or(DEFAULT_BRSAPI_URL, |p| &p.base_url)
    }

    /// The configured BrsApi key, else the `BRS_API_KEY` environment variable.
    pub fn brsapi_key(&self) -> Option<String> {
        self.providers
            .brsapi
            .as_ref()
            .and_then(|p| p.api_key.clone())
            .or_else(|| std::env::var(BRSAPI_KEY_ENV).ok())
            .filter(|key| !key.trim().is_empty())
    }
}
