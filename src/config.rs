use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::{fs, path::Path};
use tracing::debug;

use crate::core::{AllocationStrategy, Assumptions, validate_assumptions};

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(default)]
pub struct ServerConfig {
    pub bind: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig {
            bind: "0.0.0.0".to_string(),
            port: 8080,
        }
    }
}

#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RecommendationMode {
    #[default]
    Static,
    Generative,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(default)]
pub struct GenerativeConfig {
    pub base_url: String,
    pub model: String,
    /// Name of the environment variable holding the API key.
    pub api_key_env: String,
    pub timeout_secs: u64,
    pub retries: usize,
    pub retry_delay_ms: u64,
    pub temperature: f64,
}

impl Default for GenerativeConfig {
    fn default() -> Self {
        GenerativeConfig {
            base_url: "https://generativelanguage.googleapis.com".to_string(),
            model: "gemini-1.5-flash".to_string(),
            api_key_env: "GEMINI_API_KEY".to_string(),
            timeout_secs: 20,
            retries: 1,
            retry_delay_ms: 500,
            temperature: 0.4,
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone, Default, PartialEq)]
#[serde(default)]
pub struct RecommendationsConfig {
    pub mode: RecommendationMode,
    /// Attach recommendations when a request does not say either way.
    pub include_by_default: bool,
    pub generative: GenerativeConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone, Default, PartialEq)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub assumptions: Assumptions,
    pub allocation_strategy: AllocationStrategy,
    pub recommendations: RecommendationsConfig,
}

impl AppConfig {
    /// Reads `path` when given, otherwise returns the built-in defaults.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::load_from_path(path),
            None => {
                debug!("No config file given, using defaults");
                Ok(Self::default())
            }
        }
    }

    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let config_str = fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read config file: {}", path.as_ref().display()))?;

        let config: Self = serde_yaml::from_str(&config_str)
            .with_context(|| format!("Failed to parse config file: {}", path.as_ref().display()))?;
        validate_assumptions(&config.assumptions).with_context(|| {
            format!("Invalid assumptions in config file: {}", path.as_ref().display())
        })?;
        debug!(path = %path.as_ref().display(), "Successfully loaded config");
        Ok(config)
    }
}
