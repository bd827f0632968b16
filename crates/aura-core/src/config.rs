use std::path::Path;
use std::path::PathBuf;

use serde::Deserialize;
use serde::Serialize;

pub const DEFAULT_MODEL: &str = "gemini-2.5-flash";
pub const DEFAULT_PROVIDER: &str = "gemini";
pub const MODEL_ENV: &str = "AURA_MODEL";

#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq)]
#[serde(default)]
pub struct Config {
    pub model: ModelConfig,
    pub router: RouterSettings,
    pub storage: StorageConfig,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct ModelConfig {
    pub default_model: Option<String>,
    pub default_provider: Option<String>,
    /// Environment variables checked in order for the service credential.
    pub api_key_env: Vec<String>,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            default_model: None,
            default_provider: None,
            api_key_env: vec!["GEMINI_API_KEY".to_string(), "API_KEY".to_string()],
        }
    }
}

impl ModelConfig {
    pub fn model(&self) -> &str {
        self.default_model.as_deref().unwrap_or(DEFAULT_MODEL)
    }

    pub fn provider(&self) -> &str {
        self.default_provider.as_deref().unwrap_or(DEFAULT_PROVIDER)
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct RouterSettings {
    pub timeout_secs: u64,
    pub max_retries: u32,
    pub retry_backoff_ms: u64,
}

impl Default for RouterSettings {
    fn default() -> Self {
        Self {
            timeout_secs: 20,
            max_retries: 0,
            retry_backoff_ms: 500,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq)]
#[serde(default)]
pub struct StorageConfig {
    pub data_dir: Option<PathBuf>,
}

impl StorageConfig {
    pub fn resolve_data_dir(&self) -> PathBuf {
        self.data_dir.clone().unwrap_or_else(|| {
            dirs::data_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join("aura")
        })
    }
}

impl Config {
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("aura").join("config.toml"))
    }

    /// Reads the TOML config at `path`; a missing file yields defaults.
    pub fn load(path: &Path) -> std::io::Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let raw = std::fs::read_to_string(path)?;
        Self::parse(&raw)
    }

    pub fn parse(raw: &str) -> std::io::Result<Self> {
        toml::from_str(raw)
            .map_err(|err| std::io::Error::other(format!("parse config: {err}")))
    }

    pub fn apply_env_overrides(&mut self) {
        if let Ok(model) = std::env::var(MODEL_ENV) {
            let model = model.trim();
            if !model.is_empty() {
                self.model.default_model = Some(model.to_string());
            }
        }
    }
}
