//! Configuration management

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use crate::application::errors::ConfigError;

/// Bot configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct Config {
    pub bot: BotConfig,
    pub matrix: MatrixConfig,
    /// Directory holding the credential and bot session files
    pub data_path: PathBuf,
    #[serde(default)]
    pub renderer: RendererConfig,
    #[serde(default)]
    pub remarkable: RemarkableConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct BotConfig {
    pub name: String,
    pub display_name: Option<String>,
    /// Sent when the bot joins a room
    pub greeting: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct MatrixConfig {
    pub homeserver_url: String,
    pub access_token: Option<String>,
    #[serde(default = "default_sync_timeout_ms")]
    pub sync_timeout_ms: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct RendererConfig {
    pub chrome_path: PathBuf,
    #[serde(default)]
    pub extra_args: Vec<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct RemarkableConfig {
    pub auth_host: String,
    pub storage_host: String,
    pub device_desc: String,
}

fn default_sync_timeout_ms() -> u64 {
    30_000
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self {
            chrome_path: PathBuf::from("chromium"),
            extra_args: Vec::new(),
        }
    }
}

impl Default for RemarkableConfig {
    fn default() -> Self {
        Self {
            auth_host: "https://webapp-prod.cloud.remarkable.engineering".to_string(),
            storage_host: "https://document-storage-production-dot-remarkable-production.appspot.com".to_string(),
            device_desc: "desktop-linux".to_string(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bot: BotConfig {
                name: "remarkable-bot".to_string(),
                display_name: Some("reMarkable Bot".to_string()),
                greeting: "Hello, world!".to_string(),
            },
            matrix: MatrixConfig {
                homeserver_url: "https://matrix.org".to_string(),
                access_token: None,
                sync_timeout_ms: default_sync_timeout_ms(),
            },
            data_path: PathBuf::from("./data"),
            renderer: RendererConfig::default(),
            remarkable: RemarkableConfig::default(),
        }
    }
}

impl Config {
    pub fn load(path: impl Into<PathBuf>) -> Result<Self, ConfigError> {
        let path = path.into();
        let content = std::fs::read_to_string(&path)
            .map_err(|e| ConfigError::Parse(format!("Failed to read config: {}", e)))?;

        Self::from_yaml(&content)
    }

    pub fn from_yaml(content: &str) -> Result<Self, ConfigError> {
        let config: Config = serde_yaml::from_str(content)
            .map_err(|e| ConfigError::Parse(format!("Failed to parse config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn load_env() -> Self {
        // Load from environment variables
        let mut config = Config::default();

        if let Ok(url) = std::env::var("MATRIX_HOMESERVER_URL") {
            config.matrix.homeserver_url = url;
        }

        if let Ok(token) = std::env::var("MATRIX_ACCESS_TOKEN") {
            config.matrix.access_token = Some(token);
        }

        if let Ok(path) = std::env::var("BOT_DATA_PATH") {
            config.data_path = PathBuf::from(path);
        }

        if let Ok(path) = std::env::var("CHROME_PATH") {
            config.renderer.chrome_path = PathBuf::from(path);
        }

        config
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.matrix.homeserver_url.trim().is_empty() {
            return Err(ConfigError::MissingField("matrix.homeserver-url".to_string()));
        }
        url::Url::parse(&self.matrix.homeserver_url)
            .map_err(|e| ConfigError::InvalidValue(format!("matrix.homeserver-url: {}", e)))?;

        if self.data_path.as_os_str().is_empty() {
            return Err(ConfigError::MissingField("data-path".to_string()));
        }

        Ok(())
    }

    /// Access token, ignoring blank values
    pub fn access_token(&self) -> Option<&str> {
        self.matrix.access_token.as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty())
    }

    pub fn data_path(&self) -> &Path {
        &self.data_path
    }

    /// Opaque file the chat transport keeps its sync state in
    pub fn bot_session_file(&self) -> PathBuf {
        self.data_path.join("bot.json")
    }
}
