//! Application configuration management.
//!
//! This module handles loading and saving the client configuration: backend
//! URL, request timeout, where tokens are kept, and the last used username.
//!
//! Configuration is stored at `~/.config/clinic-client/config.json`.

use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::auth::{FileTokenStore, KeyringTokenStore, MemoryTokenStore, TokenStore};

/// Application name used for config/cache directory paths
const APP_NAME: &str = "clinic-client";

/// Config file name
const CONFIG_FILE: &str = "config.json";

/// Environment variable overriding `api_base_url`
pub const ENV_API_URL: &str = "CLINIC_API_URL";

/// Environment variable overriding `token_backend`
pub const ENV_TOKEN_BACKEND: &str = "CLINIC_TOKEN_BACKEND";

const DEFAULT_API_BASE_URL: &str = "http://localhost:8000";
const DEFAULT_TIMEOUT_SECS: u64 = 30;
const DEFAULT_LOGIN_ROUTE: &str = "/";

/// Where access and refresh tokens are persisted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenBackend {
    Keyring,
    #[default]
    File,
    Memory,
}

impl FromStr for TokenBackend {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "keyring" => Ok(TokenBackend::Keyring),
            "file" => Ok(TokenBackend::File),
            "memory" => Ok(TokenBackend::Memory),
            other => Err(anyhow::anyhow!("Unknown token backend: {}", other)),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub api_base_url: String,
    pub request_timeout_secs: u64,
    pub token_backend: TokenBackend,
    pub login_route: String,
    pub last_username: Option<String>,
    pub log_file: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            request_timeout_secs: DEFAULT_TIMEOUT_SECS,
            token_backend: TokenBackend::default(),
            login_route: DEFAULT_LOGIN_ROUTE.to_string(),
            last_username: None,
            log_file: None,
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        let path = Self::config_path()?;
        Self::load_from(&path)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if path.exists() {
            let contents = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file {}", path.display()))?;
            serde_json::from_str(&contents)
                .with_context(|| format!("Failed to parse config file {}", path.display()))
        } else {
            Ok(Self::default())
        }
    }

    pub fn save(&self) -> Result<()> {
        let path = Self::config_path()?;
        self.save_to(&path)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_string_pretty(self)?;
        std::fs::write(path, contents)?;
        Ok(())
    }

    /// Apply environment overrides on top of the file config
    pub fn apply_env(&mut self) -> Result<()> {
        self.apply_overrides(
            std::env::var(ENV_API_URL).ok(),
            std::env::var(ENV_TOKEN_BACKEND).ok(),
        )
    }

    fn apply_overrides(&mut self, api_url: Option<String>, backend: Option<String>) -> Result<()> {
        if let Some(url) = api_url.filter(|u| !u.trim().is_empty()) {
            self.api_base_url = url;
        }
        if let Some(backend) = backend {
            self.token_backend = backend
                .parse()
                .with_context(|| format!("Invalid {}", ENV_TOKEN_BACKEND))?;
        }
        Ok(())
    }

    fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find config directory"))?;
        Ok(config_dir.join(APP_NAME).join(CONFIG_FILE))
    }

    pub fn cache_dir(&self) -> Result<PathBuf> {
        let cache_dir = dirs::cache_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find cache directory"))?;
        Ok(cache_dir.join(APP_NAME))
    }

    /// Open the token store selected by `token_backend`
    pub fn token_store(&self) -> Result<Arc<dyn TokenStore>> {
        let store: Arc<dyn TokenStore> = match self.token_backend {
            TokenBackend::Keyring => Arc::new(KeyringTokenStore::new()),
            TokenBackend::File => Arc::new(FileTokenStore::new(self.cache_dir()?)),
            TokenBackend::Memory => Arc::new(MemoryTokenStore::new()),
        };
        Ok(store)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.api_base_url, "http://localhost:8000");
        assert_eq!(config.request_timeout_secs, 30);
        assert_eq!(config.token_backend, TokenBackend::File);
        assert_eq!(config.login_route, "/");
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let config: Config =
            serde_json::from_str(r#"{"api_base_url": "https://clinica.example/api", "token_backend": "keyring"}"#)
                .expect("parse config");
        assert_eq!(config.api_base_url, "https://clinica.example/api");
        assert_eq!(config.token_backend, TokenBackend::Keyring);
        assert_eq!(config.request_timeout_secs, 30);
        assert!(config.last_username.is_none());
    }

    #[test]
    fn test_token_backend_from_str() {
        assert_eq!("keyring".parse::<TokenBackend>().unwrap(), TokenBackend::Keyring);
        assert_eq!(" FILE ".parse::<TokenBackend>().unwrap(), TokenBackend::File);
        assert_eq!("memory".parse::<TokenBackend>().unwrap(), TokenBackend::Memory);
        assert!("redis".parse::<TokenBackend>().is_err());
    }

    #[test]
    fn test_overrides() {
        let mut config = Config::default();
        config
            .apply_overrides(Some("http://10.0.0.5:8000".to_string()), Some("memory".to_string()))
            .expect("overrides");
        assert_eq!(config.api_base_url, "http://10.0.0.5:8000");
        assert_eq!(config.token_backend, TokenBackend::Memory);

        // Blank URL keeps the configured one
        config.apply_overrides(Some("  ".to_string()), None).expect("overrides");
        assert_eq!(config.api_base_url, "http://10.0.0.5:8000");

        assert!(config.apply_overrides(None, Some("bogus".to_string())).is_err());
    }

    #[test]
    fn test_save_and_load_round_trip() {
        let path = std::env::temp_dir()
            .join(format!("clinic-config-{}", std::process::id()))
            .join(CONFIG_FILE);
        let config = Config {
            last_username: Some("recepcion".to_string()),
            ..Config::default()
        };
        config.save_to(&path).expect("save");

        let loaded = Config::load_from(&path).expect("load");
        assert_eq!(loaded.last_username.as_deref(), Some("recepcion"));

        if let Some(dir) = path.parent() {
            let _ = std::fs::remove_dir_all(dir);
        }
    }
}
