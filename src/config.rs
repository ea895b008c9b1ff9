//! Client configuration management.
//!
//! This module handles loading and saving the client configuration, which
//! covers the backend API base URL and where durable client state lives.
//!
//! Configuration is stored at `~/.config/aroma-storefront/config.json` and
//! can be overridden through the `AROMA_API_BASE` and `AROMA_DATA_DIR`
//! environment variables (a `.env` file is honored when present).

use std::path::PathBuf;

use anyhow::Result;
use serde::{Deserialize, Serialize};

/// Application name used for config/data directory paths
const APP_NAME: &str = "aroma-storefront";

/// Config file name
const CONFIG_FILE: &str = "config.json";

/// Default backend base URL (local FastAPI dev server)
const DEFAULT_API_BASE: &str = "http://localhost:8000";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Base URL of the storefront REST backend, without a trailing slash.
    pub api_base: String,
    /// Override for the durable client-state directory. When absent the
    /// platform data directory is used.
    pub data_dir: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_base: DEFAULT_API_BASE.to_string(),
            data_dir: None,
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        // Load .env file if present (silently ignore if not found)
        let _ = dotenvy::dotenv();

        let path = Self::config_path()?;
        let mut config = if path.exists() {
            let contents = std::fs::read_to_string(&path)?;
            serde_json::from_str(&contents)?
        } else {
            Self::default()
        };

        if let Ok(base) = std::env::var("AROMA_API_BASE") {
            config.api_base = base;
        }
        if let Ok(dir) = std::env::var("AROMA_DATA_DIR") {
            config.data_dir = Some(PathBuf::from(dir));
        }
        config.api_base = config.api_base.trim_end_matches('/').to_string();

        Ok(config)
    }

    pub fn save(&self) -> Result<()> {
        let path = Self::config_path()?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_string_pretty(self)?;
        std::fs::write(path, contents)?;
        Ok(())
    }

    fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find config directory"))?;
        Ok(config_dir.join(APP_NAME).join(CONFIG_FILE))
    }

    /// Directory holding the durable client state (token, local cart).
    pub fn data_dir(&self) -> Result<PathBuf> {
        if let Some(ref dir) = self.data_dir {
            return Ok(dir.clone());
        }
        let data_dir = dirs::data_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find data directory"))?;
        Ok(data_dir.join(APP_NAME))
    }
}
