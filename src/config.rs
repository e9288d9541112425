use serde::{Deserialize, Serialize};
use std::fs;
use std::io::Write;
use std::path::PathBuf;

use crate::errors::{AppError, AppResult};

/// Crate configuration: where the per-application database files live.
#[derive(Debug, Serialize, Deserialize)]
pub struct Config {
    pub data_dir: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: Self::default_data_dir().to_string_lossy().to_string(),
        }
    }
}

impl Config {
    /// Standard configuration directory depending on the platform.
    pub fn config_dir() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".prodvision")
    }

    pub fn config_file() -> PathBuf {
        Self::config_dir().join("prodvision.conf")
    }

    pub fn default_data_dir() -> PathBuf {
        Self::config_dir().join("data")
    }

    /// Load configuration from file, or return defaults if not found.
    pub fn load() -> AppResult<Self> {
        let path = Self::config_file();
        if path.exists() {
            let content = fs::read_to_string(&path)?;
            serde_yaml::from_str(&content)
                .map_err(|e| AppError::Config(format!("cannot parse {}: {e}", path.display())))
        } else {
            Ok(Config::default())
        }
    }

    /// Create the config file and data directory.
    pub fn init_all(custom_data_dir: Option<String>) -> AppResult<Self> {
        let dir = Self::config_dir();
        fs::create_dir_all(&dir)?;

        let data_dir = match custom_data_dir {
            Some(d) => {
                let p = PathBuf::from(&d);
                if p.is_absolute() { p } else { dir.join(p) }
            }
            None => Self::default_data_dir(),
        };
        fs::create_dir_all(&data_dir)?;

        let config = Config {
            data_dir: data_dir.to_string_lossy().to_string(),
        };
        let yaml = serde_yaml::to_string(&config)
            .map_err(|e| AppError::Config(format!("cannot serialize config: {e}")))?;
        let mut file = fs::File::create(Self::config_file())?;
        file.write_all(yaml.as_bytes())?;
        Ok(config)
    }
}
