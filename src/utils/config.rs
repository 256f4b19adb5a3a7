use crate::errors::AppError;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::{env, fs};

/// Concurrency cap for intelligent-update batches.
pub const DEFAULT_CONCURRENCY: usize = 10;

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct Config {
    pub api_key: Option<String>,
    pub model: String,
    /// Model retried once when the primary hits a rate limit.
    pub fallback_model: Option<String>,
    pub base_url: String,
    pub temperature: f32,
    pub concurrency: usize,
    pub log_level: String,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            api_key: None,
            model: "gemini-2.0-flash".to_string(),
            fallback_model: None,
            base_url: crate::api::config::DEFAULT_BASE_URL.to_string(),
            temperature: 0.0,
            concurrency: DEFAULT_CONCURRENCY,
            log_level: "warn".to_string(),
        }
    }
}

pub fn get_config_path() -> PathBuf {
    let mut path = get_executable_dir();
    path.push("config.toml");
    path
}

/// Validate config to prevent obviously wrong or missing values.
pub fn validate_config(config: &Config) -> Result<(), AppError> {
    if config.concurrency == 0 {
        return Err(AppError::InvalidInput(
            "Concurrency cannot be zero".to_string(),
        ));
    }
    if config.temperature < 0.0 || config.temperature > 2.0 {
        return Err(AppError::InvalidInput(
            "Temperature must be between 0.0 and 2.0".to_string(),
        ));
    }
    if config.base_url.is_empty() {
        return Err(AppError::InvalidInput(
            "Base URL cannot be empty".to_string(),
        ));
    }
    Ok(())
}

/// Read config from file, and create a default config if none exists.
pub fn read_config() -> Result<Config, AppError> {
    let config_path = get_config_path();
    if !config_path.exists() {
        write_config(&Config::default())?;
    }
    let config_str = fs::read_to_string(config_path)?;
    let config: Config = toml::from_str(&config_str)?;
    validate_config(&config)?;
    Ok(config)
}

pub fn write_config(config: &Config) -> std::io::Result<()> {
    let config_path = get_config_path();
    let config_str = toml::to_string(config).expect("Failed to serialize config");
    fs::write(config_path, config_str)
}

fn get_executable_dir() -> PathBuf {
    env::current_exe()
        .expect("Failed to get the executable path")
        .parent()
        .expect("Failed to get the executable directory")
        .to_path_buf()
}
