// src/config.rs
use std::env;
use std::path::PathBuf;
use thiserror::Error;

/// Runtime settings, read from `.env` and the process environment.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub api_base_url: String,
    pub redis_url: Option<String>,
    pub session_ttl_secs: u64,
    pub max_image_edge: u32,
    pub static_dir: Option<PathBuf>,
    pub log_level: String,
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("{name} must be a valid {expected}, got {value:?}")]
    InvalidNumber {
        name: &'static str,
        expected: &'static str,
        value: String,
    },

    #[error("ADLENS_API_BASE_URL must start with http:// or https://, got {0:?}")]
    InvalidBaseUrl(String),
}

impl AppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let host = env::var("ADLENS_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port = parse_var("ADLENS_PORT", "u16", 8080u16)?;

        let api_base_url = env::var("ADLENS_API_BASE_URL")
            .unwrap_or_else(|_| "http://127.0.0.1:9000".to_string());
        if !(api_base_url.starts_with("http://") || api_base_url.starts_with("https://")) {
            return Err(ConfigError::InvalidBaseUrl(api_base_url));
        }
        let api_base_url = api_base_url.trim_end_matches('/').to_string();

        let redis_url = non_empty_var("ADLENS_REDIS_URL");
        let session_ttl_secs = parse_var("ADLENS_SESSION_TTL_SECS", "u64", 86_400u64)?;
        let max_image_edge = parse_var("ADLENS_MAX_IMAGE_EDGE", "u32", 2048u32)?;
        let static_dir = non_empty_var("ADLENS_STATIC_DIR").map(PathBuf::from);
        let log_level = env::var("ADLENS_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());

        Ok(Self {
            host,
            port,
            api_base_url,
            redis_url,
            session_ttl_secs,
            max_image_edge,
            static_dir,
            log_level,
        })
    }

    pub fn bind_addr(&self) -> (String, u16) {
        (self.host.clone(), self.port)
    }
}

fn non_empty_var(name: &str) -> Option<String> {
    env::var(name).ok().filter(|value| !value.trim().is_empty())
}

fn parse_var<T: std::str::FromStr>(
    name: &'static str,
    expected: &'static str,
    default: T,
) -> Result<T, ConfigError> {
    match env::var(name) {
        Ok(value) => value
            .trim()
            .parse::<T>()
            .map_err(|_| ConfigError::InvalidNumber {
                name,
                expected,
                value,
            }),
        Err(_) => Ok(default),
    }
}
