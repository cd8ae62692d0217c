// Runtime configuration.
//
// Settings come from environment variables, optionally seeded from `.env`
// files. They are read once at startup and passed explicitly to the
// transport, the API client and the export; nothing else reads the
// environment.

use std::path::{Path, PathBuf};
use std::time::Duration;

use tracing::debug;

use crate::api::{Endpoints, TokenFormat};
use crate::error::ConfigError;
use crate::retrieval::DEFAULT_PAGE_DELAY;

pub const SERVER_HOST: &str = "HTTPS_SERVER_IP";
pub const SERVER_PORT: &str = "HTTPS_SERVER_PORT";
pub const TRUST_ANCHOR: &str = "HTTPS_SERVER_KEY_PUBLIC";
pub const TOKEN_FORMAT: &str = "TOKEN_FORMAT";
pub const PAGE_DELAY_MS: &str = "PAGE_DELAY_MS";
pub const EXPORT_DIR: &str = "EXPORT_DIR";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub server_host: String,
    pub server_port: u16,
    /// PEM file with the CA certificate the server must chain to.
    pub trust_anchor: PathBuf,
    pub token_format: TokenFormat,
    pub page_delay: Duration,
    pub export_dir: PathBuf,
}

impl Config {
    /// Load `.env` files (if any) and read the configuration from the
    /// process environment. Variables already set take precedence.
    pub fn load() -> Result<Self, ConfigError> {
        for file in env_files() {
            if file.is_file() {
                // dotenv never overrides variables that are already set
                match dotenv::from_path(&file) {
                    Ok(()) => debug!(path = %file.display(), "loaded environment file"),
                    Err(e) => debug!(path = %file.display(), error = %e, "skipped environment file"),
                }
            }
        }
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let required = |key: &'static str| get(key).ok_or(ConfigError::Missing(key));

        let server_host = required(SERVER_HOST)?;
        let port = required(SERVER_PORT)?;
        let server_port = port.parse::<u16>().map_err(|e| ConfigError::Invalid {
            key: SERVER_PORT,
            value: port.clone(),
            reason: e.to_string(),
        })?;
        let trust_anchor = PathBuf::from(required(TRUST_ANCHOR)?);

        let token_format = match get(TOKEN_FORMAT) {
            Some(value) => value.parse().map_err(|reason| ConfigError::Invalid {
                key: TOKEN_FORMAT,
                value,
                reason,
            })?,
            None => TokenFormat::default(),
        };

        let page_delay = match get(PAGE_DELAY_MS) {
            Some(value) => value
                .parse::<u64>()
                .map(Duration::from_millis)
                .map_err(|e| ConfigError::Invalid {
                    key: PAGE_DELAY_MS,
                    value: value.clone(),
                    reason: e.to_string(),
                })?,
            None => DEFAULT_PAGE_DELAY,
        };

        let export_dir = get(EXPORT_DIR).map(PathBuf::from).unwrap_or_else(|| PathBuf::from("."));

        Ok(Config {
            server_host,
            server_port,
            trust_anchor,
            token_format,
            page_delay,
            export_dir,
        })
    }

    /// `https://<host>:<port>`
    pub fn origin(&self) -> String {
        format!("https://{}:{}", self.server_host, self.server_port)
    }

    pub fn endpoints(&self) -> Endpoints {
        Endpoints::under(&self.origin())
    }
}

/// Candidate `.env` files, highest priority first.
fn env_files() -> Vec<PathBuf> {
    let mut files = vec![Path::new("configs").join(".env")];
    if let Some(dir) = dirs::config_dir() {
        files.push(dir.join(env!("CARGO_PKG_NAME")).join(".env"));
    }
    files.push(PathBuf::from(".env"));
    files
}
