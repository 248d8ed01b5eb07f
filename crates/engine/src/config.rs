//! Environment-driven engine configuration.

use std::path::PathBuf;

use url::Url;

use crate::infrastructure::overlay_source::DEFAULT_OVERLAY_URL;
use crate::infrastructure::upstream::DEFAULT_API_URL;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{var} is not a valid URL: {message}")]
    InvalidUrl { var: &'static str, message: String },
    #[error("no data directory: set QUESTLOG_DATA_DIR")]
    NoDataDir,
}

#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub api_url: Url,
    pub overlay_url: Url,
    pub data_dir: PathBuf,
}

impl EngineConfig {
    /// Read configuration from the environment, falling back to defaults.
    ///
    /// - `QUESTLOG_API_URL` - upstream GraphQL endpoint
    /// - `QUESTLOG_OVERLAY_URL` - overlay document location
    /// - `QUESTLOG_DATA_DIR` - registry, profile stores and cache; defaults
    ///   to the platform data directory
    pub fn from_env() -> Result<Self, ConfigError> {
        let api_url = url_from_env("QUESTLOG_API_URL", DEFAULT_API_URL)?;
        let overlay_url = url_from_env("QUESTLOG_OVERLAY_URL", DEFAULT_OVERLAY_URL)?;

        let data_dir = match std::env::var("QUESTLOG_DATA_DIR") {
            Ok(dir) if !dir.is_empty() => PathBuf::from(dir),
            _ => directories::ProjectDirs::from("com", "WrldBld", "questlog")
                .map(|dirs| dirs.data_dir().to_path_buf())
                .ok_or(ConfigError::NoDataDir)?,
        };

        Ok(Self {
            api_url,
            overlay_url,
            data_dir,
        })
    }
}

fn url_from_env(var: &'static str, default: &str) -> Result<Url, ConfigError> {
    let text = std::env::var(var).unwrap_or_else(|_| default.to_string());
    Url::parse(&text).map_err(|err| ConfigError::InvalidUrl {
        var,
        message: err.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_urls_parse() {
        assert!(Url::parse(DEFAULT_API_URL).is_ok());
        assert!(Url::parse(DEFAULT_OVERLAY_URL).is_ok());
    }
}
