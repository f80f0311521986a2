// SPDX-License-Identifier: GPL-3.0-only
use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::remote::DEFAULT_SEARCH_ENDPOINT;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// SQLite database holding pins, photos and map settings
    pub store_db_path: PathBuf,

    /// Photo search REST endpoint
    pub search_api_url: String,

    /// API key sent with every search
    pub search_api_key: String,

    /// HTTP timeout for searches and image fetches, in seconds
    pub request_timeout_secs: u64,

    /// Logging level (trace, debug, info, warn, error)
    pub log_level: String,
}

impl Config {
    /// Load configuration from TOML file with environment variable overrides
    pub fn load() -> anyhow::Result<Self> {
        Self::load_with(|key| std::env::var(key).ok())
    }

    /// Same as [`Config::load`], reading variables through `lookup`
    pub fn load_with<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let config_path = lookup("PIN_ALBUM_CONFIG").unwrap_or_else(|| "config.toml".to_string());

        let mut config: Config = if Path::new(&config_path).exists() {
            let contents = std::fs::read_to_string(&config_path)
                .with_context(|| format!("Failed to read config file {}", config_path))?;
            toml::from_str(&contents)
                .with_context(|| format!("Failed to parse config file {}", config_path))?
        } else {
            // Use default configuration
            Config::default()
        };

        // Apply environment variable overrides
        if let Some(val) = lookup("PIN_ALBUM_STORE_DB_PATH") {
            config.store_db_path = PathBuf::from(val);
        }
        if let Some(val) = lookup("PIN_ALBUM_SEARCH_API_URL") {
            config.search_api_url = val;
        }
        if let Some(val) = lookup("PIN_ALBUM_SEARCH_API_KEY") {
            config.search_api_key = val;
        }
        if let Some(val) = lookup("PIN_ALBUM_REQUEST_TIMEOUT_SECS") {
            config.request_timeout_secs = val
                .parse()
                .context("PIN_ALBUM_REQUEST_TIMEOUT_SECS must be a whole number of seconds")?;
        }
        if let Some(val) = lookup("PIN_ALBUM_LOG_LEVEL") {
            config.log_level = val;
        }

        if config.request_timeout_secs == 0 {
            anyhow::bail!("request_timeout_secs must be greater than zero");
        }

        Ok(config)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            store_db_path: PathBuf::from("pins.db"),
            search_api_url: String::from(DEFAULT_SEARCH_ENDPOINT),
            search_api_key: String::new(),
            request_timeout_secs: 30,
            log_level: String::from("info"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::create_test_config;
    use std::collections::HashMap;
    use std::fs;
    use tempfile::NamedTempFile;

    fn lookup_from(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    fn missing_config_file() -> (&'static str, &'static str) {
        ("PIN_ALBUM_CONFIG", "/nonexistent/pin-album/config.toml")
    }

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.store_db_path, PathBuf::from("pins.db"));
        assert_eq!(config.search_api_url, "https://api.flickr.com/services/rest");
        assert_eq!(config.search_api_key, "");
        assert_eq!(config.request_timeout_secs, 30);
        assert_eq!(config.log_level, "info");
    }

    #[test]
    fn test_request_timeout() {
        let config = create_test_config();
        assert_eq!(config.request_timeout(), Duration::from_secs(5));
    }

    #[test]
    fn test_load_missing_config_file() {
        let config = Config::load_with(lookup_from(&[missing_config_file()])).unwrap();
        assert_eq!(config.store_db_path, PathBuf::from("pins.db"));
        assert_eq!(config.request_timeout_secs, 30);
    }

    #[test]
    fn test_load_from_toml() {
        let temp_file = NamedTempFile::new().unwrap();
        let config_content = r#"
store_db_path = "/custom/pins.db"
search_api_url = "http://search.example.com/rest"
search_api_key = "test-key-123"
request_timeout_secs = 12
log_level = "debug"
"#;
        fs::write(temp_file.path(), config_content).unwrap();

        let path = temp_file.path().to_str().unwrap();
        let config = Config::load_with(lookup_from(&[("PIN_ALBUM_CONFIG", path)])).unwrap();
        assert_eq!(config.store_db_path, PathBuf::from("/custom/pins.db"));
        assert_eq!(config.search_api_url, "http://search.example.com/rest");
        assert_eq!(config.search_api_key, "test-key-123");
        assert_eq!(config.request_timeout_secs, 12);
        assert_eq!(config.log_level, "debug");
    }

    #[test]
    fn test_load_partial_toml_keeps_defaults() {
        let temp_file = NamedTempFile::new().unwrap();
        fs::write(temp_file.path(), "search_api_key = \"only-key\"\n").unwrap();

        let path = temp_file.path().to_str().unwrap();
        let config = Config::load_with(lookup_from(&[("PIN_ALBUM_CONFIG", path)])).unwrap();
        assert_eq!(config.search_api_key, "only-key");
        assert_eq!(config.search_api_url, "https://api.flickr.com/services/rest");
        assert_eq!(config.log_level, "info");
    }

    #[test]
    fn test_load_invalid_toml() {
        let temp_file = NamedTempFile::new().unwrap();
        fs::write(temp_file.path(), "request_timeout_secs = \"soon\"\n").unwrap();

        let path = temp_file.path().to_str().unwrap();
        assert!(Config::load_with(lookup_from(&[("PIN_ALBUM_CONFIG", path)])).is_err());
    }

    #[test]
    fn test_env_var_override_store_db_path() {
        let config = Config::load_with(lookup_from(&[
            missing_config_file(),
            ("PIN_ALBUM_STORE_DB_PATH", "/env/pins.db"),
        ]))
        .unwrap();
        assert_eq!(config.store_db_path, PathBuf::from("/env/pins.db"));
    }

    #[test]
    fn test_env_var_override_search_api() {
        let config = Config::load_with(lookup_from(&[
            missing_config_file(),
            ("PIN_ALBUM_SEARCH_API_URL", "http://env-search.example.com/rest"),
            ("PIN_ALBUM_SEARCH_API_KEY", "env-key-456"),
        ]))
        .unwrap();
        assert_eq!(config.search_api_url, "http://env-search.example.com/rest");
        assert_eq!(config.search_api_key, "env-key-456");
    }

    #[test]
    fn test_env_var_override_request_timeout() {
        let config = Config::load_with(lookup_from(&[
            missing_config_file(),
            ("PIN_ALBUM_REQUEST_TIMEOUT_SECS", "90"),
        ]))
        .unwrap();
        assert_eq!(config.request_timeout_secs, 90);

        let result = Config::load_with(lookup_from(&[
            missing_config_file(),
            ("PIN_ALBUM_REQUEST_TIMEOUT_SECS", "ninety"),
        ]));
        assert!(result.is_err());

        let result = Config::load_with(lookup_from(&[
            missing_config_file(),
            ("PIN_ALBUM_REQUEST_TIMEOUT_SECS", "0"),
        ]));
        assert!(result.is_err());
    }

    #[test]
    fn test_env_var_override_log_level() {
        let config = Config::load_with(lookup_from(&[
            missing_config_file(),
            ("PIN_ALBUM_LOG_LEVEL", "trace"),
        ]))
        .unwrap();
        assert_eq!(config.log_level, "trace");
    }

    #[test]
    fn test_env_overrides_win_over_file() {
        let temp_file = NamedTempFile::new().unwrap();
        fs::write(temp_file.path(), "log_level = \"warn\"\n").unwrap();

        let path = temp_file.path().to_str().unwrap();
        let config = Config::load_with(lookup_from(&[
            ("PIN_ALBUM_CONFIG", path),
            ("PIN_ALBUM_LOG_LEVEL", "debug"),
        ]))
        .unwrap();
        assert_eq!(config.log_level, "debug");
    }
}
