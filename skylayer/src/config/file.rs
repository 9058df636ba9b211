//! Configuration file handling for ~/.skylayer/config.ini.
//!
//! Every setting has a default, so a missing file or section is not an error.
//! Invalid values are rejected with the section and key they came from.

use std::path::{Path, PathBuf};
use std::time::Duration;

use ini::Ini;
use thiserror::Error;

use super::size::{format_size, parse_size};
use crate::cache::DEFAULT_CACHE_BUDGET;
use crate::fetch::{
    HttpFetcherConfig, DEFAULT_MAX_CONCURRENT, DEFAULT_TIMEOUT_SECS, DEFAULT_USER_AGENT,
};

/// Configuration file errors.
#[derive(Debug, Error)]
pub enum ConfigFileError {
    /// Failed to read config file
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] ini::Error),

    /// Failed to write config file
    #[error("Failed to write config file: {0}")]
    WriteError(String),

    /// Invalid configuration value
    #[error("Invalid configuration: {section}.{key} = '{value}' - {reason}")]
    InvalidValue {
        section: String,
        key: String,
        value: String,
        reason: String,
    },

    /// Failed to create config directory
    #[error("Failed to create config directory: {0}")]
    DirectoryError(std::io::Error),
}

/// `[cache]` section.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheSettings {
    /// Byte budget of the tile cache.
    pub memory_size: u64,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            memory_size: DEFAULT_CACHE_BUDGET,
        }
    }
}

/// `[fetch]` section.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchSettings {
    /// Request timeout in seconds.
    pub timeout: u64,
    /// Maximum number of deferred requests in flight.
    pub max_concurrent: usize,
    pub user_agent: String,
}

impl Default for FetchSettings {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_TIMEOUT_SECS,
            max_concurrent: DEFAULT_MAX_CONCURRENT,
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }
}

impl From<&FetchSettings> for HttpFetcherConfig {
    fn from(settings: &FetchSettings) -> Self {
        Self {
            timeout: Duration::from_secs(settings.timeout),
            max_concurrent: settings.max_concurrent,
            user_agent: settings.user_agent.clone(),
        }
    }
}

/// `[decode]` section.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DecodeSettings {
    /// Decode worker threads; 0 picks one per CPU.
    pub threads: usize,
}

/// Contents of `config.ini`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigFile {
    pub cache: CacheSettings,
    pub fetch: FetchSettings,
    pub decode: DecodeSettings,
}

impl ConfigFile {
    /// Load configuration from the default path (~/.skylayer/config.ini).
    pub fn load() -> Result<Self, ConfigFileError> {
        Self::load_from(&config_file_path())
    }

    /// Load configuration from a specific path.
    ///
    /// If the file doesn't exist, returns defaults.
    pub fn load_from(path: &Path) -> Result<Self, ConfigFileError> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let ini = Ini::load_from_file(path)?;
        parse_ini(&ini)
    }

    /// Save configuration to a specific path.
    pub fn save_to(&self, path: &Path) -> Result<(), ConfigFileError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(ConfigFileError::DirectoryError)?;
        }
        std::fs::write(path, self.to_config_string())
            .map_err(|e| ConfigFileError::WriteError(e.to_string()))
    }

    /// Render as a commented INI document.
    pub fn to_config_string(&self) -> String {
        format!(
            "\
[cache]
; Tile cache budget (e.g. 256MB, 1GB)
memory_size = {}

[fetch]
; Request timeout in seconds
timeout = {}
; Maximum concurrent deferred requests
max_concurrent = {}
user_agent = {}

[decode]
; Decode threads (0 = one per CPU)
threads = {}
",
            format_size(self.cache.memory_size),
            self.fetch.timeout,
            self.fetch.max_concurrent,
            self.fetch.user_agent,
            self.decode.threads,
        )
    }
}

fn invalid(section: &str, key: &str, value: &str, reason: &str) -> ConfigFileError {
    ConfigFileError::InvalidValue {
        section: section.to_string(),
        key: key.to_string(),
        value: value.to_string(),
        reason: reason.to_string(),
    }
}

fn parse_number<T: std::str::FromStr>(section: &str, key: &str, value: &str) -> Result<T, ConfigFileError> {
    value
        .trim()
        .parse()
        .map_err(|_| invalid(section, key, value, "must be a non-negative integer"))
}

/// Overlay the values found in `ini` on the defaults.
fn parse_ini(ini: &Ini) -> Result<ConfigFile, ConfigFileError> {
    let mut config = ConfigFile::default();

    if let Some(section) = ini.section(Some("cache")) {
        if let Some(v) = section.get("memory_size") {
            config.cache.memory_size =
                parse_size(v).map_err(|e| invalid("cache", "memory_size", v, &e.to_string()))?;
        }
    }

    if let Some(section) = ini.section(Some("fetch")) {
        if let Some(v) = section.get("timeout") {
            config.fetch.timeout = parse_number("fetch", "timeout", v)?;
            if config.fetch.timeout == 0 {
                return Err(invalid("fetch", "timeout", v, "must be at least 1"));
            }
        }
        if let Some(v) = section.get("max_concurrent") {
            config.fetch.max_concurrent = parse_number("fetch", "max_concurrent", v)?;
            if config.fetch.max_concurrent == 0 {
                return Err(invalid("fetch", "max_concurrent", v, "must be at least 1"));
            }
        }
        if let Some(v) = section.get("user_agent") {
            let v = v.trim();
            if !v.is_empty() {
                config.fetch.user_agent = v.to_string();
            }
        }
    }

    if let Some(section) = ini.section(Some("decode")) {
        if let Some(v) = section.get("threads") {
            config.decode.threads = parse_number("decode", "threads", v)?;
        }
    }

    Ok(config)
}

/// Get the path to the config directory (~/.skylayer).
pub fn config_directory() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".skylayer")
}

/// Get the path to the config file (~/.skylayer/config.ini).
pub fn config_file_path() -> PathBuf {
    config_directory().join("config.ini")
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn load_str(content: &str) -> Result<ConfigFile, ConfigFileError> {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.ini");
        std::fs::write(&path, content).unwrap();
        ConfigFile::load_from(&path)
    }

    #[test]
    fn test_default_config() {
        let config = ConfigFile::default();
        assert_eq!(config.cache.memory_size, 256 * 1024 * 1024);
        assert_eq!(config.fetch.timeout, 30);
        assert_eq!(config.fetch.max_concurrent, 8);
        assert!(config.fetch.user_agent.starts_with("skylayer/"));
        assert_eq!(config.decode.threads, 0);
    }

    #[test]
    fn test_load_nonexistent_returns_defaults() {
        let dir = TempDir::new().unwrap();
        let config = ConfigFile::load_from(&dir.path().join("missing.ini")).unwrap();
        assert_eq!(config, ConfigFile::default());
    }

    #[test]
    fn test_load_values() {
        let config = load_str(
            "[cache]\nmemory_size = 1GB\n\n[fetch]\ntimeout = 5\nmax_concurrent = 2\nuser_agent = test/1.0\n\n[decode]\nthreads = 3\n",
        )
        .unwrap();
        assert_eq!(config.cache.memory_size, 1024 * 1024 * 1024);
        assert_eq!(config.fetch.timeout, 5);
        assert_eq!(config.fetch.max_concurrent, 2);
        assert_eq!(config.fetch.user_agent, "test/1.0");
        assert_eq!(config.decode.threads, 3);

        let http = HttpFetcherConfig::from(&config.fetch);
        assert_eq!(http.timeout, Duration::from_secs(5));
        assert_eq!(http.max_concurrent, 2);
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let config = load_str("[decode]\nthreads = 2\n").unwrap();
        assert_eq!(config.decode.threads, 2);
        assert_eq!(config.cache, CacheSettings::default());
        assert_eq!(config.fetch, FetchSettings::default());
    }

    #[test]
    fn test_invalid_values() {
        let err = load_str("[cache]\nmemory_size = lots\n").unwrap_err();
        assert!(matches!(
            err,
            ConfigFileError::InvalidValue { ref section, ref key, .. }
                if section == "cache" && key == "memory_size"
        ));
        assert!(load_str("[fetch]\ntimeout = 0\n").is_err());
        assert!(load_str("[fetch]\nmax_concurrent = -2\n").is_err());
    }

    #[test]
    fn test_unknown_sections_ignored() {
        let config = load_str("[render]\nsplit_order = 4\n").unwrap();
        assert_eq!(config, ConfigFile::default());
        assert!(!config.to_config_string().contains("[render]"));
    }

    #[test]
    fn test_save_and_reload() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("config.ini");
        let mut config = ConfigFile::default();
        config.cache.memory_size = 64 * 1024 * 1024;
        config.decode.threads = 6;

        config.save_to(&path).unwrap();
        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.contains("memory_size = 64MB"));
        assert_eq!(ConfigFile::load_from(&path).unwrap(), config);
    }

    #[test]
    fn test_config_paths() {
        assert!(config_directory().ends_with(".skylayer"));
        assert!(config_file_path().ends_with(".skylayer/config.ini"));
    }
}
