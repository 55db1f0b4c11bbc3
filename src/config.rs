use std::fs;
use std::path::Path;

use anyhow::{Result, anyhow};
use chrono::Duration;
use log::info;
use serde::{Deserialize, Serialize};

// One year
const MAX_COOLDOWN_MINUTES: u64 = 525_600;

/// Reader configuration, loaded from YAML. Every field has a default so an
/// empty file (or no file at all) is a valid configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Articles fetched per "load more" and per refresh
    pub page_size: usize,
    pub refresh_cooldown_minutes: u64,
    /// Source links kept per article
    pub max_sources: usize,
    /// Hard cap on articles held for one topic
    pub max_articles_per_topic: usize,
    pub database_url: String,
    pub object_store: ObjectStoreConfig,
    pub log: LogSettings,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            page_size: 25,
            refresh_cooldown_minutes: 5,
            max_sources: 3,
            max_articles_per_topic: 500,
            database_url: "sqlite:daily_bite.db".to_string(),
            object_store: ObjectStoreConfig::default(),
            log: LogSettings::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ObjectStoreConfig {
    pub bucket: String,
    /// When set, summaries are fetched over HTTP from `{base_url}/{bucket}/{reference}`.
    /// Otherwise they are read from the local database.
    pub base_url: Option<String>,
}

impl Default for ObjectStoreConfig {
    fn default() -> Self {
        Self {
            bucket: "sourced-articles".to_string(),
            base_url: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogSettings {
    pub console_level: String,
    pub file_level: String,
    pub file: Option<String>,
}

impl Default for LogSettings {
    fn default() -> Self {
        Self {
            console_level: "info".to_string(),
            file_level: "debug".to_string(),
            file: None,
        }
    }
}

impl Config {
    /// Load the configuration from a YAML file; a missing file yields the defaults.
    pub fn load(path: &str) -> Result<Self> {
        if !Path::new(path).exists() {
            info!("Configuration file does not exist, using defaults: {}", path);
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(path)?;
        let config = Self::from_yaml(&contents)?;
        info!("Loaded configuration from {}", path);
        Ok(config)
    }

    pub fn from_yaml(contents: &str) -> Result<Self> {
        let config: Config = if contents.trim().is_empty() {
            Config::default()
        } else {
            serde_yaml::from_str(contents)?
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.page_size == 0 {
            return Err(anyhow!("page_size must be positive"));
        }
        if self.max_sources == 0 {
            return Err(anyhow!("max_sources must be positive"));
        }
        if self.max_articles_per_topic == 0 {
            return Err(anyhow!("max_articles_per_topic must be positive"));
        }
        if self.refresh_cooldown_minutes > MAX_COOLDOWN_MINUTES {
            return Err(anyhow!(
                "refresh_cooldown_minutes must be at most {}",
                MAX_COOLDOWN_MINUTES
            ));
        }
        Ok(())
    }

    pub fn refresh_cooldown(&self) -> Duration {
        Duration::minutes(self.refresh_cooldown_minutes as i64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_yaml_is_default() {
        let config = Config::from_yaml("").unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.page_size, 25);
        assert_eq!(config.refresh_cooldown(), Duration::minutes(5));
    }

    #[test]
    fn test_partial_yaml_keeps_defaults() {
        let yaml = r#"
page_size: 10
object_store:
  base_url: "http://localhost:9000"
log:
  console_level: debug
"#;
        let config = Config::from_yaml(yaml).unwrap();
        assert_eq!(config.page_size, 10);
        assert_eq!(config.refresh_cooldown_minutes, 5);
        assert_eq!(config.object_store.bucket, "sourced-articles");
        assert_eq!(config.object_store.base_url.as_deref(), Some("http://localhost:9000"));
        assert_eq!(config.log.console_level, "debug");
        assert_eq!(config.log.file_level, "debug");
    }

    #[test]
    fn test_out_of_range_values_rejected() {
        assert!(Config::from_yaml("page_size: 0").is_err());
        assert!(Config::from_yaml("max_sources: 0").is_err());
        assert!(Config::from_yaml("refresh_cooldown_minutes: 99999999").is_err());
    }

    #[test]
    fn test_example_file_matches_defaults() {
        let config = Config::load("daily-bite.example.yaml").unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_missing_file_is_default() {
        let config = Config::load("/nonexistent/daily-bite.yaml").unwrap();
        assert_eq!(config, Config::default());
    }
}
