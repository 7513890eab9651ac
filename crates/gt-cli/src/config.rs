use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use gt_core::segments::SPONSOR_API_URL;
use gt_core::types::{default_sources, FilterSource, MAX_RULES};

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to parse config '{path}': {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("Invalid config: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FetchConfig {
    pub attempts: u32,
    /// Delay before retry `n` is `n * backoff_ms`
    pub backoff_ms: u64,
    pub max_redirects: u32,
    pub user_agent: String,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            attempts: 3,
            backoff_ms: 2_000,
            max_redirects: 5,
            user_agent: concat!("goodtube/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

impl FetchConfig {
    pub fn backoff(&self) -> Duration {
        Duration::from_millis(self.backoff_ms)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    pub sources: Vec<FilterSource>,
    pub max_rules: usize,
    pub update_interval_hours: u64,
    pub check_interval_minutes: u64,
    pub fetch: FetchConfig,
    pub storage_path: PathBuf,
    pub rules_path: PathBuf,
    pub sponsor_api_url: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            sources: default_sources(),
            max_rules: MAX_RULES,
            update_interval_hours: 24,
            check_interval_minutes: 60,
            fetch: FetchConfig::default(),
            storage_path: PathBuf::from("goodtube-storage.json"),
            rules_path: PathBuf::from("rules.json"),
            sponsor_api_url: SPONSOR_API_URL.to_string(),
        }
    }
}

impl Config {
    /// Built-in defaults, overlaid with the TOML file at `path` if given.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let config = match path {
            Some(path) => {
                let text = fs::read_to_string(path).map_err(|source| ConfigError::Io {
                    path: path.to_path_buf(),
                    source,
                })?;
                Self::from_toml(&text).map_err(|source| ConfigError::Parse {
                    path: path.to_path_buf(),
                    source,
                })?
            }
            None => Self::default(),
        };

        config.validate()?;
        Ok(config)
    }

    pub fn from_toml(text: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(text)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_rules == 0 || self.max_rules > MAX_RULES {
            return Err(ConfigError::Invalid(format!(
                "max_rules must be between 1 and {}, got {}",
                MAX_RULES, self.max_rules
            )));
        }
        if self.fetch.attempts == 0 {
            return Err(ConfigError::Invalid("fetch.attempts must be at least 1".to_string()));
        }
        if self.check_interval_minutes == 0 {
            return Err(ConfigError::Invalid(
                "check_interval_minutes must be at least 1".to_string(),
            ));
        }
        for source in &self.sources {
            if source.name.trim().is_empty() {
                return Err(ConfigError::Invalid("filter source with empty name".to_string()));
            }
            if !source.url.starts_with("https://") && !source.url.starts_with("http://") {
                return Err(ConfigError::Invalid(format!(
                    "source '{}' has a non-http url '{}'",
                    source.name, source.url
                )));
            }
        }
        Ok(())
    }

    pub fn update_interval_ms(&self) -> u64 {
        self.update_interval_hours.saturating_mul(60 * 60 * 1000)
    }

    pub fn check_interval(&self) -> Duration {
        Duration::from_secs(self.check_interval_minutes.saturating_mul(60))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::load(None).unwrap();
        assert_eq!(config.sources.len(), 3);
        assert_eq!(config.sources[0].name, "EasyList");
        assert_eq!(config.max_rules, 30_000);
        assert_eq!(config.update_interval_ms(), 86_400_000);
        assert_eq!(config.fetch.attempts, 3);
        assert_eq!(config.fetch.backoff(), Duration::from_secs(2));
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = Config::from_toml(
            r#"
            max_rules = 500
            rules_path = "out/rules.json"

            [fetch]
            backoff_ms = 0
            "#,
        )
        .unwrap();
        assert_eq!(config.max_rules, 500);
        assert_eq!(config.rules_path, PathBuf::from("out/rules.json"));
        assert_eq!(config.fetch.backoff_ms, 0);
        assert_eq!(config.fetch.attempts, 3);
        assert_eq!(config.sources.len(), 3);
    }

    #[test]
    fn test_custom_sources() {
        let config = Config::from_toml(
            r#"
            [[sources]]
            name = "Local"
            url = "https://lists.example.com/ads.txt"
            "#,
        )
        .unwrap();
        assert_eq!(
            config.sources,
            vec![FilterSource::new("Local", "https://lists.example.com/ads.txt")]
        );
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validation() {
        let mut config = Config::default();
        config.max_rules = MAX_RULES + 1;
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));

        let mut config = Config::default();
        config.fetch.attempts = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.sources = vec![FilterSource::new("Bad", "ftp://example.com/list.txt")];
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_load_missing_file() {
        let err = Config::load(Some(Path::new("/nonexistent/goodtube.toml"))).unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }
}
