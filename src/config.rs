//! Configuration file handling.
//!
//! This module handles loading and merging configuration from
//! `.power-stats.toml` files.

use crate::survey::SurveyConfig;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Root configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Node connection settings.
    #[serde(default)]
    pub node: NodeConfig,

    /// Survey settings.
    #[serde(default)]
    pub survey: SurveySettings,
}

/// Node connection settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NodeConfig {
    /// Bearer token for the node API.
    #[serde(default)]
    pub token: Option<String>,
}

/// Survey settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SurveySettings {
    /// Number of concurrent miner surveys in flight.
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,

    /// Deadline for every network call, in seconds.
    #[serde(default = "default_call_timeout")]
    pub call_timeout_seconds: u64,

    /// Optional deadline for the whole run, in seconds.
    #[serde(default)]
    pub run_timeout_seconds: Option<u64>,
}

impl Default for SurveySettings {
    fn default() -> Self {
        Self {
            concurrency: default_concurrency(),
            call_timeout_seconds: default_call_timeout(),
            run_timeout_seconds: None,
        }
    }
}

fn default_concurrency() -> usize {
    100
}

fn default_call_timeout() -> u64 {
    30
}

impl SurveySettings {
    /// The per-call deadline as a duration.
    pub fn call_timeout(&self) -> Duration {
        Duration::from_secs(self.call_timeout_seconds)
    }

    /// Convert the settings into the engine's configuration.
    pub fn survey_config(&self) -> SurveyConfig {
        SurveyConfig {
            concurrency: self.concurrency,
            call_timeout: self.call_timeout(),
            run_timeout: self.run_timeout_seconds.map(Duration::from_secs),
        }
    }
}

impl Config {
    /// Load configuration from a file path.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    /// Try to load configuration from the default location.
    ///
    /// Returns `Ok(None)` if the file doesn't exist, `Err` if it exists but can't be parsed.
    pub fn load_default() -> Result<Option<Self>> {
        let default_path = Path::new(".power-stats.toml");

        if default_path.exists() {
            Ok(Some(Self::load(default_path)?))
        } else {
            Ok(None)
        }
    }

    /// Merge this configuration with CLI arguments.
    ///
    /// CLI arguments take precedence over config file settings; only
    /// explicitly provided values override.
    pub fn merge_with_args(&mut self, args: &crate::cli::Args) {
        if let Some(ref token) = args.token {
            self.node.token = Some(token.clone());
        }

        if let Some(concurrency) = args.concurrency {
            self.survey.concurrency = concurrency;
        }

        if let Some(timeout) = args.timeout {
            self.survey.call_timeout_seconds = timeout;
        }

        if let Some(run_timeout) = args.run_timeout {
            self.survey.run_timeout_seconds = Some(run_timeout);
        }
    }

    /// Generate a default configuration file content.
    pub fn default_toml() -> String {
        let config = Config::default();
        toml::to_string_pretty(&config).unwrap_or_else(|_| String::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.survey.concurrency, 100);
        assert_eq!(config.survey.call_timeout_seconds, 30);
        assert!(config.survey.run_timeout_seconds.is_none());
        assert!(config.node.token.is_none());
    }

    #[test]
    fn test_parse_config() {
        let toml_content = r#"
[node]
token = "secret"

[survey]
concurrency = 25
call_timeout_seconds = 10
run_timeout_seconds = 600
"#;

        let config: Config = toml::from_str(toml_content).unwrap();
        assert_eq!(config.node.token.as_deref(), Some("secret"));
        assert_eq!(config.survey.concurrency, 25);
        assert_eq!(config.survey.call_timeout_seconds, 10);
        assert_eq!(config.survey.run_timeout_seconds, Some(600));
    }

    #[test]
    fn test_merge_cli_takes_precedence() {
        let mut config: Config = toml::from_str(
            r#"
[survey]
concurrency = 25
"#,
        )
        .unwrap();

        let args = crate::cli::Args {
            node: Some("ws://127.0.0.1:3453/rpc/v1".to_string()),
            token: Some("cli-token".to_string()),
            concurrency: Some(8),
            timeout: Some(5),
            run_timeout: None,
            log_level: "error".to_string(),
            config: None,
            format: crate::cli::OutputFormat::Text,
            init_config: false,
        };

        config.merge_with_args(&args);
        assert_eq!(config.node.token.as_deref(), Some("cli-token"));
        assert_eq!(config.survey.concurrency, 8);
        assert_eq!(config.survey.call_timeout_seconds, 5);
        assert!(config.survey.run_timeout_seconds.is_none());
    }

    #[test]
    fn test_survey_config_conversion() {
        let settings = SurveySettings {
            concurrency: 4,
            call_timeout_seconds: 15,
            run_timeout_seconds: Some(120),
        };

        let config = settings.survey_config();
        assert_eq!(config.concurrency, 4);
        assert_eq!(config.call_timeout, Duration::from_secs(15));
        assert_eq!(config.run_timeout, Some(Duration::from_secs(120)));
    }

    #[test]
    fn test_default_toml_generation() {
        let toml_str = Config::default_toml();
        assert!(!toml_str.is_empty());
        assert!(toml_str.contains("[survey]"));
        assert!(toml_str.contains("concurrency = 100"));
    }
}
