//! Configuration file handling for rackflash

use anyhow::{Context, Result};
use rackflash_flash::FlashConfig;
use rackflash_kwp::TransportConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Bus used when neither the command line nor the config file names one
pub const DEFAULT_BUS: u8 = 1;

/// Configuration for the CLI tool
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Default CAN bus index
    pub bus: Option<u8>,
    /// Default output format
    pub output: Option<String>,
    /// Disable colored output
    pub no_color: Option<bool>,
    /// Flash tuning
    #[serde(default)]
    pub flash: FlashConfig,
    /// How to reach the unit
    #[serde(default)]
    pub transport: TransportConfig,
}

impl Config {
    /// Load configuration from the default config file
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path()?;
        if config_path.exists() {
            Self::load_from(&config_path)
        } else {
            Ok(Self::default())
        }
    }

    /// Load configuration from a specific path
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        Self::parse(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }

    fn parse(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content)?;
        config.flash.validate()?;
        Ok(config)
    }

    /// Get the default config file path
    pub fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .context("Could not determine config directory")?
            .join("rackflash");

        Ok(config_dir.join("config.toml"))
    }

    /// Merge CLI arguments over config file values
    pub fn merge_with_args(
        &self,
        bus: Option<u8>,
        output: Option<&str>,
        no_color: bool,
    ) -> MergedConfig {
        MergedConfig {
            bus: bus.or(self.bus).unwrap_or(DEFAULT_BUS),
            output: output
                .map(String::from)
                .or_else(|| self.output.clone())
                .unwrap_or_else(|| "table".to_string()),
            no_color: no_color || self.no_color.unwrap_or(false),
        }
    }
}

/// Fully resolved configuration after merging CLI args
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergedConfig {
    pub bus: u8,
    pub output: String,
    pub no_color: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rackflash_kwp::MockConfig;

    #[test]
    fn empty_file_uses_defaults() {
        let config = Config::parse("").unwrap();
        assert_eq!(config.flash, FlashConfig::default());
        assert_eq!(config.transport, TransportConfig::default());
        assert_eq!(config.bus, None);
    }

    #[test]
    fn full_file() {
        let config = Config::parse(
            r#"
            bus = 0
            output = "json"
            no_color = true

            [flash]
            reconnect_attempts = 20
            reconnect_backoff_ms = 500

            [transport]
            type = "mock"
            latency_ms = 2
            "#,
        )
        .unwrap();

        assert_eq!(config.bus, Some(0));
        assert_eq!(config.flash.reconnect_attempts, 20);
        assert_eq!(config.flash.chunk_size, 240);
        assert_eq!(config.transport, TransportConfig::Mock(MockConfig { latency_ms: 2 }));
    }

    #[test]
    fn invalid_flash_section_rejected() {
        assert!(Config::parse("[flash]\nchunk_size = 0\n").is_err());
        assert!(Config::parse("server = \"x\"\n").is_err());
    }

    #[test]
    fn arguments_win_over_file() {
        let config = Config {
            bus: Some(0),
            output: Some("json".to_string()),
            ..Config::default()
        };

        assert_eq!(
            config.merge_with_args(Some(2), None, false),
            MergedConfig {
                bus: 2,
                output: "json".to_string(),
                no_color: false,
            }
        );
        assert_eq!(config.merge_with_args(None, Some("table"), true).bus, 0);
        assert_eq!(Config::default().merge_with_args(None, None, false).bus, DEFAULT_BUS);
    }

    #[test]
    fn load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "bus = 3\n").unwrap();

        assert_eq!(Config::load_from(&path).unwrap().bus, Some(3));
        assert!(Config::load_from(&dir.path().join("missing.toml")).is_err());
    }
}
