//! Configuration module for the jokebox server.
//!
//! Supports both command-line arguments and TOML configuration file.
//! CLI arguments take precedence over config file values.

use clap::Parser;
use serde::Deserialize;
use std::path::PathBuf;

/// Command-line arguments for the joke server
#[derive(Parser, Debug)]
#[command(name = "jokebox")]
#[command(author = "jokebox authors")]
#[command(version = "0.1.0")]
#[command(about = "A multi-client knock-knock joke server", long_about = None)]
pub struct CliArgs {
    /// Path to TOML configuration file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Address to bind to (e.g., 127.0.0.1:8079)
    #[arg(short = 'l', long)]
    pub listen: Option<String>,

    /// Path to the joke catalog file
    #[arg(short = 'j', long)]
    pub jokes: Option<PathBuf>,

    /// Listen backlog (OS pending-connection queue, not a session cap)
    #[arg(short = 'b', long)]
    pub backlog: Option<u32>,

    /// Seconds with zero sessions before the server shuts itself down
    #[arg(long)]
    pub idle_grace: Option<u64>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    pub log_level: String,
}

/// TOML configuration file structure
#[derive(Debug, Deserialize, Default)]
pub struct TomlConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub catalog: CatalogConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Server-related configuration
#[derive(Debug, Deserialize)]
pub struct ServerConfig {
    /// Address to bind to
    #[serde(default = "default_listen")]
    pub listen: String,
    /// Listen backlog
    #[serde(default = "default_backlog")]
    pub backlog: u32,
    /// Idle-shutdown grace period in seconds
    #[serde(default = "default_idle_grace")]
    pub idle_grace_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen: default_listen(),
            backlog: default_backlog(),
            idle_grace_secs: default_idle_grace(),
        }
    }
}

/// Joke catalog configuration
#[derive(Debug, Deserialize)]
pub struct CatalogConfig {
    /// Path to the catalog file
    #[serde(default = "default_jokes_path")]
    pub path: PathBuf,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            path: default_jokes_path(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Deserialize)]
pub struct LoggingConfig {
    /// Log level
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_listen() -> String {
    "127.0.0.1:8079".to_string()
}

fn default_backlog() -> u32 {
    10
}

fn default_idle_grace() -> u64 {
    10 // seconds
}

fn default_jokes_path() -> PathBuf {
    PathBuf::from("jokes.toml")
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Final resolved configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub listen: String,
    pub jokes_path: PathBuf,
    pub backlog: u32,
    pub idle_grace: u64,
    pub log_level: String,
}

impl Config {
    /// Load configuration from CLI args and optional TOML file.
    /// CLI arguments take precedence over TOML file values.
    pub fn load() -> Result<Self, ConfigError> {
        Self::resolve(CliArgs::parse())
    }

    /// Merge CLI args with the TOML config they point at.
    fn resolve(cli: CliArgs) -> Result<Self, ConfigError> {
        let toml_config = if let Some(ref config_path) = cli.config {
            let contents = std::fs::read_to_string(config_path)
                .map_err(|e| ConfigError::FileRead(config_path.clone(), e))?;
            toml::from_str(&contents)
                .map_err(|e| ConfigError::TomlParse(config_path.clone(), e))?
        } else {
            TomlConfig::default()
        };

        Ok(Config {
            listen: cli.listen.unwrap_or(toml_config.server.listen),
            jokes_path: cli.jokes.unwrap_or(toml_config.catalog.path),
            backlog: cli.backlog.unwrap_or(toml_config.server.backlog),
            idle_grace: cli.idle_grace.unwrap_or(toml_config.server.idle_grace_secs),
            log_level: if cli.log_level != "info" {
                cli.log_level
            } else {
                toml_config.logging.level
            },
        })
    }
}

/// Configuration loading errors
#[derive(Debug)]
pub enum ConfigError {
    FileRead(PathBuf, std::io::Error),
    TomlParse(PathBuf, toml::de::Error),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::FileRead(path, e) => {
                write!(f, "Failed to read config file '{}': {}", path.display(), e)
            }
            ConfigError::TomlParse(path, e) => {
                write!(f, "Failed to parse config file '{}': {}", path.display(), e)
            }
        }
    }
}

impl std::error::Error for ConfigError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = TomlConfig::default();
        assert_eq!(config.server.listen, "127.0.0.1:8079");
        assert_eq!(config.server.backlog, 10);
        assert_eq!(config.server.idle_grace_secs, 10);
        assert_eq!(config.catalog.path, PathBuf::from("jokes.toml"));
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_toml_parsing() {
        let toml_str = r#"
            [server]
            listen = "0.0.0.0:8079"
            backlog = 32
            idle_grace_secs = 30

            [catalog]
            path = "data/more-jokes.toml"

            [logging]
            level = "debug"
        "#;

        let config: TomlConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.server.listen, "0.0.0.0:8079");
        assert_eq!(config.server.backlog, 32);
        assert_eq!(config.server.idle_grace_secs, 30);
        assert_eq!(config.catalog.path, PathBuf::from("data/more-jokes.toml"));
        assert_eq!(config.logging.level, "debug");
    }

    #[test]
    fn test_cli_overrides_defaults() {
        let cli = CliArgs {
            config: None,
            listen: Some("0.0.0.0:9000".to_string()),
            jokes: None,
            backlog: None,
            idle_grace: Some(5),
            log_level: "info".to_string(),
        };

        let config = Config::resolve(cli).unwrap();
        assert_eq!(config.listen, "0.0.0.0:9000");
        assert_eq!(config.idle_grace, 5);
        assert_eq!(config.jokes_path, PathBuf::from("jokes.toml"));
        assert_eq!(config.backlog, 10);
    }
}
