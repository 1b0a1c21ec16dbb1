//! Configuration for Sendpace

use serde::{Deserialize, Serialize};

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Server configuration
    #[serde(default)]
    pub server: ServerConfig,

    /// Database configuration
    pub database: DatabaseConfig,

    /// Provider transport configuration
    #[serde(default)]
    pub transport: TransportConfig,

    /// Queue processor configuration
    #[serde(default)]
    pub processor: ProcessorConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Hostname used in logs and outbound identification
    #[serde(default = "default_hostname")]
    pub hostname: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            hostname: default_hostname(),
        }
    }
}

fn default_hostname() -> String {
    "localhost".to_string()
}

/// Database configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Database URL (PostgreSQL)
    pub url: String,

    /// Maximum connections
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,

    /// Minimum connections
    #[serde(default = "default_min_connections")]
    pub min_connections: u32,
}

fn default_max_connections() -> u32 {
    20
}

fn default_min_connections() -> u32 {
    5
}

/// Provider transport configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransportConfig {
    /// Base URL of the provider API
    #[serde(default = "default_transport_base_url")]
    pub base_url: String,

    /// Per-request timeout in seconds
    #[serde(default = "default_transport_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            base_url: default_transport_base_url(),
            timeout_secs: default_transport_timeout_secs(),
        }
    }
}

fn default_transport_base_url() -> String {
    "https://api.zentra.io/v1".to_string()
}

fn default_transport_timeout_secs() -> u64 {
    30
}

/// Queue processor configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessorConfig {
    /// Interval between queue sweeps (seconds)
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,

    /// Maximum due items picked per sweep
    #[serde(default = "default_batch_size")]
    pub batch_size: i64,
}

impl Default for ProcessorConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: default_poll_interval_secs(),
            batch_size: default_batch_size(),
        }
    }
}

fn default_poll_interval_secs() -> u64 {
    5
}

fn default_batch_size() -> i64 {
    10
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level filter (overridden by RUST_LOG)
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Output format: "text" or "json"
    #[serde(default = "default_log_format")]
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "text".to_string()
}

impl Config {
    /// Load configuration from file
    pub fn from_file(path: &std::path::Path) -> crate::Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| crate::Error::Config(format!("Failed to read config file: {}", e)))?;

        let config: Config = toml::from_str(&content)
            .map_err(|e| crate::Error::Config(format!("Failed to parse config: {}", e)))?;

        Ok(config)
    }

    /// Load configuration from default locations
    pub fn load() -> crate::Result<Self> {
        let paths = [
            std::path::PathBuf::from("./config.toml"),
            std::path::PathBuf::from("/etc/sendpace/config.toml"),
        ];

        for path in paths {
            if path.exists() {
                return Self::from_file(&path);
            }
        }

        Err(crate::Error::Config(
            "No configuration file found".to_string(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let processor = ProcessorConfig::default();
        assert_eq!(processor.poll_interval_secs, 5);
        assert_eq!(processor.batch_size, 10);

        let transport = TransportConfig::default();
        assert_eq!(transport.timeout_secs, 30);
    }

    #[test]
    fn test_parse_config() {
        let toml = r#"
[server]
hostname = "pace.example.com"

[database]
url = "postgres://localhost/sendpace"

[processor]
poll_interval_secs = 2
"#;

        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.server.hostname, "pace.example.com");
        assert_eq!(config.database.url, "postgres://localhost/sendpace");
        assert_eq!(config.database.max_connections, 20);
        assert_eq!(config.processor.poll_interval_secs, 2);
        assert_eq!(config.processor.batch_size, 10);
        assert_eq!(config.logging.level, "info");
    }
}
