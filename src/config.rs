//! Broker configuration for the connection bootstrapper
//!
//! The configuration is read once at startup, turned into client options and
//! then dropped. TOML, YAML and JSON files are accepted; the format is picked
//! from the file extension.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Default named location of the MQTT configuration, without extension
pub const DEFAULT_CONFIG_PATH: &str = "config/mqtt";

/// Extensions tried, in order, when the configured path has none
const CONFIG_EXTENSIONS: [&str; 4] = ["toml", "yaml", "yml", "json"];

/// MQTT connection configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MqttConfig {
    /// Broker addresses as `host:port`, tried in order
    #[serde(default)]
    pub brokers: Vec<String>,
    /// Base client identifier; a random suffix is appended per connection
    #[serde(default = "default_client_id")]
    pub client_id: String,
    /// Seconds to wait for a PINGRESP before the connection counts as lost
    #[serde(default = "default_ping_timeout")]
    pub ping_timeout: u64,
    /// Upper bound in seconds for the reconnect backoff
    #[serde(default = "default_max_reconnect_interval")]
    pub max_reconnect_interval: u64,
    /// Seconds allowed for the initial connect handshake across all brokers.
    /// Also the per-broker network timeout; 0 removes the overall bound and
    /// leaves each attempt at the client library's 5 s default
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout: u64,
    /// Keep-alive interval in seconds
    #[serde(default = "default_keep_alive")]
    pub keep_alive: u64,
    /// Environment variable containing username
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username_env: Option<String>,
    /// Environment variable containing password
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password_env: Option<String>,
}

fn default_client_id() -> String {
    "mqtt-client".to_string()
}

fn default_ping_timeout() -> u64 {
    10
}

fn default_max_reconnect_interval() -> u64 {
    600 // 10 minutes
}

fn default_connect_timeout() -> u64 {
    30
}

fn default_keep_alive() -> u64 {
    30
}

impl Default for MqttConfig {
    fn default() -> Self {
        Self {
            brokers: Vec::new(),
            client_id: default_client_id(),
            ping_timeout: default_ping_timeout(),
            max_reconnect_interval: default_max_reconnect_interval(),
            connect_timeout: default_connect_timeout(),
            keep_alive: default_keep_alive(),
            username_env: None,
            password_env: None,
        }
    }
}

/// Configuration loading errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    FileRead(#[from] std::io::Error),
    #[error("Failed to parse TOML: {0}")]
    TomlParse(#[from] toml::de::Error),
    #[error("Failed to parse YAML: {0}")]
    YamlParse(#[from] serde_yaml::Error),
    #[error("Failed to parse JSON: {0}")]
    JsonParse(#[from] serde_json::Error),
    #[error("Unsupported config format: {0}")]
    UnsupportedFormat(String),
    #[error("No configuration found at {0} (tried .toml, .yaml, .yml, .json)")]
    NotFound(String),
}

/// On-disk format of a configuration file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    Toml,
    Yaml,
    Json,
}

impl ConfigFormat {
    /// Pick the format from a file extension
    pub fn from_path(path: &Path) -> Result<Self, ConfigError> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_lowercase)
            .unwrap_or_default();

        match ext.as_str() {
            "toml" => Ok(ConfigFormat::Toml),
            "yaml" | "yml" => Ok(ConfigFormat::Yaml),
            "json" => Ok(ConfigFormat::Json),
            _ => Err(ConfigError::UnsupportedFormat(path.display().to_string())),
        }
    }
}

impl MqttConfig {
    /// Load configuration from a named path.
    ///
    /// A path with a known extension is read directly. Otherwise each of
    /// `.toml`, `.yaml`, `.yml` and `.json` is appended in turn and the first
    /// existing file wins.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        if ConfigFormat::from_path(path).is_ok() {
            return Self::load_from_file(path);
        }

        let resolved = resolve_config_path(path)
            .ok_or_else(|| ConfigError::NotFound(path.display().to_string()))?;
        Self::load_from_file(&resolved)
    }

    /// Load configuration from a file whose extension names its format
    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let format = ConfigFormat::from_path(path)?;
        let content = std::fs::read_to_string(path)?;
        Self::parse(&content, format)
    }

    /// Parse configuration text in the given format
    pub fn parse(content: &str, format: ConfigFormat) -> Result<Self, ConfigError> {
        let config = match format {
            ConfigFormat::Toml => toml::from_str(content)?,
            ConfigFormat::Yaml => serde_yaml::from_str(content)?,
            ConfigFormat::Json => serde_json::from_str(content)?,
        };
        Ok(config)
    }

    pub fn ping_timeout(&self) -> Duration {
        Duration::from_secs(self.ping_timeout)
    }

    pub fn max_reconnect_interval(&self) -> Duration {
        Duration::from_secs(self.max_reconnect_interval)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout)
    }

    pub fn keep_alive(&self) -> Duration {
        Duration::from_secs(self.keep_alive)
    }

    /// Get MQTT username from environment variable
    pub fn get_mqtt_username(&self) -> Option<String> {
        get_env_var_optional(self.username_env.as_ref())
    }

    /// Get MQTT password from environment variable
    pub fn get_mqtt_password(&self) -> Option<String> {
        get_env_var_optional(self.password_env.as_ref())
    }
}

fn get_env_var_optional(env_var_name: Option<&String>) -> Option<String> {
    env_var_name.and_then(|name| std::env::var(name).ok())
}

/// Find the first existing `<path>.<ext>` for the supported extensions
fn resolve_config_path(path: &Path) -> Option<PathBuf> {
    CONFIG_EXTENSIONS.iter().find_map(|ext| {
        let mut candidate = path.as_os_str().to_owned();
        candidate.push(".");
        candidate.push(ext);
        let candidate = PathBuf::from(candidate);
        candidate.is_file().then_some(candidate)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_toml_config() {
        let toml_content = r#"
brokers = ["localhost:1883", "backup:1884"]
client_id = "svc"
ping_timeout = 10
max_reconnect_interval = 5
connect_timeout = 3
"#;

        let config = MqttConfig::parse(toml_content, ConfigFormat::Toml).unwrap();
        assert_eq!(config.brokers, vec!["localhost:1883", "backup:1884"]);
        assert_eq!(config.client_id, "svc");
        assert_eq!(config.ping_timeout, 10);
        assert_eq!(config.max_reconnect_interval, 5);
        assert_eq!(config.connect_timeout, 3);
        assert_eq!(config.keep_alive, 30);
    }

    #[test]
    fn test_yaml_config() {
        let yaml_content = r#"
brokers:
  - "mq.internal:1883"
client_id: worker
ping_timeout: 30
max_reconnect_interval: 60
connect_timeout: 5
"#;

        let config = MqttConfig::parse(yaml_content, ConfigFormat::Yaml).unwrap();
        assert_eq!(config.brokers, vec!["mq.internal:1883"]);
        assert_eq!(config.client_id, "worker");
        assert_eq!(config.ping_timeout(), Duration::from_secs(30));
    }

    #[test]
    fn test_json_config() {
        let json_content = r#"{"brokers":["127.0.0.1:1883"],"client_id":"edge","ping_timeout":1,"max_reconnect_interval":2,"connect_timeout":3}"#;

        let config = MqttConfig::parse(json_content, ConfigFormat::Json).unwrap();
        assert_eq!(config.client_id, "edge");
        assert_eq!(config.connect_timeout(), Duration::from_secs(3));
        assert_eq!(config.max_reconnect_interval(), Duration::from_secs(2));
    }

    #[test]
    fn test_minimal_config_uses_defaults() {
        let config = MqttConfig::parse("", ConfigFormat::Toml).unwrap();
        assert!(config.brokers.is_empty());
        assert_eq!(config, MqttConfig::default());
        assert_eq!(config.ping_timeout(), Duration::from_secs(10));
        assert_eq!(config.connect_timeout(), Duration::from_secs(30));
        assert_eq!(config.max_reconnect_interval(), Duration::from_secs(600));
    }

    #[test]
    fn test_durations_are_whole_seconds() {
        let config = MqttConfig {
            ping_timeout: 30,
            max_reconnect_interval: 45,
            connect_timeout: 0,
            ..Default::default()
        };
        assert_eq!(config.ping_timeout(), Duration::from_secs(30));
        assert_eq!(config.max_reconnect_interval(), Duration::from_secs(45));
        assert_eq!(config.connect_timeout(), Duration::ZERO);
    }

    #[test]
    fn test_negative_timeout_rejected() {
        let result = MqttConfig::parse("ping_timeout = -1", ConfigFormat::Toml);
        assert!(matches!(result, Err(ConfigError::TomlParse(_))));
    }

    #[test]
    fn test_format_from_path() {
        assert_eq!(
            ConfigFormat::from_path(Path::new("config/mqtt.toml")).unwrap(),
            ConfigFormat::Toml
        );
        assert_eq!(
            ConfigFormat::from_path(Path::new("mqtt.YML")).unwrap(),
            ConfigFormat::Yaml
        );
        assert_eq!(
            ConfigFormat::from_path(Path::new("mqtt.json")).unwrap(),
            ConfigFormat::Json
        );
        assert!(matches!(
            ConfigFormat::from_path(Path::new("config/mqtt")),
            Err(ConfigError::UnsupportedFormat(_))
        ));
    }

    #[test]
    fn test_credentials_from_env() {
        std::env::set_var("MQTT_BOOTSTRAP_TEST_USER", "alice");
        let config = MqttConfig {
            username_env: Some("MQTT_BOOTSTRAP_TEST_USER".to_string()),
            password_env: Some("MQTT_BOOTSTRAP_TEST_PASS_UNSET".to_string()),
            ..Default::default()
        };
        assert_eq!(config.get_mqtt_username(), Some("alice".to_string()));
        assert_eq!(config.get_mqtt_password(), None);
    }
}
