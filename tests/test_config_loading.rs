//! Configuration loading tests
//!
//! Tests focus on the observable outcome of loading a configuration from
//! disk: format selection, extension resolution, defaults and errors.

use mqtt_bootstrap::config::{ConfigError, MqttConfig};
use std::fs;
use std::io::Write;
use tempfile::{tempdir, Builder};

#[test]
fn test_config_loads_from_toml() {
    let mut temp_file = Builder::new().suffix(".toml").tempfile().unwrap();
    writeln!(
        temp_file,
        r#"
brokers = ["localhost:1883", "backup.local:1884"]
client_id = "svc"
ping_timeout = 10
max_reconnect_interval = 5
connect_timeout = 3
"#
    )
    .unwrap();

    let config = MqttConfig::load(temp_file.path()).unwrap();

    assert_eq!(config.brokers, vec!["localhost:1883", "backup.local:1884"]);
    assert_eq!(config.client_id, "svc");
    assert_eq!(config.ping_timeout, 10);
    assert_eq!(config.max_reconnect_interval, 5);
    assert_eq!(config.connect_timeout, 3);
}

#[test]
fn test_config_loads_from_yaml() {
    let mut temp_file = Builder::new().suffix(".yaml").tempfile().unwrap();
    writeln!(
        temp_file,
        r#"
brokers:
  - localhost:1883
client_id: sensor
connect_timeout: 7
"#
    )
    .unwrap();

    let config = MqttConfig::load(temp_file.path()).unwrap();

    assert_eq!(config.brokers, vec!["localhost:1883"]);
    assert_eq!(config.client_id, "sensor");
    assert_eq!(config.connect_timeout, 7);
    assert_eq!(config.ping_timeout, 10);
}

#[test]
fn test_config_loads_from_json() {
    let mut temp_file = Builder::new().suffix(".json").tempfile().unwrap();
    writeln!(
        temp_file,
        r#"{{"brokers": ["mqtt.example.com:1883"], "client_id": "gw", "max_reconnect_interval": 30}}"#
    )
    .unwrap();

    let config = MqttConfig::load(temp_file.path()).unwrap();

    assert_eq!(config.brokers, vec!["mqtt.example.com:1883"]);
    assert_eq!(config.client_id, "gw");
    assert_eq!(config.max_reconnect_interval, 30);
}

#[test]
fn test_named_path_resolves_extension() {
    let dir = tempdir().unwrap();
    fs::write(
        dir.path().join("mqtt.yaml"),
        "brokers: [\"localhost:1883\"]\nclient_id: from-yaml\n",
    )
    .unwrap();

    let config = MqttConfig::load(dir.path().join("mqtt")).unwrap();
    assert_eq!(config.client_id, "from-yaml");
}

#[test]
fn test_toml_wins_over_other_formats() {
    let dir = tempdir().unwrap();
    fs::write(dir.path().join("mqtt.toml"), "client_id = \"from-toml\"\n").unwrap();
    fs::write(dir.path().join("mqtt.json"), r#"{"client_id": "from-json"}"#).unwrap();

    let config = MqttConfig::load(dir.path().join("mqtt")).unwrap();
    assert_eq!(config.client_id, "from-toml");
}

#[test]
fn test_missing_config_is_not_found() {
    let dir = tempdir().unwrap();

    let result = MqttConfig::load(dir.path().join("mqtt"));
    assert!(matches!(result, Err(ConfigError::NotFound(_))));
}

#[test]
fn test_missing_file_with_extension_is_read_error() {
    let dir = tempdir().unwrap();

    let result = MqttConfig::load(dir.path().join("absent.toml"));
    assert!(matches!(result, Err(ConfigError::FileRead(_))));
}

#[test]
fn test_malformed_toml_is_parse_error() {
    let mut temp_file = Builder::new().suffix(".toml").tempfile().unwrap();
    writeln!(temp_file, "brokers = [\"unterminated").unwrap();

    let result = MqttConfig::load(temp_file.path());
    assert!(matches!(result, Err(ConfigError::TomlParse(_))));
}

#[test]
fn test_wrong_field_type_is_parse_error() {
    let mut temp_file = Builder::new().suffix(".json").tempfile().unwrap();
    writeln!(temp_file, r#"{{"ping_timeout": "ten"}}"#).unwrap();

    let result = MqttConfig::load(temp_file.path());
    assert!(matches!(result, Err(ConfigError::JsonParse(_))));
}

#[test]
fn test_empty_file_uses_defaults() {
    let temp_file = Builder::new().suffix(".toml").tempfile().unwrap();

    let config = MqttConfig::load(temp_file.path()).unwrap();
    assert_eq!(config, MqttConfig::default());
    assert!(config.brokers.is_empty());
}

#[test]
fn test_credentials_come_from_environment() {
    let mut temp_file = Builder::new().suffix(".toml").tempfile().unwrap();
    writeln!(
        temp_file,
        r#"
brokers = ["localhost:1883"]
username_env = "MQTT_BOOTSTRAP_TEST_USER"
password_env = "MQTT_BOOTSTRAP_TEST_UNSET_PASS"
"#
    )
    .unwrap();
    std::env::set_var("MQTT_BOOTSTRAP_TEST_USER", "device-7");

    let config = MqttConfig::load(temp_file.path()).unwrap();

    assert_eq!(config.get_mqtt_username(), Some("device-7".to_string()));
    assert_eq!(config.get_mqtt_password(), None);
}
