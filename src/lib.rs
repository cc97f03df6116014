//! MQTT Connection Bootstrapper
//!
//! Turns a configuration record into a live, self-reconnecting MQTT client
//! connection and installs an interrupt handler that disconnects it cleanly.
//!
//! # Overview
//!
//! - Configuration loading from TOML, YAML or JSON
//! - Client options: persistent session, auto reconnect, bounded backoff
//! - Unique client identifiers (`<base>-<uuid v4>`) per process
//! - One-shot SIGINT listener with a short disconnect grace period
//!
//! # Quick Start
//!
//! ```rust
//! use mqtt_bootstrap::config::MqttConfig;
//! use mqtt_bootstrap::transport::mqtt::ClientOptions;
//! use std::time::Duration;
//!
//! let config = MqttConfig {
//!     brokers: vec!["localhost:1883".to_string()],
//!     client_id: "svc".to_string(),
//!     ping_timeout: 10,
//!     max_reconnect_interval: 5,
//!     connect_timeout: 3,
//!     ..Default::default()
//! };
//!
//! let options = ClientOptions::from_config(&config, None);
//! assert!(options.client_id.starts_with("svc-"));
//! assert!(!options.clean_session);
//! assert_eq!(options.brokers, vec!["tcp://localhost:1883"]);
//! assert_eq!(options.max_reconnect_interval, Duration::from_secs(5));
//! ```

pub mod bootstrap;
pub mod config;
pub mod error;
pub mod observability;
pub mod testing;
pub mod transport;

pub use bootstrap::{initialize, initialize_with_config, InterruptOutcome, Session};
pub use config::{ConfigError, MqttConfig};
pub use error::{BootstrapError, BootstrapResult};
pub use transport::mqtt::MqttClient;
pub use transport::Transport;
