//! Pure connection state management for MQTT client
//!
//! This module contains pure functions for connection state management,
//! client option construction and broker address handling.

use crate::config::MqttConfig;
use rumqttc::{MqttOptions, Transport as RumqttcTransport};
use std::fmt;
use std::time::Duration;
use thiserror::Error;
use url::Url;
use uuid::Uuid;

/// Initial reconnect delay; doubled on every failed attempt
pub const INITIAL_RECONNECT_DELAY: Duration = Duration::from_secs(1);

/// Cap used when the configured reconnect interval is zero
pub const DEFAULT_MAX_RECONNECT_INTERVAL: Duration = Duration::from_secs(600);

/// rumqttc's per-attempt network timeout, kept when `connect_timeout` is zero
pub const DEFAULT_NETWORK_TIMEOUT: Duration = Duration::from_secs(5);

const DEFAULT_PORT: u16 = 1883;
const DEFAULT_TLS_PORT: u16 = 8883;

/// Connection state for MQTT client
#[derive(Debug, Clone, PartialEq)]
pub enum ConnectionState {
    /// Connect handshake in progress
    Connecting,
    /// Successfully connected and ready for operations
    Connected,
    /// Disconnected with reason
    Disconnected(String),
    /// Attempting to reconnect (attempt count)
    Reconnecting(u32),
}

/// Reconnection configuration
#[derive(Debug, Clone, PartialEq)]
pub struct ReconnectConfig {
    /// Delay before the first reconnect attempt
    pub initial_delay: Duration,
    /// Upper bound for the doubled delay
    pub max_interval: Duration,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            initial_delay: INITIAL_RECONNECT_DELAY,
            max_interval: DEFAULT_MAX_RECONNECT_INTERVAL,
        }
    }
}

impl ReconnectConfig {
    /// Build a policy capped at `max_interval`; zero falls back to the default cap
    pub fn new(max_interval: Duration) -> Self {
        let max_interval = if max_interval.is_zero() {
            DEFAULT_MAX_RECONNECT_INTERVAL
        } else {
            max_interval
        };
        Self {
            initial_delay: INITIAL_RECONNECT_DELAY,
            max_interval,
        }
    }

    /// Calculate backoff delay for given attempt (1-based)
    /// Pattern: 1s, 2s, 4s, 8s ... then sustain at `max_interval`
    pub fn calculate_backoff_delay(&self, attempt: u32) -> Duration {
        let factor = 1u32
            .checked_shl(attempt.saturating_sub(1))
            .unwrap_or(u32::MAX);
        self.initial_delay
            .saturating_mul(factor)
            .min(self.max_interval)
    }
}

/// MQTT transport errors
#[derive(Debug, Error)]
pub enum MqttError {
    #[error("Connection failed: {0}")]
    ConnectionFailedStr(String),
    #[error("Connection lost: {0}")]
    ConnectionLost(String),
    #[error("Connect timed out after {0:?}")]
    ConnectTimeout(Duration),
    #[error("No broker addresses configured")]
    NoBrokers,
    #[error("Invalid broker URL: {0}")]
    InvalidBrokerUrl(String),
    #[error("Invalid client identifier: {0:?}")]
    InvalidClientId(String),
    #[error("Client already connected")]
    AlreadyConnected,
    #[error("Not connected - current state: {state:?}")]
    NotConnected { state: ConnectionState },
    #[error("Publishing failed")]
    PublishFailed(#[source] Box<dyn std::error::Error + Send + Sync>),
    #[error("Subscription failed")]
    SubscriptionFailed(#[source] Box<dyn std::error::Error + Send + Sync>),
    #[error("Disconnect failed")]
    DisconnectFailed(#[source] Box<dyn std::error::Error + Send + Sync>),
}

/// A parsed broker endpoint
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BrokerAddress {
    pub host: String,
    pub port: u16,
    pub tls: bool,
}

impl BrokerAddress {
    /// Parse a broker address; bare `host:port` is read as `tcp://host:port`
    pub fn parse(address: &str) -> Result<Self, MqttError> {
        let url = Url::parse(&broker_url(address))
            .map_err(|_| MqttError::InvalidBrokerUrl(address.to_string()))?;

        let tls = match url.scheme() {
            "tcp" | "mqtt" => false,
            "ssl" | "tls" | "mqtts" => true,
            _ => return Err(MqttError::InvalidBrokerUrl(address.to_string())),
        };

        let host = url
            .host_str()
            .filter(|h| !h.is_empty())
            .ok_or_else(|| MqttError::InvalidBrokerUrl(address.to_string()))?;
        let port = url
            .port()
            .unwrap_or(if tls { DEFAULT_TLS_PORT } else { DEFAULT_PORT });

        Ok(Self {
            host: host.to_string(),
            port,
            tls,
        })
    }
}

impl fmt::Display for BrokerAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let scheme = if self.tls { "ssl" } else { "tcp" };
        write!(f, "{scheme}://{}:{}", self.host, self.port)
    }
}

/// Prefix a bare `host:port` with `tcp://`; addresses with a scheme are kept
pub fn broker_url(address: &str) -> String {
    let address = address.trim();
    if address.contains("://") {
        address.to_string()
    } else {
        format!("tcp://{address}")
    }
}

/// Build the per-process client identifier: `<prefix>-<uuid v4>`.
///
/// A non-empty override wins over the configured base.
pub fn effective_client_id(base: &str, client_id_override: Option<&str>) -> String {
    let prefix = match client_id_override {
        Some(id) if !id.is_empty() => id,
        _ => base,
    };
    format!("{prefix}-{}", Uuid::new_v4())
}

/// Options the client is built from
#[derive(Debug, Clone, PartialEq)]
pub struct ClientOptions {
    /// Broker URLs in the order they are tried
    pub brokers: Vec<String>,
    pub client_id: String,
    /// Keep broker-side session state across reconnects when false
    pub clean_session: bool,
    pub auto_reconnect: bool,
    pub keep_alive: Duration,
    pub ping_timeout: Duration,
    /// Overall bound for trying every broker. Zero removes the overall
    /// bound, but each attempt still times out after [`network_timeout`]
    pub connect_timeout: Duration,
    pub max_reconnect_interval: Duration,
    pub username: Option<String>,
    pub password: Option<String>,
}

impl ClientOptions {
    /// Options with conventional client defaults and no brokers
    pub fn new(client_id: impl Into<String>) -> Self {
        let defaults = MqttConfig::default();
        Self {
            brokers: Vec::new(),
            client_id: client_id.into(),
            clean_session: true,
            auto_reconnect: true,
            keep_alive: defaults.keep_alive(),
            ping_timeout: defaults.ping_timeout(),
            connect_timeout: defaults.connect_timeout(),
            max_reconnect_interval: defaults.max_reconnect_interval(),
            username: None,
            password: None,
        }
    }

    /// Translate configuration into client options.
    ///
    /// Clean session is disabled so subscriptions survive reconnects, and a
    /// fresh client identifier is generated on every call.
    pub fn from_config(config: &MqttConfig, client_id_override: Option<&str>) -> Self {
        let mut options = Self::new(effective_client_id(&config.client_id, client_id_override));
        options.clean_session = false;
        options.auto_reconnect = true;
        options.keep_alive = config.keep_alive();
        options.ping_timeout = config.ping_timeout();
        options.connect_timeout = config.connect_timeout();
        options.max_reconnect_interval = config.max_reconnect_interval();
        options.username = config.get_mqtt_username();
        options.password = config.get_mqtt_password();

        for address in &config.brokers {
            options.add_broker(address);
        }
        options
    }

    pub fn add_broker(&mut self, address: &str) -> &mut Self {
        self.brokers.push(broker_url(address));
        self
    }

    /// Parse every configured broker; an empty list is an error
    pub fn broker_addresses(&self) -> Result<Vec<BrokerAddress>, MqttError> {
        if self.brokers.is_empty() {
            return Err(MqttError::NoBrokers);
        }
        self.brokers
            .iter()
            .map(|b| BrokerAddress::parse(b))
            .collect()
    }

    pub fn reconnect_config(&self) -> ReconnectConfig {
        ReconnectConfig::new(self.max_reconnect_interval)
    }
}

/// Per-broker network timeout handed to rumqttc.
///
/// Bounds the TCP connect plus CONNACK wait of one attempt and later socket
/// flushes. Follows `connect_timeout` (at least 1 s, rumqttc counts whole
/// seconds) or rumqttc's 5 s default when that is zero.
pub fn network_timeout(options: &ClientOptions) -> Duration {
    if options.connect_timeout.is_zero() {
        DEFAULT_NETWORK_TIMEOUT
    } else {
        options.connect_timeout.max(Duration::from_secs(1))
    }
}

/// Pure function to configure rumqttc options for one broker
pub fn configure_mqtt_options(
    options: &ClientOptions,
    broker: &BrokerAddress,
) -> Result<MqttOptions, MqttError> {
    // rumqttc rejects empty identifiers and ones starting with a space
    if options.client_id.trim().is_empty() || options.client_id.starts_with(' ') {
        return Err(MqttError::InvalidClientId(options.client_id.clone()));
    }

    let mut mqtt_options = MqttOptions::new(&options.client_id, &broker.host, broker.port);

    if broker.tls {
        mqtt_options.set_transport(RumqttcTransport::tls_with_default_config());
    }

    if let Some(username) = &options.username {
        let password = options.password.clone().unwrap_or_default();
        mqtt_options.set_credentials(username, password);
    }

    mqtt_options.set_keep_alive(options.keep_alive);
    mqtt_options.set_clean_session(options.clean_session);

    Ok(mqtt_options)
}
