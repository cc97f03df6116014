//! MQTT client built on rumqttc
//!
//! This module separates pure functions from I/O operations for better
//! testability.
//!
//! # Architecture
//!
//! - [`connection`] - Client options, broker addresses and reconnect policy
//! - [`message_handler`] - Event-loop output classification and message forwarding
//! - [`health_monitor`] - Reconnection decisions, state transitions, ping timeout
//! - [`client`] - Impure I/O operations and the connection supervisor
//!
//! # Usage
//!
//! ```rust,no_run
//! use mqtt_bootstrap::transport::mqtt::{ClientOptions, ConnectionHandlers, MqttClient};
//! use std::time::Duration;
//!
//! # tokio_test::block_on(async {
//! let mut options = ClientOptions::new("my-service");
//! options.add_broker("localhost:1883");
//!
//! let mut client = MqttClient::new(options, ConnectionHandlers::default());
//! client.connect().await?;
//! client.disconnect(Duration::from_millis(200)).await?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! # });
//! ```

pub mod client;
pub mod connection;
pub mod health_monitor;
pub mod message_handler;

// Re-export public types for convenience
pub use client::{
    log_connection_lost, ConnectionHandlers, ConnectionLostHandler, MqttClient, OnConnectHandler,
};
pub use connection::{
    broker_url, configure_mqtt_options, effective_client_id, network_timeout, BrokerAddress,
    ClientOptions, ConnectionState, MqttError, ReconnectConfig,
};
pub use health_monitor::{ConnectionEvent, HealthMonitor, PingTracker, ReconnectionDecision};
pub use message_handler::{EventRoute, MessageForwarder, MessageHandler};
