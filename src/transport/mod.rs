//! Transport layer for broker communication
//!
//! This module provides the transport abstraction the bootstrapper drives
//! and its MQTT implementation.

use crate::transport::mqtt::{ClientOptions, ConnectionState};
use rumqttc::QoS;
use std::time::Duration;

pub mod mqtt;

/// Transport trait for broker connections
///
/// This trait abstracts the MQTT client so the connection lifecycle can be
/// driven by a mock in tests.
#[async_trait::async_trait]
pub trait Transport: Send + Sync {
    type Error: std::error::Error + Send + Sync + 'static;

    /// Options the transport was built from
    fn options(&self) -> &ClientOptions;

    /// Effective client identifier
    fn client_id(&self) -> &str {
        &self.options().client_id
    }

    /// Connect to the broker, waiting for the handshake to complete
    async fn connect(&mut self) -> Result<(), Self::Error>;

    /// Disconnect, allowing `grace` for in-flight work to finish
    async fn disconnect(&mut self, grace: Duration) -> Result<(), Self::Error>;

    /// Publish a message on `topic`
    async fn publish(
        &self,
        topic: &str,
        qos: QoS,
        retain: bool,
        payload: Vec<u8>,
    ) -> Result<(), Self::Error>;

    /// Subscribe to `topic`
    async fn subscribe(&self, topic: &str, qos: QoS) -> Result<(), Self::Error>;

    /// Get current connection state
    fn connection_state(&self) -> ConnectionState;

    /// Check if transport is currently connected
    fn is_connected(&self) -> bool {
        matches!(self.connection_state(), ConnectionState::Connected)
    }
}
