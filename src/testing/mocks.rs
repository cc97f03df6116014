//! Mock implementations for testing
//!
//! Provides a recording [`Transport`] so bootstrap and interrupt handling can
//! be tested without network access.

use crate::transport::mqtt::{ClientOptions, ConnectionState, MqttError};
use crate::transport::Transport;
use async_trait::async_trait;
use rumqttc::QoS;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

/// What the mock saw on a connect call
#[derive(Debug, Clone, PartialEq)]
pub struct ConnectAttempt {
    pub client_id: String,
    pub brokers: Vec<String>,
}

/// (topic, qos, retain, payload)
pub type PublishedMessage = (String, QoS, bool, Vec<u8>);

/// Mock transport for testing.
///
/// Clones share their recordings, so a test can keep a clone as a probe
/// after moving the mock into a session.
#[derive(Debug, Clone)]
pub struct MockTransport {
    options: ClientOptions,
    pub connect_attempts: Arc<Mutex<Vec<ConnectAttempt>>>,
    pub disconnect_calls: Arc<Mutex<Vec<Duration>>>,
    pub published_messages: Arc<Mutex<Vec<PublishedMessage>>>,
    pub subscriptions: Arc<Mutex<Vec<(String, QoS)>>>,
    connected: Arc<AtomicBool>,
    pub should_fail: bool,
    pub fail_disconnect: bool,
}

impl MockTransport {
    pub fn new(options: ClientOptions) -> Self {
        Self {
            options,
            connect_attempts: Arc::default(),
            disconnect_calls: Arc::default(),
            published_messages: Arc::default(),
            subscriptions: Arc::default(),
            connected: Arc::default(),
            should_fail: false,
            fail_disconnect: false,
        }
    }

    /// A transport whose every operation fails
    pub fn with_failure(options: ClientOptions) -> Self {
        Self {
            should_fail: true,
            ..Self::new(options)
        }
    }

    /// A transport that connects but fails to disconnect
    pub fn with_disconnect_failure(options: ClientOptions) -> Self {
        Self {
            fail_disconnect: true,
            ..Self::new(options)
        }
    }

    pub fn set_connected(&self, connected: bool) {
        self.connected.store(connected, Ordering::SeqCst);
    }

    pub async fn connect_attempts(&self) -> Vec<ConnectAttempt> {
        self.connect_attempts.lock().await.clone()
    }

    pub async fn disconnect_calls(&self) -> Vec<Duration> {
        self.disconnect_calls.lock().await.clone()
    }

    pub async fn published_messages(&self) -> Vec<PublishedMessage> {
        self.published_messages.lock().await.clone()
    }

    pub async fn subscriptions(&self) -> Vec<(String, QoS)> {
        self.subscriptions.lock().await.clone()
    }

    fn ensure_connected(&self) -> Result<(), MqttError> {
        if self.should_fail {
            return Err(MqttError::ConnectionFailedStr("Mock failure".to_string()));
        }
        if !self.connected.load(Ordering::SeqCst) {
            return Err(MqttError::NotConnected {
                state: self.connection_state(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl Transport for MockTransport {
    type Error = MqttError;

    fn options(&self) -> &ClientOptions {
        &self.options
    }

    async fn connect(&mut self) -> Result<(), Self::Error> {
        self.connect_attempts.lock().await.push(ConnectAttempt {
            client_id: self.options.client_id.clone(),
            brokers: self.options.brokers.clone(),
        });

        if self.should_fail {
            return Err(MqttError::ConnectionFailedStr(
                "Mock connect failure".to_string(),
            ));
        }
        self.options.broker_addresses()?;
        self.set_connected(true);
        Ok(())
    }

    async fn disconnect(&mut self, grace: Duration) -> Result<(), Self::Error> {
        self.disconnect_calls.lock().await.push(grace);

        if self.should_fail || self.fail_disconnect {
            return Err(MqttError::DisconnectFailed("Mock disconnect failure".into()));
        }
        self.set_connected(false);
        Ok(())
    }

    async fn publish(
        &self,
        topic: &str,
        qos: QoS,
        retain: bool,
        payload: Vec<u8>,
    ) -> Result<(), Self::Error> {
        self.ensure_connected()?;
        self.published_messages
            .lock()
            .await
            .push((topic.to_string(), qos, retain, payload));
        Ok(())
    }

    async fn subscribe(&self, topic: &str, qos: QoS) -> Result<(), Self::Error> {
        self.ensure_connected()?;
        self.subscriptions
            .lock()
            .await
            .push((topic.to_string(), qos));
        Ok(())
    }

    fn connection_state(&self) -> ConnectionState {
        if self.connected.load(Ordering::SeqCst) {
            ConnectionState::Connected
        } else {
            ConnectionState::Disconnected("Mock disconnected".to_string())
        }
    }
}
