//! Pure health monitoring and reconnection logic for MQTT client
//!
//! This module contains pure functions for reconnection decisions,
//! connection state transitions and ping-timeout tracking.

use super::connection::{ConnectionState, ReconnectConfig};
use std::time::Duration;
use tokio::time::Instant;
use tracing::{error, info};

/// Pure health monitoring and reconnection decision logic
pub struct HealthMonitor;

impl HealthMonitor {
    /// Determine if reconnection should be attempted (pure function)
    /// Retries are unlimited; only shutdown stops them
    pub fn should_attempt_reconnection(
        current_attempts: u32,
        config: &ReconnectConfig,
        shutdown_requested: bool,
    ) -> ReconnectionDecision {
        if shutdown_requested {
            return ReconnectionDecision::AbortShutdownRequested;
        }

        let attempt = current_attempts.saturating_add(1);
        ReconnectionDecision::Proceed {
            attempt,
            delay: config.calculate_backoff_delay(attempt),
        }
    }

    /// Determine next state after connection event (pure function)
    pub fn determine_next_state(event: ConnectionEvent) -> ConnectionState {
        match event {
            ConnectionEvent::ConnAckReceived => {
                info!("MQTT client connected successfully");
                ConnectionState::Connected
            }
            ConnectionEvent::DisconnectedByBroker => {
                info!("MQTT broker disconnected client");
                ConnectionState::Disconnected("Broker disconnected".to_string())
            }
            ConnectionEvent::NetworkError(error) => {
                error!("MQTT event loop error: {}", error);
                ConnectionState::Disconnected(error)
            }
            ConnectionEvent::PingTimeout(timeout) => {
                error!("No PINGRESP within {:?}", timeout);
                ConnectionState::Disconnected(format!("Ping timeout after {timeout:?}"))
            }
            ConnectionEvent::ReconnectionStarted(attempt) => {
                info!("Starting reconnection attempt {}", attempt);
                ConnectionState::Reconnecting(attempt)
            }
            ConnectionEvent::ClientDisconnected => {
                ConnectionState::Disconnected("Client disconnected".to_string())
            }
        }
    }

    /// Check if connection state allows publishing (pure function)
    pub fn can_publish(state: &ConnectionState) -> bool {
        matches!(state, ConnectionState::Connected)
    }

    /// Check if connection state allows subscribing (pure function)
    pub fn can_subscribe(state: &ConnectionState) -> bool {
        matches!(state, ConnectionState::Connected)
    }
}

/// Connection events that drive state transitions
#[derive(Debug, Clone, PartialEq)]
pub enum ConnectionEvent {
    ConnAckReceived,
    DisconnectedByBroker,
    NetworkError(String),
    PingTimeout(Duration),
    ReconnectionStarted(u32),
    ClientDisconnected,
}

/// Reconnection decision
#[derive(Debug, Clone, PartialEq)]
pub enum ReconnectionDecision {
    /// Try again after `delay`
    Proceed { attempt: u32, delay: Duration },
    AbortShutdownRequested,
}

/// Tracks outstanding PINGREQs against the configured ping timeout
#[derive(Debug, Clone)]
pub struct PingTracker {
    timeout: Duration,
    awaiting_since: Option<Instant>,
}

impl PingTracker {
    pub fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            awaiting_since: None,
        }
    }

    /// Record an outgoing ping; an earlier unanswered ping keeps its deadline
    pub fn ping_sent(&mut self, at: Instant) {
        self.awaiting_since.get_or_insert(at);
    }

    pub fn pong_received(&mut self) {
        self.awaiting_since = None;
    }

    pub fn reset(&mut self) {
        self.awaiting_since = None;
    }

    /// When the outstanding ping expires; None when nothing is pending or
    /// the timeout is disabled
    pub fn deadline(&self) -> Option<Instant> {
        if self.timeout.is_zero() {
            return None;
        }
        self.awaiting_since.map(|sent| sent + self.timeout)
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}

/// Sleep until the ping deadline, or forever when none is set
pub async fn ping_deadline_elapsed(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending::<()>().await,
    }
}
