//! Pure message routing and processing logic for MQTT events
//!
//! This module contains pure functions for classifying event-loop output
//! and the forwarder that hands incoming publishes to the application.

use rumqttc::{Event, Outgoing, Packet, Publish};
use tokio::sync::mpsc;
use tracing::{debug, warn};

/// Pure message routing decisions based on MQTT events
pub struct MessageHandler;

impl MessageHandler {
    /// Route MQTT event to appropriate handler (pure routing decision)
    pub fn route_mqtt_event(event: &Event) -> EventRoute {
        match event {
            Event::Incoming(incoming) => match incoming {
                Packet::ConnAck(connack) => EventRoute::ConnectionAcknowledged {
                    session_present: connack.session_present,
                },
                Packet::Publish(publish) => EventRoute::MessageReceived(publish.clone()),
                Packet::PingResp => EventRoute::PingResponse,
                Packet::Disconnect => EventRoute::Disconnected,
                other => EventRoute::InfrastructureEvent(format!("{other:?}")),
            },
            Event::Outgoing(Outgoing::PingReq) => EventRoute::PingRequested,
            Event::Outgoing(Outgoing::Disconnect) => EventRoute::DisconnectRequested,
            Event::Outgoing(_) => EventRoute::OutgoingEvent,
        }
    }
}

/// Routing decisions for MQTT events
#[derive(Debug, Clone)]
pub enum EventRoute {
    /// Connection acknowledged - ready to publish/subscribe
    ConnectionAcknowledged { session_present: bool },
    /// Message received on subscribed topic
    MessageReceived(Publish),
    /// Keep-alive ping went out
    PingRequested,
    /// Broker answered a ping
    PingResponse,
    /// MQTT broker disconnected
    Disconnected,
    /// Our own DISCONNECT was written to the socket
    DisconnectRequested,
    /// Infrastructure event (SubAck, PubAck, etc.)
    InfrastructureEvent(String),
    /// Outgoing event (handled automatically)
    OutgoingEvent,
}

/// Hands incoming publishes to the application (impure I/O)
#[derive(Clone, Default)]
pub struct MessageForwarder {
    message_sender: Option<mpsc::Sender<Publish>>,
}

impl MessageForwarder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_message_sender(&mut self, sender: mpsc::Sender<Publish>) {
        self.message_sender = Some(sender);
    }

    /// Forward a received publish; dropped with a debug line when nobody listens
    pub async fn forward(&self, publish: Publish) -> Result<(), String> {
        match &self.message_sender {
            Some(sender) => sender
                .send(publish)
                .await
                .map_err(|e| format!("Failed to forward message: {e}")),
            None => {
                debug!(topic = %publish.topic, "No message receiver configured - message dropped");
                Ok(())
            }
        }
    }
}

/// Log-and-continue wrapper used by the event loop
pub async fn forward_or_warn(forwarder: &MessageForwarder, publish: Publish) {
    if let Err(e) = forwarder.forward(publish).await {
        warn!("{}", e);
    }
}
