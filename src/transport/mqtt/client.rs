//! Impure I/O operations for MQTT client
//!
//! This module handles all impure I/O operations including network communication,
//! async coordination, and integration with the rumqttc client.

use super::connection::{
    configure_mqtt_options, network_timeout, BrokerAddress, ClientOptions, ConnectionState,
    MqttError,
};
use super::health_monitor::{
    ping_deadline_elapsed, ConnectionEvent, HealthMonitor, PingTracker, ReconnectionDecision,
};
use super::message_handler::{forward_or_warn, EventRoute, MessageForwarder, MessageHandler};
use crate::transport::Transport;
use async_trait::async_trait;
use rumqttc::{AsyncClient, EventLoop, Publish, QoS};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch, Mutex};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, error, info, warn, Instrument};

/// Capacity of the request channel between `AsyncClient` and `EventLoop`
const EVENT_CHANNEL_CAPACITY: usize = 10;

/// Called after every successful (re)connection with the live client handle.
///
/// Runs on the supervisor task, so it must not block; use the `try_*`
/// methods of [`AsyncClient`] to subscribe from inside it.
pub type OnConnectHandler = Arc<dyn Fn(&AsyncClient) + Send + Sync>;

/// Called whenever an established connection is lost
pub type ConnectionLostHandler = Arc<dyn Fn(&MqttError) + Send + Sync>;

/// Callbacks installed on the client
#[derive(Clone)]
pub struct ConnectionHandlers {
    pub on_connect: Option<OnConnectHandler>,
    pub on_connection_lost: ConnectionLostHandler,
}

impl ConnectionHandlers {
    pub fn new(on_connect: OnConnectHandler) -> Self {
        Self {
            on_connect: Some(on_connect),
            ..Default::default()
        }
    }
}

impl Default for ConnectionHandlers {
    fn default() -> Self {
        Self {
            on_connect: None,
            on_connection_lost: Arc::new(log_connection_lost),
        }
    }
}

/// Default connection-lost handler
pub fn log_connection_lost(error: &MqttError) {
    error!("MQTT client disconnected: {}", error);
}

/// A connected rumqttc client/event-loop pair
struct Established {
    client: AsyncClient,
    event_loop: EventLoop,
    broker: BrokerAddress,
    session_present: bool,
}

/// MQTT client owning one broker connection and its supervisor task
pub struct MqttClient {
    options: ClientOptions,
    handlers: ConnectionHandlers,
    client: Arc<Mutex<Option<AsyncClient>>>,
    state_tx: Arc<watch::Sender<ConnectionState>>,
    state_rx: watch::Receiver<ConnectionState>,
    shutdown_tx: watch::Sender<bool>,
    supervisor_handle: Option<JoinHandle<()>>,
    message_forwarder: Arc<Mutex<MessageForwarder>>,
}

impl MqttClient {
    /// Create a client; no network I/O happens until [`MqttClient::connect`]
    pub fn new(options: ClientOptions, handlers: ConnectionHandlers) -> Self {
        let (state_tx, state_rx) =
            watch::channel(ConnectionState::Disconnected("Not connected".to_string()));
        let (shutdown_tx, _) = watch::channel(false);

        Self {
            options,
            handlers,
            client: Arc::new(Mutex::new(None)),
            state_tx: Arc::new(state_tx),
            state_rx,
            shutdown_tx,
            supervisor_handle: None,
            message_forwarder: Arc::new(Mutex::new(MessageForwarder::new())),
        }
    }

    pub fn client_id(&self) -> &str {
        &self.options.client_id
    }

    pub fn options(&self) -> &ClientOptions {
        &self.options
    }

    /// Route incoming publishes to `sender`
    pub async fn set_message_sender(&self, sender: mpsc::Sender<Publish>) {
        let mut forwarder = self.message_forwarder.lock().await;
        forwarder.set_message_sender(sender);
    }

    /// Get current connection state
    pub fn connection_state(&self) -> ConnectionState {
        self.state_rx.borrow().clone()
    }

    /// Watch connection state changes
    pub fn subscribe_state(&self) -> watch::Receiver<ConnectionState> {
        self.state_rx.clone()
    }

    /// Connect to the first reachable broker and start the supervisor.
    ///
    /// Returns only after a CONNACK, a failure on every broker, or the
    /// connect timeout.
    pub async fn connect(&mut self) -> Result<(), MqttError> {
        if self.supervisor_handle.is_some() {
            return Err(MqttError::AlreadyConnected);
        }

        let brokers = self.options.broker_addresses()?;
        self.shutdown_tx.send_replace(false);
        self.state_tx.send_replace(ConnectionState::Connecting);

        let established = match Self::connect_with_timeout(&self.options, &brokers).await {
            Ok(established) => established,
            Err(e) => {
                self.state_tx
                    .send_replace(ConnectionState::Disconnected(e.to_string()));
                return Err(e);
            }
        };

        info!(
            client_id = %self.options.client_id,
            broker = %established.broker,
            session_present = established.session_present,
            "MQTT connection established"
        );

        let supervisor = ConnectionSupervisor {
            options: self.options.clone(),
            brokers,
            handlers: self.handlers.clone(),
            shared_client: self.client.clone(),
            state_tx: self.state_tx.clone(),
            shutdown_rx: self.shutdown_tx.subscribe(),
            message_forwarder: self.message_forwarder.clone(),
        };
        supervisor.on_connected(established.client).await;
        self.supervisor_handle = Some(tokio::spawn(supervisor.run(established.event_loop)));

        Ok(())
    }

    /// Try every broker in order inside one overall deadline
    async fn connect_with_timeout(
        options: &ClientOptions,
        brokers: &[BrokerAddress],
    ) -> Result<Established, MqttError> {
        let attempt = Self::connect_any(options, brokers);
        if options.connect_timeout.is_zero() {
            return attempt.await;
        }

        tokio::time::timeout(options.connect_timeout, attempt)
            .await
            .map_err(|_| MqttError::ConnectTimeout(options.connect_timeout))?
    }

    async fn connect_any(
        options: &ClientOptions,
        brokers: &[BrokerAddress],
    ) -> Result<Established, MqttError> {
        let mut last_error = None;

        for broker in brokers {
            let span = crate::mqtt_span!(operation = "connect", broker = %broker, client_id = %options.client_id);
            match Self::establish(options, broker).instrument(span).await {
                Ok(established) => return Ok(established),
                Err(e) => {
                    warn!(broker = %broker, error = %e, "Broker connection attempt failed");
                    last_error = Some(e);
                }
            }
        }

        Err(last_error.unwrap_or(MqttError::NoBrokers))
    }

    /// Open one connection and poll until the broker acknowledges it
    async fn establish(
        options: &ClientOptions,
        broker: &BrokerAddress,
    ) -> Result<Established, MqttError> {
        let mqtt_options = configure_mqtt_options(options, broker)?;
        let (client, mut event_loop) = AsyncClient::new(mqtt_options, EVENT_CHANNEL_CAPACITY);
        event_loop
            .network_options
            .set_connection_timeout(network_timeout(options).as_secs());

        loop {
            let event = event_loop
                .poll()
                .await
                .map_err(|e| MqttError::ConnectionFailedStr(format!("{broker}: {e}")))?;

            if let EventRoute::ConnectionAcknowledged { session_present } =
                MessageHandler::route_mqtt_event(&event)
            {
                return Ok(Established {
                    client,
                    event_loop,
                    broker: broker.clone(),
                    session_present,
                });
            }
        }
    }

    /// Disconnect, giving the event loop `grace` to flush the DISCONNECT
    pub async fn disconnect(&mut self, grace: Duration) -> Result<(), MqttError> {
        let was_connected = self.is_connected();
        let client = self.client.lock().await.take();
        let result = match client {
            Some(client) if was_connected => client
                .disconnect()
                .await
                .map_err(|e| MqttError::DisconnectFailed(Box::new(e))),
            _ => Ok(()),
        };

        // Without a DISCONNECT in flight the supervisor only stops on the flag
        if !was_connected || result.is_err() {
            self.shutdown_tx.send_replace(true);
        }

        if let Some(mut handle) = self.supervisor_handle.take() {
            match tokio::time::timeout(grace, &mut handle).await {
                Ok(Ok(())) => debug!("Connection supervisor shut down gracefully"),
                Ok(Err(e)) if !e.is_cancelled() => {
                    warn!("Connection supervisor ended with error: {}", e);
                }
                Ok(Err(_)) => {}
                Err(_) => {
                    warn!(
                        "Connection supervisor did not stop within {:?}, forcing abort",
                        grace
                    );
                    handle.abort();
                }
            }
        }

        self.shutdown_tx.send_replace(true);
        self.state_tx.send_replace(HealthMonitor::determine_next_state(
            ConnectionEvent::ClientDisconnected,
        ));

        info!(client_id = %self.options.client_id, "MQTT client disconnected");
        result
    }

    /// Clone the live client handle, failing unless connected
    async fn connected_client(&self) -> Result<AsyncClient, MqttError> {
        let state = self.connection_state();
        if !HealthMonitor::can_publish(&state) {
            return Err(MqttError::NotConnected { state });
        }

        self.client
            .lock()
            .await
            .clone()
            .ok_or(MqttError::NotConnected { state })
    }

    pub async fn publish(
        &self,
        topic: &str,
        qos: QoS,
        retain: bool,
        payload: Vec<u8>,
    ) -> Result<(), MqttError> {
        let client = self.connected_client().await?;
        client
            .publish(topic, qos, retain, payload)
            .await
            .map_err(|e| MqttError::PublishFailed(Box::new(e)))
    }

    pub async fn subscribe(&self, topic: &str, qos: QoS) -> Result<(), MqttError> {
        let state = self.connection_state();
        if !HealthMonitor::can_subscribe(&state) {
            return Err(MqttError::NotConnected { state });
        }

        let client = self.connected_client().await?;
        client
            .subscribe(topic, qos)
            .await
            .map_err(|e| MqttError::SubscriptionFailed(Box::new(e)))?;

        info!("Subscribed to: {}", topic);
        Ok(())
    }
}

/// State shared with the background task that drives the event loop
struct ConnectionSupervisor {
    options: ClientOptions,
    brokers: Vec<BrokerAddress>,
    handlers: ConnectionHandlers,
    shared_client: Arc<Mutex<Option<AsyncClient>>>,
    state_tx: Arc<watch::Sender<ConnectionState>>,
    shutdown_rx: watch::Receiver<bool>,
    message_forwarder: Arc<Mutex<MessageForwarder>>,
}

impl ConnectionSupervisor {
    /// Publish the new client handle and run the on-connect handler
    async fn on_connected(&self, client: AsyncClient) {
        self.state_tx
            .send_replace(HealthMonitor::determine_next_state(ConnectionEvent::ConnAckReceived));

        let handle = client.clone();
        *self.shared_client.lock().await = Some(client);

        if let Some(on_connect) = &self.handlers.on_connect {
            on_connect(&handle);
        }
    }

    async fn run(self, mut event_loop: EventLoop) {
        let mut ping = PingTracker::new(self.options.ping_timeout);

        loop {
            let lost = match self.drive(&mut event_loop, &mut ping).await {
                Some(event) => event,
                None => break,
            };

            let state = HealthMonitor::determine_next_state(lost);
            let reason = match &state {
                ConnectionState::Disconnected(reason) => reason.clone(),
                other => format!("{other:?}"),
            };
            self.state_tx.send_replace(state);
            (self.handlers.on_connection_lost)(&MqttError::ConnectionLost(reason));

            if !self.options.auto_reconnect {
                break;
            }

            match self.reconnect().await {
                Some(established) => {
                    info!(broker = %established.broker, "MQTT connection re-established");
                    event_loop = established.event_loop;
                    ping.reset();
                    self.on_connected(established.client).await;
                }
                None => break,
            }
        }

        info!(client_id = %self.options.client_id, "MQTT connection supervisor stopped");
    }

    /// Poll the current connection until it is lost (Some) or stopped (None)
    async fn drive(
        &self,
        event_loop: &mut EventLoop,
        ping: &mut PingTracker,
    ) -> Option<ConnectionEvent> {
        loop {
            tokio::select! {
                _ = shutdown_requested(self.shutdown_rx.clone()) => {
                    info!("Shutdown signal received, stopping connection supervisor");
                    return None;
                }

                _ = ping_deadline_elapsed(ping.deadline()) => {
                    return Some(ConnectionEvent::PingTimeout(ping.timeout()));
                }

                result = event_loop.poll() => match result {
                    Ok(event) => match MessageHandler::route_mqtt_event(&event) {
                        EventRoute::PingRequested => ping.ping_sent(Instant::now()),
                        EventRoute::PingResponse => ping.pong_received(),
                        EventRoute::MessageReceived(publish) => {
                            // Lock is not held across the send
                            let forwarder = self.message_forwarder.lock().await.clone();
                            forward_or_warn(&forwarder, publish).await;
                        }
                        EventRoute::Disconnected => {
                            return Some(ConnectionEvent::DisconnectedByBroker);
                        }
                        EventRoute::DisconnectRequested => {
                            info!("Disconnect sent, stopping connection supervisor");
                            return None;
                        }
                        EventRoute::ConnectionAcknowledged { .. } => {
                            debug!(target: "mqtt_transport", "CONNACK on established connection");
                        }
                        EventRoute::InfrastructureEvent(event_str) => {
                            debug!(target: "mqtt_transport", "MQTT event: {}", event_str);
                        }
                        EventRoute::OutgoingEvent => {}
                    },
                    Err(e) => return Some(ConnectionEvent::NetworkError(e.to_string())),
                }
            }
        }
    }

    /// Retry all brokers with exponential backoff until success or shutdown
    async fn reconnect(&self) -> Option<Established> {
        let reconnect_config = self.options.reconnect_config();
        let mut attempts = 0u32;

        loop {
            let decision = HealthMonitor::should_attempt_reconnection(
                attempts,
                &reconnect_config,
                *self.shutdown_rx.borrow(),
            );

            match decision {
                ReconnectionDecision::AbortShutdownRequested => {
                    info!("Shutdown signal received, stopping reconnection");
                    return None;
                }
                ReconnectionDecision::Proceed { attempt, delay } => {
                    attempts = attempt;
                    self.state_tx.send_replace(HealthMonitor::determine_next_state(
                        ConnectionEvent::ReconnectionStarted(attempt),
                    ));
                    info!("Attempting reconnection {} after {:?} delay", attempt, delay);

                    let result = tokio::select! {
                        _ = shutdown_requested(self.shutdown_rx.clone()) => {
                            info!("Shutdown signal received during reconnection, stopping");
                            return None;
                        }
                        result = async {
                            tokio::time::sleep(delay).await;
                            MqttClient::connect_with_timeout(&self.options, &self.brokers).await
                        } => result,
                    };

                    match result {
                        Ok(established) => return Some(established),
                        Err(e) => warn!(attempt, error = %e, "Reconnection attempt failed"),
                    }
                }
            }
        }
    }
}

/// Resolves once shutdown is flagged or the sender is gone
async fn shutdown_requested(mut shutdown_rx: watch::Receiver<bool>) {
    loop {
        if *shutdown_rx.borrow_and_update() {
            return;
        }
        if shutdown_rx.changed().await.is_err() {
            return;
        }
    }
}

#[async_trait]
impl Transport for MqttClient {
    type Error = MqttError;

    fn options(&self) -> &ClientOptions {
        MqttClient::options(self)
    }

    async fn connect(&mut self) -> Result<(), Self::Error> {
        MqttClient::connect(self).await
    }

    async fn disconnect(&mut self, grace: Duration) -> Result<(), Self::Error> {
        MqttClient::disconnect(self, grace).await
    }

    async fn publish(
        &self,
        topic: &str,
        qos: QoS,
        retain: bool,
        payload: Vec<u8>,
    ) -> Result<(), Self::Error> {
        MqttClient::publish(self, topic, qos, retain, payload).await
    }

    async fn subscribe(&self, topic: &str, qos: QoS) -> Result<(), Self::Error> {
        MqttClient::subscribe(self, topic, qos).await
    }

    fn connection_state(&self) -> ConnectionState {
        MqttClient::connection_state(self)
    }
}

impl Drop for MqttClient {
    fn drop(&mut self) {
        // Stop the supervisor; callers wanting a clean DISCONNECT must call disconnect()
        self.shutdown_tx.send_replace(true);
        if let Some(handle) = self.supervisor_handle.take() {
            handle.abort();
        }
    }
}
