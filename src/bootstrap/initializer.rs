//! Connection bootstrap: config -> options -> connect -> interrupt listener

use super::interrupt::{InterruptListener, InterruptOutcome, DISCONNECT_GRACE};
use crate::config::MqttConfig;
use crate::error::{BootstrapError, BootstrapResult};
use crate::transport::mqtt::{ClientOptions, ConnectionHandlers, MqttClient, OnConnectHandler};
use crate::transport::Transport;
use std::fmt::Display;
use std::future::Future;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{error, info, Instrument};

/// A connected transport plus the listener that will disconnect it
pub struct Session<T>
where
    T: Transport + 'static,
{
    transport: Arc<Mutex<T>>,
    client_id: String,
    listener: InterruptListener,
}

impl<T> Session<T>
where
    T: Transport + 'static,
{
    /// Shared handle for code that publishes or subscribes
    pub fn client(&self) -> Arc<Mutex<T>> {
        self.transport.clone()
    }

    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    /// Whether the interrupt listener has already ended
    pub fn listener_finished(&self) -> bool {
        self.listener.is_finished()
    }

    /// Block until the interrupt listener ends
    pub async fn wait(&mut self) -> InterruptOutcome {
        self.listener.wait().await
    }

    /// Cancel the listener and disconnect, unless an interrupt already
    /// triggered the disconnect (whether or not it succeeded)
    pub async fn shutdown(mut self) -> BootstrapResult<()> {
        self.listener.shutdown();
        match self.listener.wait().await {
            InterruptOutcome::Disconnected | InterruptOutcome::DisconnectFailed(_) => return Ok(()),
            InterruptOutcome::Cancelled
            | InterruptOutcome::SignalFailed(_)
            | InterruptOutcome::TaskFailed(_) => {}
        }

        let mut transport = self.transport.lock().await;
        transport
            .disconnect(DISCONNECT_GRACE)
            .await
            .map_err(BootstrapError::transport)?;
        info!(client_id = %self.client_id, "MQTT session shut down");
        Ok(())
    }
}

/// Load configuration from `config_path` and connect.
///
/// A non-empty `client_id_override` replaces the configured base client id.
/// `on_connect` runs after every successful (re)connection.
pub async fn initialize(
    config_path: impl AsRef<Path>,
    client_id_override: Option<&str>,
    on_connect: OnConnectHandler,
) -> BootstrapResult<Session<MqttClient>> {
    let config_path = config_path.as_ref();
    let config = MqttConfig::load(config_path).map_err(|e| {
        error!("Failed to load MQTT configuration from {}: {}", config_path.display(), e);
        e
    })?;

    initialize_with_config(&config, client_id_override, on_connect).await
}

/// Connect using an already loaded configuration
pub async fn initialize_with_config(
    config: &MqttConfig,
    client_id_override: Option<&str>,
    on_connect: OnConnectHandler,
) -> BootstrapResult<Session<MqttClient>> {
    let options = ClientOptions::from_config(config, client_id_override);
    let client = MqttClient::new(options, ConnectionHandlers::new(on_connect));
    start(client).await
}

/// Connect `transport` and listen for Ctrl-C / SIGINT
pub async fn start<T>(transport: T) -> BootstrapResult<Session<T>>
where
    T: Transport + 'static,
{
    start_with_signal(transport, tokio::signal::ctrl_c()).await
}

/// Connect `transport` and disconnect it when `signal` resolves.
///
/// Connect failures are logged and returned. The listener is only started
/// after a successful connect.
pub async fn start_with_signal<T, S, E>(mut transport: T, signal: S) -> BootstrapResult<Session<T>>
where
    T: Transport + 'static,
    S: Future<Output = Result<(), E>> + Send + 'static,
    E: Display + Send + 'static,
{
    let client_id = transport.client_id().to_string();
    let span = crate::lifecycle_span!(event = "initialize", client_id = %client_id);

    async {
        if let Err(e) = transport.connect().await {
            error!("Cannot connect to the broker: {}", e);
            return Err(BootstrapError::transport(e));
        }
        info!("MQTT connection established for client {}", client_id);
        Ok(())
    }
    .instrument(span)
    .await?;

    let transport = Arc::new(Mutex::new(transport));
    let listener = InterruptListener::spawn(transport.clone(), signal, DISCONNECT_GRACE);

    Ok(Session {
        transport,
        client_id,
        listener,
    })
}
