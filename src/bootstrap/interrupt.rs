//! One-shot interrupt listener
//!
//! After a successful connect a single background task waits for the process
//! interrupt. On the first signal it disconnects the transport and exits; it
//! can also be cancelled through [`InterruptListener::shutdown`].

use crate::transport::Transport;
use std::fmt::Display;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tracing::{error, info};

/// Grace period given to the client to flush in-flight work on disconnect
pub const DISCONNECT_GRACE: Duration = Duration::from_millis(200);

/// How the listener task ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InterruptOutcome {
    /// Interrupt received and the transport disconnected
    Disconnected,
    /// Interrupt received but the disconnect call failed
    DisconnectFailed(String),
    /// Listener cancelled before any interrupt arrived
    Cancelled,
    /// Waiting for the signal itself failed
    SignalFailed(String),
    /// The listener task panicked or was aborted
    TaskFailed(String),
}

/// Background task that disconnects a transport on the first interrupt
pub struct InterruptListener {
    shutdown_tx: watch::Sender<bool>,
    handle: Option<JoinHandle<InterruptOutcome>>,
    outcome: Option<InterruptOutcome>,
}

impl InterruptListener {
    /// Listen for an arbitrary one-shot signal future
    pub fn spawn<T, S, E>(transport: Arc<Mutex<T>>, signal: S, grace: Duration) -> Self
    where
        T: Transport + 'static,
        S: Future<Output = Result<(), E>> + Send + 'static,
        E: Display + Send + 'static,
    {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let handle = tokio::spawn(async move {
            tokio::select! {
                _ = cancelled(shutdown_rx) => InterruptOutcome::Cancelled,
                result = signal => match result {
                    Ok(()) => disconnect_on_interrupt(&transport, grace).await,
                    Err(e) => {
                        error!("Failed to listen for interrupt signal: {}", e);
                        InterruptOutcome::SignalFailed(e.to_string())
                    }
                },
            }
        });

        Self {
            shutdown_tx,
            handle: Some(handle),
            outcome: None,
        }
    }

    /// Cancel the listener if it is still waiting
    pub fn shutdown(&self) {
        self.shutdown_tx.send_replace(true);
    }

    /// Whether the listener task has ended
    pub fn is_finished(&self) -> bool {
        match &self.handle {
            Some(handle) => handle.is_finished(),
            None => true,
        }
    }

    /// Wait for the listener to end and report how it ended
    pub async fn wait(&mut self) -> InterruptOutcome {
        if let Some(handle) = self.handle.take() {
            let outcome = handle
                .await
                .unwrap_or_else(|e| InterruptOutcome::TaskFailed(e.to_string()));
            self.outcome = Some(outcome);
        }

        self.outcome
            .clone()
            .unwrap_or_else(|| InterruptOutcome::TaskFailed("listener state lost".to_string()))
    }
}

impl Drop for InterruptListener {
    fn drop(&mut self) {
        self.shutdown();
    }
}

async fn disconnect_on_interrupt<T>(transport: &Arc<Mutex<T>>, grace: Duration) -> InterruptOutcome
where
    T: Transport,
{
    let mut transport = transport.lock().await;
    match transport.disconnect(grace).await {
        Ok(()) => {
            info!(client_id = %transport.client_id(), "MQTT connection aborted by interrupt");
            InterruptOutcome::Disconnected
        }
        Err(e) => {
            error!("Failed to disconnect after interrupt: {}", e);
            InterruptOutcome::DisconnectFailed(e.to_string())
        }
    }
}

async fn cancelled(mut shutdown_rx: watch::Receiver<bool>) {
    loop {
        if *shutdown_rx.borrow_and_update() {
            return;
        }
        if shutdown_rx.changed().await.is_err() {
            return;
        }
    }
}
