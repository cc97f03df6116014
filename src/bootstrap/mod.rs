//! Connection bootstrapper
//!
//! Turns a configuration record into a connected MQTT session and installs
//! the interrupt-driven disconnect.
//!
//! ```rust,no_run
//! use mqtt_bootstrap::bootstrap;
//! use rumqttc::{AsyncClient, QoS};
//! use std::sync::Arc;
//!
//! # tokio_test::block_on(async {
//! let on_connect = Arc::new(|client: &AsyncClient| {
//!     let _ = client.try_subscribe("devices/+/status", QoS::AtLeastOnce);
//! });
//!
//! let mut session = bootstrap::initialize("config/mqtt", None, on_connect).await?;
//! session.wait().await;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! # });
//! ```

pub mod initializer;
pub mod interrupt;

pub use initializer::{initialize, initialize_with_config, start, start_with_signal, Session};
pub use interrupt::{InterruptListener, InterruptOutcome, DISCONNECT_GRACE};
