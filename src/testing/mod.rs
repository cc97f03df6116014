//! Testing utilities and mock implementations
//!
//! This module provides a mock transport for exercising the connection
//! lifecycle without an MQTT broker, and a loopback fake broker for driving
//! the real client.

pub mod broker;
pub mod mocks;

pub use broker::FakeBroker;
pub use mocks::*;
