//! Observability for the connection bootstrapper
//!
//! Structured logging through `tracing`, configured from the environment.

pub mod logging;

// Re-export for convenience
pub use logging::{init_default_logging, init_logging, LogFormat, LogSettings};

// Span macros for structured logging
pub use logging::{lifecycle_span, mqtt_span};
