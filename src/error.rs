//! Top-level error type for the connection bootstrapper

use thiserror::Error;

/// Main error type for bootstrap operations
#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error("Configuration error: {0}")]
    ConfigError(#[from] crate::config::ConfigError),

    #[error("Transport error: {0}")]
    TransportError(#[from] Box<dyn std::error::Error + Send + Sync>),
}

impl BootstrapError {
    /// Wrap any transport error
    pub fn transport<E>(error: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::TransportError(Box::new(error))
    }

    /// Borrow the transport error as a concrete type, if it is one
    pub fn transport_error<E>(&self) -> Option<&E>
    where
        E: std::error::Error + 'static,
    {
        match self {
            Self::TransportError(e) => e.downcast_ref::<E>(),
            _ => None,
        }
    }
}

/// Result type for bootstrap operations
pub type BootstrapResult<T> = Result<T, BootstrapError>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ConfigError;
    use crate::transport::mqtt::MqttError;

    #[test]
    fn test_config_error_conversion() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "missing");
        let error: BootstrapError = ConfigError::from(io).into();

        assert!(matches!(error, BootstrapError::ConfigError(_)));
        assert!(error.to_string().starts_with("Configuration error:"));
    }

    #[test]
    fn test_transport_error_downcast() {
        let error = BootstrapError::transport(MqttError::NoBrokers);

        assert_eq!(
            error.to_string(),
            "Transport error: No broker addresses configured"
        );
        assert!(matches!(
            error.transport_error::<MqttError>(),
            Some(MqttError::NoBrokers)
        ));
        assert!(error.transport_error::<std::io::Error>().is_none());
    }
}
