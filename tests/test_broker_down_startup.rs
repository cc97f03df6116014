//! Integration Tests for Startup When the Broker is Down
//!
//! The bootstrapper must not hang or panic when no broker is reachable: the
//! initial connect is bounded by `connect_timeout` and the error is returned
//! to the caller.


use mqtt_bootstrap::bootstrap;
use mqtt_bootstrap::transport::mqtt::{
    ClientOptions, ConnectionHandlers, ConnectionState, MqttClient, MqttError, OnConnectHandler,
};
use mqtt_bootstrap::transport::Transport;
use mqtt_bootstrap::BootstrapError;
use mqtt_integration_helpers::{
    config_for, BLACKHOLE_BROKER_ADDRESS, REFUSED_BROKER_ADDRESS,
};
use rumqttc::AsyncClient;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

fn counting_handler() -> (OnConnectHandler, Arc<AtomicUsize>) {
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = calls.clone();
    let handler: OnConnectHandler = Arc::new(move |_: &AsyncClient| {
        counter.fetch_add(1, Ordering::SeqCst);
    });
    (handler, calls)
}

#[tokio::test]
async fn test_initialize_returns_error_when_broker_refuses() {
    let config = config_for(&[REFUSED_BROKER_ADDRESS], "down-svc");
    let (on_connect, calls) = counting_handler();

    let result = bootstrap::initialize_with_config(&config, None, on_connect).await;

    let error = result.err().expect("connect to a closed port must fail");
    assert!(matches!(error, BootstrapError::TransportError(_)));
    assert!(error.transport_error::<MqttError>().is_some());
    assert_eq!(calls.load(Ordering::SeqCst), 0, "on_connect must not run");
}

#[tokio::test]
async fn test_connect_is_bounded_by_connect_timeout() {
    let config = config_for(&[BLACKHOLE_BROKER_ADDRESS], "blackhole-svc");
    let (on_connect, _) = counting_handler();

    let start = Instant::now();
    let result = bootstrap::initialize_with_config(&config, None, on_connect).await;

    assert!(result.is_err(), "no broker answers at a non-routable address");
    assert!(
        start.elapsed() < Duration::from_secs(3),
        "connect should give up after connect_timeout, took {:?}",
        start.elapsed()
    );
}

#[tokio::test]
async fn test_every_broker_is_tried_before_failing() {
    let config = config_for(&[REFUSED_BROKER_ADDRESS, "127.0.0.1:2"], "multi-svc");
    let mut client = MqttClient::new(
        ClientOptions::from_config(&config, None),
        ConnectionHandlers::default(),
    );

    let result = client.connect().await;

    match result {
        Err(MqttError::ConnectionFailedStr(reason)) => {
            assert!(reason.contains("127.0.0.1:2"), "last broker reported: {reason}")
        }
        other => panic!("expected connection failure, got {other:?}"),
    }
    assert!(matches!(
        client.connection_state(),
        ConnectionState::Disconnected(_)
    ));
}

#[tokio::test]
async fn test_failed_client_can_retry_connect() {
    let config = config_for(&[REFUSED_BROKER_ADDRESS], "retry-svc");
    let mut client = MqttClient::new(
        ClientOptions::from_config(&config, None),
        ConnectionHandlers::default(),
    );

    assert!(client.connect().await.is_err());
    // A failed connect leaves no supervisor behind, so a second try runs again
    assert!(!matches!(
        client.connect().await,
        Err(MqttError::AlreadyConnected)
    ));
    assert!(!client.is_connected());
}
