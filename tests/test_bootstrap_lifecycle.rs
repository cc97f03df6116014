//! Bootstrap lifecycle tests against the mock transport
//!
//! Covers the full path: config file -> client options -> connect ->
//! interrupt -> disconnect, without a broker.

use mqtt_bootstrap::bootstrap::{self, InterruptOutcome, DISCONNECT_GRACE};
use mqtt_bootstrap::config::MqttConfig;
use mqtt_bootstrap::testing::MockTransport;
use mqtt_bootstrap::transport::mqtt::ClientOptions;
use mqtt_bootstrap::transport::Transport;
use rumqttc::QoS;
use std::fs;
use tempfile::tempdir;
use tokio::sync::oneshot;

fn options_from_file(contents: &str, client_id_override: Option<&str>) -> ClientOptions {
    let dir = tempdir().unwrap();
    fs::write(dir.path().join("mqtt.toml"), contents).unwrap();
    let config = MqttConfig::load(dir.path().join("mqtt")).unwrap();
    ClientOptions::from_config(&config, client_id_override)
}

#[tokio::test]
async fn test_config_file_to_connected_session() {
    let options = options_from_file(
        r#"
brokers = ["localhost:1883"]
client_id = "svc"
ping_timeout = 10
max_reconnect_interval = 5
connect_timeout = 3
"#,
        None,
    );
    let mock = MockTransport::new(options);
    let probe = mock.clone();
    let (_tx, rx) = oneshot::channel::<()>();

    let session = bootstrap::start_with_signal(mock, rx).await.unwrap();

    let attempts = probe.connect_attempts().await;
    assert_eq!(attempts.len(), 1);
    assert_eq!(attempts[0].brokers, vec!["tcp://localhost:1883"]);
    assert!(attempts[0].client_id.starts_with("svc-"));

    let client = session.client();
    let client = client.lock().await;
    assert!(client.is_connected());
    assert!(!client.options().clean_session);
    assert!(client.options().auto_reconnect);
}

#[tokio::test]
async fn test_override_replaces_base_client_id() {
    let options = options_from_file(
        "brokers = [\"a:1883\", \"b:1883\"]\nclient_id = \"svc\"\n",
        Some("edge"),
    );
    let mock = MockTransport::new(options);
    let probe = mock.clone();
    let (_tx, rx) = oneshot::channel::<()>();

    let session = bootstrap::start_with_signal(mock, rx).await.unwrap();

    let attempts = probe.connect_attempts().await;
    assert!(attempts[0].client_id.starts_with("edge-"));
    assert_eq!(attempts[0].brokers, vec!["tcp://a:1883", "tcp://b:1883"]);
    assert_eq!(session.client_id(), attempts[0].client_id);
}

#[tokio::test]
async fn test_session_client_is_usable_until_interrupt() {
    let options = options_from_file("brokers = [\"localhost:1883\"]\n", None);
    let mock = MockTransport::new(options);
    let probe = mock.clone();
    let (tx, rx) = oneshot::channel::<()>();

    let mut session = bootstrap::start_with_signal(mock, rx).await.unwrap();
    {
        let client = session.client();
        let client = client.lock().await;
        client.subscribe("devices/+/status", QoS::AtLeastOnce).await.unwrap();
        client
            .publish("devices/1/status", QoS::AtLeastOnce, false, b"up".to_vec())
            .await
            .unwrap();
    }

    tx.send(()).unwrap();
    assert_eq!(session.wait().await, InterruptOutcome::Disconnected);

    assert_eq!(probe.disconnect_calls().await, vec![DISCONNECT_GRACE]);
    assert_eq!(probe.subscriptions().await.len(), 1);
    assert_eq!(probe.published_messages().await.len(), 1);

    let client = session.client();
    let client = client.lock().await;
    assert!(client
        .publish("devices/1/status", QoS::AtLeastOnce, false, Vec::new())
        .await
        .is_err());
}

#[tokio::test]
async fn test_connect_failure_leaves_no_listener() {
    let options = options_from_file("brokers = [\"localhost:1883\"]\n", None);
    let mock = MockTransport::with_failure(options);
    let probe = mock.clone();
    let (tx, rx) = oneshot::channel::<()>();

    assert!(bootstrap::start_with_signal(mock, rx).await.is_err());

    // The signal future was dropped with the failed start
    assert!(tx.send(()).is_err());
    assert!(probe.disconnect_calls().await.is_empty());
}

#[tokio::test]
async fn test_dropping_session_cancels_listener() {
    let options = options_from_file("brokers = [\"localhost:1883\"]\n", None);
    let mock = MockTransport::new(options);
    let probe = mock.clone();
    let (mut tx, rx) = oneshot::channel::<()>();

    let session = bootstrap::start_with_signal(mock, rx).await.unwrap();
    drop(session);

    tokio::time::timeout(std::time::Duration::from_secs(1), tx.closed())
        .await
        .expect("listener should release the signal after cancellation");
    assert!(probe.disconnect_calls().await.is_empty());
}
