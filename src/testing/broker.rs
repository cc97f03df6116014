//! Minimal in-process MQTT broker for exercising the real client
//!
//! Accepts TCP connections on loopback, answers the first packet (CONNECT)
//! with an accepted CONNACK and hands the socket to the test. Nothing else
//! is answered, so PINGREQs go unanswered unless the test replies itself.

use std::io;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::debug;

/// CONNACK, no session present, return code 0 (accepted)
pub const CONNACK_ACCEPTED: [u8; 4] = [0x20, 0x02, 0x00, 0x00];

/// DISCONNECT as written by the client
pub const DISCONNECT: [u8; 2] = [0xE0, 0x00];

/// PINGRESP
pub const PINGRESP: [u8; 2] = [0xD0, 0x00];

/// A QoS 0 PUBLISH packet for short topics and payloads
pub fn publish_packet(topic: &str, payload: &[u8]) -> Vec<u8> {
    let topic = topic.as_bytes();
    let remaining = 2 + topic.len() + payload.len();
    let mut packet = Vec::with_capacity(2 + remaining);
    packet.push(0x30);
    packet.push(remaining as u8);
    packet.extend_from_slice(&(topic.len() as u16).to_be_bytes());
    packet.extend_from_slice(topic);
    packet.extend_from_slice(payload);
    packet
}

/// Loopback broker that accepts every connection
pub struct FakeBroker {
    address: String,
    connections: mpsc::UnboundedReceiver<TcpStream>,
    accept_handle: JoinHandle<()>,
}

impl FakeBroker {
    pub async fn start() -> io::Result<Self> {
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let address = listener.local_addr()?.to_string();
        let (tx, connections) = mpsc::unbounded_channel();

        let accept_handle = tokio::spawn(async move {
            while let Ok((mut socket, peer)) = listener.accept().await {
                let mut connect = [0u8; 512];
                match socket.read(&mut connect).await {
                    Ok(n) if n > 0 => {}
                    _ => continue,
                }
                if socket.write_all(&CONNACK_ACCEPTED).await.is_err() {
                    continue;
                }
                debug!(%peer, "Fake broker accepted MQTT connection");
                if tx.send(socket).is_err() {
                    break;
                }
            }
        });

        Ok(Self {
            address,
            connections,
            accept_handle,
        })
    }

    /// `host:port` to hand to the client
    pub fn address(&self) -> &str {
        &self.address
    }

    /// Next acknowledged connection, if one arrives within `within`
    pub async fn next_connection(&mut self, within: Duration) -> Option<TcpStream> {
        tokio::time::timeout(within, self.connections.recv())
            .await
            .ok()
            .flatten()
    }
}

impl Drop for FakeBroker {
    fn drop(&mut self) {
        self.accept_handle.abort();
    }
}
