//! UDP voice transport: keep-alive, send, and receive tasks (spec §4.4).

use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use tokio::net::UdpSocket;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::codec::VoicePacket;
use crate::error::SrsError;

/// Application-level NAT/health probe cadence.
pub const VOICE_KEEPALIVE_PERIOD: Duration = Duration::from_secs(15);

/// Handles for a running UDP voice connection.
pub struct VoiceTransport {
    pub inbound: mpsc::UnboundedReceiver<VoicePacket>,
    pub outbound: mpsc::UnboundedSender<Vec<u8>>,
    /// Unix millis of the last datagram observed from the server (keep-alive reply
    /// or voice frame), for health monitoring.
    pub last_seen_millis: Arc<AtomicI64>,
    keepalive_task: JoinHandle<()>,
    send_task: JoinHandle<()>,
    receive_task: JoinHandle<()>,
}

impl VoiceTransport {
    pub fn abort(&self) {
        self.keepalive_task.abort();
        self.send_task.abort();
        self.receive_task.abort();
    }
}

/// Open a connected UDP datagram endpoint to `addr` and start the keep-alive, send,
/// and receive tasks.
pub async fn connect_voice(host: &str, port: u16, guid: String) -> Result<VoiceTransport, SrsError> {
    let socket = UdpSocket::bind(("0.0.0.0", 0))
        .await
        .map_err(|_| SrsError::ConnectionBroken)?;
    socket
        .connect((host, port))
        .await
        .map_err(|_| SrsError::ConnectionBroken)?;
    let socket = Arc::new(socket);

    let (inbound_tx, inbound_rx) = mpsc::unbounded_channel::<VoicePacket>();
    let (outbound_tx, mut outbound_rx) = mpsc::unbounded_channel::<Vec<u8>>();
    let last_seen_millis = Arc::new(AtomicI64::new(now_millis()));

    let keepalive_socket = socket.clone();
    let keepalive_guid = guid.clone();
    let keepalive_task = tokio::spawn(async move {
        let mut interval = tokio::time::interval(VOICE_KEEPALIVE_PERIOD);
        loop {
            interval.tick().await;
            if keepalive_socket.send(keepalive_guid.as_bytes()).await.is_err() {
                log::warn!("voice keep-alive: send failed");
            }
        }
    });

    let send_socket = socket.clone();
    let send_task = tokio::spawn(async move {
        while let Some(bytes) = outbound_rx.recv().await {
            if send_socket.send(&bytes).await.is_err() {
                log::warn!("voice send: datagram send failed");
            }
        }
    });

    let receive_socket = socket.clone();
    let receive_last_seen = last_seen_millis.clone();
    let receive_task = tokio::spawn(async move {
        let mut buf = vec![0u8; 65536];
        loop {
            let n = match receive_socket.recv(&mut buf).await {
                Ok(n) => n,
                Err(err) => {
                    log::warn!("voice receive: socket error: {err}");
                    break;
                }
            };
            receive_last_seen.store(now_millis(), Ordering::Relaxed);
            if n == 22 {
                // Keep-alive reply; nothing further to do.
                continue;
            }
            match VoicePacket::deserialize(&buf[..n]) {
                Ok(packet) => {
                    if inbound_tx.send(packet).is_err() {
                        break;
                    }
                }
                Err(err) => {
                    log::debug!("voice receive: dropping undecodable datagram: {err}");
                }
            }
        }
    });

    Ok(VoiceTransport {
        inbound: inbound_rx,
        outbound: outbound_tx,
        last_seen_millis,
        keepalive_task,
        send_task,
        receive_task,
    })
}

fn now_millis() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as i64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::Frequency;
    use crate::model::Modulation;
    use tokio::net::UdpSocket as TokioUdpSocket;

    #[tokio::test]
    async fn sends_and_receives_a_voice_frame() {
        let server = TokioUdpSocket::bind(("127.0.0.1", 0)).await.unwrap();
        let server_addr = server.local_addr().unwrap();

        let guid = "A".repeat(22);
        let transport = connect_voice("127.0.0.1", server_addr.port(), guid.clone())
            .await
            .unwrap();

        let packet = VoicePacket {
            audio_data: vec![9, 8, 7],
            frequencies: vec![Frequency::new(251_000_000.0, Modulation::Am)],
            unit_id: 1,
            packet_id: 1,
            guid: guid.clone(),
            hop_count: 0,
            original_client_guid: String::new(),
        };
        transport.outbound.send(packet.serialize().unwrap()).unwrap();

        // The keep-alive task's first tick fires immediately, so the server may see
        // a 22-byte probe before the voice frame; skip over it.
        let mut buf = vec![0u8; 4096];
        let (n, client_addr) = loop {
            let (n, addr) =
                tokio::time::timeout(Duration::from_secs(2), server.recv_from(&mut buf))
                    .await
                    .unwrap()
                    .unwrap();
            if n != 22 {
                break (n, addr);
            }
        };
        let decoded = VoicePacket::deserialize(&buf[..n]).unwrap();
        assert_eq!(decoded.audio_data, vec![9, 8, 7]);

        // Reply with the same packet back to the client.
        server.send_to(&buf[..n], client_addr).await.unwrap();

        let mut inbound = transport.inbound;
        let received = tokio::time::timeout(Duration::from_secs(2), inbound.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(received.audio_data, vec![9, 8, 7]);

        transport.keepalive_task.abort();
        transport.send_task.abort();
        transport.receive_task.abort();
    }

    #[tokio::test]
    async fn twenty_two_byte_datagram_is_treated_as_keepalive_reply() {
        let server = TokioUdpSocket::bind(("127.0.0.1", 0)).await.unwrap();
        let server_addr = server.local_addr().unwrap();
        let guid = "B".repeat(22);

        let transport = connect_voice("127.0.0.1", server_addr.port(), guid.clone())
            .await
            .unwrap();

        let mut buf = vec![0u8; 64];
        let (n, client_addr) =
            tokio::time::timeout(Duration::from_secs(2), server.recv_from(&mut buf))
                .await
                .unwrap()
                .unwrap();
        assert_eq!(n, 22);

        server
            .send_to(&buf[..n], client_addr)
            .await
            .unwrap();

        // No voice packet should surface on the inbound channel for a 22-byte reply.
        let mut inbound = transport.inbound;
        let result = tokio::time::timeout(Duration::from_millis(300), inbound.recv()).await;
        assert!(result.is_err(), "keep-alive reply must not surface as a voice packet");

        transport.keepalive_task.abort();
        transport.send_task.abort();
        transport.receive_task.abort();
    }
}
