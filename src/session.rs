//! Session controller: SYNC handshake, roster maintenance, request correlation,
//! and the public embedder-facing API (spec §4.5).

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::{oneshot, watch};
use tokio::task::JoinHandle;

use crate::codec::{Frequency, VoicePacket};
use crate::error::{Result, SrsError};
use crate::guid::make_short_guid;
use crate::messages::{
    external_awacs_mode_password_message, radio_update_message, sync_message, MessageType,
    NetworkMessage,
};
use crate::model::{new_default_client, ClientInfo, Coalition, Modulation, RADIO_SLOT_COUNT};
use crate::roster::{Roster, ServerSettings};
use crate::tcp::{connect_tcp_json, TcpTransport};
use crate::voice::{connect_voice, VoiceTransport};

/// Budget for both the initial SYNC handshake and the EXTERNAL_AWACS_MODE_PASSWORD
/// round trip.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

/// Lifecycle state of a [`SrsClient`] session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Connecting,
    Syncing,
    Connected,
    AuthPending,
    Closed,
}

type Waiters = HashMap<u8, Vec<oneshot::Sender<NetworkMessage>>>;

/// An SRS client session: identity, roster, and the two live transports.
pub struct SrsClient {
    guid: String,
    roster: Arc<Roster>,
    server_settings: Arc<ServerSettings>,
    state: Arc<Mutex<SessionState>>,
    waiters: Arc<Mutex<Waiters>>,
    next_packet_id: AtomicU64,
    tcp_outbound: Option<tokio::sync::mpsc::UnboundedSender<NetworkMessage>>,
    voice_outbound: Option<tokio::sync::mpsc::UnboundedSender<Vec<u8>>>,
    pump_task: Option<JoinHandle<()>>,
    voice_transport: Option<VoiceTransport>,
    shutdown: watch::Sender<bool>,
}

impl SrsClient {
    /// Create a new, unconnected session with a freshly generated GUID.
    pub fn new(name: impl Into<String>) -> Self {
        let guid = make_short_guid();
        let roster = Arc::new(Roster::new());
        roster.insert_or_replace(&guid, new_default_client(guid.clone(), name));
        let (shutdown, _) = watch::channel(false);
        Self {
            guid,
            roster,
            server_settings: Arc::new(ServerSettings::new()),
            state: Arc::new(Mutex::new(SessionState::Idle)),
            waiters: Arc::new(Mutex::new(HashMap::new())),
            next_packet_id: AtomicU64::new(0),
            tcp_outbound: None,
            voice_outbound: None,
            pump_task: None,
            voice_transport: None,
            shutdown,
        }
    }

    pub fn guid(&self) -> &str {
        &self.guid
    }

    pub fn state(&self) -> SessionState {
        *self.state.lock()
    }

    /// Read-only view of the local client's own record.
    pub fn my_info(&self) -> ClientInfo {
        self.roster
            .get(&self.guid)
            .expect("local client always present in roster")
    }

    /// Read-only view of the full roster.
    pub fn roster(&self) -> HashMap<String, ClientInfo> {
        self.roster.snapshot()
    }

    /// Read-only view of the most recently delivered server settings.
    pub fn server_settings(&self) -> HashMap<String, String> {
        self.server_settings.snapshot()
    }

    /// Open TCP, perform the SYNC handshake, then open the UDP voice channel.
    ///
    /// On any failure the session is torn down and `state()` reports `Closed`
    /// (spec §4.5: "errors at any step move to Closed") rather than being left
    /// stuck in `Connecting`/`Syncing` with a half-initialized session.
    pub async fn connect(&mut self, host: &str, port: u16) -> Result<()> {
        match self.try_connect(host, port).await {
            Ok(()) => Ok(()),
            Err(err) => {
                self.close();
                Err(err)
            }
        }
    }

    async fn try_connect(&mut self, host: &str, port: u16) -> Result<()> {
        *self.state.lock() = SessionState::Connecting;

        let tcp = connect_tcp_json(host, port).await?;
        let tcp_outbound = tcp.outbound.clone();
        self.tcp_outbound = Some(tcp_outbound.clone());

        let pump_task = spawn_message_pump(
            tcp,
            self.roster.clone(),
            self.server_settings.clone(),
            self.waiters.clone(),
            self.state.clone(),
            self.shutdown.subscribe(),
        );
        self.pump_task = Some(pump_task);

        *self.state.lock() = SessionState::Syncing;
        let sync_waiter = self.future_message(MessageType::Sync);
        tcp_outbound
            .send(sync_message(self.my_info()))
            .map_err(|_| SrsError::ConnectionBroken)?;

        let sync_reply = tokio::time::timeout(REQUEST_TIMEOUT, sync_waiter)
            .await
            .map_err(|_| SrsError::TimedOut)?
            .map_err(|_| SrsError::ConnectionBroken)?;
        if sync_reply.message_type()? != MessageType::Sync {
            return Err(SrsError::ProtocolError("expected SYNC reply".into()));
        }

        let voice = connect_voice(host, port, self.guid.clone()).await?;
        self.voice_outbound = Some(voice.outbound.clone());
        self.voice_transport = Some(voice);

        *self.state.lock() = SessionState::Connected;
        Ok(())
    }

    /// Await the next decoded inbound voice packet from the UDP channel, or
    /// `None` once the voice transport has shut down.
    pub async fn recv_voice(&mut self) -> Option<VoicePacket> {
        self.voice_transport.as_mut()?.inbound.recv().await
    }

    /// Replace radio slot `i` and announce the change with RADIO_UPDATE.
    pub async fn tune_radio(&self, index: usize, frequency_hz: f64, modulation: Modulation) -> Result<()> {
        if index >= RADIO_SLOT_COUNT {
            return Err(SrsError::InvalidSlot(index));
        }
        let updated = self
            .roster
            .with_mut(&self.guid, |info| {
                info.radio_info.radios[index] =
                    crate::model::RadioInformation::new(frequency_hz, modulation);
                info.clone()
            })
            .expect("local client always present in roster");

        let outbound = self
            .tcp_outbound
            .as_ref()
            .ok_or(SrsError::ConnectionBroken)?;
        outbound
            .send(radio_update_message(updated))
            .map_err(|_| SrsError::ConnectionBroken)?;
        Ok(())
    }

    /// Attempt to log in as external AWACS with `password`. Collapses every
    /// failure mode (timeout, disconnect, spectator result) to `false` (spec §7).
    ///
    /// The only legal transition is `Connected -> AuthPending -> Connected`
    /// (spec §4.5): calling this on a session that was never connected or has
    /// already been closed short-circuits to `false` without touching `state`,
    /// rather than forging a `Connected` state the session doesn't actually have.
    pub async fn log_in_awacs(&self, password: impl Into<String>) -> bool {
        {
            let mut state = self.state.lock();
            if *state != SessionState::Connected {
                return false;
            }
            *state = SessionState::AuthPending;
        }
        let result = self.try_log_in_awacs(password).await;
        *self.state.lock() = SessionState::Connected;
        result
    }

    async fn try_log_in_awacs(&self, password: impl Into<String>) -> bool {
        let Some(outbound) = self.tcp_outbound.as_ref() else {
            return false;
        };
        let waiter = self.future_message(MessageType::ExternalAwacsModePassword);
        if outbound
            .send(external_awacs_mode_password_message(
                self.my_info(),
                password,
            ))
            .is_err()
        {
            return false;
        }

        let reply = match tokio::time::timeout(REQUEST_TIMEOUT, waiter).await {
            Ok(Ok(reply)) => reply,
            _ => return false,
        };

        match reply.client {
            Some(client) => client.coalition != Coalition::Spectator,
            None => false,
        }
    }

    /// Build and enqueue a voice packet carrying `audio_bytes` on `radio_index`'s
    /// current frequency/modulation.
    pub fn transmit(&self, audio_bytes: Vec<u8>, radio_index: usize) -> Result<()> {
        if radio_index >= RADIO_SLOT_COUNT {
            return Err(SrsError::InvalidSlot(radio_index));
        }
        let my_info = self.my_info();
        let radio = my_info.radio_info.radios[radio_index];

        let packet = VoicePacket {
            audio_data: audio_bytes,
            frequencies: vec![Frequency::new(radio.freq, radio.modulation)],
            unit_id: my_info.radio_info.unit_id,
            packet_id: self.next_packet_id.fetch_add(1, Ordering::Relaxed),
            guid: self.guid.clone(),
            hop_count: 0,
            original_client_guid: String::new(),
        };

        let outbound = self
            .voice_outbound
            .as_ref()
            .ok_or(SrsError::ConnectionBroken)?;
        outbound
            .send(packet.serialize()?)
            .map_err(|_| SrsError::ConnectionBroken)
    }

    /// Cancel pump tasks and close transports.
    pub fn close(&mut self) {
        let _ = self.shutdown.send(true);
        if let Some(task) = self.pump_task.take() {
            task.abort();
        }
        if let Some(voice) = self.voice_transport.take() {
            voice.abort();
        }
        self.tcp_outbound = None;
        self.voice_outbound = None;
        *self.state.lock() = SessionState::Closed;
    }

    /// Register a one-shot completer for the next message of `message_type`.
    fn future_message(&self, message_type: MessageType) -> oneshot::Receiver<NetworkMessage> {
        let (tx, rx) = oneshot::channel();
        self.waiters
            .lock()
            .entry(message_type as u8)
            .or_default()
            .push(tx);
        rx
    }
}

impl Drop for SrsClient {
    fn drop(&mut self) {
        self.close();
    }
}

#[allow(clippy::too_many_arguments)]
fn spawn_message_pump(
    mut tcp: TcpTransport,
    roster: Arc<Roster>,
    server_settings: Arc<ServerSettings>,
    waiters: Arc<Mutex<Waiters>>,
    state: Arc<Mutex<SessionState>>,
    mut shutdown: watch::Receiver<bool>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            let received = tokio::select! {
                received = tcp.inbound.recv() => received,
                _ = shutdown.changed() => break,
            };

            let Some(received) = received else {
                mark_disconnected(&state, &waiters);
                break;
            };

            match received {
                Ok(msg) => {
                    if let Err(err) = handle_message(&msg, &roster, &server_settings) {
                        log::warn!("message pump: error handling message: {err}");
                    }

                    let is_version_mismatch = matches!(msg.message_type(), Ok(MessageType::VersionMismatch));
                    complete_waiters(&waiters, msg.msg_type, msg);

                    if is_version_mismatch {
                        log::error!("SRS version mismatch; terminating session");
                        mark_disconnected(&state, &waiters);
                        break;
                    }
                }
                Err(err) => {
                    log::warn!("message pump: transport error: {err}");
                    mark_disconnected(&state, &waiters);
                    break;
                }
            }
        }
        tcp.abort();
    })
}

fn handle_message(
    msg: &NetworkMessage,
    roster: &Roster,
    server_settings: &ServerSettings,
) -> Result<()> {
    let msg_type = msg.message_type()?;
    match msg_type {
        MessageType::Sync => {
            let clients = msg
                .clients
                .as_ref()
                .ok_or_else(|| SrsError::ProtocolError("SYNC missing Clients".into()))?;
            for client in clients {
                roster.insert_or_replace(&client.client_guid, client.clone());
            }
            if let Some(settings) = &msg.server_settings {
                server_settings.replace_all(settings.clone());
            }
            Ok(())
        }
        MessageType::Update | MessageType::RadioUpdate => {
            let client = msg
                .client
                .as_ref()
                .ok_or_else(|| SrsError::ProtocolError("missing Client".into()))?;
            roster.merge_fields(&client.client_guid, client.clone());
            Ok(())
        }
        MessageType::ClientDisconnect => {
            let client = msg
                .client
                .as_ref()
                .ok_or_else(|| SrsError::ProtocolError("missing Client".into()))?;
            roster.remove(&client.client_guid);
            Ok(())
        }
        MessageType::VersionMismatch => Ok(()),
        MessageType::ExternalAwacsModePassword => Ok(()),
        MessageType::Ping | MessageType::ServerSettings | MessageType::ExternalAwacsModeDisconnect => {
            Ok(())
        }
    }
}

fn complete_waiters(waiters: &Mutex<Waiters>, msg_type: u8, msg: NetworkMessage) {
    let pending = waiters.lock().remove(&msg_type);
    if let Some(pending) = pending {
        for tx in pending {
            let _ = tx.send(msg.clone());
        }
    }
}

/// Drop every outstanding completer so in-flight `future_message` callers fail
/// fast with `ConnectionBroken`/timeout semantics instead of waiting out the full
/// request budget (spec §9: "garbage-collect already-completed or orphaned
/// completers").
fn mark_disconnected(state: &Mutex<SessionState>, waiters: &Mutex<Waiters>) {
    *state.lock() = SessionState::Closed;
    waiters.lock().clear();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::messages::sync_message;
    use crate::model::new_default_client;
    use std::collections::HashMap as StdHashMap;
    use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
    use tokio::net::{TcpListener, UdpSocket};

    async fn spawn_mock_server(
        respond_sync: bool,
    ) -> (u16, JoinHandle<()>) {
        let listener = TcpListener::bind(("127.0.0.1", 0)).await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let udp = UdpSocket::bind(("127.0.0.1", port)).await.unwrap();

        let task = tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            let (read_half, mut write_half) = stream.into_split();
            let mut lines = BufReader::new(read_half).lines();
            let _sync_line = lines.next_line().await.unwrap().unwrap();

            if respond_sync {
                let mut settings = StdHashMap::new();
                settings.insert("EXTERNAL_AWACS_MODE".to_string(), "true".to_string());
                let mut reply = sync_message(new_default_client("S".repeat(22), "server"));
                reply.clients = Some(vec![new_default_client("S".repeat(22), "server")]);
                reply.server_settings = Some(settings);
                let line = serde_json::to_string(&reply).unwrap();
                write_half.write_all(line.as_bytes()).await.unwrap();
                write_half.write_all(b"\n").await.unwrap();
            }

            // Keep the connection (and UDP socket) alive long enough for the test.
            tokio::time::sleep(Duration::from_secs(10)).await;
            drop(udp);
        });

        (port, task)
    }

    #[tokio::test]
    async fn connect_succeeds_after_sync_reply() {
        let (port, server) = spawn_mock_server(true).await;

        let mut client = SrsClient::new("pilot");
        client.connect("127.0.0.1", port).await.unwrap();

        assert_eq!(client.state(), SessionState::Connected);
        assert!(client.server_settings().contains_key("EXTERNAL_AWACS_MODE"));
        assert!(client.roster().contains_key(client.guid()));

        client.close();
        server.abort();
    }

    #[tokio::test]
    async fn connect_times_out_without_sync_reply() {
        let (port, server) = spawn_mock_server(false).await;

        let mut client = SrsClient::new("pilot");
        let result = client.connect("127.0.0.1", port).await;
        assert!(matches!(result, Err(SrsError::TimedOut)));
        // A failed connect must not leave the session looking usable.
        assert_eq!(client.state(), SessionState::Closed);

        client.close();
        server.abort();
    }

    #[tokio::test]
    async fn log_in_awacs_does_not_forge_connected_state() {
        let client = SrsClient::new("pilot");
        assert_eq!(client.state(), SessionState::Idle);
        assert!(!client.log_in_awacs("hunter2").await);
        // Never connected; must still report Idle, not Connected.
        assert_eq!(client.state(), SessionState::Idle);
    }

    #[tokio::test]
    async fn tune_radio_rejects_out_of_range_slot() {
        let mut client = SrsClient::new("pilot");
        // Skip connect(): tune_radio validates the slot before touching transports.
        let result = client.tune_radio(11, 251_000_000.0, Modulation::Am).await;
        assert!(matches!(result, Err(SrsError::InvalidSlot(11))));
    }

    #[tokio::test]
    async fn transmit_rejects_out_of_range_slot() {
        let client = SrsClient::new("pilot");
        let result = client.transmit(vec![1, 2, 3], 11);
        assert!(matches!(result, Err(SrsError::InvalidSlot(11))));
    }

    #[tokio::test]
    async fn log_in_awacs_returns_false_without_a_connection() {
        let client = SrsClient::new("pilot");
        assert!(!client.log_in_awacs("hunter2").await);
    }

    #[tokio::test]
    async fn unrecognized_message_type_does_not_terminate_the_pump() {
        let listener = TcpListener::bind(("127.0.0.1", 0)).await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let udp = UdpSocket::bind(("127.0.0.1", port)).await.unwrap();

        let server = tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            let (read_half, mut write_half) = stream.into_split();
            let mut lines = BufReader::new(read_half).lines();
            let _sync_line = lines.next_line().await.unwrap().unwrap();

            let reply = sync_message(new_default_client("S".repeat(22), "server"));
            write_half
                .write_all(serde_json::to_string(&reply).unwrap().as_bytes())
                .await
                .unwrap();
            write_half.write_all(b"\n").await.unwrap();

            // A MsgType the client enum doesn't recognize; the pump must log and
            // keep running rather than treat it as a fatal protocol violation.
            write_half.write_all(b"{\"MsgType\":200}\n").await.unwrap();

            tokio::time::sleep(Duration::from_secs(10)).await;
            drop(udp);
        });

        let mut client = SrsClient::new("pilot");
        client.connect("127.0.0.1", port).await.unwrap();

        // Give the pump a moment to process the unrecognized-type line.
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(client.state(), SessionState::Connected);

        client.close();
        server.abort();
    }
}
