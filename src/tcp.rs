//! TCP JSON control transport: framed line-delimited JSON reader/writer (spec §4.3).

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::error::SrsError;
use crate::messages::NetworkMessage;

/// Handles for a running TCP JSON control connection.
pub struct TcpTransport {
    pub inbound: mpsc::UnboundedReceiver<Result<NetworkMessage, SrsError>>,
    pub outbound: mpsc::UnboundedSender<NetworkMessage>,
    reader_task: JoinHandle<()>,
    writer_task: JoinHandle<()>,
}

impl TcpTransport {
    pub fn abort(&self) {
        self.reader_task.abort();
        self.writer_task.abort();
    }
}

/// Open a TCP connection and start the reader/writer tasks described in spec §4.3.
pub async fn connect_tcp_json(host: &str, port: u16) -> Result<TcpTransport, SrsError> {
    log::info!("opening TCP control connection to {host}:{port}");
    let stream = TcpStream::connect((host, port))
        .await
        .map_err(|_| SrsError::ConnectionBroken)?;
    let (read_half, mut write_half) = stream.into_split();

    let (outbound_tx, mut outbound_rx) = mpsc::unbounded_channel::<NetworkMessage>();
    let (inbound_tx, inbound_rx) = mpsc::unbounded_channel::<Result<NetworkMessage, SrsError>>();

    let writer_task = tokio::spawn(async move {
        while let Some(msg) = outbound_rx.recv().await {
            let line = match serde_json::to_string(&msg) {
                Ok(line) => line,
                Err(err) => {
                    log::error!("failed to serialize outbound message: {err}");
                    continue;
                }
            };
            if write_half.write_all(line.as_bytes()).await.is_err()
                || write_half.write_all(b"\n").await.is_err()
            {
                log::warn!("TCP writer: connection broken");
                break;
            }
        }
    });

    let reader_task = tokio::spawn(async move {
        let mut reader = BufReader::new(read_half);
        let mut buf = Vec::new();
        loop {
            buf.clear();
            match reader.read_until(b'\n', &mut buf).await {
                Ok(0) => {
                    log::info!("TCP reader: connection closed");
                    let _ = inbound_tx.send(Err(SrsError::ConnectionBroken));
                    break;
                }
                Ok(_) if buf.last() != Some(&b'\n') => {
                    log::warn!("TCP reader: connection closed mid-line");
                    let _ = inbound_tx.send(Err(SrsError::ConnectionBroken));
                    break;
                }
                Ok(_) => {
                    buf.pop(); // trailing '\n'
                    let line = match std::str::from_utf8(&buf) {
                        Ok(line) => line,
                        Err(_) => {
                            let err = SrsError::ProtocolError("non-utf8 line".into());
                            log::error!("TCP reader: protocol error: {err}");
                            let _ = inbound_tx.send(Err(err));
                            break;
                        }
                    };
                    match parse_line(line) {
                        Ok(msg) => {
                            if inbound_tx.send(Ok(msg)).is_err() {
                                break;
                            }
                        }
                        Err(err) => {
                            log::error!("TCP reader: protocol error: {err}");
                            let _ = inbound_tx.send(Err(err));
                            break;
                        }
                    }
                }
                Err(_) => {
                    let _ = inbound_tx.send(Err(SrsError::ConnectionBroken));
                    break;
                }
            }
        }
    });

    Ok(TcpTransport {
        inbound: inbound_rx,
        outbound: outbound_tx,
        reader_task,
        writer_task,
    })
}

/// Parses one line as JSON; fails `ProtocolError` on malformed JSON or a missing
/// `MsgType`. Does NOT reject an unrecognized `MsgType` *value* — the pump treats
/// those leniently (ignore body, still complete waiters), only the voice codec is
/// strict about unknown enum codes (spec §7).
fn parse_line(line: &str) -> Result<NetworkMessage, SrsError> {
    serde_json::from_str(line).map_err(|err| SrsError::ProtocolError(err.to_string()))
}
