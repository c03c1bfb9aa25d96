// MIT License - Copyright (c) 2026 Peter Wright
// Concord 4 MQTT bridge

//! TCP client for a panel decoder gateway speaking newline-delimited JSON.
//!
//! Each inbound line is one decoded panel message carrying a `command_id`.
//! Outbound lines are requests (`{"request":"all_equipment"}`) or keypress
//! sequences (`{"keypress":[5,40],"partition":1}`).

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use serde::Serialize;
use serde_json::Map;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio::net::tcp::OwnedWriteHalf;
use tokio::sync::{mpsc, watch};
use tokio::time::sleep;
use tracing::{debug, error, info, warn};

use crate::error::{BridgeError, Result};
use crate::message::{CommandKind, PanelMessage};
use crate::transport::{MessageSink, PanelTransport};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
enum OutgoingFrame {
    Request { request: &'static str },
    Keypress { keypress: Vec<u8>, partition: u8 },
}

/// State shared between the transport handle and its connection task.
#[derive(Default)]
struct Shared {
    handlers: Mutex<HashMap<CommandKind, MessageSink>>,
    connected: AtomicBool,
}

impl Shared {
    fn handlers(&self) -> MutexGuard<'_, HashMap<CommandKind, MessageSink>> {
        match self.handlers.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn route_line(&self, line: &str) {
        let line = line.trim();
        if line.is_empty() {
            return;
        }
        match PanelMessage::from_json_line(line) {
            Ok(msg) => self.deliver(msg),
            Err(e) => warn!("Discarding undecodable panel line: {e}"),
        }
    }

    fn deliver(&self, msg: PanelMessage) {
        let sink = self.handlers().get(&msg.kind).cloned();
        match sink {
            Some(sink) => {
                if sink.send(msg).is_err() {
                    debug!("Panel message handler gone, dropping message");
                }
            }
            None => debug!("No handler for {} message, dropping", msg.kind),
        }
    }
}

enum SessionEnd {
    Shutdown,
    Closed(String),
}

/// Newline-delimited JSON transport over TCP.
///
/// The connection task reconnects after `reconnect_delay` whenever the
/// gateway drops the link and then delivers a synthetic `EVENT_LOST` so the
/// consumer resynchronises. Dropping the handle stops the task.
pub struct JsonLineTransport {
    shared: Arc<Shared>,
    outgoing: mpsc::UnboundedSender<OutgoingFrame>,
    shutdown_tx: watch::Sender<bool>,
}

impl JsonLineTransport {
    /// Connect to the gateway. Only this first connection attempt can fail;
    /// later losses are retried in the background.
    pub async fn connect(address: impl Into<String>, reconnect_delay: Duration) -> Result<Self> {
        let address = address.into();
        info!("Connecting to panel gateway at {address}");

        let stream = TcpStream::connect(&address).await.map_err(|e| {
            error!("TCP connect to {address} failed: {e}");
            BridgeError::Io(e)
        })?;
        debug!("TCP socket connected");

        let shared = Arc::new(Shared::default());
        shared.connected.store(true, Ordering::SeqCst);
        let (outgoing, outgoing_rx) = mpsc::unbounded_channel();
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        tokio::spawn(run_connection(
            address,
            stream,
            reconnect_delay,
            shared.clone(),
            outgoing_rx,
            shutdown_rx,
        ));

        Ok(Self {
            shared,
            outgoing,
            shutdown_tx,
        })
    }

    fn queue(&self, frame: OutgoingFrame) -> Result<()> {
        self.outgoing
            .send(frame)
            .map_err(|_| BridgeError::TransportClosed)
    }
}

impl PanelTransport for JsonLineTransport {
    fn register_handler(&self, command: CommandKind, sink: MessageSink) {
        self.shared.handlers().insert(command, sink);
    }

    fn request_all_equipment(&self) -> Result<()> {
        debug!("Requesting all equipment");
        self.queue(OutgoingFrame::Request {
            request: "all_equipment",
        })
    }

    fn request_dynamic_data_refresh(&self) -> Result<()> {
        debug!("Requesting dynamic data refresh");
        self.queue(OutgoingFrame::Request {
            request: "dynamic_data_refresh",
        })
    }

    /// Keypresses are refused while disconnected so a stale sequence is never
    /// replayed after a reconnect.
    fn send_keypress(&self, keys: &[u8], partition: u8) -> Result<()> {
        if !self.is_connected() {
            return Err(BridgeError::NotConnected);
        }
        self.queue(OutgoingFrame::Keypress {
            keypress: keys.to_vec(),
            partition,
        })
    }

    fn stop(&self) {
        info!("Stopping panel transport");
        self.shared.connected.store(false, Ordering::SeqCst);
        self.shutdown_tx.send_replace(true);
    }

    fn is_connected(&self) -> bool {
        self.shared.connected.load(Ordering::SeqCst)
    }
}

async fn run_connection(
    address: String,
    mut stream: TcpStream,
    reconnect_delay: Duration,
    shared: Arc<Shared>,
    mut outgoing_rx: mpsc::UnboundedReceiver<OutgoingFrame>,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    loop {
        let end = run_session(stream, &shared, &mut outgoing_rx, &mut shutdown_rx).await;
        shared.connected.store(false, Ordering::SeqCst);
        match end {
            SessionEnd::Shutdown => break,
            SessionEnd::Closed(reason) => warn!("Panel gateway connection lost: {reason}"),
        }

        stream = loop {
            tokio::select! {
                _ = sleep(reconnect_delay) => {}
                _ = shutdown_rx.changed() => {
                    debug!("Panel transport stopped while reconnecting");
                    return;
                }
            }
            info!("Reconnecting to panel gateway at {address}");
            match TcpStream::connect(&address).await {
                Ok(stream) => break stream,
                Err(e) => warn!(
                    "Reconnection failed: {e}. Retrying in {:.1}s...",
                    reconnect_delay.as_secs_f64()
                ),
            }
        };

        shared.connected.store(true, Ordering::SeqCst);
        info!("Panel gateway reconnected");
        // Anything may have happened while we were away
        shared.deliver(PanelMessage::new(CommandKind::EventLost, Map::new()));
    }
    debug!("Panel transport stopped");
}

async fn run_session(
    stream: TcpStream,
    shared: &Shared,
    outgoing_rx: &mut mpsc::UnboundedReceiver<OutgoingFrame>,
    shutdown_rx: &mut watch::Receiver<bool>,
) -> SessionEnd {
    if *shutdown_rx.borrow() {
        return SessionEnd::Shutdown;
    }
    let (reader, mut writer) = stream.into_split();
    let mut lines = BufReader::new(reader).lines();

    loop {
        tokio::select! {
            line = lines.next_line() => match line {
                Ok(Some(line)) => shared.route_line(&line),
                Ok(None) => return SessionEnd::Closed("connection closed by gateway".to_string()),
                Err(e) => return SessionEnd::Closed(e.to_string()),
            },
            frame = outgoing_rx.recv() => match frame {
                Some(frame) => {
                    if let Err(e) = write_frame(&mut writer, &frame).await {
                        return SessionEnd::Closed(e.to_string());
                    }
                }
                None => return SessionEnd::Shutdown,
            },
            _ = shutdown_rx.changed() => return SessionEnd::Shutdown,
        }
    }
}

async fn write_frame(writer: &mut OwnedWriteHalf, frame: &OutgoingFrame) -> Result<()> {
    let mut line = serde_json::to_vec(frame)?;
    line.push(b'\n');
    writer.write_all(&line).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
    use tokio::net::TcpListener;
    use tokio::time::timeout;

    const WAIT: Duration = Duration::from_secs(5);

    #[test]
    fn test_frame_encoding() {
        let request = serde_json::to_string(&OutgoingFrame::Request {
            request: "all_equipment",
        })
        .unwrap();
        assert_eq!(request, r#"{"request":"all_equipment"}"#);

        let keypress = serde_json::to_string(&OutgoingFrame::Keypress {
            keypress: vec![0x05, 0x28],
            partition: 1,
        })
        .unwrap();
        assert_eq!(keypress, r#"{"keypress":[5,40],"partition":1}"#);
    }

    #[tokio::test]
    async fn test_routes_lines_and_writes_requests() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();

        let transport = JsonLineTransport::connect(addr, Duration::from_millis(10))
            .await
            .unwrap();
        let (sock, _) = listener.accept().await.unwrap();
        let (read_half, mut write_half) = sock.into_split();
        let mut server_lines = BufReader::new(read_half).lines();

        let (tx, mut rx) = mpsc::unbounded_channel();
        transport.register_handler(CommandKind::ZoneStatus, tx);

        transport.request_all_equipment().unwrap();
        transport.send_keypress(&[0x20], 1).unwrap();
        let first = timeout(WAIT, server_lines.next_line()).await.unwrap().unwrap();
        let second = timeout(WAIT, server_lines.next_line()).await.unwrap().unwrap();
        assert_eq!(first.as_deref(), Some(r#"{"request":"all_equipment"}"#));
        assert_eq!(second.as_deref(), Some(r#"{"keypress":[32],"partition":1}"#));

        write_half
            .write_all(
                b"not json\n{\"command_id\":\"CHIME\"}\n{\"command_id\":\"ZONE_STATUS\",\"zone_number\":3}\n",
            )
            .await
            .unwrap();
        let msg = timeout(WAIT, rx.recv()).await.unwrap().unwrap();
        assert_eq!(msg.kind, CommandKind::ZoneStatus);
        assert_eq!(msg.zone_number(), Some(3));
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_reconnect_delivers_event_lost() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();

        let transport = JsonLineTransport::connect(addr, Duration::from_millis(10))
            .await
            .unwrap();
        let (tx, mut rx) = mpsc::unbounded_channel();
        transport.register_handler(CommandKind::EventLost, tx);

        let (first, _) = listener.accept().await.unwrap();
        drop(first);

        let (_second, _) = timeout(WAIT, listener.accept()).await.unwrap().unwrap();
        let msg = timeout(WAIT, rx.recv()).await.unwrap().unwrap();
        assert_eq!(msg.kind, CommandKind::EventLost);
        assert!(transport.is_connected());
    }

    #[tokio::test]
    async fn test_stop_refuses_keypresses() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        let transport = JsonLineTransport::connect(addr, Duration::from_millis(10))
            .await
            .unwrap();

        transport.stop();
        transport.stop();
        assert!(!transport.is_connected());
        assert!(matches!(
            transport.send_keypress(&[0x20], 1),
            Err(BridgeError::NotConnected)
        ));
    }

    #[tokio::test]
    async fn test_connect_failure_is_io_error() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        drop(listener);

        let err = JsonLineTransport::connect(addr, Duration::from_millis(10))
            .await
            .err()
            .unwrap();
        assert!(matches!(err, BridgeError::Io(_)));
        assert!(err.is_retryable());
    }
}
