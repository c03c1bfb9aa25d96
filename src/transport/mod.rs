// MIT License - Copyright (c) 2026 Peter Wright
// Concord 4 MQTT bridge

pub mod json_line;

use tokio::sync::mpsc;

use crate::error::Result;
use crate::message::{CommandKind, PanelMessage};

pub use json_line::JsonLineTransport;

/// Where a transport delivers decoded messages for one command kind.
pub type MessageSink = mpsc::UnboundedSender<PanelMessage>;

/// The panel serial link as seen by the bridge.
///
/// Every method returns promptly: requests are queued for the transport's
/// writer and decoded messages arrive asynchronously on the registered sinks.
pub trait PanelTransport: Send + Sync {
    /// Route messages of `command` to `sink`, replacing any earlier route.
    fn register_handler(&self, command: CommandKind, sink: MessageSink);

    /// Ask the panel to report its full equipment list.
    fn request_all_equipment(&self) -> Result<()>;

    /// Ask the panel to resend its dynamic state (arming, zone status).
    fn request_dynamic_data_refresh(&self) -> Result<()>;

    /// Send a keypress sequence to a partition.
    fn send_keypress(&self, keys: &[u8], partition: u8) -> Result<()>;

    /// Stop reading and writing. Idempotent.
    fn stop(&self);

    /// Whether the link to the panel is currently up.
    fn is_connected(&self) -> bool;
}
