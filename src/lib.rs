// MIT License - Copyright (c) 2026 Peter Wright
// Concord 4 MQTT bridge
//
//! # concord-bridge
//!
//! Keeps a live model of a Concord 4 security panel and mirrors it onto an
//! MQTT bus.
//!
//! Decoded panel messages (zone, partition, arming, alarm and touchpad
//! updates) arrive through a [`PanelTransport`] and are folded into a
//! [`StateStore`]. State changes are queued as bus publishes, recorded in an
//! internal event log and, while the system is armed, raised as alerts.
//! Arm/disarm commands from the bus become keypress sequences for the panel.
//!
//! ## Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! use concord_bridge::{
//!     alert_queue, outbound_queue, BridgeConfig, JsonLineTransport, PanelDispatcher,
//!     PanelTransport, StateTranslator,
//! };
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = BridgeConfig::builder()
//!         .panel_address("192.168.0.50:5007")
//!         .zone_name(1, "Front Door")
//!         .build();
//!
//!     let (outbound, mut drain) = outbound_queue();
//!     let (alerts, _alert_rx) = alert_queue();
//!     let transport: Arc<dyn PanelTransport> = Arc::new(
//!         JsonLineTransport::connect(config.panel_address.clone(), Duration::from_secs(10)).await?,
//!     );
//!
//!     let mut dispatcher =
//!         PanelDispatcher::new(transport, StateTranslator::new(config, outbound, alerts));
//!     let mut rx = dispatcher.startup();
//!     while let Some(msg) = rx.recv().await {
//!         dispatcher.dispatch(msg);
//!         for update in drain.drain() {
//!             println!("{} = {}", update.topic, update.value);
//!         }
//!     }
//!     Ok(())
//! }
//! ```

pub mod alert;
pub mod bus;
pub mod command;
pub mod config;
pub mod constants;
pub mod devices;
pub mod dispatcher;
pub mod error;
pub mod event_log;
pub mod message;
pub mod outbound;
pub mod store;
pub mod translator;
pub mod transport;

// Re-exports for convenience
pub use alert::{
    alert_queue, run_alert_worker, Alert, AlertQueue, AlertSink, ConfiguredAlertSink,
    LogAlertSink, SendmailAlertSink,
};
pub use bus::{run_bus_loop, MqttPublisher};
pub use command::{
    AlwaysReady, ArmAction, ArmRequest, CommandTranslator, PanelLink, ReadinessCheck,
};
pub use config::{AlertConfig, BridgeConfig, BridgeConfigBuilder};
pub use devices::{
    ArmTransition, PartitionRecord, PartitionState, TouchpadBinding, TouchpadView, ZoneClass,
    ZoneKey, ZoneRecord, ZoneStateFlags,
};
pub use dispatcher::PanelDispatcher;
pub use error::{ArmError, BridgeError, Result};
pub use event_log::{EventInfo, EventLog, EventLogEntry, EventLogs};
pub use message::{CommandKind, PanelMessage};
pub use outbound::{
    flush, outbound_queue, run_drain_loop, BusPublisher, OutboundDrain, OutboundMessage,
    OutboundQueue,
};
pub use store::{PanelInfo, PanelStatus, StateStore};
pub use translator::StateTranslator;
pub use transport::{JsonLineTransport, MessageSink, PanelTransport};
