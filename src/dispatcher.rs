// MIT License - Copyright (c) 2026 Peter Wright
// Concord 4 MQTT bridge

use std::sync::Arc;

use tokio::sync::{mpsc, watch};
use tracing::{debug, info, trace, warn};

use crate::message::{CommandKind, PanelMessage};
use crate::store::PanelStatus;
use crate::transport::PanelTransport;
use crate::translator::StateTranslator;

/// Receives every decoded panel message and routes it to the translator.
///
/// Owns the translator and therefore the state store; run it on a single
/// task so panel messages are handled strictly in arrival order.
pub struct PanelDispatcher {
    transport: Arc<dyn PanelTransport>,
    translator: StateTranslator,
}

impl PanelDispatcher {
    pub fn new(transport: Arc<dyn PanelTransport>, translator: StateTranslator) -> Self {
        Self {
            transport,
            translator,
        }
    }

    pub fn translator(&self) -> &StateTranslator {
        &self.translator
    }

    /// Register for every known command kind and request the full panel state.
    /// Returns the receiving end of the registered handlers.
    pub fn startup(&mut self) -> mpsc::UnboundedReceiver<PanelMessage> {
        let (tx, rx) = mpsc::unbounded_channel();
        for kind in CommandKind::KNOWN {
            self.transport.register_handler(kind, tx.clone());
        }
        self.refresh_panel_state("startup");
        rx
    }

    /// Ask the panel for everything it knows. Failures are logged; the next
    /// CLEAR_IMAGE or EVENT_LOST retries.
    pub fn refresh_panel_state(&mut self, reason: &str) {
        info!("Querying panel for state ({reason})");
        self.translator.set_panel_status(PanelStatus::Exploring);
        if let Err(e) = self.transport.request_all_equipment() {
            warn!("All-equipment request failed: {e}");
        }
        if let Err(e) = self.transport.request_dynamic_data_refresh() {
            warn!("Dynamic data refresh request failed: {e}");
        }
        self.translator.set_initial_query_done(false);
    }

    pub fn dispatch(&mut self, msg: PanelMessage) {
        if msg.kind.is_chatty() {
            trace!("Panel message {}", msg.kind);
        } else {
            debug!("Panel message {}", msg.kind);
        }

        match &msg.kind {
            CommandKind::PanelType => self.translator.handle_panel_type(&msg),
            CommandKind::ZoneData | CommandKind::ZoneStatus => self.translator.handle_zone(&msg),
            CommandKind::ArmLevel => self.translator.handle_arm_level(&msg),
            CommandKind::PartData
            | CommandKind::FeatState
            | CommandKind::Delay
            | CommandKind::Touchpad => self.translator.handle_partition(&msg),
            CommandKind::Alarm => self.translator.handle_alarm(&msg),
            CommandKind::EqptListDone => {
                if !self.translator.initial_query_done() {
                    self.translator.set_panel_status(PanelStatus::Active);
                    self.translator.set_initial_query_done(true);
                }
            }
            CommandKind::ClearImage | CommandKind::EventLost => {
                let reason = format!("reacting to {} message", msg.kind);
                self.refresh_panel_state(&reason);
            }
            CommandKind::AutomationEventLost
            | CommandKind::BusDevData
            | CommandKind::BusCapData
            | CommandKind::OutputData
            | CommandKind::UserData
            | CommandKind::SchedData
            | CommandKind::EventData
            | CommandKind::LightAttach
            | CommandKind::SirenSetup
            | CommandKind::SirenSync
            | CommandKind::SirenGo
            | CommandKind::Chime
            | CommandKind::Temperature => {
                trace!("No action for {} message", msg.kind);
            }
            CommandKind::Unrecognized(id) => {
                debug!("Unrecognized panel message {id}, dropping");
            }
        }
    }

    /// Dispatch messages until the transport side closes or shutdown is
    /// signalled. Returns the dispatcher for inspection.
    pub async fn run(
        mut self,
        mut rx: mpsc::UnboundedReceiver<PanelMessage>,
        mut shutdown_rx: watch::Receiver<bool>,
    ) -> Self {
        loop {
            tokio::select! {
                msg = rx.recv() => match msg {
                    Some(msg) => self.dispatch(msg),
                    None => {
                        debug!("Panel message channel closed");
                        break;
                    }
                },
                changed = shutdown_rx.changed() => {
                    if changed.is_err() || *shutdown_rx.borrow() {
                        debug!("Panel dispatcher shutting down");
                        break;
                    }
                }
            }
        }
        self
    }
}
