// MIT License - Copyright (c) 2026 Peter Wright
// Concord 4 MQTT bridge

use chrono::Local;
use serde_json::Value;
use tracing::{debug, error, info, warn};

use crate::alert::{Alert, AlertQueue};
use crate::config::BridgeConfig;
use crate::constants::{ALARM_GENERAL_ACTIONABLE, SOURCE_TYPE_ZONE};
use crate::devices::{ArmTransition, PartitionState, ZoneClass, ZoneStateFlags};
use crate::event_log::{EventInfo, EventLogs};
use crate::message::{CommandKind, PanelMessage};
use crate::outbound::OutboundQueue;
use crate::store::{PanelInfo, PanelStatus, StateStore};

/// Turns decoded panel messages into state changes, event-log entries, bus
/// updates and alerts.
pub struct StateTranslator {
    config: BridgeConfig,
    store: StateStore,
    logs: EventLogs,
    outbound: OutboundQueue,
    alerts: AlertQueue,
}

impl StateTranslator {
    pub fn new(config: BridgeConfig, outbound: OutboundQueue, alerts: AlertQueue) -> Self {
        let store = StateStore::new(config.touchpads.clone());
        let logs = EventLogs::new(config.event_log_days, config.error_log_days);
        Self {
            config,
            store,
            logs,
            outbound,
            alerts,
        }
    }

    pub fn store(&self) -> &StateStore {
        &self.store
    }

    pub fn logs(&self) -> &EventLogs {
        &self.logs
    }

    pub fn set_panel_status(&mut self, status: PanelStatus) {
        if self.store.set_panel_status(status) {
            info!("Panel Information: state: {status}");
        }
    }

    pub fn initial_query_done(&self) -> bool {
        self.store.initial_query_done()
    }

    pub fn set_initial_query_done(&mut self, done: bool) {
        self.store.set_initial_query_done(done);
    }

    // --- Panel identification ---

    pub fn handle_panel_type(&mut self, msg: &PanelMessage) {
        let text = |key: &str| {
            msg.get(key).map(|v| match v {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            })
        };
        let info = PanelInfo {
            panel_type: text("panel_type"),
            is_concord: msg.get("is_concord").and_then(Value::as_bool),
            serial_number: text("serial_number"),
            hardware_revision: text("hardware_revision"),
            software_revision: text("software_revision"),
        };
        info!(
            "Panel Information: type={} concord={} serial={} hw={} sw={}",
            info.panel_type.as_deref().unwrap_or("?"),
            info.is_concord.map_or("?".to_string(), |b| b.to_string()),
            info.serial_number.as_deref().unwrap_or("?"),
            info.hardware_revision.as_deref().unwrap_or("?"),
            info.software_revision.as_deref().unwrap_or("?"),
        );
        self.store.set_panel_info(info);
    }

    // --- Zones ---

    /// ZONE_DATA / ZONE_STATUS.
    pub fn handle_zone(&mut self, msg: &PanelMessage) {
        let Some(zone_number) = msg.zone_number() else {
            warn!("{} message without a zone number, ignoring", msg.kind);
            return;
        };
        let partition = msg.partition_number().unwrap_or(1);
        let key = (partition, zone_number);

        if self.store.zone(key).is_some() {
            debug!("Updating zone {zone_number} with {} message", msg.kind);
        } else {
            debug!("Learning new zone {zone_number} from {} message", msg.kind);
        }

        let merge = self
            .store
            .upsert_zone(key, msg, || self.config.friendly_zone_name(zone_number));
        let zone_name = match self.store.zone(key) {
            Some(zone) => zone.display_name(),
            None => zone_number.to_string(),
        };

        let class = ZoneClass::classify(merge.current);
        if let Some(value) = class.bus_value() {
            self.outbound.enqueue(format!("zone/{zone_number}"), value);
        }
        info!("Zone {zone_name} | State: {class}");

        // Trip/untrip toggles while already in an error state stay out of
        // the error log.
        let old = merge.previous.unwrap_or_default();
        let use_err_log = (old.is_error_state() || merge.current.is_error_state())
            && ZoneStateFlags::changed_except_tripped(old, merge.current);

        self.log_event(
            EventInfo::Zone {
                zone_name,
                zone_state: merge.current,
                prev_zone_state: merge.previous,
                message: "Zone update message".to_string(),
                command: msg.kind.clone(),
                command_data: msg.to_value(),
            },
            use_err_log,
        );
    }

    // --- Arming ---

    /// ARM_LEVEL. Only codes 1, 2 and 3 are observed transitions. The partition
    /// record is left to the partition messages.
    pub fn handle_arm_level(&mut self, msg: &PanelMessage) {
        let Some(code) = msg.int("arming_level_code") else {
            warn!("ARM_LEVEL message without arming_level_code, ignoring");
            return;
        };

        match ArmTransition::from_code(code) {
            Some(transition) => self.apply_arm_transition(transition),
            None => debug!("Arming level code {code} is not an arm/disarm transition"),
        }
    }

    fn apply_arm_transition(&mut self, transition: ArmTransition) {
        match transition {
            ArmTransition::Disarmed => info!("System is DISARMED"),
            ArmTransition::ArmedStay => info!("System is ARMED to STAY"),
            ArmTransition::ArmedAway => info!("System is ARMED to AWAY"),
        }
        debug!("armstatus: arm_level={}", transition.status_name());
        self.store.set_armed(transition.is_armed());
        self.outbound.enqueue("alarm", transition.bus_value());
    }

    // --- Partitions ---

    /// PART_DATA / FEAT_STATE / DELAY / TOUCHPAD.
    pub fn handle_partition(&mut self, msg: &PanelMessage) {
        let Some(partition) = msg.partition_number() else {
            warn!("{} message without a partition number, ignoring", msg.kind);
            return;
        };

        if self.store.partition(partition).is_some() {
            debug!("Updating partition {partition} with {} message", msg.kind);
        } else {
            info!("Learning new partition {partition} from {} message", msg.kind);
        }
        let merge = self.store.upsert_partition(partition, msg);

        // First observation of the arm state can come from partition data
        if self.store.armed().is_none()
            && msg.get("arming_level").is_some_and(|v| !v.is_null())
            && let Some(transition) = msg.int("arming_level_code").and_then(ArmTransition::from_code)
        {
            self.apply_arm_transition(transition);
        }

        if let Some(part) = self.store.partition(partition) {
            debug!(
                "Partition {partition}: state={} user={} features={} delay={}",
                part.state(),
                part.arming_user(),
                part.features_summary(),
                part.delay_summary()
            );
        }
        self.refresh_touchpads(partition);

        if matches!(msg.kind, CommandKind::PartData | CommandKind::Delay) {
            // Skip the error log for routine PART_DATA while resting in ready
            let use_err_log = msg.kind != CommandKind::PartData
                || merge.previous != Some(merge.current)
                || merge.current != PartitionState::Ready;
            self.log_event(
                EventInfo::Partition {
                    partition_number: partition,
                    partition_state: merge.current,
                    command: msg.kind.clone(),
                    command_data: msg.to_value(),
                },
                use_err_log,
            );
        }
    }

    fn refresh_touchpads(&self, partition: u8) {
        for (touchpad, view) in self.store.touchpad_views(partition) {
            debug!(
                "Touchpad {}: state={} lcd1='{}' lcd2='{}'",
                touchpad.name, view.partition_state, view.lcd_line1, view.lcd_line2
            );
            if partition == 1 {
                info!("Latest touchpad display text: '{}'", view.display_line());
            }
        }
    }

    // --- Alarms ---

    /// ALARM. Only general type 1 (fire/police/medical) is acted on.
    pub fn handle_alarm(&mut self, msg: &PanelMessage) {
        let general_code = msg.int("alarm_general_type_code");
        let specific_code = msg.int("alarm_specific_type_code");
        let alarm_code = format!(
            "{}.{}",
            general_code.map_or("?".to_string(), |c| c.to_string()),
            specific_code.map_or("?".to_string(), |c| c.to_string())
        );
        if general_code != Some(ALARM_GENERAL_ACTIONABLE) {
            debug!("Ignoring non-actionable alarm {alarm_code}");
            return;
        }

        let partition = msg.partition_number().unwrap_or(1);
        let source_type = msg.str("source_type").unwrap_or("Unknown");
        let source_number = msg.int("source_number").unwrap_or(-1);
        let source_desc = self.describe_source(partition, source_type, source_number);
        let alarm_desc = format!(
            "{} / {}",
            msg.str("alarm_general_type").unwrap_or("Unknown"),
            msg.str("alarm_specific_type").unwrap_or("Unknown")
        );

        error!("ALARM or TROUBLE on partition {partition}: Source details: {source_desc}");
        self.set_panel_status(PanelStatus::Alarm);

        let mut command_data = msg.to_value();
        if let Value::Object(map) = &mut command_data {
            map.insert("source_desc".to_string(), Value::String(source_desc.clone()));
        }
        self.log_event(
            EventInfo::Alarm {
                partition_number: partition,
                source_desc,
                alarm_code,
                alarm_desc,
                command_data,
            },
            true,
        );
    }

    fn describe_source(&self, partition: u8, source_type: &str, source_number: i64) -> String {
        if source_type == SOURCE_TYPE_ZONE
            && let Ok(zone_number) = u16::try_from(source_number)
            && let Some(zone) = self.store.zone((partition, zone_number))
        {
            return format!("Zone {zone_number} - alarm zone {}", zone.zone_text);
        }
        format!("{source_type}, number {source_number}")
    }

    // --- Event log ---

    /// Append to the event logs. A zone entry while armed also raises an
    /// alert and reports the alarm as triggered.
    fn log_event(&mut self, info: EventInfo, is_err: bool) {
        let now = Local::now();

        if let EventInfo::Zone {
            zone_name,
            zone_state,
            prev_zone_state,
            command,
            ..
        } = &info
            && self.store.armed() == Some(true)
            && !zone_state.is_empty()
        {
            self.alerts.raise(Alert {
                zone_name: zone_name.clone(),
                zone_state: *zone_state,
                prev_zone_state: *prev_zone_state,
                command: command.clone(),
                timestamp: now,
            });
            self.outbound.enqueue("alarm", "triggered");
        }

        self.logs.record(now, info, is_err);
    }
}
