// MIT License - Copyright (c) 2026 Peter Wright
// Concord 4 MQTT bridge

use std::collections::{BTreeMap, HashMap};
use std::fmt;

use crate::devices::{
    PartitionRecord, PartitionState, TouchpadBinding, TouchpadView, ZoneKey, ZoneRecord,
    ZoneStateFlags,
};
use crate::message::PanelMessage;

/// Panel lifecycle status as surfaced to logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PanelStatus {
    Connecting,
    /// A full-state request is outstanding
    Exploring,
    Active,
    Alarm,
    Faulted,
}

impl fmt::Display for PanelStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Connecting => "connecting",
            Self::Exploring => "exploring",
            Self::Active => "active",
            Self::Alarm => "alarm",
            Self::Faulted => "faulted",
        };
        f.write_str(s)
    }
}

/// Panel identification from PANEL_TYPE.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PanelInfo {
    pub panel_type: Option<String>,
    pub is_concord: Option<bool>,
    pub serial_number: Option<String>,
    pub hardware_revision: Option<String>,
    pub software_revision: Option<String>,
}

/// Result of merging a zone message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ZoneMerge {
    /// State before the merge; `None` when the zone was just learned
    pub previous: Option<ZoneStateFlags>,
    pub current: ZoneStateFlags,
}

/// Result of merging a partition message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PartitionMerge {
    /// Derived state before the merge; `None` when the partition was just learned
    pub previous: Option<PartitionState>,
    pub current: PartitionState,
}

/// Canonical in-memory state of the panel.
///
/// The store is the single owner of every zone and partition record and is
/// only mutated from the panel message task; other parts of the bridge get
/// borrowed views.
#[derive(Debug, Clone)]
pub struct StateStore {
    zones: HashMap<ZoneKey, ZoneRecord>,
    partitions: BTreeMap<u8, PartitionRecord>,
    touchpads: Vec<TouchpadBinding>,
    armed: Option<bool>,
    panel_info: PanelInfo,
    panel_status: PanelStatus,
    initial_query_done: bool,
}

impl StateStore {
    pub fn new(touchpads: Vec<TouchpadBinding>) -> Self {
        Self {
            zones: HashMap::new(),
            partitions: BTreeMap::new(),
            touchpads,
            armed: None,
            panel_info: PanelInfo::default(),
            panel_status: PanelStatus::Connecting,
            initial_query_done: false,
        }
    }

    // --- Zones ---

    /// Learn or merge a zone. `friendly_name` is consulted only when the
    /// zone has no text of its own.
    pub fn upsert_zone(
        &mut self,
        key: ZoneKey,
        msg: &PanelMessage,
        friendly_name: impl FnOnce() -> String,
    ) -> ZoneMerge {
        match self.zones.get_mut(&key) {
            Some(zone) => {
                let previous = zone.zone_state;
                zone.merge(msg);
                if zone.zone_text.is_empty() {
                    zone.zone_text = friendly_name();
                }
                ZoneMerge {
                    previous: Some(previous),
                    current: zone.zone_state,
                }
            }
            None => {
                let zone = ZoneRecord::learn(key, msg, friendly_name);
                let current = zone.zone_state;
                self.zones.insert(key, zone);
                ZoneMerge {
                    previous: None,
                    current,
                }
            }
        }
    }

    pub fn zone(&self, key: ZoneKey) -> Option<&ZoneRecord> {
        self.zones.get(&key)
    }

    /// All zones ordered by (partition, zone).
    pub fn zones(&self) -> Vec<&ZoneRecord> {
        let mut zones: Vec<_> = self.zones.values().collect();
        zones.sort_by_key(|z| z.key());
        zones
    }

    // --- Partitions ---

    pub fn upsert_partition(&mut self, partition_number: u8, msg: &PanelMessage) -> PartitionMerge {
        match self.partitions.get_mut(&partition_number) {
            Some(part) => {
                let previous = part.state();
                part.merge(msg);
                PartitionMerge {
                    previous: Some(previous),
                    current: part.state(),
                }
            }
            None => {
                let part = PartitionRecord::learn(partition_number, msg);
                let current = part.state();
                self.partitions.insert(partition_number, part);
                PartitionMerge {
                    previous: None,
                    current,
                }
            }
        }
    }

    pub fn partition(&self, partition_number: u8) -> Option<&PartitionRecord> {
        self.partitions.get(&partition_number)
    }

    pub fn partitions(&self) -> impl Iterator<Item = &PartitionRecord> {
        self.partitions.values()
    }

    /// Derived state of a partition; unknown partitions are `Unknown`.
    pub fn partition_state(&self, partition_number: u8) -> PartitionState {
        self.partition(partition_number)
            .map(PartitionRecord::state)
            .unwrap_or(PartitionState::Unknown)
    }

    // --- Touchpads ---

    pub fn touchpads(&self) -> &[TouchpadBinding] {
        &self.touchpads
    }

    /// Views for every touchpad bound to `partition_number`.
    pub fn touchpad_views(&self, partition_number: u8) -> Vec<(&TouchpadBinding, TouchpadView)> {
        let part = self.partition(partition_number);
        self.touchpads
            .iter()
            .filter(|tp| tp.partition == partition_number)
            .map(|tp| (tp, TouchpadView::mirror(part)))
            .collect()
    }

    // --- Process-wide flags ---

    /// `None` until the first arm/disarm transition is observed.
    pub fn armed(&self) -> Option<bool> {
        self.armed
    }

    pub fn set_armed(&mut self, armed: bool) {
        self.armed = Some(armed);
    }

    pub fn panel_info(&self) -> &PanelInfo {
        &self.panel_info
    }

    pub fn set_panel_info(&mut self, info: PanelInfo) {
        self.panel_info = info;
    }

    pub fn panel_status(&self) -> PanelStatus {
        self.panel_status
    }

    /// Returns true if the status changed.
    pub fn set_panel_status(&mut self, status: PanelStatus) -> bool {
        let changed = self.panel_status != status;
        self.panel_status = status;
        changed
    }

    pub fn initial_query_done(&self) -> bool {
        self.initial_query_done
    }

    pub fn set_initial_query_done(&mut self, done: bool) {
        self.initial_query_done = done;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::CommandKind;
    use serde_json::{json, Value};

    fn msg(kind: CommandKind, fields: Value) -> PanelMessage {
        let Value::Object(map) = fields else { unreachable!() };
        PanelMessage::new(kind, map)
    }

    #[test]
    fn test_upsert_zone_learn_then_merge() {
        let mut store = StateStore::new(Vec::new());
        let first = store.upsert_zone(
            (1, 4),
            &msg(CommandKind::ZoneData, json!({"zone_number": 4, "zone_state": ["Tripped"]})),
            || "Glass Break".to_string(),
        );
        assert_eq!(first.previous, None);
        assert_eq!(first.current, ZoneStateFlags::TRIPPED);
        assert_eq!(store.zone((1, 4)).map(|z| z.zone_text.as_str()), Some("Glass Break"));

        let second = store.upsert_zone(
            (1, 4),
            &msg(CommandKind::ZoneStatus, json!({"zone_number": 4, "zone_state": []})),
            || unreachable!("zone already named"),
        );
        assert_eq!(second.previous, Some(ZoneStateFlags::TRIPPED));
        assert_eq!(second.current, ZoneStateFlags::empty());
        assert_eq!(store.zones().len(), 1);
    }

    #[test]
    fn test_zones_keyed_by_partition() {
        let mut store = StateStore::new(Vec::new());
        let m = msg(CommandKind::ZoneData, json!({"zone_number": 1, "zone_state": []}));
        store.upsert_zone((1, 1), &m, || "A".to_string());
        store.upsert_zone((2, 1), &m, || "B".to_string());
        let keys: Vec<_> = store.zones().iter().map(|z| z.key()).collect();
        assert_eq!(keys, vec![(1, 1), (2, 1)]);
    }

    #[test]
    fn test_upsert_partition_tracks_state_change() {
        let mut store = StateStore::new(vec![TouchpadBinding::new(1, "Hall")]);
        let first = store.upsert_partition(
            1,
            &msg(CommandKind::PartData, json!({"partition_number": 1, "arming_level_code": 1})),
        );
        assert_eq!(first.previous, None);
        assert_eq!(first.current, PartitionState::Ready);

        let second = store.upsert_partition(
            1,
            &msg(CommandKind::Touchpad, json!({"partition_number": 1, "display_text": "ARMED\nSTAY"})),
        );
        assert_eq!(second.previous, Some(PartitionState::Ready));
        assert_eq!(second.current, PartitionState::Ready);

        let views = store.touchpad_views(1);
        assert_eq!(views.len(), 1);
        assert_eq!(views[0].0.name, "Hall");
        assert_eq!(views[0].1.lcd_line1, "ARMED");
        assert!(store.touchpad_views(2).is_empty());
        assert_eq!(store.partition_state(7), PartitionState::Unknown);
    }

    #[test]
    fn test_flags() {
        let mut store = StateStore::new(Vec::new());
        assert_eq!(store.armed(), None);
        store.set_armed(false);
        assert_eq!(store.armed(), Some(false));

        assert_eq!(store.panel_status(), PanelStatus::Connecting);
        assert!(store.set_panel_status(PanelStatus::Active));
        assert!(!store.set_panel_status(PanelStatus::Active));
        assert_eq!(PanelStatus::Exploring.to_string(), "exploring");
    }
}
