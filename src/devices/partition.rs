// MIT License - Copyright (c) 2026 Peter Wright
// Concord 4 MQTT bridge

use std::fmt;

use serde_json::{Map, Value};

use crate::message::PanelMessage;

/// Partition arming state derived from the panel's arming-level code.
///
/// PART_DATA and ARM_LEVEL report overlapping but different sets of codes;
/// this unifies them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PartitionState {
    Unknown,
    /// Code 0, ARM_LEVEL only
    ZoneTest,
    /// Code 1, "off"
    Ready,
    /// Code 2, home/perimeter
    Stay,
    /// Code 3, away/full
    Away,
    /// Code 4, ARM_LEVEL only
    Night,
    /// Code 5, ARM_LEVEL only
    Silent,
    /// Code 8, PART_DATA only
    PhoneTest,
    /// Code 9, PART_DATA only
    SensorTest,
}

impl PartitionState {
    /// Map an arming-level code. Absent or unmapped codes yield `Unknown`.
    pub fn from_code(code: Option<i64>) -> Self {
        match code {
            Some(0) => Self::ZoneTest,
            Some(1) => Self::Ready,
            Some(2) => Self::Stay,
            Some(3) => Self::Away,
            Some(4) => Self::Night,
            Some(5) => Self::Silent,
            Some(8) => Self::PhoneTest,
            Some(9) => Self::SensorTest,
            _ => Self::Unknown,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Unknown => "unknown",
            Self::ZoneTest => "zone_test",
            Self::Ready => "ready",
            Self::Stay => "stay",
            Self::Away => "away",
            Self::Night => "night",
            Self::Silent => "silent",
            Self::PhoneTest => "phone_test",
            Self::SensorTest => "sensor_test",
        }
    }
}

impl fmt::Display for PartitionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An observed arm/disarm transition (arming-level codes 1, 2 and 3).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArmTransition {
    Disarmed,
    ArmedStay,
    ArmedAway,
}

impl ArmTransition {
    /// Codes outside 1..=3 are query-refresh artifacts and yield `None`.
    pub fn from_code(code: i64) -> Option<Self> {
        match code {
            1 => Some(Self::Disarmed),
            2 => Some(Self::ArmedStay),
            3 => Some(Self::ArmedAway),
            _ => None,
        }
    }

    pub fn is_armed(&self) -> bool {
        !matches!(self, Self::Disarmed)
    }

    /// Payload published on `<namespace>/alarm`.
    pub fn bus_value(&self) -> &'static str {
        match self {
            Self::Disarmed => "disarmed",
            Self::ArmedStay => "armed_home",
            Self::ArmedAway => "armed_away",
        }
    }

    pub fn status_name(&self) -> &'static str {
        match self {
            Self::Disarmed => "disarmed",
            Self::ArmedStay => "armed_stay",
            Self::ArmedAway => "armed_away",
        }
    }
}

/// Canonical state of one partition, merged from PART_DATA, FEAT_STATE,
/// DELAY, TOUCHPAD and ARM_LEVEL messages.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PartitionRecord {
    pub partition_number: u8,
    pub arming_level_code: Option<i64>,
    pub arming_level: Option<String>,
    pub display_text: Option<String>,
    pub user_info: Option<String>,
    pub feature_state: Option<Vec<String>>,
    pub delay_flags: Option<Vec<String>>,
    pub delay_seconds: Option<i64>,
    pub extra: Map<String, Value>,
}

impl PartitionRecord {
    pub fn learn(partition_number: u8, msg: &PanelMessage) -> Self {
        let mut part = Self {
            partition_number,
            ..Default::default()
        };
        part.merge(msg);
        part
    }

    /// Field-wise merge: present fields overwrite, absent ones survive.
    pub fn merge(&mut self, msg: &PanelMessage) {
        for (name, value) in &msg.fields {
            match name.as_str() {
                "partition_number" => {}
                "arming_level_code" => {
                    if let Some(code) = msg.int(name) {
                        self.arming_level_code = Some(code);
                    }
                }
                "arming_level" => self.arming_level = Some(value_text(value)),
                "display_text" => {
                    if let Some(text) = value.as_str() {
                        self.display_text = Some(text.to_string());
                    }
                }
                "user_info" => self.user_info = Some(value_text(value)),
                "feature_state" => {
                    if let Some(list) = msg.str_list(name) {
                        self.feature_state = Some(list);
                    }
                }
                "delay_flags" => {
                    if let Some(list) = msg.str_list(name) {
                        self.delay_flags = Some(list);
                    }
                }
                "delay_seconds" => {
                    if let Some(secs) = msg.int(name) {
                        self.delay_seconds = Some(secs);
                    }
                }
                _ => {
                    self.extra.insert(name.clone(), value.clone());
                }
            }
        }
    }

    pub fn state(&self) -> PartitionState {
        PartitionState::from_code(self.arming_level_code)
    }

    pub fn arming_user(&self) -> &str {
        self.user_info.as_deref().unwrap_or("Unknown User")
    }

    pub fn features_summary(&self) -> String {
        match &self.feature_state {
            Some(features) => features.join(", "),
            None => "Unknown".to_string(),
        }
    }

    pub fn delay_summary(&self) -> String {
        match &self.delay_flags {
            Some(flags) if !flags.is_empty() => {
                format!("{}, {} seconds", flags.join(", "), self.delay_seconds.unwrap_or(-1))
            }
            _ => "No delay info".to_string(),
        }
    }
}

fn value_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::CommandKind;
    use serde_json::json;

    fn part_msg(kind: CommandKind, fields: Value) -> PanelMessage {
        let Value::Object(map) = fields else { unreachable!() };
        PanelMessage::new(kind, map)
    }

    #[test]
    fn test_partition_state_mapping() {
        assert_eq!(PartitionState::from_code(Some(-1)), PartitionState::Unknown);
        assert_eq!(PartitionState::from_code(Some(0)), PartitionState::ZoneTest);
        assert_eq!(PartitionState::from_code(Some(1)), PartitionState::Ready);
        assert_eq!(PartitionState::from_code(Some(2)), PartitionState::Stay);
        assert_eq!(PartitionState::from_code(Some(3)), PartitionState::Away);
        assert_eq!(PartitionState::from_code(Some(4)), PartitionState::Night);
        assert_eq!(PartitionState::from_code(Some(5)), PartitionState::Silent);
        assert_eq!(PartitionState::from_code(Some(8)), PartitionState::PhoneTest);
        assert_eq!(PartitionState::from_code(Some(9)), PartitionState::SensorTest);
        assert_eq!(PartitionState::from_code(None), PartitionState::Unknown);
        for unmapped in [6, 7, 10, 42, -7] {
            assert_eq!(PartitionState::from_code(Some(unmapped)), PartitionState::Unknown);
        }
    }

    #[test]
    fn test_arm_transition() {
        assert_eq!(ArmTransition::from_code(1), Some(ArmTransition::Disarmed));
        assert_eq!(ArmTransition::from_code(2).map(|t| t.bus_value()), Some("armed_home"));
        assert_eq!(ArmTransition::from_code(3).map(|t| t.bus_value()), Some("armed_away"));
        assert!(ArmTransition::ArmedStay.is_armed());
        assert!(!ArmTransition::Disarmed.is_armed());
        assert_eq!(ArmTransition::from_code(4), None);
        assert_eq!(ArmTransition::from_code(5), None);
    }

    #[test]
    fn test_merge_partition_fields() {
        let mut part = PartitionRecord::learn(
            1,
            &part_msg(
                CommandKind::PartData,
                json!({
                    "partition_number": 1,
                    "arming_level": "Off",
                    "arming_level_code": 1,
                    "user_info": "User 1"
                }),
            ),
        );
        assert_eq!(part.state(), PartitionState::Ready);

        part.merge(&part_msg(
            CommandKind::Delay,
            json!({"partition_number": 1, "delay_flags": ["Exit", "Standard"], "delay_seconds": 60}),
        ));
        assert_eq!(part.state(), PartitionState::Ready);
        assert_eq!(part.arming_user(), "User 1");
        assert_eq!(part.delay_summary(), "Exit, Standard, 60 seconds");

        part.merge(&part_msg(
            CommandKind::FeatState,
            json!({"partition_number": 1, "feature_state": ["Chime", "Energy saver"]}),
        ));
        assert_eq!(part.features_summary(), "Chime, Energy saver");
    }

    #[test]
    fn test_summaries_default() {
        let part = PartitionRecord::learn(2, &part_msg(CommandKind::Touchpad, json!({})));
        assert_eq!(part.arming_user(), "Unknown User");
        assert_eq!(part.features_summary(), "Unknown");
        assert_eq!(part.delay_summary(), "No delay info");
        assert_eq!(part.state(), PartitionState::Unknown);
    }
}
