// MIT License - Copyright (c) 2026 Peter Wright
// Concord 4 MQTT bridge

use std::fmt;

use serde_json::{Map, Value};

use crate::error::{BridgeError, Result};

/// Command identifiers carried in the `command_id` tag of a decoded panel message.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CommandKind {
    PanelType,
    AutomationEventLost,
    ZoneData,
    PartData,
    BusDevData,
    BusCapData,
    OutputData,
    EqptListDone,
    UserData,
    SchedData,
    EventData,
    LightAttach,
    ClearImage,
    ZoneStatus,
    ArmLevel,
    Alarm,
    Delay,
    SirenSetup,
    SirenSync,
    SirenGo,
    Touchpad,
    Chime,
    FeatState,
    Temperature,
    EventLost,
    /// Any identifier this bridge does not know about.
    Unrecognized(String),
}

impl CommandKind {
    /// Every identifier the bridge registers a handler for.
    pub const KNOWN: [CommandKind; 25] = [
        Self::PanelType,
        Self::AutomationEventLost,
        Self::ZoneData,
        Self::PartData,
        Self::BusDevData,
        Self::BusCapData,
        Self::OutputData,
        Self::EqptListDone,
        Self::UserData,
        Self::SchedData,
        Self::EventData,
        Self::LightAttach,
        Self::ClearImage,
        Self::ZoneStatus,
        Self::ArmLevel,
        Self::Alarm,
        Self::Delay,
        Self::SirenSetup,
        Self::SirenSync,
        Self::SirenGo,
        Self::Touchpad,
        Self::Chime,
        Self::FeatState,
        Self::Temperature,
        Self::EventLost,
    ];

    pub fn from_id(id: &str) -> Self {
        match id {
            "PANEL_TYPE" => Self::PanelType,
            "AUTOMATION_EVENT_LOST" => Self::AutomationEventLost,
            "ZONE_DATA" => Self::ZoneData,
            "PART_DATA" => Self::PartData,
            "BUS_DEV_DATA" => Self::BusDevData,
            "BUS_CAP_DATA" => Self::BusCapData,
            "OUTPUT_DATA" => Self::OutputData,
            "EQPT_LIST_DONE" => Self::EqptListDone,
            "USER_DATA" => Self::UserData,
            "SCHED_DATA" => Self::SchedData,
            "EVENT_DATA" => Self::EventData,
            "LIGHT_ATTACH" => Self::LightAttach,
            "CLEAR_IMAGE" => Self::ClearImage,
            "ZONE_STATUS" => Self::ZoneStatus,
            "ARM_LEVEL" => Self::ArmLevel,
            "ALARM" => Self::Alarm,
            "DELAY" => Self::Delay,
            "SIREN_SETUP" => Self::SirenSetup,
            "SIREN_SYNC" => Self::SirenSync,
            "SIREN_GO" => Self::SirenGo,
            "TOUCHPAD" => Self::Touchpad,
            "CHIME" => Self::Chime,
            "FEAT_STATE" => Self::FeatState,
            "TEMPERATURE" => Self::Temperature,
            "EVENT_LOST" => Self::EventLost,
            other => Self::Unrecognized(other.to_string()),
        }
    }

    /// The wire identifier.
    pub fn as_str(&self) -> &str {
        match self {
            Self::PanelType => "PANEL_TYPE",
            Self::AutomationEventLost => "AUTOMATION_EVENT_LOST",
            Self::ZoneData => "ZONE_DATA",
            Self::PartData => "PART_DATA",
            Self::BusDevData => "BUS_DEV_DATA",
            Self::BusCapData => "BUS_CAP_DATA",
            Self::OutputData => "OUTPUT_DATA",
            Self::EqptListDone => "EQPT_LIST_DONE",
            Self::UserData => "USER_DATA",
            Self::SchedData => "SCHED_DATA",
            Self::EventData => "EVENT_DATA",
            Self::LightAttach => "LIGHT_ATTACH",
            Self::ClearImage => "CLEAR_IMAGE",
            Self::ZoneStatus => "ZONE_STATUS",
            Self::ArmLevel => "ARM_LEVEL",
            Self::Alarm => "ALARM",
            Self::Delay => "DELAY",
            Self::SirenSetup => "SIREN_SETUP",
            Self::SirenSync => "SIREN_SYNC",
            Self::SirenGo => "SIREN_GO",
            Self::Touchpad => "TOUCHPAD",
            Self::Chime => "CHIME",
            Self::FeatState => "FEAT_STATE",
            Self::Temperature => "TEMPERATURE",
            Self::EventLost => "EVENT_LOST",
            Self::Unrecognized(id) => id,
        }
    }

    /// Messages the panel sends continuously; logged at a lower level.
    pub fn is_chatty(&self) -> bool {
        matches!(self, Self::Touchpad | Self::SirenSync)
    }
}

impl fmt::Display for CommandKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A decoded panel message: the command tag plus its field mapping.
///
/// The field map never contains `command_id`; that is lifted into [`PanelMessage::kind`].
#[derive(Debug, Clone, PartialEq)]
pub struct PanelMessage {
    pub kind: CommandKind,
    pub fields: Map<String, Value>,
}

impl PanelMessage {
    pub fn new(kind: CommandKind, fields: Map<String, Value>) -> Self {
        Self { kind, fields }
    }

    /// Build from a decoded JSON object carrying a `command_id` string.
    pub fn from_value(value: Value) -> Result<Self> {
        let Value::Object(mut fields) = value else {
            return Err(BridgeError::InvalidMessage {
                details: "expected a JSON object".to_string(),
            });
        };
        let kind = match fields.remove("command_id") {
            Some(Value::String(id)) => CommandKind::from_id(&id),
            Some(other) => {
                return Err(BridgeError::InvalidMessage {
                    details: format!("command_id is not a string: {other}"),
                });
            }
            None => {
                return Err(BridgeError::InvalidMessage {
                    details: "missing command_id".to_string(),
                });
            }
        };
        Ok(Self { kind, fields })
    }

    /// Parse one JSON line as produced by the decoder gateway.
    pub fn from_json_line(line: &str) -> Result<Self> {
        Self::from_value(serde_json::from_str(line)?)
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    pub fn has(&self, key: &str) -> bool {
        self.fields.contains_key(key)
    }

    /// Integer field; numeric strings (e.g. `"1"`) are accepted too.
    pub fn int(&self, key: &str) -> Option<i64> {
        match self.fields.get(key)? {
            Value::Number(n) => n.as_i64(),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    pub fn str(&self, key: &str) -> Option<&str> {
        self.fields.get(key)?.as_str()
    }

    /// List of strings; a bare string counts as a single-element list.
    pub fn str_list(&self, key: &str) -> Option<Vec<String>> {
        match self.fields.get(key)? {
            Value::Array(items) => Some(
                items
                    .iter()
                    .filter_map(|v| v.as_str().map(str::to_string))
                    .collect(),
            ),
            Value::String(s) => Some(vec![s.clone()]),
            _ => None,
        }
    }

    pub fn partition_number(&self) -> Option<u8> {
        self.int("partition_number").and_then(|n| u8::try_from(n).ok())
    }

    pub fn zone_number(&self) -> Option<u16> {
        self.int("zone_number").and_then(|n| u16::try_from(n).ok())
    }

    /// The message as a JSON object including its `command_id`, for event logs.
    pub fn to_value(&self) -> Value {
        let mut map = self.fields.clone();
        map.insert(
            "command_id".to_string(),
            Value::String(self.kind.as_str().to_string()),
        );
        Value::Object(map)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_command_kind_roundtrip_known() {
        for kind in CommandKind::KNOWN.iter() {
            assert_eq!(&CommandKind::from_id(kind.as_str()), kind);
        }
    }

    #[test]
    fn test_unrecognized_command_kind() {
        let kind = CommandKind::from_id("SOMETHING_NEW");
        assert_eq!(kind, CommandKind::Unrecognized("SOMETHING_NEW".to_string()));
        assert_eq!(kind.to_string(), "SOMETHING_NEW");
    }

    #[test]
    fn test_only_periodic_kinds_are_chatty() {
        let chatty: Vec<_> = CommandKind::KNOWN.iter().filter(|k| k.is_chatty()).collect();
        assert_eq!(chatty, vec![&CommandKind::SirenSync, &CommandKind::Touchpad]);
        assert!(!CommandKind::ZoneStatus.is_chatty());
        assert!(!CommandKind::from_id("SOMETHING_NEW").is_chatty());
    }

    #[test]
    fn test_parse_json_line() {
        let msg = PanelMessage::from_json_line(
            r#"{"command_id":"ZONE_STATUS","zone_number":3,"partition_number":1,"zone_state":["Tripped"]}"#,
        )
        .unwrap();
        assert_eq!(msg.kind, CommandKind::ZoneStatus);
        assert_eq!(msg.zone_number(), Some(3));
        assert_eq!(msg.partition_number(), Some(1));
        assert_eq!(msg.str_list("zone_state"), Some(vec!["Tripped".to_string()]));
        assert!(!msg.has("command_id"));
    }

    #[test]
    fn test_missing_command_id_rejected() {
        let err = PanelMessage::from_value(json!({"zone_number": 1})).unwrap_err();
        assert!(matches!(err, BridgeError::InvalidMessage { .. }));
        assert!(PanelMessage::from_value(json!([1, 2])).is_err());
    }

    #[test]
    fn test_int_accepts_numeric_strings() {
        let msg = PanelMessage::from_value(json!({
            "command_id": "ALARM",
            "alarm_general_type_code": "1",
            "source_number": 4
        }))
        .unwrap();
        assert_eq!(msg.int("alarm_general_type_code"), Some(1));
        assert_eq!(msg.int("source_number"), Some(4));
        assert_eq!(msg.int("missing"), None);
    }

    #[test]
    fn test_to_value_restores_command_id() {
        let msg = PanelMessage::from_value(json!({"command_id": "DELAY", "delay_seconds": 30})).unwrap();
        let value = msg.to_value();
        assert_eq!(value["command_id"], "DELAY");
        assert_eq!(value["delay_seconds"], 30);
    }
}
