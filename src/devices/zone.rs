// MIT License - Copyright (c) 2026 Peter Wright
// Concord 4 MQTT bridge

use std::fmt;

use bitflags::bitflags;
use serde_json::{Map, Value};

use crate::message::PanelMessage;

bitflags! {
    /// Raw zone state tags reported in the `zone_state` field.
    ///
    /// An empty set means the zone is closed and healthy.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct ZoneStateFlags: u8 {
        const TRIPPED  = 0b0000_0001;
        const FAULTED  = 0b0000_0010;
        const ALARM    = 0b0000_0100;
        const TROUBLE  = 0b0000_1000;
        const BYPASSED = 0b0001_0000;
        /// A tag this bridge does not recognise
        const OTHER    = 0b1000_0000;
    }
}

const ZONE_TAGS: [(&str, ZoneStateFlags); 5] = [
    ("Tripped", ZoneStateFlags::TRIPPED),
    ("Faulted", ZoneStateFlags::FAULTED),
    ("Alarm", ZoneStateFlags::ALARM),
    ("Trouble", ZoneStateFlags::TROUBLE),
    ("Bypassed", ZoneStateFlags::BYPASSED),
];

impl ZoneStateFlags {
    /// States that make a zone change worth an error-log entry.
    pub const ERROR_STATES: Self = Self::ALARM
        .union(Self::FAULTED)
        .union(Self::TROUBLE)
        .union(Self::BYPASSED);

    /// Parse the tag list (e.g. `["Tripped", "Bypassed"]`), case-insensitively.
    pub fn from_tags<S: AsRef<str>>(tags: &[S]) -> Self {
        let mut flags = Self::empty();
        for tag in tags {
            let tag = tag.as_ref().trim();
            match ZONE_TAGS.iter().find(|(name, _)| name.eq_ignore_ascii_case(tag)) {
                Some((_, flag)) => flags |= *flag,
                None => flags |= Self::OTHER,
            }
        }
        flags
    }

    pub fn tag_names(&self) -> Vec<&'static str> {
        let mut names: Vec<&'static str> = ZONE_TAGS
            .iter()
            .filter(|(_, flag)| self.contains(*flag))
            .map(|(name, _)| *name)
            .collect();
        if self.contains(Self::OTHER) {
            names.push("Other");
        }
        names
    }

    /// Whether the zone is in alarm, faulted, in trouble or bypassed.
    pub fn is_error_state(&self) -> bool {
        self.intersects(Self::ERROR_STATES)
    }

    /// Compare two states ignoring the tripped flag.
    pub fn changed_except_tripped(old: Self, new: Self) -> bool {
        old.difference(Self::TRIPPED) != new.difference(Self::TRIPPED)
    }
}

impl fmt::Display for ZoneStateFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}]", self.tag_names().join(", "))
    }
}

/// Classification of a zone's raw state for status and bus purposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ZoneClass {
    Closed,
    Faulted,
    Alarm,
    Open,
    Disabled,
    Unavailable,
}

impl ZoneClass {
    /// Classify a state set. Precedence: empty, faulted/trouble, alarm,
    /// tripped, bypassed.
    pub fn classify(state: ZoneStateFlags) -> Self {
        if state.is_empty() {
            Self::Closed
        } else if state.intersects(ZoneStateFlags::FAULTED | ZoneStateFlags::TROUBLE) {
            Self::Faulted
        } else if state.contains(ZoneStateFlags::ALARM) {
            Self::Alarm
        } else if state.contains(ZoneStateFlags::TRIPPED) {
            Self::Open
        } else if state.contains(ZoneStateFlags::BYPASSED) {
            Self::Disabled
        } else {
            Self::Unavailable
        }
    }

    /// Bus payload for this classification. Only actionable security
    /// transitions are published.
    pub fn bus_value(&self) -> Option<&'static str> {
        match self {
            Self::Closed => Some("closed"),
            Self::Alarm | Self::Open => Some("open"),
            Self::Faulted | Self::Disabled | Self::Unavailable => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Closed => "closed",
            Self::Faulted => "faulted",
            Self::Alarm => "alarm",
            Self::Open => "open",
            Self::Disabled => "disabled",
            Self::Unavailable => "unavailable",
        }
    }
}

impl fmt::Display for ZoneClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Zone key: (partition number, zone number).
pub type ZoneKey = (u8, u16);

/// Canonical state of a single zone, learned from the first message that
/// mentions it and merged with every later one.
#[derive(Debug, Clone, PartialEq)]
pub struct ZoneRecord {
    pub partition_number: u8,
    pub zone_number: u16,
    pub zone_state: ZoneStateFlags,
    /// Never empty; falls back to the friendly-name table.
    pub zone_text: String,
    pub zone_type: Option<String>,
    /// Remaining message fields, merged key by key.
    pub extra: Map<String, Value>,
}

impl ZoneRecord {
    /// Create a record from the first message referencing the zone.
    pub fn learn(key: ZoneKey, msg: &PanelMessage, friendly_name: impl FnOnce() -> String) -> Self {
        let mut zone = Self {
            partition_number: key.0,
            zone_number: key.1,
            zone_state: ZoneStateFlags::empty(),
            zone_text: String::new(),
            zone_type: None,
            extra: Map::new(),
        };
        zone.merge(msg);
        if zone.zone_text.is_empty() {
            zone.zone_text = friendly_name();
        }
        zone
    }

    pub fn key(&self) -> ZoneKey {
        (self.partition_number, self.zone_number)
    }

    /// Merge an incoming message. Fields present in the message overwrite,
    /// absent ones are preserved. An empty `zone_text` never replaces a
    /// known name.
    pub fn merge(&mut self, msg: &PanelMessage) {
        for (name, value) in &msg.fields {
            match name.as_str() {
                "partition_number" | "zone_number" => {}
                "zone_state" => {
                    if let Some(tags) = msg.str_list("zone_state") {
                        self.zone_state = ZoneStateFlags::from_tags(&tags);
                    }
                }
                "zone_text" => {
                    if let Some(text) = value.as_str().map(str::trim)
                        && !text.is_empty()
                    {
                        self.zone_text = text.to_string();
                    }
                }
                "zone_type" => {
                    if let Some(t) = value.as_str() {
                        self.zone_type = Some(t.to_string());
                    }
                }
                _ => {
                    self.extra.insert(name.clone(), value.clone());
                }
            }
        }
    }

    pub fn class(&self) -> ZoneClass {
        ZoneClass::classify(self.zone_state)
    }

    /// Name used in logs and alerts, e.g. `3 - Garage Interior Door`.
    pub fn display_name(&self) -> String {
        format!("{} - {}", self.zone_number, self.zone_text)
    }
}
