// MIT License - Copyright (c) 2026 Peter Wright
// Concord 4 MQTT bridge

/// Keypad key codes understood by the panel's keypress command.
pub mod keys {
    /// Silent arming prefix.
    pub const SILENT: u8 = 0x05;
    /// Arm stay (silent variant, follows [`SILENT`]).
    pub const ARM_STAY: u8 = 0x28;
    /// Arm away (silent variant, follows [`SILENT`]).
    pub const ARM_AWAY: u8 = 0x27;
    /// Arm stay with exit beeps.
    pub const ARM_STAY_LOUD: u8 = 0x02;
    /// Arm away with exit beeps.
    pub const ARM_AWAY_LOUD: u8 = 0x03;
    pub const DISARM: u8 = 0x20;
    /// `#`, bypasses faulted zones when arming.
    pub const BYPASS: u8 = 0x0b;
}

/// Touchpad placeholder shown when the panel has not reported any text.
pub const NO_DATA: &str = "<NO DATA>";

/// Markup the panel embeds in display text for blinking characters.
pub const BLINK_MARKUP: &str = "<blink>";

/// Default topic prefix for every bus message this bridge publishes.
pub const DEFAULT_NAMESPACE: &str = "concord";

/// Default interval between outbound queue drains.
pub const DEFAULT_DRAIN_INTERVAL_MS: u64 = 1000;

/// Fixed backoff between initial bus connection attempts.
pub const DEFAULT_BUS_RETRY_SECS: u64 = 10;

/// Default delay between panel transport reconnection attempts.
pub const DEFAULT_PANEL_RECONNECT_MS: u64 = 10_000;

/// Source type string the panel uses for zone-originated alarms.
pub const SOURCE_TYPE_ZONE: &str = "Zone";

/// Alarm general type code for fire/police/medical class events.
pub const ALARM_GENERAL_ACTIONABLE: i64 = 1;
