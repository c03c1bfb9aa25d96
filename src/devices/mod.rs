// MIT License - Copyright (c) 2026 Peter Wright
// Concord 4 MQTT bridge

pub mod partition;
pub mod touchpad;
pub mod zone;

pub use partition::{ArmTransition, PartitionRecord, PartitionState};
pub use touchpad::{TouchpadBinding, TouchpadView};
pub use zone::{ZoneClass, ZoneKey, ZoneRecord, ZoneStateFlags};
