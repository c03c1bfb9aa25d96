// MIT License - Copyright (c) 2026 Peter Wright
// Concord 4 MQTT bridge

use crate::constants::{BLINK_MARKUP, NO_DATA};
use crate::devices::partition::{PartitionRecord, PartitionState};

/// A display-only touchpad bound to a partition. It has no state of its own.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TouchpadBinding {
    pub partition: u8,
    pub name: String,
}

impl TouchpadBinding {
    pub fn new(partition: u8, name: impl Into<String>) -> Self {
        Self {
            partition,
            name: name.into(),
        }
    }
}

/// What a touchpad shows: its partition's state and two LCD lines.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TouchpadView {
    pub partition_state: PartitionState,
    pub lcd_line1: String,
    pub lcd_line2: String,
}

impl TouchpadView {
    /// Mirror a partition. An unknown partition renders as `unknown` with
    /// both lines set to the no-data placeholder.
    pub fn mirror(partition: Option<&PartitionRecord>) -> Self {
        let Some(part) = partition else {
            return Self {
                partition_state: PartitionState::Unknown,
                lcd_line1: NO_DATA.to_string(),
                lcd_line2: NO_DATA.to_string(),
            };
        };

        let (lcd_line1, lcd_line2) = match part.display_text.as_deref() {
            Some(text) => split_display(text),
            None => (NO_DATA.to_string(), NO_DATA.to_string()),
        };

        Self {
            partition_state: part.state(),
            lcd_line1,
            lcd_line2,
        }
    }

    /// Both lines joined with a space, for logging.
    pub fn display_line(&self) -> String {
        format!("{} {}", self.lcd_line1, self.lcd_line2)
    }
}

/// Strip blink markup and split into two trimmed lines.
fn split_display(text: &str) -> (String, String) {
    let cleaned = text.replace(BLINK_MARKUP, "");
    let mut lines = cleaned.split('\n');
    let line1 = lines.next().map(str::trim).unwrap_or(NO_DATA).to_string();
    let line2 = lines.next().map(str::trim).unwrap_or(NO_DATA).to_string();
    (line1, line2)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn part_with_text(text: Option<&str>, code: Option<i64>) -> PartitionRecord {
        PartitionRecord {
            partition_number: 1,
            arming_level_code: code,
            display_text: text.map(str::to_string),
            ..Default::default()
        }
    }

    #[test]
    fn test_mirror_unknown_partition() {
        let view = TouchpadView::mirror(None);
        assert_eq!(view.partition_state, PartitionState::Unknown);
        assert_eq!(view.lcd_line1, NO_DATA);
        assert_eq!(view.lcd_line2, NO_DATA);
    }

    #[test]
    fn test_mirror_strips_blink_and_trims() {
        let part = part_with_text(Some("  SYSTEM <blink>OK  \n  12:34 PM "), Some(1));
        let view = TouchpadView::mirror(Some(&part));
        assert_eq!(view.partition_state, PartitionState::Ready);
        assert_eq!(view.lcd_line1, "SYSTEM OK");
        assert_eq!(view.lcd_line2, "12:34 PM");
        assert_eq!(view.display_line(), "SYSTEM OK 12:34 PM");
    }

    #[test]
    fn test_mirror_single_line_and_missing_text() {
        let view = TouchpadView::mirror(Some(&part_with_text(Some("ARMED AWAY"), Some(3))));
        assert_eq!(view.partition_state, PartitionState::Away);
        assert_eq!(view.lcd_line1, "ARMED AWAY");
        assert_eq!(view.lcd_line2, NO_DATA);

        let view = TouchpadView::mirror(Some(&part_with_text(None, None)));
        assert_eq!(view.lcd_line1, NO_DATA);
        assert_eq!(view.lcd_line2, NO_DATA);
    }
}
