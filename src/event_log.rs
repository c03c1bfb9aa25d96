// MIT License - Copyright (c) 2026 Peter Wright
// Concord 4 MQTT bridge

//! Internal event logs.
//!
//! The bridge keeps a general log of every state-changing panel message and a
//! separate error log restricted to security-relevant transitions. Both age
//! out entries by whole days. Growth is bounded only by the retention window,
//! so a very large retention on a busy panel keeps a correspondingly large
//! log in memory.

use std::collections::VecDeque;

use chrono::{DateTime, Local};
use serde_json::Value;

use crate::devices::{PartitionState, ZoneStateFlags};
use crate::message::CommandKind;

/// What happened, as recorded in the event logs.
#[derive(Debug, Clone, PartialEq)]
pub enum EventInfo {
    Zone {
        zone_name: String,
        zone_state: ZoneStateFlags,
        /// `None` when the zone was learned from this message
        prev_zone_state: Option<ZoneStateFlags>,
        message: String,
        command: CommandKind,
        command_data: Value,
    },
    Partition {
        partition_number: u8,
        partition_state: PartitionState,
        command: CommandKind,
        command_data: Value,
    },
    Alarm {
        partition_number: u8,
        source_desc: String,
        alarm_code: String,
        alarm_desc: String,
        command_data: Value,
    },
}

impl EventInfo {
    pub fn command(&self) -> &CommandKind {
        match self {
            Self::Zone { command, .. } | Self::Partition { command, .. } => command,
            Self::Alarm { .. } => &CommandKind::Alarm,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct EventLogEntry {
    pub timestamp: DateTime<Local>,
    pub info: EventInfo,
}

/// An oldest-first log that keeps entries while they are within
/// `retention_days` of the newest one.
#[derive(Debug, Clone)]
pub struct EventLog {
    entries: VecDeque<EventLogEntry>,
    retention_days: i64,
}

impl EventLog {
    /// A retention of 0 keeps only entries less than a day older than the newest.
    pub fn new(retention_days: i64) -> Self {
        Self {
            entries: VecDeque::new(),
            retention_days,
        }
    }

    /// Append at the back, then evict from the front every entry more than
    /// `retention_days` whole days older than `timestamp`.
    pub fn append(&mut self, timestamp: DateTime<Local>, info: EventInfo) {
        self.entries.push_back(EventLogEntry { timestamp, info });
        while let Some(oldest) = self.entries.front() {
            if (timestamp - oldest.timestamp).num_days() > self.retention_days {
                self.entries.pop_front();
            } else {
                break;
            }
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> impl Iterator<Item = &EventLogEntry> {
        self.entries.iter()
    }

    pub fn latest(&self) -> Option<&EventLogEntry> {
        self.entries.back()
    }

    pub fn retention_days(&self) -> i64 {
        self.retention_days
    }
}

/// The general log and the error-only log.
#[derive(Debug, Clone)]
pub struct EventLogs {
    pub general: EventLog,
    pub errors: EventLog,
}

impl EventLogs {
    pub fn new(event_log_days: i64, error_log_days: i64) -> Self {
        Self {
            general: EventLog::new(event_log_days),
            errors: EventLog::new(error_log_days),
        }
    }

    /// Record in the general log, and in the error log too when `is_err`.
    pub fn record(&mut self, timestamp: DateTime<Local>, info: EventInfo, is_err: bool) {
        if is_err {
            self.errors.append(timestamp, info.clone());
        }
        self.general.append(timestamp, info);
    }
}
