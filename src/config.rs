// MIT License - Copyright (c) 2026 Peter Wright
// Concord 4 MQTT bridge

use std::collections::HashMap;
use std::time::Duration;

use crate::constants::{
    DEFAULT_BUS_RETRY_SECS, DEFAULT_DRAIN_INTERVAL_MS, DEFAULT_NAMESPACE,
    DEFAULT_PANEL_RECONNECT_MS,
};
use crate::devices::TouchpadBinding;

/// Alert e-mail settings. Alerts are handed to a sendmail-compatible
/// command reading an RFC 822 message on stdin.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlertConfig {
    pub sender: String,
    pub recipient: String,
    /// Program and arguments, e.g. `["/usr/sbin/sendmail", "-t"]`
    pub command: Vec<String>,
}

/// Configuration for the panel state synchronization engine.
#[derive(Debug, Clone)]
pub struct BridgeConfig {
    /// Address of the JSON-line panel decoder gateway (host:port)
    pub panel_address: String,
    /// Delay between panel transport reconnection attempts in milliseconds
    pub panel_reconnect_delay_ms: u64,
    /// Topic prefix for all published and subscribed bus messages
    pub namespace: String,
    /// Interval between outbound queue drains in milliseconds
    pub drain_interval_ms: u64,
    /// Fixed backoff between initial bus connection attempts in seconds
    pub bus_retry_secs: u64,
    /// Days the general event log retains entries
    pub event_log_days: i64,
    /// Days the error event log retains entries
    pub error_log_days: i64,
    /// Friendly zone names, used when the panel reports no zone text
    pub zone_names: HashMap<u16, String>,
    /// Touchpads and the partitions they mirror
    pub touchpads: Vec<TouchpadBinding>,
    /// Alert delivery; `None` logs alerts only
    pub alert: Option<AlertConfig>,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            panel_address: "127.0.0.1:5007".to_string(),
            panel_reconnect_delay_ms: DEFAULT_PANEL_RECONNECT_MS,
            namespace: DEFAULT_NAMESPACE.to_string(),
            drain_interval_ms: DEFAULT_DRAIN_INTERVAL_MS,
            bus_retry_secs: DEFAULT_BUS_RETRY_SECS,
            event_log_days: 0,
            error_log_days: 0,
            zone_names: HashMap::new(),
            touchpads: vec![TouchpadBinding::new(1, "Touchpad")],
            alert: None,
        }
    }
}

impl BridgeConfig {
    /// Create a new config builder starting from defaults.
    pub fn builder() -> BridgeConfigBuilder {
        BridgeConfigBuilder::default()
    }

    /// Friendly name for a zone: the configured name, else `Zone <n>`.
    pub fn friendly_zone_name(&self, zone_number: u16) -> String {
        self.zone_names
            .get(&zone_number)
            .filter(|name| !name.trim().is_empty())
            .cloned()
            .unwrap_or_else(|| format!("Zone {zone_number}"))
    }

    pub fn drain_interval(&self) -> Duration {
        Duration::from_millis(self.drain_interval_ms.max(1))
    }
}

/// Builder for BridgeConfig.
#[derive(Debug, Clone, Default)]
pub struct BridgeConfigBuilder {
    config: BridgeConfig,
}

impl BridgeConfigBuilder {
    pub fn panel_address(mut self, address: impl Into<String>) -> Self {
        self.config.panel_address = address.into();
        self
    }

    pub fn panel_reconnect_delay_ms(mut self, ms: u64) -> Self {
        self.config.panel_reconnect_delay_ms = ms;
        self
    }

    pub fn namespace(mut self, namespace: impl Into<String>) -> Self {
        let namespace: String = namespace.into();
        self.config.namespace = namespace.trim_end_matches('/').to_string();
        self
    }

    pub fn drain_interval_ms(mut self, ms: u64) -> Self {
        self.config.drain_interval_ms = ms;
        self
    }

    pub fn bus_retry_secs(mut self, secs: u64) -> Self {
        self.config.bus_retry_secs = secs;
        self
    }

    pub fn event_log_days(mut self, days: i64) -> Self {
        self.config.event_log_days = days;
        self
    }

    pub fn error_log_days(mut self, days: i64) -> Self {
        self.config.error_log_days = days;
        self
    }

    pub fn zone_name(mut self, zone_number: u16, name: impl Into<String>) -> Self {
        self.config.zone_names.insert(zone_number, name.into());
        self
    }

    pub fn zone_names(mut self, names: HashMap<u16, String>) -> Self {
        self.config.zone_names = names;
        self
    }

    pub fn touchpads(mut self, touchpads: Vec<TouchpadBinding>) -> Self {
        self.config.touchpads = touchpads;
        self
    }

    pub fn alert(mut self, alert: Option<AlertConfig>) -> Self {
        self.config.alert = alert;
        self
    }

    pub fn build(self) -> BridgeConfig {
        self.config
    }
}
