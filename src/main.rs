// MIT License - Copyright (c) 2026 Peter Wright
// Concord 4 MQTT bridge

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use rumqttc::{AsyncClient, MqttOptions};
use serde::Deserialize;
use tokio::signal::unix::{signal, SignalKind};
use tokio::sync::watch;
use tokio::time::{timeout, Duration};
use tracing::{error, info, warn};

use concord_bridge::constants::{
    DEFAULT_BUS_RETRY_SECS, DEFAULT_DRAIN_INTERVAL_MS, DEFAULT_NAMESPACE,
    DEFAULT_PANEL_RECONNECT_MS,
};
use concord_bridge::{
    alert_queue, outbound_queue, run_alert_worker, run_bus_loop, run_drain_loop, AlertConfig,
    BridgeConfig, CommandTranslator, ConfiguredAlertSink, JsonLineTransport, MqttPublisher,
    PanelDispatcher, PanelLink, PanelStatus, PanelTransport, StateTranslator, TouchpadBinding,
};

// ---------------------------------------------------------------------------
// CLI
// ---------------------------------------------------------------------------

#[derive(Parser)]
#[command(name = "concord2mqtt")]
#[command(about = "Bridge between a Concord 4 security panel and MQTT")]
struct Cli {
    /// Path to the TOML configuration file
    #[arg(long, default_value = "concord2mqtt.toml")]
    config: String,
}

// ---------------------------------------------------------------------------
// Config
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct Config {
    #[serde(default = "default_log_level")]
    log_level: String,
    #[serde(default)]
    panel: PanelToml,
    mqtt: MqttToml,
    #[serde(default)]
    event_log: EventLogToml,
    #[serde(default)]
    alert: Option<AlertToml>,
    #[serde(default, deserialize_with = "deserialize_zone_names")]
    zone_names: HashMap<u16, String>,
    #[serde(default)]
    touchpads: Vec<TouchpadToml>,
}

fn deserialize_zone_names<'de, D>(deserializer: D) -> Result<HashMap<u16, String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let string_map: HashMap<String, String> = HashMap::deserialize(deserializer)?;
    string_map
        .into_iter()
        .map(|(k, v)| {
            k.parse::<u16>()
                .map(|id| (id, v))
                .map_err(|_| serde::de::Error::custom(format!("invalid zone number: {k}")))
        })
        .collect()
}

fn default_log_level() -> String {
    "info".to_string()
}

#[derive(Debug, Deserialize)]
struct PanelToml {
    #[serde(default = "default_panel_address")]
    address: String,
    #[serde(default = "default_reconnect_delay")]
    reconnect_delay_ms: u64,
}

impl Default for PanelToml {
    fn default() -> Self {
        Self {
            address: default_panel_address(),
            reconnect_delay_ms: default_reconnect_delay(),
        }
    }
}

fn default_panel_address() -> String {
    "127.0.0.1:5007".to_string()
}
fn default_reconnect_delay() -> u64 {
    DEFAULT_PANEL_RECONNECT_MS
}

#[derive(Debug, Deserialize)]
struct MqttToml {
    host: String,
    #[serde(default = "default_mqtt_port")]
    port: u16,
    #[serde(default = "default_client_id")]
    client_id: String,
    #[serde(default)]
    username: Option<String>,
    #[serde(default)]
    password: Option<String>,
    #[serde(default = "default_namespace")]
    namespace: String,
    #[serde(default = "default_drain_interval")]
    drain_interval_ms: u64,
    #[serde(default = "default_connect_retry")]
    connect_retry_secs: u64,
}

fn default_mqtt_port() -> u16 {
    1883
}
fn default_client_id() -> String {
    "concord2mqtt".to_string()
}
fn default_namespace() -> String {
    DEFAULT_NAMESPACE.to_string()
}
fn default_drain_interval() -> u64 {
    DEFAULT_DRAIN_INTERVAL_MS
}
fn default_connect_retry() -> u64 {
    DEFAULT_BUS_RETRY_SECS
}

#[derive(Debug, Default, Deserialize)]
struct EventLogToml {
    #[serde(default)]
    event_log_days: i64,
    #[serde(default)]
    error_log_days: i64,
}

#[derive(Debug, Deserialize)]
struct AlertToml {
    sender: String,
    recipient: String,
    #[serde(default = "default_alert_command")]
    command: Vec<String>,
}

fn default_alert_command() -> Vec<String> {
    vec!["/usr/sbin/sendmail".to_string(), "-t".to_string()]
}

#[derive(Debug, Deserialize)]
struct TouchpadToml {
    partition: u8,
    name: String,
}

fn build_bridge_config(config: &Config) -> Result<BridgeConfig> {
    if config.event_log.event_log_days < 0 || config.event_log.error_log_days < 0 {
        anyhow::bail!("event log retention must not be negative");
    }

    let mut builder = BridgeConfig::builder()
        .panel_address(&config.panel.address)
        .panel_reconnect_delay_ms(config.panel.reconnect_delay_ms)
        .namespace(&config.mqtt.namespace)
        .drain_interval_ms(config.mqtt.drain_interval_ms)
        .bus_retry_secs(config.mqtt.connect_retry_secs)
        .event_log_days(config.event_log.event_log_days)
        .error_log_days(config.event_log.error_log_days)
        .zone_names(config.zone_names.clone())
        .alert(config.alert.as_ref().map(|a| AlertConfig {
            sender: a.sender.clone(),
            recipient: a.recipient.clone(),
            command: a.command.clone(),
        }));

    if !config.touchpads.is_empty() {
        builder = builder.touchpads(
            config
                .touchpads
                .iter()
                .map(|tp| TouchpadBinding::new(tp.partition, &tp.name))
                .collect(),
        );
    }
    Ok(builder.build())
}

fn mqtt_options(mqtt: &MqttToml) -> MqttOptions {
    let mut opts = MqttOptions::new(&mqtt.client_id, &mqtt.host, mqtt.port);
    opts.set_keep_alive(Duration::from_secs(30));
    if let Some(username) = mqtt.username.as_deref().filter(|u| !u.is_empty()) {
        opts.set_credentials(username, mqtt.password.as_deref().unwrap_or_default());
    }
    opts
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config_text =
        std::fs::read_to_string(&cli.config).context("Failed to read config file")?;
    let config: Config = toml::from_str(&config_text).context("Failed to parse config file")?;

    // RUST_LOG overrides the configured level (e.g. RUST_LOG=concord_bridge=trace).
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.log_level));

    // systemd journal already adds timestamps, so omit them when running under systemd
    if std::env::var_os("JOURNAL_STREAM").is_some() {
        tracing_subscriber::fmt().without_time().with_env_filter(env_filter).init();
    } else {
        tracing_subscriber::fmt().with_env_filter(env_filter).init();
    }

    let bridge_config = build_bridge_config(&config)?;
    let namespace = bridge_config.namespace.clone();

    let mut sigterm = signal(SignalKind::terminate())?;
    let (panel_shutdown_tx, panel_shutdown_rx) = watch::channel(false);
    let (bus_shutdown_tx, bus_shutdown_rx) = watch::channel(false);

    // Alerts
    let alert_sink = ConfiguredAlertSink::from_config(bridge_config.alert.as_ref())
        .context("Invalid alert configuration")?;
    let (alerts, alert_rx) = alert_queue();
    tokio::spawn(run_alert_worker(alert_rx, alert_sink));

    // Bus
    let (client, eventloop) = AsyncClient::new(mqtt_options(&config.mqtt), 256);
    let link = PanelLink::new();
    info!(
        "Connecting to MQTT broker at {}:{}",
        config.mqtt.host, config.mqtt.port
    );
    let bus_handle = tokio::spawn(run_bus_loop(
        eventloop,
        client.clone(),
        namespace.clone(),
        CommandTranslator::new(link.clone()),
        Duration::from_secs(bridge_config.bus_retry_secs),
        bus_shutdown_rx,
    ));

    let (outbound, drain) = outbound_queue();
    let drain_handle = tokio::spawn(run_drain_loop(
        drain,
        MqttPublisher::new(client.clone()),
        namespace,
        bridge_config.drain_interval(),
        panel_shutdown_rx.clone(),
    ));

    // Panel
    let mut translator = StateTranslator::new(bridge_config.clone(), outbound, alerts);
    let reconnect_delay = Duration::from_millis(bridge_config.panel_reconnect_delay_ms);
    let transport: Option<Arc<dyn PanelTransport>> =
        match JsonLineTransport::connect(bridge_config.panel_address.clone(), reconnect_delay).await
        {
            Ok(transport) => {
                let transport: Arc<dyn PanelTransport> = Arc::new(transport);
                link.connect(transport.clone());
                let mut dispatcher = PanelDispatcher::new(transport.clone(), translator);
                let rx = dispatcher.startup();
                tokio::spawn(dispatcher.run(rx, panel_shutdown_rx));
                info!("Panel transport connected");
                Some(transport)
            }
            Err(e) => {
                error!("Failed to create panel transport: {e}");
                translator.set_panel_status(PanelStatus::Faulted);
                warn!("Panel operations halted; bus commands will be rejected");
                None
            }
        };

    info!("Concord bridge running. Send SIGINT/SIGTERM to stop.");
    tokio::select! {
        _ = tokio::signal::ctrl_c() => info!("Received SIGINT, shutting down..."),
        _ = sigterm.recv() => info!("Received SIGTERM, shutting down..."),
    }

    link.clear();
    if let Some(transport) = transport {
        transport.stop();
    }

    // Drain loop flushes once more on shutdown; the bus loop must still be
    // running for those publishes to leave.
    panel_shutdown_tx.send_replace(true);
    if timeout(Duration::from_secs(5), drain_handle).await.is_err() {
        warn!("Timed out waiting for final bus flush");
    }
    bus_shutdown_tx.send_replace(true);
    if timeout(Duration::from_secs(5), bus_handle).await.is_err() {
        warn!("Timed out waiting for MQTT disconnect");
    }

    info!("Shutdown complete");
    Ok(())
}
