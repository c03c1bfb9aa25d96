// MIT License - Copyright (c) 2026 Peter Wright
// Concord 4 MQTT bridge

use std::process::Stdio;

use chrono::{DateTime, Local};
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::config::AlertConfig;
use crate::devices::ZoneStateFlags;
use crate::error::{BridgeError, Result};
use crate::message::CommandKind;

/// A zone changed while the system was armed.
#[derive(Debug, Clone, PartialEq)]
pub struct Alert {
    pub zone_name: String,
    pub zone_state: ZoneStateFlags,
    pub prev_zone_state: Option<ZoneStateFlags>,
    pub command: CommandKind,
    pub timestamp: DateTime<Local>,
}

impl Alert {
    pub fn subject(&self) -> String {
        format!("--- ALARM EVENT: ZONE {}", self.zone_name)
    }

    pub fn body(&self) -> String {
        let prev = match self.prev_zone_state {
            Some(state) => state.to_string(),
            None => "Not known".to_string(),
        };
        format!(
            "NEW STATE: {}\nPREVIOUS STATE: {}\nCOMMAND: {}\nDATE: {}",
            self.zone_state,
            prev,
            self.command,
            self.timestamp.format("%Y-%m-%d %H:%M:%S")
        )
    }
}

/// Something that can deliver an alert to a human.
#[allow(async_fn_in_trait)]
pub trait AlertSink {
    async fn send(&self, alert: &Alert) -> Result<()>;
}

/// Writes alerts to the log only.
#[derive(Debug, Clone, Default)]
pub struct LogAlertSink;

impl AlertSink for LogAlertSink {
    async fn send(&self, alert: &Alert) -> Result<()> {
        warn!("{}: {}", alert.subject(), alert.body().replace('\n', "; "));
        Ok(())
    }
}

/// Pipes an RFC 822 message into a sendmail-compatible command.
#[derive(Debug, Clone)]
pub struct SendmailAlertSink {
    config: AlertConfig,
}

impl SendmailAlertSink {
    pub fn new(config: AlertConfig) -> Result<Self> {
        if config.command.is_empty() {
            return Err(BridgeError::InvalidConfig {
                details: "alert command must not be empty".to_string(),
            });
        }
        Ok(Self { config })
    }

    pub fn render(&self, alert: &Alert) -> String {
        format!(
            "From: {}\nTo: {}\nSubject: {}\n\n{}\n",
            self.config.sender,
            self.config.recipient,
            alert.subject(),
            alert.body()
        )
    }
}

impl AlertSink for SendmailAlertSink {
    async fn send(&self, alert: &Alert) -> Result<()> {
        let (program, args) = self
            .config
            .command
            .split_first()
            .ok_or_else(|| BridgeError::InvalidConfig {
                details: "alert command must not be empty".to_string(),
            })?;

        let mut child = Command::new(program)
            .args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin.write_all(self.render(alert).as_bytes()).await?;
        }

        let output = child.wait_with_output().await?;
        if !output.status.success() {
            return Err(BridgeError::AlertFailed {
                reason: format!(
                    "{program} exited with {}: {}",
                    output.status,
                    String::from_utf8_lossy(&output.stderr).trim()
                ),
            });
        }
        Ok(())
    }
}

/// Either of the built-in sinks, chosen from configuration.
#[derive(Debug, Clone)]
pub enum ConfiguredAlertSink {
    Log(LogAlertSink),
    Sendmail(SendmailAlertSink),
}

impl ConfiguredAlertSink {
    pub fn from_config(config: Option<&AlertConfig>) -> Result<Self> {
        match config {
            Some(cfg) => Ok(Self::Sendmail(SendmailAlertSink::new(cfg.clone())?)),
            None => Ok(Self::Log(LogAlertSink)),
        }
    }
}

impl AlertSink for ConfiguredAlertSink {
    async fn send(&self, alert: &Alert) -> Result<()> {
        match self {
            Self::Log(sink) => sink.send(alert).await,
            Self::Sendmail(sink) => sink.send(alert).await,
        }
    }
}

/// Producer side of the alert queue; raising an alert never blocks.
#[derive(Debug, Clone)]
pub struct AlertQueue {
    tx: mpsc::UnboundedSender<Alert>,
}

pub fn alert_queue() -> (AlertQueue, mpsc::UnboundedReceiver<Alert>) {
    let (tx, rx) = mpsc::unbounded_channel();
    (AlertQueue { tx }, rx)
}

impl AlertQueue {
    pub fn raise(&self, alert: Alert) {
        if self.tx.send(alert).is_err() {
            warn!("Alert worker gone, alert not delivered");
        }
    }
}

/// Deliver alerts until every [`AlertQueue`] is dropped. Delivery failures
/// are logged and swallowed.
pub async fn run_alert_worker<S: AlertSink>(mut rx: mpsc::UnboundedReceiver<Alert>, sink: S) {
    while let Some(alert) = rx.recv().await {
        info!("Sending alert for zone {}", alert.zone_name);
        debug!("Alert contents: {}\n{}", alert.subject(), alert.body());
        match sink.send(&alert).await {
            Ok(()) => info!("Alert notification sent"),
            Err(e) => error!("Alert notification failed to send: {e}"),
        }
    }
    debug!("Alert worker stopped");
}
