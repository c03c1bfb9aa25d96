// MIT License - Copyright (c) 2026 Peter Wright
// Concord 4 MQTT bridge

//! Handoff of bus publishes from the panel side to the one task allowed to
//! talk to the bus client.

use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tracing::{debug, error, info};

use crate::error::Result;

/// A bus publish request: topic suffix (below the namespace) and payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundMessage {
    pub topic: String,
    pub value: String,
}

impl OutboundMessage {
    pub fn new(topic: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            topic: topic.into(),
            value: value.into(),
        }
    }
}

/// Producer side of the outbound queue. Cheap to clone; enqueueing never
/// blocks.
#[derive(Debug, Clone)]
pub struct OutboundQueue {
    tx: mpsc::UnboundedSender<OutboundMessage>,
}

/// Consumer side of the outbound queue. There is exactly one.
#[derive(Debug)]
pub struct OutboundDrain {
    rx: mpsc::UnboundedReceiver<OutboundMessage>,
}

/// Create a connected queue/drain pair.
pub fn outbound_queue() -> (OutboundQueue, OutboundDrain) {
    let (tx, rx) = mpsc::unbounded_channel();
    (OutboundQueue { tx }, OutboundDrain { rx })
}

impl OutboundQueue {
    pub fn enqueue(&self, topic: impl Into<String>, value: impl Into<String>) {
        let msg = OutboundMessage::new(topic, value);
        debug!("Queueing bus update {} = {}", msg.topic, msg.value);
        if self.tx.send(msg).is_err() {
            debug!("Outbound drain gone, dropping bus update");
        }
    }
}

impl OutboundDrain {
    /// Take everything queued so far, oldest first, leaving the queue empty.
    pub fn drain(&mut self) -> Vec<OutboundMessage> {
        let mut taken = Vec::new();
        while let Ok(msg) = self.rx.try_recv() {
            taken.push(msg);
        }
        taken
    }
}

/// The bus client seam used by the drain.
#[allow(async_fn_in_trait)]
pub trait BusPublisher {
    /// Publish one payload on a full topic.
    async fn publish(&self, topic: &str, payload: &str) -> Result<()>;
}

/// Drain the queue once and publish each entry under `namespace`.
///
/// Failed publishes are logged and dropped; a later state event re-publishes.
/// Returns the number of successful publishes.
pub async fn flush<P: BusPublisher>(drain: &mut OutboundDrain, publisher: &P, namespace: &str) -> usize {
    let mut published = 0;
    for msg in drain.drain() {
        let topic = format!("{namespace}/{}", msg.topic);
        info!("TX -> {topic} - {}", msg.value);
        match publisher.publish(&topic, &msg.value).await {
            Ok(()) => published += 1,
            Err(e) => error!("Failed to publish to {topic}: {e}"),
        }
    }
    published
}

/// Periodically flush the outbound queue until shutdown is signalled, then
/// flush one last time.
pub async fn run_drain_loop<P: BusPublisher>(
    mut drain: OutboundDrain,
    publisher: P,
    namespace: String,
    every: Duration,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    let mut ticker = tokio::time::interval(every);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    loop {
        tokio::select! {
            _ = ticker.tick() => {
                flush(&mut drain, &publisher, &namespace).await;
            }
            changed = shutdown_rx.changed() => {
                if changed.is_err() || *shutdown_rx.borrow() {
                    debug!("Drain loop shutting down");
                    break;
                }
            }
        }
    }
    let last = flush(&mut drain, &publisher, &namespace).await;
    if last > 0 {
        info!("Flushed {last} pending bus update(s) before exit");
    }
}
