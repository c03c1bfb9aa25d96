// MIT License - Copyright (c) 2026 Peter Wright
// Concord 4 MQTT bridge

//! MQTT side of the bridge: the publisher used by the outbound drain and the
//! event loop that subscribes and turns inbound commands into arm requests.

use std::time::Duration;

use rumqttc::{AsyncClient, Event, EventLoop, Outgoing, Packet, QoS};
use tokio::sync::watch;
use tokio::time::sleep;
use tracing::{debug, error, info, warn};

use crate::command::{ArmAction, ArmRequest, CommandTranslator};
use crate::error::Result;
use crate::outbound::BusPublisher;

/// Topic suffix for inbound arm/disarm commands.
pub const COMMAND_TOPIC: &str = "alarm/set";

/// Wildcard subscription covering everything under the namespace.
pub fn subscription_topic(namespace: &str) -> String {
    format!("{namespace}/#")
}

/// Parse an inbound publish into an arm action.
///
/// Topic and payload are matched case-insensitively. Returns `None` for
/// other topics and for unknown payloads.
pub fn parse_inbound(namespace: &str, topic: &str, payload: &str) -> Option<ArmAction> {
    let expected = format!("{namespace}/{COMMAND_TOPIC}");
    if !topic.eq_ignore_ascii_case(&expected) {
        return None;
    }
    match payload.trim().to_ascii_lowercase().as_str() {
        "arm_home" => Some(ArmAction::Stay),
        "arm_away" => Some(ArmAction::Away),
        "disarm" => Some(ArmAction::Disarm),
        other => {
            warn!("Unknown alarm command payload '{other}', ignoring");
            None
        }
    }
}

/// Inbound commands always target partition 1 and arm silently.
pub fn inbound_request(action: ArmAction) -> ArmRequest {
    ArmRequest {
        action,
        silent: true,
        bypass: false,
        partition: 1,
    }
}

/// Hand an inbound command to the panel. Errors are logged, never raised.
pub fn handle_inbound(commands: &CommandTranslator, namespace: &str, topic: &str, payload: &str) {
    let Some(action) = parse_inbound(namespace, topic, payload) else {
        return;
    };
    info!("MQTT command received: {action}");
    match commands.arm_disarm(inbound_request(action)) {
        Ok(_) => debug!("Command {action} sent to panel"),
        Err(e) => error!("Command {action} failed ({}): {e}", e.field()),
    }
}

/// [`BusPublisher`] backed by a rumqttc client. Publishes are fire-and-forget
/// and never wait on a full request channel.
#[derive(Clone)]
pub struct MqttPublisher {
    client: AsyncClient,
}

impl MqttPublisher {
    pub fn new(client: AsyncClient) -> Self {
        Self { client }
    }
}

impl BusPublisher for MqttPublisher {
    async fn publish(&self, topic: &str, payload: &str) -> Result<()> {
        self.client
            .try_publish(topic, QoS::AtMostOnce, false, payload.as_bytes().to_vec())?;
        Ok(())
    }
}

/// Drive the MQTT event loop until shutdown.
///
/// Subscribes on every CONNACK, since rumqttc does not resubscribe after a
/// reconnect. Until the first CONNACK, failed connection attempts are retried
/// every `connect_retry`.
pub async fn run_bus_loop(
    mut eventloop: EventLoop,
    client: AsyncClient,
    namespace: String,
    commands: CommandTranslator,
    connect_retry: Duration,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    let sub_topic = subscription_topic(&namespace);
    let mut connected_once = false;

    loop {
        let event = tokio::select! {
            event = eventloop.poll() => event,
            changed = shutdown_rx.changed() => {
                if changed.is_err() || *shutdown_rx.borrow() {
                    debug!("Bus loop shutting down");
                    break;
                }
                continue;
            }
        };

        match event {
            Ok(Event::Incoming(Packet::ConnAck(_))) => {
                connected_once = true;
                info!("MQTT: connected, subscribing to {sub_topic}");
                // Only this loop polls the event loop, so it must not wait on the request channel
                if let Err(e) = client.try_subscribe(&sub_topic, QoS::AtLeastOnce) {
                    error!("Failed to subscribe to {sub_topic}: {e}");
                }
            }
            Ok(Event::Incoming(Packet::Publish(msg))) => {
                let payload = String::from_utf8_lossy(&msg.payload);
                debug!("RX <- {} - {payload}", msg.topic);
                handle_inbound(&commands, &namespace, &msg.topic, &payload);
            }
            Ok(_) => {}
            Err(e) if !connected_once => {
                error!(
                    "MQTT connection failed: {e}. Trying again in {} seconds",
                    connect_retry.as_secs()
                );
                sleep(connect_retry).await;
            }
            Err(e) => {
                error!("MQTT event loop error: {e}");
                sleep(Duration::from_secs(1)).await;
            }
        }
    }

    // Keep polling so queued publishes go out ahead of the disconnect
    if let Err(e) = client.try_disconnect() {
        debug!("MQTT disconnect: {e}");
        return;
    }
    let drained = tokio::time::timeout(Duration::from_secs(2), async {
        loop {
            match eventloop.poll().await {
                Ok(Event::Outgoing(Outgoing::Disconnect)) | Err(_) => break,
                Ok(_) => {}
            }
        }
    })
    .await;
    if drained.is_err() {
        warn!("MQTT disconnect timed out");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use rumqttc::MqttOptions;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::{TcpListener, TcpStream};
    use tokio::time::timeout;

    use crate::command::PanelLink;
    use crate::command::tests::KeypressRecorder;
    use crate::constants::keys;
    use crate::error::BridgeError;

    #[test]
    fn test_parse_inbound_payloads() {
        assert_eq!(parse_inbound("concord", "concord/alarm/set", "arm_home"), Some(ArmAction::Stay));
        assert_eq!(parse_inbound("concord", "concord/alarm/set", "ARM_AWAY"), Some(ArmAction::Away));
        assert_eq!(parse_inbound("concord", "Concord/Alarm/Set", " Disarm \n"), Some(ArmAction::Disarm));
        assert_eq!(parse_inbound("concord", "concord/alarm/set", "arm_night"), None);
        assert_eq!(parse_inbound("concord", "concord/zone/1", "disarm"), None);
        assert_eq!(parse_inbound("concord", "other/alarm/set", "disarm"), None);
    }

    #[test]
    fn test_subscription_topic() {
        assert_eq!(subscription_topic("concord"), "concord/#");
    }

    #[test]
    fn test_inbound_arm_home_is_silent_stay_on_partition_one() {
        let recorder = Arc::new(KeypressRecorder::default());
        let link = PanelLink::new();
        link.connect(recorder.clone());
        let commands = CommandTranslator::new(link);

        handle_inbound(&commands, "concord", "concord/alarm/set", "ARM_HOME");
        handle_inbound(&commands, "concord", "concord/alarm/set", "bogus");
        handle_inbound(&commands, "concord", "concord/alarm", "disarm");

        assert_eq!(
            *recorder.sent.lock().unwrap(),
            vec![(vec![keys::SILENT, keys::ARM_STAY], 1)]
        );
    }

    #[test]
    fn test_inbound_without_panel_is_logged_only() {
        let commands = CommandTranslator::new(PanelLink::new());
        handle_inbound(&commands, "concord", "concord/alarm/set", "disarm");
    }

    #[tokio::test]
    async fn test_publish_does_not_wait_on_full_channel() {
        // Nothing polls the event loop, so the single request slot stays full
        let (client, _eventloop) =
            AsyncClient::new(MqttOptions::new("concord-test", "127.0.0.1", 1883), 1);
        let publisher = MqttPublisher::new(client);

        let first = timeout(Duration::from_secs(1), publisher.publish("concord/zone/1", "open"))
            .await
            .expect("publish blocked");
        assert!(first.is_ok());
        let second = timeout(Duration::from_secs(1), publisher.publish("concord/zone/1", "closed"))
            .await
            .expect("publish blocked");
        assert!(matches!(second, Err(BridgeError::Mqtt(_))));
    }

    /// Read one MQTT control packet: (fixed header byte, variable header + payload).
    async fn read_packet(stream: &mut TcpStream) -> (u8, Vec<u8>) {
        let header = stream.read_u8().await.unwrap();
        let mut len = 0usize;
        let mut shift = 0;
        loop {
            let byte = stream.read_u8().await.unwrap();
            len |= usize::from(byte & 0x7f) << shift;
            if byte & 0x80 == 0 {
                break;
            }
            shift += 7;
        }
        let mut body = vec![0; len];
        stream.read_exact(&mut body).await.unwrap();
        (header, body)
    }

    async fn read_until(stream: &mut TcpStream, header: u8) -> Vec<u8> {
        loop {
            let (h, body) = read_packet(stream).await;
            if h == header {
                return body;
            }
        }
    }

    const CONNECT: u8 = 0x10;
    const SUBSCRIBE: u8 = 0x82;
    const DISCONNECT: u8 = 0xe0;
    const CONNACK: [u8; 4] = [0x20, 0x02, 0x00, 0x00];

    /// Accept a session, acknowledge it and return the stream once the
    /// namespace subscription has arrived.
    async fn accept_subscribed(listener: &TcpListener) -> TcpStream {
        let (mut stream, _) = listener.accept().await.unwrap();
        read_until(&mut stream, CONNECT).await;
        stream.write_all(&CONNACK).await.unwrap();

        let body = read_until(&mut stream, SUBSCRIBE).await;
        let topic = b"concord/#";
        assert!(body.windows(topic.len()).any(|w| w == topic));
        // SUBACK with the same packet id, granted QoS 1
        stream
            .write_all(&[0x90, 0x03, body[0], body[1], 0x01])
            .await
            .unwrap();
        stream
    }

    #[tokio::test]
    async fn test_bus_loop_retries_and_resubscribes() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let (client, eventloop) =
            AsyncClient::new(MqttOptions::new("concord-test", "127.0.0.1", port), 10);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let bus = tokio::spawn(run_bus_loop(
            eventloop,
            client,
            "concord".to_string(),
            CommandTranslator::new(PanelLink::new()),
            Duration::from_millis(50),
            shutdown_rx,
        ));

        timeout(Duration::from_secs(10), async {
            // Refused before any CONNACK: retried after the initial delay
            let (mut refused, _) = listener.accept().await.unwrap();
            read_until(&mut refused, CONNECT).await;
            drop(refused);

            let first = accept_subscribed(&listener).await;
            drop(first);

            // Reconnect after a dropped session subscribes again
            let mut second = accept_subscribed(&listener).await;

            shutdown_tx.send_replace(true);
            read_until(&mut second, DISCONNECT).await;
        })
        .await
        .expect("broker exchange timed out");

        timeout(Duration::from_secs(5), bus)
            .await
            .expect("bus loop did not stop")
            .unwrap();
    }
}
