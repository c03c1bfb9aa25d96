// MIT License - Copyright (c) 2026 Peter Wright
// Concord 4 MQTT bridge

use std::fmt;
use std::sync::{Arc, RwLock};

use tracing::{debug, info};

use crate::constants::keys;
use crate::error::ArmError;
use crate::transport::PanelTransport;

/// Arm or disarm request kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArmAction {
    Stay,
    Away,
    Disarm,
}

impl fmt::Display for ArmAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Stay => "stay",
            Self::Away => "away",
            Self::Disarm => "disarm",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArmRequest {
    pub action: ArmAction,
    /// Arm without exit beeps. Ignored for disarm.
    pub silent: bool,
    /// Bypass faulted zones while arming.
    pub bypass: bool,
    pub partition: u8,
}

/// Decides whether a partition may accept an arm/disarm request.
pub trait ReadinessCheck: Send + Sync {
    /// `Err(reason)` rejects the request before anything is sent.
    fn check(&self, partition: u8) -> Result<(), String>;
}

/// Accepts every request.
#[derive(Debug, Clone, Copy, Default)]
pub struct AlwaysReady;

impl ReadinessCheck for AlwaysReady {
    fn check(&self, _partition: u8) -> Result<(), String> {
        Ok(())
    }
}

/// Shared, replaceable reference to the active panel transport.
///
/// Cleared on shutdown so the command path stops reaching the panel.
#[derive(Clone, Default)]
pub struct PanelLink {
    inner: Arc<RwLock<Option<Arc<dyn PanelTransport>>>>,
}

impl PanelLink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn connect(&self, transport: Arc<dyn PanelTransport>) {
        *self.write() = Some(transport);
    }

    pub fn clear(&self) {
        *self.write() = None;
    }

    pub fn get(&self) -> Option<Arc<dyn PanelTransport>> {
        match self.inner.read() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub fn is_active(&self) -> bool {
        self.get().is_some()
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, Option<Arc<dyn PanelTransport>>> {
        match self.inner.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

/// Turns arm/disarm requests into panel keypress sequences.
pub struct CommandTranslator {
    link: PanelLink,
    readiness: Box<dyn ReadinessCheck>,
}

impl CommandTranslator {
    pub fn new(link: PanelLink) -> Self {
        Self::with_readiness(link, AlwaysReady)
    }

    pub fn with_readiness(link: PanelLink, readiness: impl ReadinessCheck + 'static) -> Self {
        Self {
            link,
            readiness: Box::new(readiness),
        }
    }

    /// Keypress sequence for a request.
    ///
    /// Silent arming prefixes the silent key; loud arming uses the dedicated
    /// loud keys. Bypass appends the `#` key.
    pub fn compose_keys(action: ArmAction, silent: bool, bypass: bool) -> Vec<u8> {
        let mut keys = match (action, silent) {
            (ArmAction::Stay, true) => vec![keys::SILENT, keys::ARM_STAY],
            (ArmAction::Stay, false) => vec![keys::ARM_STAY_LOUD],
            (ArmAction::Away, true) => vec![keys::SILENT, keys::ARM_AWAY],
            (ArmAction::Away, false) => vec![keys::ARM_AWAY_LOUD],
            (ArmAction::Disarm, _) => vec![keys::DISARM],
        };
        if bypass {
            keys.push(keys::BYPASS);
        }
        keys
    }

    /// Send an arm/disarm request. Returns the keys sent.
    pub fn arm_disarm(&self, request: ArmRequest) -> Result<Vec<u8>, ArmError> {
        let partition = request.partition;
        let Some(transport) = self.link.get() else {
            return Err(ArmError::PanelInactive { partition });
        };
        if !transport.is_connected() {
            return Err(ArmError::PanelInactive { partition });
        }
        self.readiness
            .check(partition)
            .map_err(|reason| ArmError::NotReady { partition, reason })?;

        let keys = Self::compose_keys(request.action, request.silent, request.bypass);
        debug!("Sending keys {keys:02x?} to partition {partition}");
        transport
            .send_keypress(&keys, partition)
            .map_err(|e| ArmError::SendFailed {
                partition,
                reason: e.to_string(),
            })?;
        info!(
            "Sent {} request to partition {partition} (silent={}, bypass={})",
            request.action, request.silent, request.bypass
        );
        Ok(keys)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::sync::Mutex;

    use crate::error::{BridgeError, Result};
    use crate::message::CommandKind;
    use crate::transport::MessageSink;

    /// Records keypresses; optionally refuses them or reports the gateway down.
    #[derive(Default)]
    pub(crate) struct KeypressRecorder {
        pub sent: Mutex<Vec<(Vec<u8>, u8)>>,
        pub refuse: bool,
        pub disconnected: bool,
    }

    impl PanelTransport for KeypressRecorder {
        fn register_handler(&self, _command: CommandKind, _sink: MessageSink) {}

        fn request_all_equipment(&self) -> Result<()> {
            Ok(())
        }

        fn request_dynamic_data_refresh(&self) -> Result<()> {
            Ok(())
        }

        fn send_keypress(&self, keys: &[u8], partition: u8) -> Result<()> {
            if self.refuse || self.disconnected {
                return Err(BridgeError::NotConnected);
            }
            self.sent.lock().unwrap().push((keys.to_vec(), partition));
            Ok(())
        }

        fn stop(&self) {}

        fn is_connected(&self) -> bool {
            !self.disconnected
        }
    }

    struct NeverReady;

    impl ReadinessCheck for NeverReady {
        fn check(&self, _partition: u8) -> std::result::Result<(), String> {
            Err("Zone 3 is open".to_string())
        }
    }

    fn request(action: ArmAction, silent: bool) -> ArmRequest {
        ArmRequest {
            action,
            silent,
            bypass: false,
            partition: 1,
        }
    }

    #[test]
    fn test_compose_keys() {
        use crate::constants::keys::*;
        assert_eq!(CommandTranslator::compose_keys(ArmAction::Stay, true, false), vec![SILENT, ARM_STAY]);
        assert_eq!(CommandTranslator::compose_keys(ArmAction::Stay, false, false), vec![ARM_STAY_LOUD]);
        assert_eq!(CommandTranslator::compose_keys(ArmAction::Away, true, false), vec![SILENT, ARM_AWAY]);
        assert_eq!(CommandTranslator::compose_keys(ArmAction::Away, false, true), vec![ARM_AWAY_LOUD, BYPASS]);
        assert_eq!(CommandTranslator::compose_keys(ArmAction::Disarm, true, false), vec![DISARM]);
        assert_eq!(CommandTranslator::compose_keys(ArmAction::Disarm, false, false), vec![DISARM]);
    }

    #[test]
    fn test_arm_sends_to_partition() {
        let recorder = Arc::new(KeypressRecorder::default());
        let link = PanelLink::new();
        link.connect(recorder.clone());
        let commands = CommandTranslator::new(link);

        let sent = commands.arm_disarm(request(ArmAction::Stay, true)).unwrap();
        assert_eq!(sent, vec![0x05, 0x28]);
        assert_eq!(*recorder.sent.lock().unwrap(), vec![(vec![0x05, 0x28], 1)]);
    }

    #[test]
    fn test_inactive_panel_sends_nothing() {
        let recorder = Arc::new(KeypressRecorder::default());
        let link = PanelLink::new();
        link.connect(recorder.clone());
        link.clear();
        let commands = CommandTranslator::new(link.clone());

        let err = commands.arm_disarm(request(ArmAction::Away, false)).unwrap_err();
        assert_eq!(err, ArmError::PanelInactive { partition: 1 });
        assert_eq!(err.field(), "partition");
        assert_eq!(err.reason(), "The alarm panel is not active");
        assert!(recorder.sent.lock().unwrap().is_empty());
        assert!(!link.is_active());
    }

    #[test]
    fn test_not_ready_sends_nothing() {
        let recorder = Arc::new(KeypressRecorder::default());
        let link = PanelLink::new();
        link.connect(recorder.clone());
        let commands = CommandTranslator::with_readiness(link, NeverReady);

        let err = commands.arm_disarm(request(ArmAction::Stay, true)).unwrap_err();
        assert_eq!(
            err,
            ArmError::NotReady {
                partition: 1,
                reason: "Zone 3 is open".to_string()
            }
        );
        assert!(recorder.sent.lock().unwrap().is_empty());
    }

    #[test]
    fn test_transport_refusal_is_send_failed() {
        let link = PanelLink::new();
        link.connect(Arc::new(KeypressRecorder {
            refuse: true,
            ..Default::default()
        }));
        let commands = CommandTranslator::new(link);
        let err = commands.arm_disarm(request(ArmAction::Disarm, true)).unwrap_err();
        assert!(matches!(err, ArmError::SendFailed { partition: 1, .. }));
    }

    #[test]
    fn test_disconnected_gateway_is_panel_inactive() {
        let recorder = Arc::new(KeypressRecorder {
            disconnected: true,
            ..Default::default()
        });
        let link = PanelLink::new();
        link.connect(recorder.clone());
        let commands = CommandTranslator::new(link.clone());

        let err = commands.arm_disarm(request(ArmAction::Stay, true)).unwrap_err();
        assert_eq!(err, ArmError::PanelInactive { partition: 1 });
        assert!(recorder.sent.lock().unwrap().is_empty());
        // The link itself stays in place for when the gateway returns
        assert!(link.is_active());
    }
}
