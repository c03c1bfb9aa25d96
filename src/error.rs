// MIT License - Copyright (c) 2026 Peter Wright
// Concord 4 MQTT bridge

/// All errors that can occur in the concord bridge library.
#[derive(Debug, thiserror::Error)]
pub enum BridgeError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Panel transport not connected")]
    NotConnected,

    #[error("Panel transport closed")]
    TransportClosed,

    #[error("Invalid panel message: {details}")]
    InvalidMessage { details: String },

    #[error("MQTT client error: {0}")]
    Mqtt(#[from] rumqttc::ClientError),

    #[error("Alert delivery failed: {reason}")]
    AlertFailed { reason: String },

    #[error("Invalid configuration: {details}")]
    InvalidConfig { details: String },

    #[error("Channel closed")]
    ChannelClosed,
}

impl BridgeError {
    /// Whether this error is transient and the operation may succeed later.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            BridgeError::Io(_)
                | BridgeError::NotConnected
                | BridgeError::Mqtt(_)
                | BridgeError::ChannelClosed
        )
    }
}

pub type Result<T> = std::result::Result<T, BridgeError>;

/// Failure of an arm/disarm request.
///
/// Every variant is keyed by the partition the request targeted; no
/// keypresses reach the panel when one of these is returned, except for
/// [`ArmError::SendFailed`] where the transport rejected the sequence.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ArmError {
    #[error("partition {partition}: The alarm panel is not active")]
    PanelInactive { partition: u8 },

    #[error("partition {partition}: {reason}")]
    NotReady { partition: u8, reason: String },

    #[error("partition {partition}: {reason}")]
    SendFailed { partition: u8, reason: String },
}

impl ArmError {
    /// The field the error is reported against.
    pub fn field(&self) -> &'static str {
        "partition"
    }

    pub fn partition(&self) -> u8 {
        match self {
            Self::PanelInactive { partition }
            | Self::NotReady { partition, .. }
            | Self::SendFailed { partition, .. } => *partition,
        }
    }

    /// Human-readable reason, without the partition prefix.
    pub fn reason(&self) -> &str {
        match self {
            Self::PanelInactive { .. } => "The alarm panel is not active",
            Self::NotReady { reason, .. } | Self::SendFailed { reason, .. } => reason,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_classification() {
        assert!(BridgeError::NotConnected.is_retryable());
        assert!(BridgeError::ChannelClosed.is_retryable());
        assert!(!BridgeError::TransportClosed.is_retryable());
        assert!(
            !BridgeError::InvalidConfig {
                details: "x".into()
            }
            .is_retryable()
        );
    }

    #[test]
    fn test_arm_error_keyed_by_partition() {
        let err = ArmError::NotReady {
            partition: 2,
            reason: "Zone 3 faulted".to_string(),
        };
        assert_eq!(err.field(), "partition");
        assert_eq!(err.partition(), 2);
        assert_eq!(err.reason(), "Zone 3 faulted");
        assert_eq!(err.to_string(), "partition 2: Zone 3 faulted");

        let inactive = ArmError::PanelInactive { partition: 1 };
        assert_eq!(inactive.reason(), "The alarm panel is not active");
    }
}
