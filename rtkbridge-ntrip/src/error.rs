//! NTRIP error types.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Failures of the forwarding client.
///
/// The display strings are what status readers see as `last_error`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Error, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NtripError {
    #[error("Failed to connect to host")]
    ConnectionFailed,

    #[error("Connection timeout")]
    Timeout,

    #[error("Invalid server response")]
    InvalidResponse,

    #[error("Invalid configuration")]
    InvalidConfig,

    #[error("Authentication failed")]
    AuthFailed,

    #[error("RTCM data timeout")]
    RtcmTimeout,

    #[error("Survey-in active")]
    SurveyInActive,
}

impl NtripError {
    /// Evidence that the caster or network is failing; feeds the backoff.
    pub fn is_connection_class(&self) -> bool {
        matches!(
            self,
            NtripError::ConnectionFailed
                | NtripError::Timeout
                | NtripError::InvalidResponse
                | NtripError::AuthFailed
        )
    }

    /// Raised by the forwarding gate, not by the network.
    pub fn is_gate_class(&self) -> bool {
        matches!(self, NtripError::RtcmTimeout | NtripError::SurveyInActive)
    }
}

/// Why the forwarding gate refused admission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RejectReason {
    RtcmTimeout,
    SurveyInActive,
}

impl From<RejectReason> for NtripError {
    fn from(reason: RejectReason) -> Self {
        match reason {
            RejectReason::RtcmTimeout => NtripError::RtcmTimeout,
            RejectReason::SurveyInActive => NtripError::SurveyInActive,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_classes() {
        // Connection-class
        assert!(NtripError::ConnectionFailed.is_connection_class());
        assert!(NtripError::Timeout.is_connection_class());
        assert!(NtripError::AuthFailed.is_connection_class());
        assert!(NtripError::InvalidResponse.is_connection_class());

        // Gate-class
        assert!(NtripError::RtcmTimeout.is_gate_class());
        assert!(NtripError::SurveyInActive.is_gate_class());
        assert!(!NtripError::RtcmTimeout.is_connection_class());
        assert!(!NtripError::SurveyInActive.is_connection_class());

        // Neither
        assert!(!NtripError::InvalidConfig.is_connection_class());
        assert!(!NtripError::InvalidConfig.is_gate_class());
    }

    #[test]
    fn test_error_display() {
        assert_eq!(
            NtripError::ConnectionFailed.to_string(),
            "Failed to connect to host"
        );
        assert_eq!(NtripError::Timeout.to_string(), "Connection timeout");
        assert_eq!(
            NtripError::InvalidResponse.to_string(),
            "Invalid server response"
        );
        assert_eq!(NtripError::AuthFailed.to_string(), "Authentication failed");
        assert_eq!(NtripError::RtcmTimeout.to_string(), "RTCM data timeout");
    }

    #[test]
    fn test_reject_reason_conversion() {
        assert_eq!(
            NtripError::from(RejectReason::RtcmTimeout),
            NtripError::RtcmTimeout
        );
        assert_eq!(
            NtripError::from(RejectReason::SurveyInActive),
            NtripError::SurveyInActive
        );
    }

    #[test]
    fn test_error_serialization() {
        let json = serde_json::to_string(&NtripError::AuthFailed).unwrap();
        assert_eq!(json, "\"AUTH_FAILED\"");
    }
}
